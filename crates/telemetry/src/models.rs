use std::fmt;

use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, macros::format_description};

/// Number of players fielded by one side.
pub const SQUAD_SIZE: u8 = 15;

/// Jersey number of a player, always in `1..=15`.
pub type PlayerId = u8;

/// Returns true if `id` names a player on the roster.
pub fn is_valid_player(id: PlayerId) -> bool {
    (1..=SQUAD_SIZE).contains(&id)
}

/// Playing position. Fixed for a player for the lifetime of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Prop,
    Hooker,
    Lock,
    Flanker,
    NumberEight,
    ScrumHalf,
    FlyHalf,
    Centre,
    Wing,
    Fullback,
}

/// Coarse grouping of positions by how much running they do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionGroup {
    FrontRow,
    BackFive,
    InsideBacks,
    OutsideBacks,
}

impl Role {
    /// Role played by the given jersey number, or `None` off the roster.
    pub fn for_player(id: PlayerId) -> Option<Self> {
        let role = match id {
            1 | 2 => Role::Prop,
            3 => Role::Hooker,
            4 | 5 => Role::Lock,
            6 | 7 => Role::Flanker,
            8 => Role::NumberEight,
            9 => Role::ScrumHalf,
            10 => Role::FlyHalf,
            11 | 12 => Role::Centre,
            13 | 14 => Role::Wing,
            15 => Role::Fullback,
            _ => return None,
        };
        Some(role)
    }

    pub fn group(self) -> PositionGroup {
        match self {
            Role::Prop | Role::Hooker => PositionGroup::FrontRow,
            Role::Lock | Role::Flanker | Role::NumberEight => PositionGroup::BackFive,
            Role::ScrumHalf | Role::FlyHalf | Role::Centre => PositionGroup::InsideBacks,
            Role::Wing | Role::Fullback => PositionGroup::OutsideBacks,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Prop => "prop",
            Role::Hooker => "hooker",
            Role::Lock => "lock",
            Role::Flanker => "flanker",
            Role::NumberEight => "number_eight",
            Role::ScrumHalf => "scrum_half",
            Role::FlyHalf => "fly_half",
            Role::Centre => "centre",
            Role::Wing => "wing",
            Role::Fullback => "fullback",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The full squad in ascending jersey order.
pub fn roster() -> impl Iterator<Item = (PlayerId, Role)> {
    (1..=SQUAD_SIZE).filter_map(|id| Role::for_player(id).map(|role| (id, role)))
}

/// Identifier of one simulated match.
///
/// Built from the run's UTC start time so that lexicographic order is
/// chronological order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    pub const PREFIX: &'static str = "simulations_";

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Run id for a match starting at `started_at`.
    pub fn from_start(started_at: OffsetDateTime) -> Self {
        let format = format_description!("[year][month][day]_[hour][minute][second]");
        let utc = started_at.to_offset(time::UtcOffset::UTC);
        // Formatting a fully specified date-time with numeric components cannot fail.
        let stamp = utc.format(&format).unwrap_or_default();
        Self(format!("{}{stamp}", Self::PREFIX))
    }

    pub fn now() -> Self {
        Self::from_start(OffsetDateTime::now_utc())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn epoch() -> OffsetDateTime {
    OffsetDateTime::UNIX_EPOCH
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BloodPressure {
    #[serde(default)]
    pub systolic: i32,
    #[serde(default)]
    pub diastolic: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Gps {
    #[serde(default)]
    pub x: u32,
    #[serde(default)]
    pub y: u32,
    #[serde(default)]
    pub velocity: f64,
    #[serde(default)]
    pub top_speed: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Impacts {
    /// Cumulative impacts up to and including this tick.
    #[serde(default)]
    pub impact_count: u32,
    /// Force of this tick's impact, 0.0 if none occurred.
    #[serde(default)]
    pub impact_force: f64,
}

/// One reading for one player at one tick.
///
/// Samples are immutable once produced. Every field decodes to its zero
/// default when absent so that documents written by older schemas can
/// still be aggregated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    #[serde(with = "time::serde::rfc3339", default = "epoch")]
    pub timestamp: OffsetDateTime,
    #[serde(default)]
    pub elapsed_time: u32,
    #[serde(default)]
    pub player_id: PlayerId,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub heart_rate: i32,
    #[serde(default)]
    pub body_temperature: f64,
    #[serde(default)]
    pub blood_pressure: BloodPressure,
    /// Cumulative calories up to and including this tick.
    #[serde(default)]
    pub calories_consumed: f64,
    #[serde(default)]
    pub gps: Gps,
    #[serde(default)]
    pub impacts: Impacts,
    #[serde(default)]
    pub impact_to_play_ratio: f64,
    #[serde(default)]
    pub velocity_variability: f64,
    #[serde(default)]
    pub max_heart_rate: i32,
    #[serde(default)]
    pub impact_severity_index: f64,
}

/// Position-only view of a sample, published on the coordinates feed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoordinatesUpdate {
    pub player_id: PlayerId,
    pub role: Role,
    pub gps: PitchPosition,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PitchPosition {
    pub x: u32,
    pub y: u32,
}

impl From<&TelemetrySample> for CoordinatesUpdate {
    fn from(sample: &TelemetrySample) -> Self {
        Self {
            player_id: sample.player_id,
            role: sample.role,
            gps: PitchPosition {
                x: sample.gps.x,
                y: sample.gps.y,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ImpactSummary {
    pub impact_count: u32,
    pub average_impact_force: f64,
}

/// Per-player summary of a run. Derived on demand, never stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateMetrics {
    pub average_velocity: f64,
    pub distance_traveled_km: f64,
    pub calories_consumed: f64,
    pub heart_rate: i32,
    pub body_temperature: f64,
    pub blood_pressure: BloodPressure,
    pub impacts: ImpactSummary,
    pub impact_to_play_ratio: f64,
    pub velocity_variability: f64,
    pub max_heart_rate: i32,
}

/// Rounds half to even at `decimals` places.
///
/// Rounds the exact binary value, so a literal such as 0.65, stored slightly
/// above the tie, goes up to 0.7 rather than being scaled onto the tie first.
pub fn round_to(value: f64, decimals: usize) -> f64 {
    format!("{value:.decimals$}").parse().unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_roster_covers_squad_in_order() {
        let ids: Vec<PlayerId> = roster().map(|(id, _)| id).collect();
        assert_eq!(ids, (1..=15).collect::<Vec<_>>());
        assert_eq!(Role::for_player(3), Some(Role::Hooker));
        assert_eq!(Role::for_player(15), Some(Role::Fullback));
        assert_eq!(Role::for_player(0), None);
        assert_eq!(Role::for_player(16), None);
    }

    #[test]
    fn test_position_groups() {
        assert_eq!(Role::Hooker.group(), PositionGroup::FrontRow);
        assert_eq!(Role::NumberEight.group(), PositionGroup::BackFive);
        assert_eq!(Role::Centre.group(), PositionGroup::InsideBacks);
        assert_eq!(Role::Fullback.group(), PositionGroup::OutsideBacks);
    }

    #[test]
    fn test_run_id_sorts_chronologically() {
        let earlier = RunId::from_start(datetime!(2024-05-01 09:59:59 UTC));
        let later = RunId::from_start(datetime!(2024-05-01 10:00:00 UTC));
        assert_eq!(earlier.as_str(), "simulations_20240501_095959");
        assert!(earlier < later);
    }

    #[test]
    fn test_sample_missing_fields_decode_to_zero() {
        let json = serde_json::json!({
            "elapsed_time": 12,
            "player_id": 4,
            "role": "lock",
            "gps": { "velocity": 7.5 }
        });
        let sample: TelemetrySample = serde_json::from_value(json).unwrap();

        assert_eq!(sample.elapsed_time, 12);
        assert_eq!(sample.role, Role::Lock);
        assert_eq!(sample.gps.velocity, 7.5);
        assert_eq!(sample.gps.top_speed, 0.0);
        assert_eq!(sample.impacts, Impacts::default());
        assert_eq!(sample.heart_rate, 0);
        assert_eq!(sample.timestamp, OffsetDateTime::UNIX_EPOCH);
    }

    #[test]
    fn test_round_half_to_even() {
        assert_eq!(round_to(104.5, 0), 104.0);
        assert_eq!(round_to(105.5, 0), 106.0);
        assert_eq!(round_to(7.5, 2), 7.5);
        assert_eq!(round_to(1.234, 1), 1.2);
        assert_eq!(round_to(0.125, 2), 0.12);
    }

    #[test]
    fn test_round_uses_exact_binary_value() {
        // Each of these is stored a hair away from the decimal tie.
        assert_eq!(round_to(0.45, 1), 0.5);
        assert_eq!(round_to(0.65, 1), 0.7);
        assert_eq!(round_to(1.95, 1), 1.9);
        assert_eq!(round_to(0.5 * 1.3, 1), 0.7);
        assert_eq!(round_to(2.675, 2), 2.67);
    }
}
