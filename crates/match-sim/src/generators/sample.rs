//! One player, one tick: state update and derived sample.

use time::OffsetDateTime;

use telemetry::config::MatchConfig;
use telemetry::models::{BloodPressure, Gps, Impacts, PlayerId, Role, TelemetrySample, round_to};

use super::state::PlayerState;
use crate::profiles::{PaceProfile, velocity_coefficient};
use crate::random::RandomSource;

/// Pitch length and width in the units of `gps.x` / `gps.y`.
const PITCH_LENGTH: u32 = 120;
const PITCH_WIDTH: u32 = 50;

/// Values shared by every player generated within one tick.
#[derive(Debug, Clone, Copy)]
pub struct TickContext {
    pub elapsed_time: u32,
    /// Mean top speed of the squad, snapshotted before the tick began.
    pub mean_top_speed: f64,
    pub timestamp: OffsetDateTime,
}

impl TickContext {
    pub fn new(elapsed_time: u32, mean_top_speed: f64) -> Self {
        Self {
            elapsed_time,
            mean_top_speed,
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}

/// Advances a player's accumulators by one tick and derives the sample.
#[derive(Debug, Clone)]
pub struct TelemetryGenerator {
    impact_probability: f64,
    pace: PaceProfile,
}

impl TelemetryGenerator {
    pub fn new(config: &MatchConfig) -> Self {
        Self {
            impact_probability: config.impact_probability,
            pace: PaceProfile::new(config.velocity_bands),
        }
    }

    /// Generates the sample for `player_id` at `tick`, mutating `state`.
    ///
    /// Draw order is fixed: impact occurrence, velocity, then pitch x and y.
    pub fn generate(
        &self,
        player_id: PlayerId,
        role: Role,
        tick: &TickContext,
        state: &mut PlayerState,
        rng: &mut (impl RandomSource + ?Sized),
    ) -> TelemetrySample {
        let elapsed_time = tick.elapsed_time;

        let impact = rng.chance(self.impact_probability);
        if impact {
            state.impact_count += 1;
        }

        let raw_velocity = rng.uniform(0.0, self.pace.max_velocity(role));
        let velocity = round_to(raw_velocity * velocity_coefficient(elapsed_time), 1);
        state.top_speed = state.top_speed.max(velocity);

        let impact_count = f64::from(state.impact_count);
        let heart_rate = round_to(100.0 + 1.5 * velocity + 2.0 * impact_count, 0) as i32;
        state.peak_heart_rate = state.peak_heart_rate.max(heart_rate);

        let hr = f64::from(heart_rate);
        state.calorie_total += (hr / 150.0) * (velocity / 10.0) * 5.0;

        let body_temperature = round_to(36.5 + 0.01 * (hr - 120.0) + 0.02 * velocity, 1);
        let blood_pressure = BloodPressure {
            systolic: round_to(110.0 + 0.5 * (hr - 120.0), 0) as i32,
            diastolic: round_to(70.0 + 0.3 * (hr - 120.0), 0) as i32,
        };

        let impact_force = if impact {
            round_to(velocity * (1.0 + 0.1 * impact_count), 1)
        } else {
            0.0
        };

        let impact_to_play_ratio = if elapsed_time > 0 {
            impact_count / (f64::from(elapsed_time) / 10.0)
        } else {
            0.0
        };

        let mean = tick.mean_top_speed;
        let velocity_variability = if mean != 0.0 {
            (velocity - mean).abs() / mean
        } else {
            0.0
        };

        let x = rng.uniform_int(0, PITCH_LENGTH);
        let y = rng.uniform_int(0, PITCH_WIDTH);

        TelemetrySample {
            timestamp: tick.timestamp,
            elapsed_time,
            player_id,
            role,
            heart_rate,
            body_temperature,
            blood_pressure,
            calories_consumed: state.calorie_total,
            gps: Gps {
                x,
                y,
                velocity,
                top_speed: state.top_speed,
            },
            impacts: Impacts {
                impact_count: state.impact_count,
                impact_force,
            },
            impact_to_play_ratio,
            velocity_variability,
            max_heart_rate: state.peak_heart_rate,
            impact_severity_index: impact_count * (impact_force / 10.0),
        }
    }
}
