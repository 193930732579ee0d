//! Per-player accumulators for one run.

use std::collections::BTreeMap;

use telemetry::models::{PlayerId, Role, roster};

/// Mutable accumulators for one player in one run.
///
/// Every field only ever grows. Created zeroed at kickoff, written once per
/// tick by the generator, and discarded with the run.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlayerState {
    pub impact_count: u32,
    pub calorie_total: f64,
    pub top_speed: f64,
    pub peak_heart_rate: i32,
}

/// State of every player in a run, keyed by jersey number.
#[derive(Debug, Clone, Default)]
pub struct StateTable {
    players: BTreeMap<PlayerId, (Role, PlayerState)>,
}

impl StateTable {
    /// Zeroed state for the full roster.
    pub fn kickoff() -> Self {
        Self::with_players(roster())
    }

    pub fn with_players(players: impl IntoIterator<Item = (PlayerId, Role)>) -> Self {
        Self {
            players: players
                .into_iter()
                .map(|(id, role)| (id, (role, PlayerState::default())))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Players in ascending jersey order with mutable access to their state.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (PlayerId, Role, &mut PlayerState)> {
        self.players
            .iter_mut()
            .map(|(id, (role, state))| (*id, *role, state))
    }

    pub fn iter(&self) -> impl Iterator<Item = (PlayerId, Role, &PlayerState)> {
        self.players
            .iter()
            .map(|(id, (role, state))| (*id, *role, state))
    }

    /// Mean top speed over all players, 0.0 for an empty table.
    pub fn mean_top_speed(&self) -> f64 {
        if self.players.is_empty() {
            return 0.0;
        }
        let total: f64 = self.players.values().map(|(_, s)| s.top_speed).sum();
        total / self.players.len() as f64
    }
}
