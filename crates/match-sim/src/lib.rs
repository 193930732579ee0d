//! Telemetry simulation for a rugby match.
//!
//! This crate produces per-player samples tick by tick: impacts, late-match
//! fatigue, calories and speed all accumulate in an explicit per-run
//! [`generators::StateTable`] rather than process-wide state.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use match_sim::prelude::*;
//!
//! let driver = RunDriver::new(MatchConfig::default(), store, publisher);
//! let summary = driver.run(RunId::now(), &mut rand::thread_rng()).await;
//! ```

pub mod driver;
pub mod generators;
pub mod profiles;
pub mod random;

pub mod prelude {
    //! Convenient re-exports for common usage.

    pub use crate::driver::{RunDriver, RunSummary};
    pub use crate::generators::{PlayerState, StateTable, TelemetryGenerator, TickContext};
    pub use crate::profiles::{PaceProfile, fatigue_coefficient, velocity_coefficient};
    pub use crate::random::{RandomSource, SequenceRandom};
    pub use telemetry::config::MatchConfig;
    pub use telemetry::models::{RunId, TelemetrySample};
}
