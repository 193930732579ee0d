//! Per-tick telemetry generation.
//!
//! - [`TelemetryGenerator`]: advances one player's state by one tick and
//!   derives the sample
//! - [`PlayerState`] / [`StateTable`]: the per-run accumulators it mutates

pub mod sample;
pub mod state;

pub use self::sample::{TelemetryGenerator, TickContext};
pub use self::state::{PlayerState, StateTable};
