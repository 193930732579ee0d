//! Late-match fatigue and role-banded pace.
//!
//! Players run at full pace until the hour mark. After that each minute
//! adds one percent of fatigue, capped at 50%, and velocity draws are
//! divided by the fatigue coefficient.

use telemetry::config::VelocityBands;
use telemetry::models::Role;

/// Last tick played without fatigue.
pub const FATIGUE_ONSET_TICK: u32 = 60;

/// Fatigue multiplier at `elapsed_time`, in `[1.0, 1.5]`.
pub fn fatigue_coefficient(elapsed_time: u32) -> f64 {
    if elapsed_time > FATIGUE_ONSET_TICK {
        let over = f64::from(elapsed_time - FATIGUE_ONSET_TICK);
        (1.0 + 0.01 * over).clamp(1.0, 1.5)
    } else {
        1.0
    }
}

/// Multiplier applied to velocity draws at `elapsed_time`.
pub fn velocity_coefficient(elapsed_time: u32) -> f64 {
    1.0 / fatigue_coefficient(elapsed_time)
}

/// Pace limits for each position.
#[derive(Debug, Clone, Copy, Default)]
pub struct PaceProfile {
    bands: VelocityBands,
}

impl PaceProfile {
    pub fn new(bands: VelocityBands) -> Self {
        Self { bands }
    }

    /// Upper bound of the velocity draw for `role` before fatigue.
    pub fn max_velocity(&self, role: Role) -> f64 {
        self.bands.max_velocity(role)
    }
}
