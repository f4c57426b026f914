//! Wall-clock to simulated-time conversion
//!
//! The simulation itself only understands `tick(dt_hours)`. A
//! `SimulationClock` is the tick source a driver (GUI timer, headless loop)
//! uses to turn elapsed real time into simulated hours.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default speed-up: one simulated hour per real second
pub const DEFAULT_TIME_SCALE: f64 = 1.0;

/// Converts real elapsed time into simulated hours
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationClock {
    time_scale: f64,
    paused: bool,
    elapsed_hours: f64,
}

impl SimulationClock {
    /// Clock running at `time_scale` simulated hours per real second
    #[must_use]
    pub fn new(time_scale: f64) -> Self {
        let mut clock = Self {
            time_scale: DEFAULT_TIME_SCALE,
            paused: false,
            elapsed_hours: 0.0,
        };
        clock.set_time_scale(time_scale);
        clock
    }

    /// Simulated hours per real second
    pub fn time_scale(&self) -> f64 {
        self.time_scale
    }

    /// Change speed; negative or non-finite values are ignored
    pub fn set_time_scale(&mut self, time_scale: f64) {
        if time_scale.is_finite() && time_scale >= 0.0 {
            self.time_scale = time_scale;
        }
    }

    /// Stop or resume simulated time
    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// Whether time is stopped
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Total simulated hours handed out
    pub fn elapsed_hours(&self) -> f64 {
        self.elapsed_hours
    }

    /// Convert `real` elapsed time into a simulated step and accumulate it
    ///
    /// Returns 0 while paused.
    pub fn advance(&mut self, real: Duration) -> f64 {
        if self.paused {
            return 0.0;
        }
        let dt_hours = real.as_secs_f64() * self.time_scale;
        self.elapsed_hours += dt_hours;
        dt_hours
    }
}

impl Default for SimulationClock {
    fn default() -> Self {
        Self::new(DEFAULT_TIME_SCALE)
    }
}
