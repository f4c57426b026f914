//! Fit timing helpers for estimator refits.
//!
//! `FitTimer` is an RAII scope: it logs the elapsed time at `debug` level
//! when dropped, so a refit is timed no matter which path it exits through.

use crate::core_types::GasSpecies;
use std::time::Instant;
use tracing::debug;

/// Measures one refit and logs its duration on drop.
pub struct FitTimer {
    start: Instant,
    gas: GasSpecies,
    samples: usize,
}

impl FitTimer {
    /// Starts timing a refit of `gas` over `samples` readings.
    pub fn new(gas: GasSpecies, samples: usize) -> Self {
        Self {
            start: Instant::now(),
            gas,
            samples,
        }
    }

    /// Gets elapsed time in milliseconds.
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Drop for FitTimer {
    fn drop(&mut self) {
        debug!(
            "{} refit on {} samples took {:.2} ms",
            self.gas,
            self.samples,
            self.elapsed_ms()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_fit_timer_measures_time() {
        let timer = FitTimer::new(GasSpecies::O2, 4);
        thread::sleep(Duration::from_millis(10));
        let elapsed = timer.elapsed_ms();
        assert!(elapsed >= 10.0, "Expected at least 10ms, got {elapsed}");
    }
}
