//! Top-level simulation configuration

use super::gas_balance::BalanceConfig;
use crate::core_types::AmbientBaseline;
use crate::estimator::EstimatorConfig;
use crate::field::GridSpec;
use serde::{Deserialize, Serialize};

/// Everything a [`HabitatSimulation`](super::HabitatSimulation) is built from
///
/// All parts stay mutable at runtime through the simulation's setters.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Evaluation grid for ground-truth and reconstructed fields
    pub grid: GridSpec,
    /// Exterior atmosphere
    pub ambient: AmbientBaseline,
    /// Gas model rates
    pub balance: BalanceConfig,
    /// Estimator backend, hyperparameters and refit policy
    pub estimator: EstimatorConfig,
    /// Sensor noise seed; `None` seeds from the OS
    pub random_seed: Option<u64>,
}

impl SimulationConfig {
    /// Same configuration with a fixed sensor-noise seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.random_seed = Some(seed);
        self
    }

    /// Same configuration on a different grid
    pub fn with_grid(mut self, grid: GridSpec) -> Self {
        self.grid = grid;
        self
    }
}
