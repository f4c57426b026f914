//! Habitat Atmosphere Core Library
//!
//! Gas balance and spatial estimation for a pressurized Mars surface habitat.
//! Rooms exchange O₂ and CO₂ through doors, with the thin CO₂ atmosphere
//! outside and with their crew. Noisy sensors sample the air, and a Gaussian
//! process reconstructs a continuous field per gas from those readings.
//!
//! ## Per-tick pipeline
//!
//! - Gas balance: respiration, breach leakage and door exchange per room
//! - Ground truth: room levels rasterized onto a regular grid
//! - Sensing: Gaussian noise on the truth at each sensor position
//! - Reconstruction: GP fit (on a refit cadence) and prediction per gas,
//!   falling back to ground truth when no model can be produced

// Core types and utilities
pub mod core_types;
pub mod error;
pub mod geometry;

// Habitat model and gas dynamics
pub mod habitat;
pub mod health;
pub mod simulation;

// Sensing and estimation
pub mod estimator;
pub mod field;
pub mod sensor;

// Re-export core types
pub use core_types::{AmbientBaseline, DoorId, GasPair, GasSpecies, Point2, RoomId, SensorId};
pub use error::{EstimatorError, HabitatError};
pub use geometry::Shape;

// Re-export habitat types
pub use habitat::{Door, DoorEndpoint, Habitat, Room, RoomKind};
pub use health::HealthEffects;
pub use sensor::{Sensor, SensorModel};

// Re-export estimation types
pub use estimator::{
    create_estimator, Estimator, EstimatorConfig, EstimatorKind, EstimatorStatus,
    GasReconstructor, RefitMode, Sample,
};
pub use field::{GasField, GridQuality, GridSpec};

// Re-export simulation types
pub use simulation::{
    BalanceConfig, GasBalanceSimulator, HabitatSimulation, SimulationClock, SimulationConfig,
};
