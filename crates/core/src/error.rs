//! Error types
//!
//! Configuration errors are reported by the registry operations that detect
//! them. Numerical and capability errors never escape the tick loop: the
//! reconstructor converts them into a fallback status.

use crate::core_types::{DoorId, RoomId, SensorId};

/// Configuration errors raised by habitat edits
#[derive(Debug, Clone, PartialEq)]
pub enum HabitatError {
    /// No room with this id exists
    UnknownRoom(RoomId),
    /// No door with this id exists
    UnknownDoor(DoorId),
    /// No sensor with this id exists
    UnknownSensor(SensorId),
    /// A door cannot connect a room to itself
    SelfReferencingDoor(RoomId),
    /// Footprint geometry is unusable
    InvalidShape(String),
}

impl std::fmt::Display for HabitatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HabitatError::UnknownRoom(id) => write!(f, "Unknown room: {id}"),
            HabitatError::UnknownDoor(id) => write!(f, "Unknown door: {id}"),
            HabitatError::UnknownSensor(id) => write!(f, "Unknown sensor: {id}"),
            HabitatError::SelfReferencingDoor(id) => {
                write!(f, "Door cannot connect room {id} to itself")
            }
            HabitatError::InvalidShape(msg) => write!(f, "Invalid room shape: {msg}"),
        }
    }
}

impl std::error::Error for HabitatError {}

/// Errors from fitting or evaluating a spatial estimator
#[derive(Debug, Clone, PartialEq)]
pub enum EstimatorError {
    /// Fit was called without any samples
    NoSamples,
    /// Covariance matrix could not be factorised
    IllConditioned(String),
    /// Hyperparameter search found no usable point
    OptimizerFailed(String),
    /// Backend cannot regress at all (passthrough, or GP compiled out)
    Unavailable,
    /// A sample position or value was NaN or infinite
    NonFiniteInput,
    /// Predict was called before a successful fit
    NotFitted,
}

impl std::fmt::Display for EstimatorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EstimatorError::NoSamples => write!(f, "No samples to fit"),
            EstimatorError::IllConditioned(msg) => write!(f, "Ill-conditioned covariance: {msg}"),
            EstimatorError::OptimizerFailed(msg) => write!(f, "Optimizer failed: {msg}"),
            EstimatorError::Unavailable => write!(f, "Regression backend unavailable"),
            EstimatorError::NonFiniteInput => write!(f, "Non-finite sample input"),
            EstimatorError::NotFitted => write!(f, "Estimator has not been fitted"),
        }
    }
}

impl std::error::Error for EstimatorError {}
