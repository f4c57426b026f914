//! Core types and utilities

pub mod gas;
pub mod ids;
pub mod vec2;

pub use gas::*;
pub use ids::{DoorId, RoomId, SensorId};
pub(crate) use ids::IdCounter;
pub use vec2::Point2;
