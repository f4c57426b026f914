//! Vector type alias for 2D habitat positions.

use nalgebra::Vector2;

/// 2D point in the habitat's floor-plan coordinate space (meters).
///
/// This is a simple alias for `nalgebra::Vector2<f64>`, used for room
/// geometry, sensor placement and estimation grid nodes.
pub type Point2 = Vector2<f64>;
