//! Room footprint geometry
//!
//! Footprints are a closed set of shape variants with a uniform capability
//! set (`area`, `contains`, `bounding_box`, `centroid`). Everything the gas
//! model needs from geometry goes through these four operations.

use crate::core_types::Point2;
use serde::{Deserialize, Serialize};

/// Room footprint in floor-plan coordinates (meters)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    /// Axis-aligned rectangle spanning `min`..`max`
    Rect {
        /// Lower-left corner
        min: Point2,
        /// Upper-right corner
        max: Point2,
    },
    /// Circle
    Circle {
        /// Center point
        center: Point2,
        /// Radius in meters
        radius: f64,
    },
    /// Simple polygon, vertices in either winding order, implicitly closed
    Polygon {
        /// Polygon vertices
        vertices: Vec<Point2>,
    },
}

impl Shape {
    /// Rectangle from its lower-left corner and size
    #[must_use]
    pub fn rect(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::Rect {
            min: Point2::new(x.min(x + width), y.min(y + height)),
            max: Point2::new(x.max(x + width), y.max(y + height)),
        }
    }

    /// Circle from center and radius
    #[must_use]
    pub fn circle(cx: f64, cy: f64, radius: f64) -> Self {
        Self::Circle {
            center: Point2::new(cx, cy),
            radius: radius.abs(),
        }
    }

    /// Polygon from `(x, y)` vertex pairs
    #[must_use]
    pub fn polygon(vertices: &[(f64, f64)]) -> Self {
        Self::Polygon {
            vertices: vertices.iter().map(|&(x, y)| Point2::new(x, y)).collect(),
        }
    }

    /// Footprint area in m²
    #[must_use]
    pub fn area(&self) -> f64 {
        match self {
            Self::Rect { min, max } => (max.x - min.x) * (max.y - min.y),
            Self::Circle { radius, .. } => std::f64::consts::PI * radius * radius,
            Self::Polygon { vertices } => shoelace_area(vertices).abs(),
        }
    }

    /// Point containment test (boundary counts as inside for rect and circle)
    #[must_use]
    pub fn contains(&self, point: Point2) -> bool {
        match self {
            Self::Rect { min, max } => {
                point.x >= min.x && point.x <= max.x && point.y >= min.y && point.y <= max.y
            }
            Self::Circle { center, radius } => (point - center).norm_squared() <= radius * radius,
            Self::Polygon { vertices } => polygon_contains(vertices, point),
        }
    }

    /// Axis-aligned bounding box as `(min, max)`
    #[must_use]
    pub fn bounding_box(&self) -> (Point2, Point2) {
        match self {
            Self::Rect { min, max } => (*min, *max),
            Self::Circle { center, radius } => (
                Point2::new(center.x - radius, center.y - radius),
                Point2::new(center.x + radius, center.y + radius),
            ),
            Self::Polygon { vertices } => {
                let mut lo = Point2::new(f64::INFINITY, f64::INFINITY);
                let mut hi = Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
                for v in vertices {
                    lo = lo.inf(v);
                    hi = hi.sup(v);
                }
                (lo, hi)
            }
        }
    }

    /// Area centroid
    #[must_use]
    pub fn centroid(&self) -> Point2 {
        match self {
            Self::Rect { min, max } => (min + max) * 0.5,
            Self::Circle { center, .. } => *center,
            Self::Polygon { vertices } => polygon_centroid(vertices),
        }
    }

    /// Check the shape is usable as a room footprint
    ///
    /// # Errors
    /// Returns a description when a coordinate is non-finite or the area is
    /// not strictly positive.
    pub fn validate(&self) -> Result<(), String> {
        let finite = match self {
            Self::Rect { min, max } => min.iter().chain(max.iter()).all(|c| c.is_finite()),
            Self::Circle { center, radius } => {
                center.iter().all(|c| c.is_finite()) && radius.is_finite()
            }
            Self::Polygon { vertices } => {
                if vertices.len() < 3 {
                    return Err(format!(
                        "polygon needs at least 3 vertices, got {}",
                        vertices.len()
                    ));
                }
                vertices.iter().flat_map(|v| v.iter()).all(|c| c.is_finite())
            }
        };
        if !finite {
            return Err("shape has non-finite coordinates".to_string());
        }
        let area = self.area();
        if area <= 0.0 {
            return Err(format!("shape area must be positive, got {area}"));
        }
        Ok(())
    }
}

/// Signed shoelace area (positive for counter-clockwise winding)
fn shoelace_area(vertices: &[Point2]) -> f64 {
    let n = vertices.len();
    if n < 3 {
        return 0.0;
    }
    let mut twice_area = 0.0;
    for i in 0..n {
        let a = vertices[i];
        let b = vertices[(i + 1) % n];
        twice_area += a.x * b.y - b.x * a.y;
    }
    twice_area * 0.5
}

/// Even-odd ray casting
fn polygon_contains(vertices: &[Point2], point: Point2) -> bool {
    let n = vertices.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let vi = vertices[i];
        let vj = vertices[j];
        if (vi.y > point.y) != (vj.y > point.y) {
            let x_cross = vj.x + (point.y - vj.y) * (vi.x - vj.x) / (vi.y - vj.y);
            if point.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

fn polygon_centroid(vertices: &[Point2]) -> Point2 {
    let signed = shoelace_area(vertices);
    if signed.abs() < f64::EPSILON {
        // Degenerate: fall back to the vertex mean
        let n = vertices.len().max(1) as f64;
        return vertices.iter().fold(Point2::zeros(), |acc, v| acc + v) / n;
    }
    let n = vertices.len();
    let mut c = Point2::zeros();
    for i in 0..n {
        let a = vertices[i];
        let b = vertices[(i + 1) % n];
        let cross = a.x * b.y - b.x * a.y;
        c += (a + b) * cross;
    }
    c / (6.0 * signed)
}
