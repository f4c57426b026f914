//! Evaluation grid over the habitat domain
//!
//! Nodes are placed on a uniform lattice that includes both domain edges
//! (`linspace` semantics), stored row-major: index `j * nx + i` for column
//! `i` (x) and row `j` (y).

use crate::core_types::Point2;
use serde::{Deserialize, Serialize};

/// Fewest nodes along an axis
pub const MIN_GRID_NODES: usize = 2;

/// Most nodes along an axis
pub const MAX_GRID_NODES: usize = 512;

/// Uniform node lattice over a rectangular domain
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    origin: Point2,
    extent: Point2,
    nx: usize,
    ny: usize,
}

impl GridSpec {
    /// Lattice spanning `origin`..`origin + extent` with `nx × ny` nodes
    ///
    /// Node counts are clamped to [`MIN_GRID_NODES`]..=[`MAX_GRID_NODES`] and
    /// a non-positive extent is widened to 1 m so node spacing never vanishes.
    #[must_use]
    pub fn new(origin: Point2, extent: Point2, nx: usize, ny: usize) -> Self {
        let axis = |v: f64| if v.is_finite() && v > 0.0 { v } else { 1.0 };
        Self {
            origin,
            extent: Point2::new(axis(extent.x), axis(extent.y)),
            nx: nx.clamp(MIN_GRID_NODES, MAX_GRID_NODES),
            ny: ny.clamp(MIN_GRID_NODES, MAX_GRID_NODES),
        }
    }

    /// Lattice covering the box `min..max`, expanded by `margin` on every side
    #[must_use]
    pub fn covering(min: Point2, max: Point2, margin: f64, quality: GridQuality) -> Self {
        let margin = Point2::new(margin, margin);
        let origin = min - margin;
        let extent = (max + margin) - origin;
        let (nx, ny) = quality.node_counts(extent);
        Self::new(origin, extent, nx, ny)
    }

    /// Lower-left corner
    pub fn origin(&self) -> Point2 {
        self.origin
    }

    /// Domain width and height
    pub fn extent(&self) -> Point2 {
        self.extent
    }

    /// Node count along x
    pub fn nx(&self) -> usize {
        self.nx
    }

    /// Node count along y
    pub fn ny(&self) -> usize {
        self.ny
    }

    /// Total node count
    pub fn len(&self) -> usize {
        self.nx * self.ny
    }

    /// Always false: a grid has at least 2×2 nodes
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Spacing between adjacent nodes along x and y
    pub fn spacing(&self) -> Point2 {
        Point2::new(
            self.extent.x / (self.nx - 1) as f64,
            self.extent.y / (self.ny - 1) as f64,
        )
    }

    /// Position of node (`i`, `j`)
    pub fn node(&self, i: usize, j: usize) -> Point2 {
        let spacing = self.spacing();
        Point2::new(
            self.origin.x + spacing.x * i as f64,
            self.origin.y + spacing.y * j as f64,
        )
    }

    /// Flat row-major index of node (`i`, `j`)
    #[inline]
    pub fn index(&self, i: usize, j: usize) -> usize {
        j * self.nx + i
    }

    /// All node positions in row-major order
    pub fn points(&self) -> Vec<Point2> {
        (0..self.ny)
            .flat_map(|j| (0..self.nx).map(move |i| (i, j)))
            .map(|(i, j)| self.node(i, j))
            .collect()
    }

    /// Node nearest to a point, clamped into the grid
    pub fn nearest_node(&self, point: Point2) -> (usize, usize) {
        let spacing = self.spacing();
        let snap = |v: f64, origin: f64, step: f64, n: usize| {
            let k = ((v - origin) / step).round();
            if k.is_finite() && k > 0.0 {
                (k as usize).min(n - 1)
            } else {
                0
            }
        };
        (
            snap(point.x, self.origin.x, spacing.x, self.nx),
            snap(point.y, self.origin.y, spacing.y, self.ny),
        )
    }
}

impl Default for GridSpec {
    /// 50 m × 50 m at 1 m spacing
    fn default() -> Self {
        Self::new(Point2::zeros(), Point2::new(50.0, 50.0), 51, 51)
    }
}

/// Resolution preset for the evaluation grid
///
/// Prediction cost scales with node count, so coarser grids trade display
/// detail for faster estimator refreshes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GridQuality {
    /// ~2 m node spacing
    Coarse,
    /// ~1 m node spacing
    #[default]
    Medium,
    /// ~0.5 m node spacing
    Fine,
}

impl GridQuality {
    /// Target node spacing in meters
    #[must_use]
    pub const fn target_spacing(self) -> f64 {
        match self {
            Self::Coarse => 2.0,
            Self::Medium => 1.0,
            Self::Fine => 0.5,
        }
    }

    /// Node counts that give roughly the target spacing over `extent`
    #[must_use]
    pub fn node_counts(self, extent: Point2) -> (usize, usize) {
        let spacing = self.target_spacing();
        let count = |len: f64| {
            let n = (len / spacing).ceil();
            if n.is_finite() && n > 0.0 {
                (n as usize + 1).clamp(MIN_GRID_NODES, MAX_GRID_NODES)
            } else {
                MIN_GRID_NODES
            }
        };
        (count(extent.x), count(extent.y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_nodes_include_both_edges() {
        let grid = GridSpec::new(Point2::new(-5.0, 0.0), Point2::new(10.0, 4.0), 11, 5);
        assert_eq!(grid.node(0, 0), Point2::new(-5.0, 0.0));
        let far = grid.node(10, 4);
        assert_abs_diff_eq!(far.x, 5.0, epsilon = 1e-12);
        assert_abs_diff_eq!(far.y, 4.0, epsilon = 1e-12);
        assert_eq!(grid.len(), 55);
    }

    #[test]
    fn test_points_are_row_major() {
        let grid = GridSpec::new(Point2::zeros(), Point2::new(2.0, 1.0), 3, 2);
        let pts = grid.points();
        assert_eq!(pts.len(), 6);
        assert_eq!(pts[grid.index(2, 0)], Point2::new(2.0, 0.0));
        assert_eq!(pts[grid.index(0, 1)], Point2::new(0.0, 1.0));
    }

    #[test]
    fn test_degenerate_inputs_clamped() {
        let grid = GridSpec::new(Point2::zeros(), Point2::new(0.0, -3.0), 0, 10_000);
        assert_eq!(grid.nx(), MIN_GRID_NODES);
        assert_eq!(grid.ny(), MAX_GRID_NODES);
        assert_eq!(grid.extent(), Point2::new(1.0, 1.0));
    }

    #[test]
    fn test_nearest_node_clamps() {
        let grid = GridSpec::new(Point2::zeros(), Point2::new(10.0, 10.0), 11, 11);
        assert_eq!(grid.nearest_node(Point2::new(3.4, 6.6)), (3, 7));
        assert_eq!(grid.nearest_node(Point2::new(-8.0, 40.0)), (0, 10));
    }

    #[test]
    fn test_quality_node_counts() {
        let extent = Point2::new(20.0, 10.0);
        assert_eq!(GridQuality::Coarse.node_counts(extent), (11, 6));
        assert_eq!(GridQuality::Medium.node_counts(extent), (21, 11));
        assert_eq!(GridQuality::Fine.node_counts(extent), (41, 21));
    }

    #[test]
    fn test_covering_adds_margin() {
        let grid = GridSpec::covering(
            Point2::new(0.0, 0.0),
            Point2::new(20.0, 10.0),
            2.0,
            GridQuality::Medium,
        );
        assert_eq!(grid.origin(), Point2::new(-2.0, -2.0));
        assert_eq!(grid.extent(), Point2::new(24.0, 14.0));
        assert_eq!((grid.nx(), grid.ny()), (25, 15));
    }
}
