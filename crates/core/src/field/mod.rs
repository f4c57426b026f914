//! Gas concentration fields
//!
//! A [`GasField`] holds one value per [`GridSpec`] node for one gas species.
//! Two kinds exist per gas: ground truth (rooms and ambient, computed
//! deterministically) and reconstructed (estimator output).

mod grid;

pub use grid::{GridQuality, GridSpec, MAX_GRID_NODES, MIN_GRID_NODES};

use crate::core_types::{AmbientBaseline, GasSpecies, Point2};
use crate::habitat::Habitat;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Grid of concentrations for one gas, row-major
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GasField {
    grid: GridSpec,
    gas: GasSpecies,
    data: Vec<f64>,
}

impl GasField {
    /// Field with every node set to `value`
    #[must_use]
    pub fn with_value(grid: GridSpec, gas: GasSpecies, value: f64) -> Self {
        Self {
            grid,
            gas,
            data: vec![value; grid.len()],
        }
    }

    /// Field from row-major values
    ///
    /// Returns `None` when `data` does not have one value per node.
    #[must_use]
    pub fn from_values(grid: GridSpec, gas: GasSpecies, data: Vec<f64>) -> Option<Self> {
        (data.len() == grid.len()).then_some(Self { grid, gas, data })
    }

    /// Ground truth: the containing room's level, or ambient outside rooms
    ///
    /// Rows are evaluated in parallel.
    #[must_use]
    pub fn ground_truth(
        habitat: &Habitat,
        grid: GridSpec,
        gas: GasSpecies,
        ambient: &AmbientBaseline,
    ) -> Self {
        let mut data = vec![0.0; grid.len()];
        data.par_chunks_mut(grid.nx())
            .enumerate()
            .for_each(|(j, row)| {
                for (i, value) in row.iter_mut().enumerate() {
                    *value = habitat.truth_at(grid.node(i, j), ambient).get(gas);
                }
            });
        Self { grid, gas, data }
    }

    /// Node lattice
    pub fn grid(&self) -> &GridSpec {
        &self.grid
    }

    /// Gas species stored
    pub fn gas(&self) -> GasSpecies {
        self.gas
    }

    /// Value at node (`i`, `j`)
    ///
    /// # Panics
    ///
    /// Panics if coordinates are out of bounds
    pub fn get(&self, i: usize, j: usize) -> f64 {
        assert!(
            i < self.grid.nx() && j < self.grid.ny(),
            "Coordinates out of bounds"
        );
        self.data[self.grid.index(i, j)]
    }

    /// Set value at node (`i`, `j`)
    ///
    /// # Panics
    ///
    /// Panics if coordinates are out of bounds
    pub fn set(&mut self, i: usize, j: usize, value: f64) {
        assert!(
            i < self.grid.nx() && j < self.grid.ny(),
            "Coordinates out of bounds"
        );
        let idx = self.grid.index(i, j);
        self.data[idx] = value;
    }

    /// Value at the node nearest to a point
    pub fn sample(&self, point: Point2) -> f64 {
        let (i, j) = self.grid.nearest_node(point);
        self.data[self.grid.index(i, j)]
    }

    /// Row-major values
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Clamp every value into the gas's physical range
    pub fn clip_to_physical(&mut self) {
        let gas = self.gas;
        for v in &mut self.data {
            *v = gas.clip(*v);
        }
    }

    /// Smallest and largest value, ignoring NaN
    pub fn min_max(&self) -> (f64, f64) {
        self.data
            .iter()
            .filter(|v| !v.is_nan())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            })
    }

    /// Range for color-mapping this field
    ///
    /// Flat fields are widened to the gas's minimum display span around their
    /// midpoint (shifted up so the range never dips below zero).
    pub fn display_range(&self) -> (f64, f64) {
        let (lo, hi) = self.min_max();
        let min_span = self.gas.min_display_span();
        if !(lo.is_finite() && hi.is_finite()) {
            return (0.0, min_span);
        }
        if hi - lo >= min_span {
            return (lo, hi);
        }
        let mid = 0.5 * (lo + hi);
        let lower = (mid - 0.5 * min_span).max(0.0);
        (lower, lower + min_span)
    }

    /// Largest absolute difference to another field of the same shape
    pub fn max_abs_diff(&self, other: &GasField) -> Option<f64> {
        (self.data.len() == other.data.len()).then(|| {
            self.data
                .iter()
                .zip(&other.data)
                .map(|(a, b)| (a - b).abs())
                .fold(0.0, f64::max)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::GasPair;
    use crate::geometry::Shape;
    use crate::habitat::RoomKind;

    fn small_grid() -> GridSpec {
        GridSpec::new(Point2::zeros(), Point2::new(20.0, 10.0), 21, 11)
    }

    #[test]
    fn test_field_get_set() {
        let mut field = GasField::with_value(small_grid(), GasSpecies::O2, 21.0);
        field.set(3, 4, 18.5);
        assert_eq!(field.get(3, 4), 18.5);
        assert_eq!(field.as_slice()[4 * 21 + 3], 18.5);
    }

    #[test]
    #[should_panic(expected = "Coordinates out of bounds")]
    fn test_field_bounds_check() {
        let field = GasField::with_value(small_grid(), GasSpecies::O2, 0.0);
        let _ = field.get(21, 0);
    }

    #[test]
    fn test_from_values_checks_length() {
        assert!(GasField::from_values(small_grid(), GasSpecies::CO2, vec![0.0; 3]).is_none());
        assert!(GasField::from_values(small_grid(), GasSpecies::CO2, vec![0.0; 231]).is_some());
    }

    #[test]
    fn test_ground_truth_rooms_and_ambient() {
        let mut habitat = Habitat::new();
        let room = habitat
            .add_room("Lab", RoomKind::Laboratory, Shape::rect(0.0, 0.0, 10.0, 10.0))
            .unwrap();
        habitat.set_levels(room, GasPair::new(19.0, 1500.0)).unwrap();
        let ambient = AmbientBaseline::mars();

        let o2 = GasField::ground_truth(&habitat, small_grid(), GasSpecies::O2, &ambient);
        let co2 = GasField::ground_truth(&habitat, small_grid(), GasSpecies::CO2, &ambient);

        assert_eq!(o2.get(5, 5), 19.0);
        assert_eq!(co2.get(5, 5), 1500.0);
        assert_eq!(o2.get(15, 5), ambient.o2_percent);
        assert_eq!(co2.get(15, 5), ambient.co2_ppm);
        assert_eq!(o2.sample(Point2::new(4.8, 5.2)), 19.0);
    }

    #[test]
    fn test_display_range_minimum_span() {
        let flat = GasField::with_value(small_grid(), GasSpecies::O2, 21.0);
        assert_eq!(flat.display_range(), (20.75, 21.25));

        let flat_co2 = GasField::with_value(small_grid(), GasSpecies::CO2, 10.0);
        assert_eq!(flat_co2.display_range(), (0.0, 100.0));

        let mut varied = GasField::with_value(small_grid(), GasSpecies::O2, 15.0);
        varied.set(0, 0, 21.0);
        assert_eq!(varied.display_range(), (15.0, 21.0));
    }

    #[test]
    fn test_clip_to_physical() {
        let mut field = GasField::with_value(small_grid(), GasSpecies::O2, 130.0);
        field.set(1, 1, -4.0);
        field.clip_to_physical();
        assert_eq!(field.min_max(), (0.0, 100.0));
    }
}
