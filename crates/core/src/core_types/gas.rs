//! Gas species, paired O₂/CO₂ levels and the exterior baseline
//!
//! O₂ is carried as a volume percentage (0-100) and CO₂ in parts per million.
//! Both use f64: CO₂ near the Mars baseline sits around 10⁶ ppm, where f32
//! would lose the sub-ppm changes a single tick of respiration produces.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// REFERENCE ATMOSPHERES
// ============================================================================

/// Nominal habitat O₂ (Earth sea-level composition), percent
pub const NORMAL_O2_PERCENT: f64 = 21.0;

/// Nominal habitat CO₂, ppm
pub const NORMAL_CO2_PPM: f64 = 400.0;

/// Mars surface O₂, percent
pub const MARS_O2_PERCENT: f64 = 0.13;

/// Mars surface CO₂ (95 % by volume), ppm
pub const MARS_CO2_PPM: f64 = 95.0 * 10_000.0;

/// Gas species tracked by the habitat model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GasSpecies {
    /// Oxygen, percent by volume
    O2,
    /// Carbon dioxide, parts per million
    CO2,
}

impl GasSpecies {
    /// Both species, in a fixed order used for per-gas arrays
    pub const ALL: [GasSpecies; 2] = [GasSpecies::O2, GasSpecies::CO2];

    /// Position of this species in per-gas arrays
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::O2 => 0,
            Self::CO2 => 1,
        }
    }

    /// Unit label for display
    #[must_use]
    pub const fn unit(self) -> &'static str {
        match self {
            Self::O2 => "%",
            Self::CO2 => "ppm",
        }
    }

    /// Physically plausible value range
    ///
    /// Reconstructed fields are clipped to this range so regression overshoot
    /// near sparse data cannot hand consumers impossible concentrations.
    #[must_use]
    pub const fn physical_range(self) -> (f64, f64) {
        match self {
            Self::O2 => (0.0, 100.0),
            Self::CO2 => (0.0, 1_000_000.0),
        }
    }

    /// Smallest span a display range may have
    ///
    /// A perfectly flat field would otherwise collapse to `min == max`.
    #[must_use]
    pub const fn min_display_span(self) -> f64 {
        match self {
            Self::O2 => 0.5,
            Self::CO2 => 100.0,
        }
    }

    /// Clamp a value into the physical range
    #[inline]
    #[must_use]
    pub fn clip(self, value: f64) -> f64 {
        let (lo, hi) = self.physical_range();
        value.clamp(lo, hi)
    }
}

impl fmt::Display for GasSpecies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::O2 => write!(f, "O₂"),
            Self::CO2 => write!(f, "CO₂"),
        }
    }
}

/// One O₂ and one CO₂ value, e.g. a room state or a sensor reading
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GasPair {
    /// O₂ in percent
    pub o2: f64,
    /// CO₂ in ppm
    pub co2: f64,
}

impl GasPair {
    /// Create a new pair
    #[inline]
    #[must_use]
    pub const fn new(o2: f64, co2: f64) -> Self {
        Self { o2, co2 }
    }

    /// Value for one species
    #[inline]
    #[must_use]
    pub const fn get(&self, gas: GasSpecies) -> f64 {
        match gas {
            GasSpecies::O2 => self.o2,
            GasSpecies::CO2 => self.co2,
        }
    }

    /// Mutable value for one species
    #[inline]
    pub fn get_mut(&mut self, gas: GasSpecies) -> &mut f64 {
        match gas {
            GasSpecies::O2 => &mut self.o2,
            GasSpecies::CO2 => &mut self.co2,
        }
    }

    /// Both values floored at zero
    #[inline]
    #[must_use]
    pub fn non_negative(self) -> Self {
        Self {
            o2: self.o2.max(0.0),
            co2: self.co2.max(0.0),
        }
    }
}

/// Exterior atmosphere composition rooms equilibrate toward
///
/// Read-only for the duration of a run; ambient is an infinite reservoir so
/// exchange with it never changes these values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AmbientBaseline {
    /// Exterior O₂, percent
    pub o2_percent: f64,
    /// Exterior CO₂, ppm
    pub co2_ppm: f64,
}

impl AmbientBaseline {
    /// Mars surface atmosphere
    #[must_use]
    pub const fn mars() -> Self {
        Self {
            o2_percent: MARS_O2_PERCENT,
            co2_ppm: MARS_CO2_PPM,
        }
    }

    /// Baseline as a gas pair
    #[inline]
    #[must_use]
    pub const fn levels(&self) -> GasPair {
        GasPair::new(self.o2_percent, self.co2_ppm)
    }
}

impl Default for AmbientBaseline {
    fn default() -> Self {
        Self::mars()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_species_indices_are_distinct() {
        assert_eq!(GasSpecies::O2.index(), 0);
        assert_eq!(GasSpecies::CO2.index(), 1);
        for (i, gas) in GasSpecies::ALL.iter().enumerate() {
            assert_eq!(gas.index(), i);
        }
    }

    #[test]
    fn test_clip_to_physical_range() {
        assert_eq!(GasSpecies::O2.clip(140.0), 100.0);
        assert_eq!(GasSpecies::O2.clip(-3.0), 0.0);
        assert_eq!(GasSpecies::CO2.clip(2_000_000.0), 1_000_000.0);
        assert_eq!(GasSpecies::CO2.clip(812.5), 812.5);
    }

    #[test]
    fn test_gas_pair_accessors() {
        let mut pair = GasPair::new(20.5, 900.0);
        assert_eq!(pair.get(GasSpecies::O2), 20.5);
        assert_eq!(pair.get(GasSpecies::CO2), 900.0);

        *pair.get_mut(GasSpecies::CO2) = -5.0;
        assert_eq!(pair.non_negative().co2, 0.0);
    }

    #[test]
    fn test_mars_baseline() {
        let mars = AmbientBaseline::default();
        assert_eq!(mars.o2_percent, 0.13);
        assert_eq!(mars.co2_ppm, 950_000.0);
    }
}
