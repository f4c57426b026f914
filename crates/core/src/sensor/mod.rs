//! Noisy point sensors
//!
//! A sensor sits at a fixed position and reports both gases with independent
//! Gaussian noise. What the sensor "truly" sees is resolved from the habitat:
//! the containing room's level, or the ambient baseline outside every room,
//! optionally averaged over a small disc to model a physically-sized probe.

use crate::core_types::{AmbientBaseline, GasPair, GasSpecies, Point2, SensorId};
use crate::habitat::Habitat;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

/// Default O₂ reading variance, %²
pub const DEFAULT_O2_VARIANCE: f64 = 0.5;

/// Default CO₂ reading variance, ppm²
pub const DEFAULT_CO2_VARIANCE: f64 = 20.0;

/// Stencil half-width in steps; offsets are `radius / STENCIL_STEPS` apart
const STENCIL_STEPS: i32 = 2;

/// Noise model of a sensor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorModel {
    o2_variance: f64,
    co2_variance: f64,
}

impl SensorModel {
    /// Create a model; negative or non-finite variances become zero
    #[must_use]
    pub fn new(o2_variance: f64, co2_variance: f64) -> Self {
        Self {
            o2_variance: sanitize_variance(o2_variance),
            co2_variance: sanitize_variance(co2_variance),
        }
    }

    /// A noiseless model that reports the truth exactly
    #[must_use]
    pub fn exact() -> Self {
        Self::new(0.0, 0.0)
    }

    /// Configured variance for one gas
    pub fn variance(&self, gas: GasSpecies) -> f64 {
        match gas {
            GasSpecies::O2 => self.o2_variance,
            GasSpecies::CO2 => self.co2_variance,
        }
    }

    /// Draw one noisy reading of both gases
    ///
    /// Each gas is drawn independently from `Normal(truth, sqrt(variance))`
    /// and floored at zero, since a physical reading cannot be negative.
    pub fn read<R: Rng + ?Sized>(&self, rng: &mut R, truth: GasPair) -> GasPair {
        GasPair::new(
            noisy(rng, truth.o2, self.o2_variance),
            noisy(rng, truth.co2, self.co2_variance),
        )
    }
}

impl Default for SensorModel {
    fn default() -> Self {
        Self::new(DEFAULT_O2_VARIANCE, DEFAULT_CO2_VARIANCE)
    }
}

fn sanitize_variance(variance: f64) -> f64 {
    if variance.is_finite() {
        variance.max(0.0)
    } else {
        0.0
    }
}

fn noisy<R: Rng + ?Sized>(rng: &mut R, mean: f64, variance: f64) -> f64 {
    if variance <= 0.0 {
        return mean.max(0.0);
    }
    match Normal::new(mean, variance.sqrt()) {
        Ok(normal) => normal.sample(rng).max(0.0),
        Err(_) => mean.max(0.0),
    }
}

/// A placed sensor and its most recent reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sensor {
    id: SensorId,
    position: Point2,
    /// Noise model
    pub model: SensorModel,
    sensing_radius: Option<f64>,
    last_reading: Option<GasPair>,
}

impl Sensor {
    pub(crate) fn new(id: SensorId, position: Point2, model: SensorModel) -> Self {
        Self {
            id,
            position,
            model,
            sensing_radius: None,
            last_reading: None,
        }
    }

    /// Sensor identity
    pub fn id(&self) -> SensorId {
        self.id
    }

    /// Fixed position
    pub fn position(&self) -> Point2 {
        self.position
    }

    /// Spatial averaging radius, if the probe is not a point sample
    pub fn sensing_radius(&self) -> Option<f64> {
        self.sensing_radius
    }

    /// Set or clear the averaging radius; non-positive radii clear it
    pub fn set_sensing_radius(&mut self, radius: Option<f64>) {
        self.sensing_radius = radius.filter(|r| r.is_finite() && *r > 0.0);
    }

    /// Most recent reading, `None` until first sampled
    pub fn last_reading(&self) -> Option<GasPair> {
        self.last_reading
    }

    /// Take a reading of the given truth and remember it
    pub fn sample<R: Rng + ?Sized>(&mut self, rng: &mut R, truth: GasPair) -> GasPair {
        let reading = self.model.read(rng, truth);
        self.last_reading = Some(reading);
        reading
    }
}

/// True gas levels a sensor is exposed to
///
/// Point sensors see the containing room (or ambient). Sensors with a sensing
/// radius see the mean of the same lookup over a disc-shaped stencil.
pub fn true_value_for(sensor: &Sensor, habitat: &Habitat, ambient: &AmbientBaseline) -> GasPair {
    match sensor.sensing_radius {
        None => habitat.truth_at(sensor.position, ambient),
        Some(radius) => {
            let offsets = stencil_offsets(radius);
            let sum = offsets.iter().fold(GasPair::default(), |acc, offset| {
                let v = habitat.truth_at(sensor.position + offset, ambient);
                GasPair::new(acc.o2 + v.o2, acc.co2 + v.co2)
            });
            let n = offsets.len() as f64;
            GasPair::new(sum.o2 / n, sum.co2 / n)
        }
    }
}

/// Offsets of a square lattice clipped to a disc, center included
fn stencil_offsets(radius: f64) -> Vec<Point2> {
    let step = radius / f64::from(STENCIL_STEPS);
    let mut offsets = Vec::new();
    for i in -STENCIL_STEPS..=STENCIL_STEPS {
        for j in -STENCIL_STEPS..=STENCIL_STEPS {
            if i * i + j * j <= STENCIL_STEPS * STENCIL_STEPS {
                offsets.push(Point2::new(f64::from(i) * step, f64::from(j) * step));
            }
        }
    }
    offsets
}
