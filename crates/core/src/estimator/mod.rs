//! Spatial estimation of gas fields from sparse sensor readings
//!
//! The core abstraction is the [`Estimator`] trait, fitted on
//! `(position, value)` samples and evaluated at arbitrary points. Two backends
//! implement it:
//!
//! - [`GaussianProcess`] (feature `gp`, on by default): RBF + white-noise
//!   regression with maximum-likelihood hyperparameters
//! - [`Passthrough`]: cannot regress; every fit reports
//!   [`EstimatorError::Unavailable`] so callers show ground truth instead
//!
//! # Backend Selection
//!
//! [`create_estimator`] picks the backend from [`EstimatorConfig::backend`].
//! Requesting the GP with the feature compiled out falls back to passthrough,
//! which is permanent for the session.
//!
//! [`GasReconstructor`] wraps one estimator per gas and turns every failure
//! into a fallback status, so nothing here can stall the tick loop.

pub mod fusion;
#[cfg(feature = "gp")]
mod gp;
#[cfg(feature = "gp")]
mod optimizer;
mod passthrough;
mod reconstructor;
pub mod timing;

pub use fusion::{fuse, FusedEstimate};
#[cfg(feature = "gp")]
pub use gp::GaussianProcess;
#[cfg(feature = "gp")]
pub use optimizer::{Minimum, NelderMead};
pub use passthrough::Passthrough;
pub use reconstructor::GasReconstructor;
pub use timing::FitTimer;

use crate::core_types::Point2;
use crate::error::EstimatorError;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

#[cfg(not(feature = "gp"))]
use tracing::warn;

/// One observation: a sensor reading at a position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Where the reading was taken
    pub position: Point2,
    /// Reading value in the gas's unit
    pub value: f64,
}

impl Sample {
    /// Create a sample
    #[must_use]
    pub fn new(position: Point2, value: f64) -> Self {
        Self { position, value }
    }

    pub(crate) fn is_finite(&self) -> bool {
        self.position.x.is_finite() && self.position.y.is_finite() && self.value.is_finite()
    }
}

/// Backend-agnostic interface for spatial regression
///
/// Implementations own their fitted state exclusively; two estimators never
/// share a model.
pub trait Estimator: Send {
    /// Fit the model to samples, replacing any previous fit
    ///
    /// # Errors
    ///
    /// `NoSamples` for an empty slice, `NonFiniteInput` for NaN/∞ samples,
    /// numerical errors when the fit cannot be computed, `Unavailable` when
    /// the backend cannot regress at all.
    fn fit(&mut self, samples: &[Sample]) -> Result<(), EstimatorError>;

    /// Posterior mean at each point, in order
    ///
    /// Calling `predict` twice without a fit in between returns identical
    /// values.
    ///
    /// # Errors
    ///
    /// `NotFitted` before a successful fit.
    fn predict(&self, points: &[Point2]) -> Result<Vec<f64>, EstimatorError>;

    /// Which backend this is
    fn kind(&self) -> EstimatorKind;

    /// Whether a successful fit is held
    fn is_fitted(&self) -> bool;
}

/// Estimator backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EstimatorKind {
    /// Gaussian Process regression
    #[default]
    GaussianProcess,
    /// No regression; callers show ground truth
    Passthrough,
}

impl fmt::Display for EstimatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GaussianProcess => write!(f, "Gaussian Process"),
            Self::Passthrough => write!(f, "Passthrough"),
        }
    }
}

/// Where refits run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RefitMode {
    /// Fit and predict inside `update`
    #[default]
    Inline,
    /// Fit and predict on the rayon pool; the last good field is shown until
    /// the result arrives
    Background,
}

/// Estimator configuration, mutable at runtime between ticks
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EstimatorConfig {
    /// Requested backend
    pub backend: EstimatorKind,
    /// Starting RBF length scale, meters
    pub length_scale: f64,
    /// Search bounds for the length scale, meters
    pub length_scale_bounds: (f64, f64),
    /// Starting white-noise level (standardised units)
    pub noise_level: f64,
    /// Search bounds for the noise level
    pub noise_level_bounds: (f64, f64),
    /// Diagonal regularization added to every covariance matrix
    pub nugget: f64,
    /// Random restarts of the hyperparameter search beyond the initial point
    pub n_restarts: usize,
    /// Iteration cap per search
    pub max_iterations: usize,
    /// Refit every N ticks, holding the previous prediction in between
    pub refit_every: u64,
    /// Inline or background refits
    pub refit_mode: RefitMode,
    /// Seed for the restart sampler
    pub optimizer_seed: u64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            backend: EstimatorKind::GaussianProcess,
            length_scale: 10.0,
            length_scale_bounds: (1.0, 100.0),
            noise_level: 1e-4,
            noise_level_bounds: (1e-6, 10.0),
            nugget: 1e-8,
            n_restarts: 5,
            max_iterations: 200,
            refit_every: 5,
            refit_mode: RefitMode::Inline,
            optimizer_seed: 0,
        }
    }
}

impl EstimatorConfig {
    /// Replace the length-scale bounds
    ///
    /// Bounds are ordered, kept strictly positive, and the starting length
    /// scale is pulled inside them. Non-finite input is ignored.
    pub fn set_length_scale_bounds(&mut self, min: f64, max: f64) {
        if !(min.is_finite() && max.is_finite()) {
            return;
        }
        let lo = min.min(max).max(f64::MIN_POSITIVE);
        let hi = min.max(max).max(lo);
        self.length_scale_bounds = (lo, hi);
        self.length_scale = self.length_scale.clamp(lo, hi);
    }

    /// Set the refit cadence (at least every tick)
    pub fn set_refit_every(&mut self, ticks: u64) {
        self.refit_every = ticks.max(1);
    }
}

/// Per-gas estimator state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EstimatorStatus {
    /// No fit attempted yet; ground truth shown
    Unfitted,
    /// Reconstructed field is the regression posterior mean
    Fitted,
    /// No sensor readings; ground truth shown
    TruthNoSensors,
    /// Regression backend unavailable for this session; ground truth shown
    TruthNoLibrary,
    /// Last fit failed; ground truth shown
    TruthFitError,
}

impl EstimatorStatus {
    /// Status line for display
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::Unfitted => "Waiting for first fit, showing truth",
            Self::Fitted => "GP fitted",
            Self::TruthNoSensors => "Showing truth (no sensors)",
            Self::TruthNoLibrary => "Showing truth (no regression backend)",
            Self::TruthFitError => "GP error, showing truth",
        }
    }

    /// Whether the reconstructed field is currently ground truth
    #[must_use]
    pub const fn is_fallback(self) -> bool {
        !matches!(self, Self::Fitted)
    }
}

impl fmt::Display for EstimatorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Create an estimator for the configured backend
///
/// Logs the selection. A GP request with the `gp` feature disabled yields the
/// passthrough backend.
pub fn create_estimator(config: &EstimatorConfig) -> Box<dyn Estimator> {
    match config.backend {
        EstimatorKind::GaussianProcess => gp_backend(config),
        EstimatorKind::Passthrough => {
            info!("Passthrough estimator selected, reconstructed fields show ground truth");
            Box::new(Passthrough)
        }
    }
}

/// Backend for `config` without logging, used when rebuilding mid-session
pub(crate) fn build_estimator(config: &EstimatorConfig) -> Box<dyn Estimator> {
    match config.backend {
        #[cfg(feature = "gp")]
        EstimatorKind::GaussianProcess => Box::new(GaussianProcess::new(config)),
        #[cfg(not(feature = "gp"))]
        EstimatorKind::GaussianProcess => Box::new(Passthrough),
        EstimatorKind::Passthrough => Box::new(Passthrough),
    }
}

#[cfg(feature = "gp")]
fn gp_backend(config: &EstimatorConfig) -> Box<dyn Estimator> {
    info!(
        "Using Gaussian Process estimator (length scale {:.2} in [{}, {}], {} restarts)",
        config.length_scale,
        config.length_scale_bounds.0,
        config.length_scale_bounds.1,
        config.n_restarts
    );
    build_estimator(config)
}

#[cfg(not(feature = "gp"))]
fn gp_backend(config: &EstimatorConfig) -> Box<dyn Estimator> {
    warn!("GP feature disabled, falling back to passthrough estimator");
    build_estimator(config)
}
