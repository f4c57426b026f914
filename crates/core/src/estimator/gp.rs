//! Gaussian Process regression backend
//!
//! Kernel: `k(x, x') = exp(-|x − x'|² / 2ℓ²) + σ²·δ(x, x')` on standardised
//! targets, plus a fixed nugget on the diagonal for conditioning.
//!
//! `fit` maximises the log marginal likelihood over `(ln ℓ, ln σ²)` inside the
//! configured bounds, running a bounded Nelder–Mead search from the initial
//! point, the previous optimum (if any), and `n_restarts` log-uniform random
//! starts. Searches run in parallel; the best finite optimum wins.

use super::optimizer::NelderMead;
use super::{Estimator, EstimatorConfig, EstimatorKind, Sample};
use crate::core_types::Point2;
use crate::error::EstimatorError;
use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::debug;

/// ln(2π)
const LN_2PI: f64 = 1.837_877_066_409_345_5;

/// Target spread below which the samples are treated as constant
const MIN_TARGET_STD: f64 = 1e-12;

/// Model state after a successful fit
#[derive(Debug, Clone)]
struct FittedModel {
    inputs: Vec<Point2>,
    alpha: DVector<f64>,
    y_mean: f64,
    y_std: f64,
    length_scale: f64,
    noise_level: f64,
    log_marginal_likelihood: f64,
}

/// Gaussian Process regressor over 2D positions
#[derive(Debug, Clone)]
pub struct GaussianProcess {
    length_scale: f64,
    length_scale_bounds: (f64, f64),
    noise_level: f64,
    noise_level_bounds: (f64, f64),
    nugget: f64,
    n_restarts: usize,
    max_iterations: usize,
    seed: u64,
    fitted: Option<FittedModel>,
}

impl GaussianProcess {
    /// Create an unfitted regressor from configuration
    pub fn new(config: &EstimatorConfig) -> Self {
        let length_scale_bounds = positive_bounds(config.length_scale_bounds, (1.0, 100.0));
        let noise_level_bounds = positive_bounds(config.noise_level_bounds, (1e-6, 10.0));
        Self {
            length_scale: clamp_or_low(config.length_scale, length_scale_bounds),
            length_scale_bounds,
            noise_level: clamp_or_low(config.noise_level, noise_level_bounds),
            noise_level_bounds,
            nugget: if config.nugget.is_finite() {
                config.nugget.max(0.0)
            } else {
                0.0
            },
            n_restarts: config.n_restarts,
            max_iterations: config.max_iterations.max(1),
            seed: config.optimizer_seed,
            fitted: None,
        }
    }

    /// Fitted length scale, or the initial value before a fit
    pub fn length_scale(&self) -> f64 {
        self.fitted
            .as_ref()
            .map_or(self.length_scale, |m| m.length_scale)
    }

    /// Fitted noise level, or the initial value before a fit
    pub fn noise_level(&self) -> f64 {
        self.fitted.as_ref().map_or(self.noise_level, |m| m.noise_level)
    }

    /// Log marginal likelihood at the fitted hyperparameters
    pub fn log_marginal_likelihood(&self) -> Option<f64> {
        self.fitted.as_ref().map(|m| m.log_marginal_likelihood)
    }

    fn search_starts(&self, bounds: &[(f64, f64); 2]) -> Vec<Vec<f64>> {
        let mut starts = vec![vec![self.length_scale.ln(), self.noise_level.ln()]];
        if let Some(previous) = &self.fitted {
            starts.push(vec![previous.length_scale.ln(), previous.noise_level.ln()]);
        }
        let mut rng = StdRng::seed_from_u64(self.seed);
        for _ in 0..self.n_restarts {
            starts.push(
                bounds
                    .iter()
                    .map(|&(lo, hi)| rng.random_range(lo..=hi))
                    .collect(),
            );
        }
        starts
    }
}

impl Estimator for GaussianProcess {
    fn fit(&mut self, samples: &[Sample]) -> Result<(), EstimatorError> {
        if samples.is_empty() {
            self.fitted = None;
            return Err(EstimatorError::NoSamples);
        }
        if samples.iter().any(|s| !s.is_finite()) {
            self.fitted = None;
            return Err(EstimatorError::NonFiniteInput);
        }

        let n = samples.len();
        let inputs: Vec<Point2> = samples.iter().map(|s| s.position).collect();
        let y_mean = samples.iter().map(|s| s.value).sum::<f64>() / n as f64;
        let variance = samples
            .iter()
            .map(|s| (s.value - y_mean).powi(2))
            .sum::<f64>()
            / n as f64;
        let y_std = if variance.sqrt() < MIN_TARGET_STD {
            1.0
        } else {
            variance.sqrt()
        };
        let y = DVector::from_iterator(n, samples.iter().map(|s| (s.value - y_mean) / y_std));
        let sq_dists = DMatrix::from_fn(n, n, |i, j| (inputs[i] - inputs[j]).norm_squared());

        let bounds = [
            (self.length_scale_bounds.0.ln(), self.length_scale_bounds.1.ln()),
            (self.noise_level_bounds.0.ln(), self.noise_level_bounds.1.ln()),
        ];
        let nugget = self.nugget;
        let objective = |theta: &[f64]| {
            log_marginal_likelihood(&sq_dists, &y, theta[0].exp(), theta[1].exp(), nugget)
                .map_or(f64::INFINITY, |(lml, _)| -lml)
        };

        let search = NelderMead::with_max_iterations(self.max_iterations);
        let best = self
            .search_starts(&bounds)
            .par_iter()
            .map(|start| search.minimize(&objective, start, &bounds))
            .filter(|m| m.value.is_finite())
            .min_by(|a, b| a.value.total_cmp(&b.value));

        let Some(best) = best else {
            self.fitted = None;
            return Err(EstimatorError::OptimizerFailed(
                "no start reached a finite likelihood".into(),
            ));
        };

        let length_scale = best.point[0].exp();
        let noise_level = best.point[1].exp();
        let Some((lml, alpha)) =
            log_marginal_likelihood(&sq_dists, &y, length_scale, noise_level, nugget)
        else {
            self.fitted = None;
            return Err(EstimatorError::IllConditioned(format!(
                "Cholesky failed at length scale {length_scale:.3}, noise {noise_level:.2e}"
            )));
        };

        debug!(
            "GP fit on {} samples: length_scale={:.3}, noise={:.2e}, lml={:.3}, {} iterations",
            n, length_scale, noise_level, lml, best.iterations
        );

        self.fitted = Some(FittedModel {
            inputs,
            alpha,
            y_mean,
            y_std,
            length_scale,
            noise_level,
            log_marginal_likelihood: lml,
        });
        Ok(())
    }

    fn predict(&self, points: &[Point2]) -> Result<Vec<f64>, EstimatorError> {
        let model = self.fitted.as_ref().ok_or(EstimatorError::NotFitted)?;
        let inv_two_l2 = 1.0 / (2.0 * model.length_scale * model.length_scale);

        let means: Vec<f64> = points
            .par_iter()
            .map(|p| {
                let k_alpha: f64 = model
                    .inputs
                    .iter()
                    .zip(model.alpha.iter())
                    .map(|(x, a)| (-(p - x).norm_squared() * inv_two_l2).exp() * a)
                    .sum();
                model.y_mean + model.y_std * k_alpha
            })
            .collect();

        if means.iter().any(|v| !v.is_finite()) {
            return Err(EstimatorError::IllConditioned(
                "non-finite posterior mean".into(),
            ));
        }
        Ok(means)
    }

    fn kind(&self) -> EstimatorKind {
        EstimatorKind::GaussianProcess
    }

    fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }
}

/// Log marginal likelihood and `α = K⁻¹y`, or `None` if `K` is not positive definite
fn log_marginal_likelihood(
    sq_dists: &DMatrix<f64>,
    y: &DVector<f64>,
    length_scale: f64,
    noise_level: f64,
    nugget: f64,
) -> Option<(f64, DVector<f64>)> {
    if !(length_scale.is_finite() && length_scale > 0.0 && noise_level.is_finite()) {
        return None;
    }
    let n = y.len();
    let inv_two_l2 = 1.0 / (2.0 * length_scale * length_scale);
    let k = DMatrix::from_fn(n, n, |i, j| {
        let rbf = (-sq_dists[(i, j)] * inv_two_l2).exp();
        if i == j {
            rbf + noise_level + nugget
        } else {
            rbf
        }
    });

    let chol = k.cholesky()?;
    let alpha = chol.solve(y);
    let half_log_det: f64 = chol.l_dirty().diagonal().iter().map(|d| d.ln()).sum();
    let lml = -0.5 * y.dot(&alpha) - half_log_det - 0.5 * n as f64 * LN_2PI;
    lml.is_finite().then_some((lml, alpha))
}

/// Ordered, strictly positive, finite bounds; `fallback` when unusable
fn positive_bounds(bounds: (f64, f64), fallback: (f64, f64)) -> (f64, f64) {
    let (a, b) = bounds;
    if !(a.is_finite() && b.is_finite()) || a.min(b) <= 0.0 {
        return fallback;
    }
    (a.min(b), a.max(b))
}

fn clamp_or_low(value: f64, (lo, hi): (f64, f64)) -> f64 {
    if value.is_finite() {
        value.clamp(lo, hi)
    } else {
        lo
    }
}
