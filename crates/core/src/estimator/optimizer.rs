//! Bounded Nelder–Mead minimisation
//!
//! Derivative-free simplex search used for GP hyperparameters. Bounds are
//! enforced by projecting every trial point into the box. Infeasible points
//! are reported by the objective as `+∞` (NaN is treated the same way).

/// Reflection coefficient
const ALPHA: f64 = 1.0;
/// Expansion coefficient
const GAMMA: f64 = 2.0;
/// Contraction coefficient
const RHO: f64 = 0.5;
/// Shrink coefficient
const SIGMA: f64 = 0.5;

/// Result of a search
#[derive(Debug, Clone, PartialEq)]
pub struct Minimum {
    /// Best point found
    pub point: Vec<f64>,
    /// Objective at `point`
    pub value: f64,
    /// Iterations used
    pub iterations: usize,
}

/// Simplex search settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NelderMead {
    /// Iteration cap
    pub max_iterations: usize,
    /// Stop when the spread of objective values falls below this
    pub f_tolerance: f64,
    /// Stop when the simplex diameter falls below this
    pub x_tolerance: f64,
    /// Initial simplex edge as a fraction of each bound's width
    pub initial_step: f64,
}

impl Default for NelderMead {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            f_tolerance: 1e-8,
            x_tolerance: 1e-6,
            initial_step: 0.1,
        }
    }
}

impl NelderMead {
    /// Search with the given iteration cap and default tolerances
    #[must_use]
    pub fn with_max_iterations(max_iterations: usize) -> Self {
        Self {
            max_iterations: max_iterations.max(1),
            ..Self::default()
        }
    }

    /// Minimise `objective` from `start` inside `bounds` (one `(lo, hi)` per axis)
    ///
    /// `start` is projected into the box first. The returned value may be
    /// `+∞` if the objective was infeasible everywhere it was evaluated.
    pub fn minimize<F>(&self, mut objective: F, start: &[f64], bounds: &[(f64, f64)]) -> Minimum
    where
        F: FnMut(&[f64]) -> f64,
    {
        let dim = start.len();
        let mut eval = |x: &[f64]| {
            let v = objective(x);
            if v.is_nan() {
                f64::INFINITY
            } else {
                v
            }
        };

        let x0 = project(start, bounds);
        let mut simplex: Vec<(Vec<f64>, f64)> = Vec::with_capacity(dim + 1);
        let f0 = eval(x0.as_slice());
        if dim == 0 {
            return Minimum {
                point: x0,
                value: f0,
                iterations: 0,
            };
        }
        simplex.push((x0.clone(), f0));
        for axis in 0..dim {
            let mut x = x0.clone();
            let (lo, hi) = bounds[axis];
            let step = self.initial_step * (hi - lo).max(f64::EPSILON);
            // Step away from whichever bound is closer
            x[axis] = if x[axis] + step <= hi {
                x[axis] + step
            } else {
                x[axis] - step
            };
            let x = project(&x, bounds);
            let fx = eval(x.as_slice());
            simplex.push((x, fx));
        }

        let mut iterations = 0;
        while iterations < self.max_iterations {
            iterations += 1;
            simplex.sort_by(|a, b| a.1.total_cmp(&b.1));

            let best = simplex[0].1;
            let worst = simplex[dim].1;
            if converged(&simplex, best, worst, self.f_tolerance, self.x_tolerance) {
                break;
            }

            let center = centroid(&simplex[..dim], dim);
            let reflected = project(&along(&center, &simplex[dim].0, -ALPHA), bounds);
            let f_reflected = eval(reflected.as_slice());

            if f_reflected < best {
                let expanded = project(&along(&center, &reflected, GAMMA), bounds);
                let f_expanded = eval(expanded.as_slice());
                simplex[dim] = if f_expanded < f_reflected {
                    (expanded, f_expanded)
                } else {
                    (reflected, f_reflected)
                };
                continue;
            }

            if f_reflected < simplex[dim - 1].1 {
                simplex[dim] = (reflected, f_reflected);
                continue;
            }

            // Contract toward the better of the reflected and worst points
            let (toward, f_toward) = if f_reflected < worst {
                (reflected.clone(), f_reflected)
            } else {
                (simplex[dim].0.clone(), worst)
            };
            let contracted = project(&along(&center, &toward, RHO), bounds);
            let f_contracted = eval(contracted.as_slice());
            if f_contracted < f_toward {
                simplex[dim] = (contracted, f_contracted);
                continue;
            }

            // Shrink everything toward the best vertex
            let anchor = simplex[0].0.clone();
            for vertex in simplex.iter_mut().skip(1) {
                let x = project(&along(&anchor, &vertex.0, SIGMA), bounds);
                let fx = eval(x.as_slice());
                *vertex = (x, fx);
            }
        }

        simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
        let (point, value) = simplex.swap_remove(0);
        Minimum {
            point,
            value,
            iterations,
        }
    }
}

/// `origin + t × (target − origin)`
fn along(origin: &[f64], target: &[f64], t: f64) -> Vec<f64> {
    origin
        .iter()
        .zip(target)
        .map(|(o, x)| o + t * (x - o))
        .collect()
}

fn centroid(vertices: &[(Vec<f64>, f64)], dim: usize) -> Vec<f64> {
    let mut c = vec![0.0; dim];
    for (x, _) in vertices {
        for (ci, xi) in c.iter_mut().zip(x) {
            *ci += xi;
        }
    }
    let n = vertices.len().max(1) as f64;
    c.iter_mut().for_each(|ci| *ci /= n);
    c
}

fn project(x: &[f64], bounds: &[(f64, f64)]) -> Vec<f64> {
    x.iter()
        .zip(bounds)
        .map(|(&v, &(lo, hi))| if v.is_nan() { lo } else { v.clamp(lo, hi) })
        .collect()
}

fn converged(simplex: &[(Vec<f64>, f64)], best: f64, worst: f64, f_tol: f64, x_tol: f64) -> bool {
    if !(best.is_finite() && worst.is_finite()) {
        return false;
    }
    let f_spread = worst - best;
    let x_spread = simplex
        .iter()
        .skip(1)
        .flat_map(|(x, _)| x.iter().zip(&simplex[0].0).map(|(a, b)| (a - b).abs()))
        .fold(0.0, f64::max);
    f_spread <= f_tol && x_spread <= x_tol
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_quadratic_minimum() {
        let nm = NelderMead::default();
        let result = nm.minimize(
            |x| (x[0] - 1.5).powi(2) + 2.0 * (x[1] + 0.5).powi(2),
            &[0.0, 0.0],
            &[(-5.0, 5.0), (-5.0, 5.0)],
        );
        assert_abs_diff_eq!(result.point[0], 1.5, epsilon = 1e-3);
        assert_abs_diff_eq!(result.point[1], -0.5, epsilon = 1e-3);
        assert!(result.value < 1e-6);
    }

    #[test]
    fn test_minimum_on_bound() {
        let nm = NelderMead::default();
        let result = nm.minimize(|x| x[0], &[0.5], &[(-2.0, 3.0)]);
        assert_abs_diff_eq!(result.point[0], -2.0, epsilon = 1e-4);
    }

    #[test]
    fn test_start_outside_bounds_is_projected() {
        let nm = NelderMead::with_max_iterations(1);
        let result = nm.minimize(|x| x[0] * x[0], &[10.0], &[(-1.0, 1.0)]);
        assert!(result.point[0] <= 1.0);
    }

    #[test]
    fn test_rosenbrock_valley() {
        let nm = NelderMead::with_max_iterations(2000);
        let result = nm.minimize(
            |x| (1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0] * x[0]).powi(2),
            &[-1.2, 1.0],
            &[(-3.0, 3.0), (-3.0, 3.0)],
        );
        assert_abs_diff_eq!(result.point[0], 1.0, epsilon = 1e-2);
        assert_abs_diff_eq!(result.point[1], 1.0, epsilon = 2e-2);
    }

    #[test]
    fn test_infeasible_region_avoided() {
        let nm = NelderMead::default();
        // Objective undefined left of zero
        let result = nm.minimize(
            |x| if x[0] < 0.0 { f64::NAN } else { (x[0] - 0.25).powi(2) },
            &[1.0],
            &[(-1.0, 2.0)],
        );
        assert!(result.value.is_finite());
        assert_abs_diff_eq!(result.point[0], 0.25, epsilon = 1e-3);
    }
}
