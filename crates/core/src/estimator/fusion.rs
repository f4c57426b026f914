//! Precision-weighted fusion of co-located readings
//!
//! For independent Gaussian readings `rᵢ` with variances `vᵢ`, the fused
//! estimate is `Σ(rᵢ/vᵢ) / Σ(1/vᵢ)` with variance `1 / Σ(1/vᵢ)`.

use serde::{Deserialize, Serialize};

/// Fused value and its variance
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusedEstimate {
    /// Precision-weighted mean
    pub value: f64,
    /// Variance of the fused mean
    pub variance: f64,
}

impl FusedEstimate {
    /// One-sigma uncertainty
    pub fn std_dev(&self) -> f64 {
        self.variance.sqrt()
    }
}

/// Fuse `(reading, variance)` pairs
///
/// Returns `None` when there is nothing to fuse. Exact readings (zero
/// variance) have infinite precision: if any are present their plain mean is
/// returned with zero variance. Non-finite readings are skipped.
pub fn fuse<I>(readings: I) -> Option<FusedEstimate>
where
    I: IntoIterator<Item = (f64, f64)>,
{
    let mut precision_sum = 0.0;
    let mut weighted_sum = 0.0;
    let mut exact_sum = 0.0;
    let mut exact_count = 0_u32;

    for (reading, variance) in readings {
        if !(reading.is_finite() && variance.is_finite()) {
            continue;
        }
        if variance <= 0.0 {
            exact_sum += reading;
            exact_count += 1;
        } else {
            precision_sum += 1.0 / variance;
            weighted_sum += reading / variance;
        }
    }

    if exact_count > 0 {
        return Some(FusedEstimate {
            value: exact_sum / f64::from(exact_count),
            variance: 0.0,
        });
    }
    (precision_sum > 0.0).then(|| FusedEstimate {
        value: weighted_sum / precision_sum,
        variance: 1.0 / precision_sum,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_equal_variances_average() {
        let fused = fuse([(20.0, 0.5), (22.0, 0.5)]).unwrap();
        assert_abs_diff_eq!(fused.value, 21.0, epsilon = 1e-12);
        assert_abs_diff_eq!(fused.variance, 0.25, epsilon = 1e-12);
    }

    #[test]
    fn test_precise_reading_dominates() {
        let fused = fuse([(20.0, 0.1), (30.0, 10.0)]).unwrap();
        // weights 10 and 0.1
        assert_abs_diff_eq!(fused.value, (200.0 + 3.0) / 10.1, epsilon = 1e-12);
        assert!(fused.variance < 0.1);
    }

    #[test]
    fn test_exact_readings_win() {
        let fused = fuse([(20.0, 0.0), (25.0, 1.0), (22.0, 0.0)]).unwrap();
        assert_eq!(fused.value, 21.0);
        assert_eq!(fused.std_dev(), 0.0);
    }

    #[test]
    fn test_nothing_to_fuse() {
        assert!(fuse(std::iter::empty()).is_none());
        assert!(fuse([(f64::NAN, 1.0)]).is_none());
    }
}
