//! Estimator that never regresses

use super::{Estimator, EstimatorKind, Sample};
use crate::core_types::Point2;
use crate::error::EstimatorError;

/// Stand-in backend when no regression is available
///
/// Every fit fails with [`EstimatorError::Unavailable`], which callers turn
/// into a ground-truth display.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl Estimator for Passthrough {
    fn fit(&mut self, _samples: &[Sample]) -> Result<(), EstimatorError> {
        Err(EstimatorError::Unavailable)
    }

    fn predict(&self, _points: &[Point2]) -> Result<Vec<f64>, EstimatorError> {
        Err(EstimatorError::Unavailable)
    }

    fn kind(&self) -> EstimatorKind {
        EstimatorKind::Passthrough
    }

    fn is_fitted(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passthrough_is_unavailable() {
        let mut estimator = Passthrough;
        let samples = [Sample::new(Point2::new(1.0, 1.0), 21.0)];
        assert_eq!(estimator.fit(&samples), Err(EstimatorError::Unavailable));
        assert_eq!(
            estimator.predict(&[Point2::zeros()]),
            Err(EstimatorError::Unavailable)
        );
        assert!(!estimator.is_fitted());
    }
}
