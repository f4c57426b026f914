//! Per-gas reconstruction with graceful degradation
//!
//! A `GasReconstructor` owns one estimator exclusively and turns sensor
//! samples into a reconstructed field on a refit cadence:
//!
//! - no samples → ground truth, `TruthNoSensors`
//! - backend unavailable → ground truth, `TruthNoLibrary` (permanent)
//! - fit or predict error → ground truth, `TruthFitError`, retried on cadence
//! - success → clipped posterior mean, `Fitted`, held until the next refit
//!
//! In background mode the fit runs on the rayon pool. The last good field is
//! displayed until the result arrives; results tagged with an outdated
//! generation (sensors removed, grid or hyperparameters changed meanwhile)
//! are discarded. At most one refit is in flight; a refit requested while one
//! is running replaces any older pending request.

use super::timing::FitTimer;
use super::{
    build_estimator, create_estimator, Estimator, EstimatorConfig, EstimatorKind, EstimatorStatus,
    RefitMode, Sample,
};
use crate::core_types::GasSpecies;
use crate::error::EstimatorError;
use crate::field::{GasField, GridSpec};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use tracing::{debug, warn};

/// Output of one background refit
struct RefitResult {
    generation: u64,
    grid: GridSpec,
    estimator: Box<dyn Estimator>,
    outcome: Result<Vec<f64>, EstimatorError>,
}

/// Reconstructed field and estimator state for one gas
pub struct GasReconstructor {
    gas: GasSpecies,
    config: EstimatorConfig,
    kind: EstimatorKind,
    /// `None` while the estimator is out on a background refit
    estimator: Option<Box<dyn Estimator>>,
    status: EstimatorStatus,
    field: GasField,
    truth: GasField,
    last_refit_tick: Option<u64>,
    generation: u64,
    /// Receiver of the refit currently running on the pool
    in_flight: Option<Receiver<RefitResult>>,
    pending: Option<Vec<Sample>>,
}

impl GasReconstructor {
    /// Create a reconstructor showing `truth` until the first fit
    pub fn new(config: &EstimatorConfig, truth: GasField) -> Self {
        Self::with_estimator(config, create_estimator(config), truth)
    }

    /// Create a reconstructor around an existing estimator
    pub fn with_estimator(
        config: &EstimatorConfig,
        estimator: Box<dyn Estimator>,
        truth: GasField,
    ) -> Self {
        let mut config = *config;
        config.set_refit_every(config.refit_every);
        Self {
            gas: truth.gas(),
            config,
            kind: estimator.kind(),
            estimator: Some(estimator),
            status: EstimatorStatus::Unfitted,
            field: truth.clone(),
            truth,
            last_refit_tick: None,
            generation: 0,
            in_flight: None,
            pending: None,
        }
    }

    /// Gas this reconstructor estimates
    pub fn gas(&self) -> GasSpecies {
        self.gas
    }

    /// Backend in use
    pub fn kind(&self) -> EstimatorKind {
        self.kind
    }

    /// Current state
    pub fn status(&self) -> EstimatorStatus {
        self.status
    }

    /// Reconstructed field (ground truth while in a fallback state)
    pub fn field(&self) -> &GasField {
        &self.field
    }

    /// Color-mapping range of the reconstructed field
    pub fn display_range(&self) -> (f64, f64) {
        self.field.display_range()
    }

    /// Active configuration
    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// Tick of the most recent refit attempt
    pub fn last_refit_tick(&self) -> Option<u64> {
        self.last_refit_tick
    }

    /// Whether a background refit is running
    pub fn is_refit_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Advance the state machine with this tick's samples and ground truth
    pub fn update(&mut self, samples: &[Sample], truth: &GasField, tick: u64) {
        self.poll();

        if truth.grid() != self.truth.grid() {
            debug!("{} grid changed, invalidating reconstruction", self.gas);
            self.invalidate();
            // A held prediction lives on the old lattice; show truth until refit
            if self.status == EstimatorStatus::Fitted {
                self.set_status(EstimatorStatus::Unfitted);
            }
        }
        self.truth.clone_from(truth);

        if self.kind == EstimatorKind::Passthrough {
            self.set_status(EstimatorStatus::TruthNoLibrary);
            self.field.clone_from(truth);
            return;
        }

        if samples.is_empty() {
            if self.status != EstimatorStatus::TruthNoSensors {
                self.invalidate();
            }
            self.set_status(EstimatorStatus::TruthNoSensors);
            self.field.clone_from(truth);
            return;
        }

        let due = self
            .last_refit_tick
            .is_none_or(|last| tick.saturating_sub(last) >= self.config.refit_every);
        if due {
            self.last_refit_tick = Some(tick);
            match self.config.refit_mode {
                RefitMode::Inline => self.refit_inline(samples),
                RefitMode::Background => self.request_background(samples.to_vec()),
            }
        }

        if self.status == EstimatorStatus::TruthNoSensors {
            // Sensors came back; truth stays on display until a fit lands
            self.set_status(EstimatorStatus::Unfitted);
        }
        if self.status.is_fallback() {
            self.field.clone_from(truth);
        }
    }

    /// Block until no background refit is in flight, applying every result
    pub fn flush(&mut self) {
        while let Some(job) = self.in_flight.take() {
            match job.recv() {
                Ok(result) => self.apply_result(result),
                Err(_) => self.recover_lost_worker(),
            }
        }
        if self.status.is_fallback() {
            self.field.clone_from(&self.truth);
        }
    }

    /// Replace the configuration
    ///
    /// Changing the backend or any hyperparameter setting rebuilds the
    /// estimator and forces a refit on the next update. Cadence and mode
    /// changes apply immediately without discarding the current fit.
    pub fn set_config(&mut self, config: EstimatorConfig) {
        let mut config = config;
        config.set_refit_every(config.refit_every);
        let rebuild = EstimatorConfig {
            refit_every: self.config.refit_every,
            refit_mode: self.config.refit_mode,
            ..config
        } != self.config;
        self.config = config;
        if rebuild {
            let estimator = build_estimator(&self.config);
            self.kind = estimator.kind();
            self.estimator = Some(estimator);
            self.invalidate();
        }
    }

    /// Refit every `ticks` ticks (at least 1)
    pub fn set_refit_every(&mut self, ticks: u64) {
        self.config.set_refit_every(ticks);
    }

    /// Replace the length-scale search bounds
    pub fn set_length_scale_bounds(&mut self, min: f64, max: f64) {
        let mut config = self.config;
        config.set_length_scale_bounds(min, max);
        self.set_config(config);
    }

    // ====== Private Methods ======

    fn refit_inline(&mut self, samples: &[Sample]) {
        let grid = *self.truth.grid();
        let outcome = match self.estimator.as_mut() {
            Some(estimator) => run_refit(estimator.as_mut(), self.gas, samples, &grid),
            None => return,
        };
        self.apply_outcome(outcome, grid);
    }

    fn request_background(&mut self, samples: Vec<Sample>) {
        if self.in_flight.is_some() {
            self.pending = Some(samples);
            return;
        }
        self.launch(samples);
    }

    fn launch(&mut self, samples: Vec<Sample>) {
        let Some(mut estimator) = self.estimator.take() else {
            self.pending = Some(samples);
            return;
        };
        let (sender, receiver) = mpsc::channel();
        let generation = self.generation;
        let grid = *self.truth.grid();
        let gas = self.gas;

        rayon::spawn(move || {
            let outcome = run_refit(estimator.as_mut(), gas, &samples, &grid);
            // A dropped receiver means the result is no longer wanted
            let _ = sender.send(RefitResult {
                generation,
                grid,
                estimator,
                outcome,
            });
        });
        self.in_flight = Some(receiver);
    }

    /// Apply a finished background refit without blocking
    fn poll(&mut self) {
        let Some(job) = &self.in_flight else {
            return;
        };
        match job.try_recv() {
            Ok(result) => {
                self.in_flight = None;
                self.apply_result(result);
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                self.in_flight = None;
                self.recover_lost_worker();
            }
        }
    }

    fn apply_result(&mut self, result: RefitResult) {
        if self.estimator.is_none() {
            self.estimator = Some(result.estimator);
        }
        if result.generation == self.generation {
            self.apply_outcome(result.outcome, result.grid);
        } else {
            warn!(
                "Discarding superseded {} refit (generation {}, current {})",
                self.gas, result.generation, self.generation
            );
        }
        if let Some(samples) = self.pending.take() {
            self.launch(samples);
        }
    }

    fn apply_outcome(&mut self, outcome: Result<Vec<f64>, EstimatorError>, grid: GridSpec) {
        let values = match outcome {
            Ok(values) => values,
            Err(EstimatorError::Unavailable) => {
                self.set_status(EstimatorStatus::TruthNoLibrary);
                self.field.clone_from(&self.truth);
                return;
            }
            Err(e) => {
                warn!("{} fit failed, showing truth: {}", self.gas, e);
                self.set_fit_error();
                return;
            }
        };

        match GasField::from_values(grid, self.gas, values) {
            Some(mut field) => {
                field.clip_to_physical();
                self.field = field;
                self.set_status(EstimatorStatus::Fitted);
            }
            None => {
                warn!("{} prediction has wrong length, showing truth", self.gas);
                self.set_fit_error();
            }
        }
    }

    fn recover_lost_worker(&mut self) {
        warn!("{} background refit worker exited without a result", self.gas);
        if self.estimator.is_none() {
            self.estimator = Some(build_estimator(&self.config));
        }
        self.set_fit_error();
    }

    fn set_fit_error(&mut self) {
        self.set_status(EstimatorStatus::TruthFitError);
        self.field.clone_from(&self.truth);
    }

    fn invalidate(&mut self) {
        self.generation += 1;
        self.last_refit_tick = None;
        self.pending = None;
    }

    fn set_status(&mut self, status: EstimatorStatus) {
        if status != self.status {
            debug!("{} estimator: {:?} -> {:?}", self.gas, self.status, status);
            self.status = status;
        }
    }
}

/// Fit then evaluate on every grid node
fn run_refit(
    estimator: &mut dyn Estimator,
    gas: GasSpecies,
    samples: &[Sample],
    grid: &GridSpec,
) -> Result<Vec<f64>, EstimatorError> {
    let _timer = FitTimer::new(gas, samples.len());
    estimator.fit(samples)?;
    estimator.predict(&grid.points())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::Point2;
    use crate::estimator::Passthrough;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Predicts a fixed value everywhere and counts fits
    struct ConstantEstimator {
        value: f64,
        fits: Arc<AtomicUsize>,
        fitted: bool,
    }

    impl Estimator for ConstantEstimator {
        fn fit(&mut self, _samples: &[Sample]) -> Result<(), EstimatorError> {
            self.fits.fetch_add(1, Ordering::SeqCst);
            self.fitted = true;
            Ok(())
        }

        fn predict(&self, points: &[Point2]) -> Result<Vec<f64>, EstimatorError> {
            if self.fitted {
                Ok(vec![self.value; points.len()])
            } else {
                Err(EstimatorError::NotFitted)
            }
        }

        fn kind(&self) -> EstimatorKind {
            EstimatorKind::GaussianProcess
        }

        fn is_fitted(&self) -> bool {
            self.fitted
        }
    }

    struct FailingEstimator;

    impl Estimator for FailingEstimator {
        fn fit(&mut self, _samples: &[Sample]) -> Result<(), EstimatorError> {
            Err(EstimatorError::IllConditioned("singular".into()))
        }

        fn predict(&self, _points: &[Point2]) -> Result<Vec<f64>, EstimatorError> {
            Err(EstimatorError::NotFitted)
        }

        fn kind(&self) -> EstimatorKind {
            EstimatorKind::GaussianProcess
        }

        fn is_fitted(&self) -> bool {
            false
        }
    }

    fn truth(value: f64) -> GasField {
        let grid = GridSpec::new(Point2::zeros(), Point2::new(10.0, 10.0), 6, 6);
        GasField::with_value(grid, GasSpecies::O2, value)
    }

    fn samples() -> Vec<Sample> {
        vec![Sample::new(Point2::new(2.0, 2.0), 20.0)]
    }

    fn constant(value: f64, config: &EstimatorConfig) -> (GasReconstructor, Arc<AtomicUsize>) {
        let fits = Arc::new(AtomicUsize::new(0));
        let estimator = ConstantEstimator {
            value,
            fits: Arc::clone(&fits),
            fitted: false,
        };
        (
            GasReconstructor::with_estimator(config, Box::new(estimator), truth(21.0)),
            fits,
        )
    }

    #[test]
    fn test_no_samples_shows_truth() {
        let (mut rec, fits) = constant(18.0, &EstimatorConfig::default());
        let t = truth(19.5);
        rec.update(&[], &t, 0);
        assert_eq!(rec.status(), EstimatorStatus::TruthNoSensors);
        assert_eq!(rec.field(), &t);
        assert_eq!(fits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_passthrough_reports_no_library() {
        let mut rec = GasReconstructor::with_estimator(
            &EstimatorConfig::default(),
            Box::new(Passthrough),
            truth(21.0),
        );
        let t = truth(20.0);
        rec.update(&samples(), &t, 0);
        assert_eq!(rec.status(), EstimatorStatus::TruthNoLibrary);
        assert_eq!(rec.field(), &t);
    }

    #[test]
    fn test_fit_error_shows_truth_and_tracks_it() {
        let mut rec = GasReconstructor::with_estimator(
            &EstimatorConfig::default(),
            Box::new(FailingEstimator),
            truth(21.0),
        );
        rec.update(&samples(), &truth(20.0), 0);
        assert_eq!(rec.status(), EstimatorStatus::TruthFitError);
        assert_eq!(rec.field(), &truth(20.0));

        // Between retries the fallback follows the latest truth
        rec.update(&samples(), &truth(19.0), 1);
        assert_eq!(rec.field(), &truth(19.0));
    }

    #[test]
    fn test_refit_cadence_holds_prediction() {
        let config = EstimatorConfig {
            refit_every: 3,
            ..EstimatorConfig::default()
        };
        let (mut rec, fits) = constant(18.0, &config);
        for tick in 0..7 {
            rec.update(&samples(), &truth(21.0), tick);
            assert_eq!(rec.status(), EstimatorStatus::Fitted);
            assert_eq!(rec.field().min_max(), (18.0, 18.0));
        }
        // Ticks 0, 3 and 6
        assert_eq!(fits.load(Ordering::SeqCst), 3);
        assert_eq!(rec.last_refit_tick(), Some(6));
    }

    #[test]
    fn test_predictions_clipped_to_physical_range() {
        let (mut rec, _) = constant(150.0, &EstimatorConfig::default());
        rec.update(&samples(), &truth(21.0), 0);
        assert_eq!(rec.field().min_max(), (100.0, 100.0));
    }

    #[test]
    fn test_sensors_returning_triggers_immediate_refit() {
        let config = EstimatorConfig {
            refit_every: 10,
            ..EstimatorConfig::default()
        };
        let (mut rec, fits) = constant(18.0, &config);
        rec.update(&samples(), &truth(21.0), 0);
        rec.update(&[], &truth(21.0), 1);
        assert_eq!(rec.status(), EstimatorStatus::TruthNoSensors);
        rec.update(&samples(), &truth(21.0), 2);
        assert_eq!(rec.status(), EstimatorStatus::Fitted);
        assert_eq!(fits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_background_refit_lands_after_flush() {
        let config = EstimatorConfig {
            refit_mode: RefitMode::Background,
            ..EstimatorConfig::default()
        };
        let (mut rec, fits) = constant(18.0, &config);
        rec.update(&samples(), &truth(21.0), 0);
        rec.flush();
        assert!(!rec.is_refit_in_flight());
        assert_eq!(rec.status(), EstimatorStatus::Fitted);
        assert_eq!(rec.field().min_max(), (18.0, 18.0));
        assert_eq!(fits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_background_result_superseded_by_sensor_loss() {
        let config = EstimatorConfig {
            refit_mode: RefitMode::Background,
            ..EstimatorConfig::default()
        };
        let (mut rec, _) = constant(18.0, &config);
        rec.update(&samples(), &truth(21.0), 0);
        rec.update(&[], &truth(20.5), 1);
        rec.flush();
        assert_eq!(rec.status(), EstimatorStatus::TruthNoSensors);
        assert_eq!(rec.field(), &truth(20.5));
    }

    #[test]
    fn test_grid_change_keeps_field_on_truth_lattice() {
        let config = EstimatorConfig {
            refit_mode: RefitMode::Background,
            refit_every: 100,
            ..EstimatorConfig::default()
        };
        let (mut rec, _) = constant(18.0, &config);
        rec.update(&samples(), &truth(21.0), 0);
        rec.flush();
        assert_eq!(rec.status(), EstimatorStatus::Fitted);

        let finer = GridSpec::new(Point2::zeros(), Point2::new(10.0, 10.0), 11, 11);
        let new_truth = GasField::with_value(finer, GasSpecies::O2, 20.0);
        rec.update(&samples(), &new_truth, 1);

        // Whether or not the refit has landed, the field matches the new grid
        assert_eq!(rec.field().grid(), new_truth.grid());
        if rec.is_refit_in_flight() {
            assert_eq!(rec.status(), EstimatorStatus::Unfitted);
            assert_eq!(rec.field(), &new_truth);
        }

        rec.flush();
        assert_eq!(rec.status(), EstimatorStatus::Fitted);
        assert_eq!(rec.field().grid(), &finer);
        assert_eq!(rec.field().min_max(), (18.0, 18.0));
        assert_eq!(rec.last_refit_tick(), Some(1));
    }

    #[test]
    fn test_grid_change_inline_refits_on_new_grid() {
        let (mut rec, fits) = constant(18.0, &EstimatorConfig {
            refit_every: 100,
            ..EstimatorConfig::default()
        });
        rec.update(&samples(), &truth(21.0), 0);

        let finer = GridSpec::new(Point2::zeros(), Point2::new(10.0, 10.0), 11, 11);
        rec.update(&samples(), &GasField::with_value(finer, GasSpecies::O2, 20.0), 1);

        assert_eq!(rec.status(), EstimatorStatus::Fitted);
        assert_eq!(rec.field().grid(), &finer);
        assert_eq!(fits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_reconstructors_hold_independent_fits() {
        let config = EstimatorConfig {
            refit_every: 1,
            ..EstimatorConfig::default()
        };
        let (mut o2, _) = constant(19.0, &config);
        let co2_truth = |v| GasField::with_value(*truth(0.0).grid(), GasSpecies::CO2, v);
        let co2_fits = Arc::new(AtomicUsize::new(0));
        let mut co2 = GasReconstructor::with_estimator(
            &config,
            Box::new(ConstantEstimator {
                value: 600.0,
                fits: Arc::clone(&co2_fits),
                fitted: false,
            }),
            co2_truth(400.0),
        );
        o2.update(&samples(), &truth(21.0), 0);
        co2.update(&samples(), &co2_truth(400.0), 0);
        let co2_field = co2.field().clone();

        // O₂ loses its model and falls back; CO₂ keeps its own fit
        o2.set_config(EstimatorConfig {
            backend: EstimatorKind::Passthrough,
            ..config
        });
        o2.update(&samples(), &truth(20.0), 1);
        assert_eq!(o2.status(), EstimatorStatus::TruthNoLibrary);
        assert_eq!(o2.field(), &truth(20.0));

        assert_eq!(co2.status(), EstimatorStatus::Fitted);
        assert_eq!(co2.field(), &co2_field);
        assert_eq!(co2.field().min_max(), (600.0, 600.0));
        assert_eq!(co2_fits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_hyperparameter_change_forces_refit() {
        let config = EstimatorConfig {
            refit_every: 100,
            ..EstimatorConfig::default()
        };
        let (mut rec, _) = constant(18.0, &config);
        rec.update(&samples(), &truth(21.0), 0);
        assert_eq!(rec.last_refit_tick(), Some(0));

        rec.set_refit_every(50);
        assert_eq!(rec.last_refit_tick(), Some(0));

        rec.set_length_scale_bounds(2.0, 4.0);
        assert_eq!(rec.config().length_scale_bounds, (2.0, 4.0));
        assert_eq!(rec.last_refit_tick(), None);
    }
}
