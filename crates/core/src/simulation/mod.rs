//! Habitat atmosphere simulation
//!
//! `HabitatSimulation` orchestrates one tick as:
//! 1. Gas balance step over every room
//! 2. Ground-truth field per gas
//! 3. Sensor sampling (noisy readings of the truth at each sensor)
//! 4. Per-gas reconstruction from the readings
//!
//! Ticks are driven externally through [`HabitatSimulation::tick`]; the
//! simulation never owns a timer. Habitat edits happen between ticks through
//! [`HabitatSimulation::habitat_mut`].

mod clock;
mod config;
pub mod gas_balance;

pub use clock::{SimulationClock, DEFAULT_TIME_SCALE};
pub use config::SimulationConfig;
pub use gas_balance::{BalanceConfig, GasBalanceSimulator};

use crate::core_types::{GasPair, GasSpecies, RoomId};
use crate::estimator::{
    fuse, EstimatorStatus, FusedEstimate, GasReconstructor, RefitMode, Sample,
};
use crate::field::{GasField, GridQuality, GridSpec};
use crate::habitat::Habitat;
use crate::health::HealthEffects;
use crate::sensor::true_value_for;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info};

/// Habitat state, sensors and per-gas estimators advanced on a shared clock
pub struct HabitatSimulation {
    habitat: Habitat,
    config: SimulationConfig,
    balance: GasBalanceSimulator,
    rng: StdRng,
    truth: [GasField; 2],
    reconstructors: [GasReconstructor; 2],
    tick_count: u64,
    elapsed_hours: f64,
}

impl HabitatSimulation {
    /// Create a simulation over an empty habitat
    pub fn new(config: SimulationConfig) -> Self {
        Self::with_habitat(config, Habitat::new())
    }

    /// Create a simulation over an existing habitat
    ///
    /// Fields are computed immediately, so every accessor is valid before the
    /// first tick.
    pub fn with_habitat(config: SimulationConfig, habitat: Habitat) -> Self {
        info!(
            "Creating habitat simulation: {} rooms, {} doors, {} sensors, {}x{} grid",
            habitat.rooms().len(),
            habitat.doors().len(),
            habitat.sensors().len(),
            config.grid.nx(),
            config.grid.ny()
        );

        let rng = match config.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let truth = GasSpecies::ALL
            .map(|gas| GasField::ground_truth(&habitat, config.grid, gas, &config.ambient));
        let reconstructors = [
            GasReconstructor::new(&config.estimator, truth[0].clone()),
            GasReconstructor::new(&config.estimator, truth[1].clone()),
        ];

        let mut sim = Self {
            balance: GasBalanceSimulator::new(config.balance, config.ambient),
            habitat,
            config,
            rng,
            truth,
            reconstructors,
            tick_count: 0,
            elapsed_hours: 0.0,
        };
        sim.refresh();
        sim
    }

    /// The habitat
    pub fn habitat(&self) -> &Habitat {
        &self.habitat
    }

    /// Mutable habitat, for edits between ticks
    ///
    /// Fields reflect edits after the next [`tick`](Self::tick) or
    /// [`refresh`](Self::refresh).
    pub fn habitat_mut(&mut self) -> &mut Habitat {
        &mut self.habitat
    }

    /// Active configuration
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Advance simulated time by `dt_hours` and recompute every field
    ///
    /// Never fails: configuration problems are cleaned up and estimator
    /// failures become fallback statuses.
    pub fn tick(&mut self, dt_hours: f64) {
        self.balance.step(&mut self.habitat, dt_hours);
        if dt_hours.is_finite() && dt_hours > 0.0 {
            self.elapsed_hours += dt_hours;
        }
        self.tick_count += 1;
        self.refresh();

        debug!(
            "Tick {}: t={:.2}h, O₂ {}, CO₂ {}",
            self.tick_count,
            self.elapsed_hours,
            self.status(GasSpecies::O2),
            self.status(GasSpecies::CO2)
        );
    }

    /// Recompute truth, resample sensors and update estimators without
    /// advancing time
    pub fn refresh(&mut self) {
        for gas in GasSpecies::ALL {
            self.truth[gas.index()] =
                GasField::ground_truth(&self.habitat, self.config.grid, gas, &self.config.ambient);
        }

        self.sample_sensors();

        for gas in GasSpecies::ALL {
            let samples = self.samples(gas);
            self.reconstructors[gas.index()].update(
                &samples,
                &self.truth[gas.index()],
                self.tick_count,
            );
        }
    }

    /// Wait for any background refits and apply their results
    pub fn flush(&mut self) {
        for reconstructor in &mut self.reconstructors {
            reconstructor.flush();
        }
    }

    /// Ground-truth field of a gas
    pub fn ground_truth_field(&self, gas: GasSpecies) -> &GasField {
        &self.truth[gas.index()]
    }

    /// Reconstructed field of a gas (ground truth in fallback states)
    pub fn reconstructed_field(&self, gas: GasSpecies) -> &GasField {
        self.reconstructors[gas.index()].field()
    }

    /// Color-mapping range of a gas's reconstructed field
    pub fn display_range(&self, gas: GasSpecies) -> (f64, f64) {
        self.reconstructors[gas.index()].display_range()
    }

    /// Estimator state of a gas
    pub fn status(&self, gas: GasSpecies) -> EstimatorStatus {
        self.reconstructors[gas.index()].status()
    }

    /// Reconstructor of a gas
    pub fn reconstructor(&self, gas: GasSpecies) -> &GasReconstructor {
        &self.reconstructors[gas.index()]
    }

    /// Refit both estimators every `ticks` ticks
    pub fn set_refit_every(&mut self, ticks: u64) {
        self.config.estimator.set_refit_every(ticks);
        for reconstructor in &mut self.reconstructors {
            reconstructor.set_refit_every(ticks);
        }
    }

    /// Replace the length-scale search bounds of both estimators
    pub fn set_length_scale_bounds(&mut self, min: f64, max: f64) {
        self.config.estimator.set_length_scale_bounds(min, max);
        for reconstructor in &mut self.reconstructors {
            reconstructor.set_length_scale_bounds(min, max);
        }
    }

    /// Run refits inline or in the background
    pub fn set_refit_mode(&mut self, mode: RefitMode) {
        self.config.estimator.refit_mode = mode;
        for reconstructor in &mut self.reconstructors {
            let mut config = *reconstructor.config();
            config.refit_mode = mode;
            reconstructor.set_config(config);
        }
    }

    /// Replace the evaluation grid; fields are recomputed on the spot
    pub fn set_grid(&mut self, grid: GridSpec) {
        self.config.grid = grid;
        self.refresh();
    }

    /// Fit the evaluation grid to the habitat's rooms plus `margin` meters
    ///
    /// No-op for a habitat without rooms.
    pub fn fit_grid_to_habitat(&mut self, quality: GridQuality, margin: f64) {
        if let Some((min, max)) = self.habitat.bounds() {
            self.set_grid(GridSpec::covering(min, max, margin, quality));
        }
    }

    /// Simulated hours since creation
    pub fn elapsed_hours(&self) -> f64 {
        self.elapsed_hours
    }

    /// Ticks since creation
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Health effects of a room's current air
    pub fn room_health(&self, room: RoomId) -> Option<HealthEffects> {
        self.habitat
            .room(room)
            .map(|r| HealthEffects::from_levels(r.o2_level(), r.co2_level()))
    }

    /// Mean health effects over inhabited rooms (nominal when nobody is home)
    pub fn average_health(&self) -> HealthEffects {
        HealthEffects::average(
            self.habitat
                .rooms()
                .iter()
                .filter(|r| r.population() > 0)
                .map(|r| HealthEffects::from_levels(r.o2_level(), r.co2_level())),
        )
        .unwrap_or_default()
    }

    /// Precision-weighted fusion of the last readings of sensors in a room
    pub fn fused_room_reading(&self, room: RoomId, gas: GasSpecies) -> Option<FusedEstimate> {
        fuse(self.habitat.sensors_in_room(room).filter_map(|s| {
            s.last_reading()
                .map(|reading| (reading.get(gas), s.model.variance(gas)))
        }))
    }

    // ====== Private Methods ======

    fn sample_sensors(&mut self) {
        let ambient = self.config.ambient;
        let truths: Vec<GasPair> = self
            .habitat
            .sensors()
            .iter()
            .map(|s| true_value_for(s, &self.habitat, &ambient))
            .collect();
        for (sensor, truth) in self.habitat.sensors_mut().iter_mut().zip(truths) {
            sensor.sample(&mut self.rng, truth);
        }
    }

    fn samples(&self, gas: GasSpecies) -> Vec<Sample> {
        self.habitat
            .sensors()
            .iter()
            .filter_map(|s| {
                s.last_reading()
                    .map(|reading| Sample::new(s.position(), reading.get(gas)))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::Point2;
    use crate::estimator::{EstimatorConfig, EstimatorKind};
    use crate::geometry::Shape;
    use crate::habitat::{DoorEndpoint, RoomKind};
    use crate::sensor::SensorModel;

    fn config() -> SimulationConfig {
        SimulationConfig {
            grid: GridSpec::new(Point2::zeros(), Point2::new(20.0, 10.0), 21, 11),
            ..SimulationConfig::default()
        }
        .with_seed(7)
    }

    fn two_room_sim() -> (HabitatSimulation, RoomId, RoomId) {
        let mut sim = HabitatSimulation::new(config());
        let h = sim.habitat_mut();
        let a = h
            .add_room("Quarters", RoomKind::LivingQuarters, Shape::rect(0.0, 0.0, 10.0, 10.0))
            .unwrap();
        let b = h
            .add_room("Lab", RoomKind::Laboratory, Shape::rect(10.0, 0.0, 10.0, 10.0))
            .unwrap();
        h.add_door(a, DoorEndpoint::Room(b), true).unwrap();
        sim.refresh();
        (sim, a, b)
    }

    #[test]
    fn test_tick_advances_clock() {
        let (mut sim, _, _) = two_room_sim();
        sim.tick(0.5);
        sim.tick(0.25);
        assert_eq!(sim.tick_count(), 2);
        assert_eq!(sim.elapsed_hours(), 0.75);

        sim.tick(f64::NAN);
        assert_eq!(sim.tick_count(), 3);
        assert_eq!(sim.elapsed_hours(), 0.75);
    }

    #[test]
    fn test_no_sensors_reconstruction_is_truth() {
        let (mut sim, a, _) = two_room_sim();
        sim.habitat_mut().set_population(a, 3).unwrap();
        sim.tick(1.0);
        for gas in GasSpecies::ALL {
            assert_eq!(sim.status(gas), EstimatorStatus::TruthNoSensors);
            assert_eq!(sim.reconstructed_field(gas), sim.ground_truth_field(gas));
        }
    }

    #[test]
    fn test_sensors_get_readings_each_tick() {
        let (mut sim, _, _) = two_room_sim();
        let s = sim
            .habitat_mut()
            .add_sensor(Point2::new(5.0, 5.0), SensorModel::exact());
        sim.tick(1.0);
        let reading = sim.habitat().sensor(s).unwrap().last_reading().unwrap();
        assert_eq!(reading, GasPair::new(21.0, 400.0));
    }

    #[test]
    fn test_passthrough_backend_shows_truth() {
        let mut cfg = config();
        cfg.estimator = EstimatorConfig {
            backend: EstimatorKind::Passthrough,
            ..EstimatorConfig::default()
        };
        let mut sim = HabitatSimulation::new(cfg);
        sim.habitat_mut()
            .add_sensor(Point2::new(5.0, 5.0), SensorModel::default());
        sim.tick(1.0);
        assert_eq!(sim.status(GasSpecies::O2), EstimatorStatus::TruthNoLibrary);
        assert_eq!(
            sim.reconstructed_field(GasSpecies::O2),
            sim.ground_truth_field(GasSpecies::O2)
        );
    }

    #[test]
    fn test_fused_reading_uses_room_sensors_only() {
        let (mut sim, a, b) = two_room_sim();
        let h = sim.habitat_mut();
        h.add_sensor(Point2::new(2.0, 2.0), SensorModel::exact());
        h.add_sensor(Point2::new(8.0, 8.0), SensorModel::exact());
        h.add_sensor(Point2::new(15.0, 5.0), SensorModel::new(0.5, 20.0));
        h.set_levels(a, GasPair::new(19.0, 800.0)).unwrap();
        sim.refresh();

        let fused = sim.fused_room_reading(a, GasSpecies::O2).unwrap();
        assert_eq!(fused.value, 19.0);
        assert_eq!(fused.variance, 0.0);

        let lab = sim.fused_room_reading(b, GasSpecies::CO2).unwrap();
        assert_eq!(lab.variance, 20.0);
    }

    #[test]
    fn test_health_reports() {
        let (mut sim, a, b) = two_room_sim();
        assert_eq!(sim.average_health(), HealthEffects::default());

        sim.habitat_mut().set_population(a, 2).unwrap();
        sim.habitat_mut()
            .set_levels(a, GasPair::new(18.5, 400.0))
            .unwrap();
        let health = sim.room_health(a).unwrap();
        assert!(health.dizziness > 0.0);
        // Only the inhabited room counts
        assert_eq!(sim.average_health(), health);
        assert_eq!(sim.room_health(b), Some(HealthEffects::default()));
    }

    #[test]
    fn test_fit_grid_to_habitat() {
        let (mut sim, _, _) = two_room_sim();
        sim.fit_grid_to_habitat(GridQuality::Coarse, 2.0);
        let grid = *sim.ground_truth_field(GasSpecies::O2).grid();
        assert_eq!(grid.origin(), Point2::new(-2.0, -2.0));
        assert_eq!(grid.extent(), Point2::new(24.0, 14.0));
        assert_eq!(sim.reconstructed_field(GasSpecies::O2).grid(), &grid);
    }

    #[test]
    fn test_runtime_estimator_settings() {
        let (mut sim, _, _) = two_room_sim();
        sim.set_refit_every(0);
        assert_eq!(sim.config().estimator.refit_every, 1);
        sim.set_length_scale_bounds(2.0, 8.0);
        for gas in GasSpecies::ALL {
            assert_eq!(
                sim.reconstructor(gas).config().length_scale_bounds,
                (2.0, 8.0)
            );
        }
    }
}
