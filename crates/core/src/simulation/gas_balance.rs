//! Per-room gas mass balance
//!
//! Each step applies three phases in a fixed order:
//! 1. Respiration: occupants consume O₂ and produce CO₂, scaled by room size
//! 2. Breach exchange: damaged rooms relax toward the exterior atmosphere
//! 3. Door exchange: connected spaces relax toward each other
//!
//! All exchanges use the proportional-difference form
//! `k × dt × (other − this)`. Between two rooms the exchange is symmetric, so
//! the sum of their levels is conserved. The exterior is an infinite
//! reservoir and never changes.

use crate::core_types::{AmbientBaseline, GasPair, RoomId};
use crate::habitat::{DoorEndpoint, Habitat, Room};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

// ============================================================================
// EXCHANGE LIMITS
// ============================================================================

/// Largest fraction of a room↔room difference moved in one step
///
/// At 0.5 both rooms meet at their mean; anything larger would swap them.
const MAX_ROOM_EXCHANGE: f64 = 0.5;

/// Largest fraction of a room↔exterior difference moved in one step
const MAX_AMBIENT_EXCHANGE: f64 = 1.0;

/// Rates driving the gas model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BalanceConfig {
    /// O₂ consumed per person per hour, percentage points (before size scaling)
    pub o2_per_person_hour: f64,
    /// CO₂ produced per person per hour, ppm (before size scaling)
    pub co2_per_person_hour: f64,
    /// Floor area at which the size factor is exactly 1, m²
    pub reference_area_m2: f64,
    /// Floor area below which rooms stop getting "smaller", m²
    pub min_area_m2: f64,
    /// Exchange rate with the exterior at breach level 1, per hour
    pub breach_leak_rate: f64,
}

impl Default for BalanceConfig {
    fn default() -> Self {
        Self {
            o2_per_person_hour: 0.035,
            co2_per_person_hour: 35.0,
            reference_area_m2: 100.0,
            min_area_m2: 10.0,
            breach_leak_rate: 0.5,
        }
    }
}

impl BalanceConfig {
    /// Size normalization: small rooms deplete faster for the same population
    ///
    /// `reference_area / max(area, min_area)`, so a room of exactly the
    /// reference area has factor 1.
    pub fn size_factor(&self, area_m2: f64) -> f64 {
        let floor = self.min_area_m2.max(f64::EPSILON);
        let area = if area_m2.is_finite() { area_m2 } else { floor };
        self.reference_area_m2 / area.max(floor)
    }
}

/// Advances room gas levels through time
#[derive(Debug, Clone)]
pub struct GasBalanceSimulator {
    config: BalanceConfig,
    ambient: AmbientBaseline,
}

impl GasBalanceSimulator {
    /// Create a simulator for the given rates and exterior atmosphere
    pub fn new(config: BalanceConfig, ambient: AmbientBaseline) -> Self {
        Self { config, ambient }
    }

    /// Active rates
    pub fn config(&self) -> &BalanceConfig {
        &self.config
    }

    /// Mutable rates, for runtime tuning between ticks
    pub fn config_mut(&mut self) -> &mut BalanceConfig {
        &mut self.config
    }

    /// Exterior atmosphere
    pub fn ambient(&self) -> &AmbientBaseline {
        &self.ambient
    }

    /// Size normalization factor for a floor area
    pub fn size_factor(&self, area_m2: f64) -> f64 {
        self.config.size_factor(area_m2)
    }

    /// Advance every room by `dt_hours`
    ///
    /// Doors with dangling room references are removed before anything is
    /// computed. A non-positive or non-finite `dt_hours` leaves the habitat
    /// untouched apart from that cleanup.
    pub fn step(&self, habitat: &mut Habitat, dt_hours: f64) {
        let pruned = habitat.prune_invalid_doors();
        if !pruned.is_empty() {
            warn!("Pruned {} invalid door(s) before gas step", pruned.len());
        }

        if !(dt_hours.is_finite() && dt_hours > 0.0) {
            debug!("Skipping gas step with dt={}", dt_hours);
            return;
        }

        self.apply_respiration(habitat, dt_hours);
        self.apply_breaches(habitat, dt_hours);
        self.apply_doors(habitat, dt_hours);

        for room in habitat.rooms_mut() {
            room.clamp_levels();
        }
    }

    // ====== Private Methods ======

    fn apply_respiration(&self, habitat: &mut Habitat, dt_hours: f64) {
        for room in habitat.rooms_mut() {
            if room.population() == 0 {
                continue;
            }
            let people = f64::from(room.population());
            let scale = people * dt_hours * self.size_factor(room.area_m2());
            room.o2_level -= self.config.o2_per_person_hour * scale;
            room.co2_level += self.config.co2_per_person_hour * scale;
        }
    }

    fn apply_breaches(&self, habitat: &mut Habitat, dt_hours: f64) {
        let target = self.ambient.levels();
        for room in habitat.rooms_mut() {
            if room.breach_level() <= 0.0 {
                continue;
            }
            let k = (room.breach_level() * self.config.breach_leak_rate * dt_hours)
                .min(MAX_AMBIENT_EXCHANGE);
            relax_toward(room, target, k);
        }
    }

    fn apply_doors(&self, habitat: &mut Habitat, dt_hours: f64) {
        // Snapshot topology so rooms can be mutated door by door
        let doors: Vec<(RoomId, DoorEndpoint, f64)> = habitat
            .doors()
            .iter()
            .map(|d| (d.room_a(), d.endpoint_b(), d.flow_rate()))
            .collect();

        for (a, b, flow_rate) in doors {
            let rate = flow_rate * dt_hours;
            match b {
                DoorEndpoint::Room(b) => {
                    let (Some(level_a), Some(level_b)) = (
                        habitat.room(a).map(Room::levels),
                        habitat.room(b).map(Room::levels),
                    ) else {
                        continue;
                    };
                    let k = rate.min(MAX_ROOM_EXCHANGE);
                    let delta = GasPair::new(
                        k * (level_b.o2 - level_a.o2),
                        k * (level_b.co2 - level_a.co2),
                    );
                    if let Some(room) = habitat.room_mut(a) {
                        room.o2_level += delta.o2;
                        room.co2_level += delta.co2;
                    }
                    if let Some(room) = habitat.room_mut(b) {
                        room.o2_level -= delta.o2;
                        room.co2_level -= delta.co2;
                    }
                }
                DoorEndpoint::Ambient => {
                    let target = self.ambient.levels();
                    if let Some(room) = habitat.room_mut(a) {
                        relax_toward(room, target, rate.min(MAX_AMBIENT_EXCHANGE));
                    }
                }
            }
        }
    }
}

/// Move a room a fraction `k` of the way toward `target`
fn relax_toward(room: &mut Room, target: GasPair, k: f64) {
    room.o2_level += k * (target.o2 - room.o2_level);
    room.co2_level += k * (target.co2 - room.co2_level);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Shape;
    use crate::habitat::RoomKind;
    use approx::assert_abs_diff_eq;

    fn simulator() -> GasBalanceSimulator {
        GasBalanceSimulator::new(BalanceConfig::default(), AmbientBaseline::mars())
    }

    fn room_100m2(h: &mut Habitat, name: &str, x: f64) -> RoomId {
        h.add_room(name, RoomKind::LivingQuarters, Shape::rect(x, 0.0, 10.0, 10.0))
            .unwrap()
    }

    #[test]
    fn test_open_door_exchange_is_symmetric() {
        let mut h = Habitat::new();
        let a = room_100m2(&mut h, "A", 0.0);
        let b = room_100m2(&mut h, "B", 10.0);
        h.set_levels(a, GasPair::new(21.0, 400.0)).unwrap();
        h.set_levels(b, GasPair::new(15.0, 400.0)).unwrap();
        h.add_door(a, DoorEndpoint::Room(b), true).unwrap();

        simulator().step(&mut h, 1.0);

        assert_abs_diff_eq!(h.room(a).unwrap().o2_level(), 19.8, epsilon = 1e-12);
        assert_abs_diff_eq!(h.room(b).unwrap().o2_level(), 16.2, epsilon = 1e-12);
        assert_abs_diff_eq!(h.room(a).unwrap().co2_level(), 400.0, epsilon = 1e-12);
    }

    #[test]
    fn test_respiration_at_reference_area() {
        let mut h = Habitat::new();
        let a = room_100m2(&mut h, "A", 0.0);
        h.set_population(a, 2).unwrap();

        simulator().step(&mut h, 1.0);

        let room = h.room(a).unwrap();
        assert_abs_diff_eq!(room.o2_level(), 20.93, epsilon = 1e-12);
        assert_abs_diff_eq!(room.co2_level(), 470.0, epsilon = 1e-9);
    }

    #[test]
    fn test_small_rooms_deplete_faster() {
        let mut h = Habitat::new();
        let big = room_100m2(&mut h, "Big", 0.0);
        let small = h
            .add_room("Small", RoomKind::Storage, Shape::rect(20.0, 0.0, 5.0, 5.0))
            .unwrap();
        h.set_population(big, 1).unwrap();
        h.set_population(small, 1).unwrap();

        simulator().step(&mut h, 1.0);

        assert!(h.room(small).unwrap().o2_level() < h.room(big).unwrap().o2_level());
    }

    #[test]
    fn test_size_factor_floor() {
        let config = BalanceConfig::default();
        assert_eq!(config.size_factor(100.0), 1.0);
        assert_eq!(config.size_factor(2.0), 10.0);
        assert_eq!(config.size_factor(0.0), 10.0);
        assert_eq!(config.size_factor(200.0), 0.5);
    }

    #[test]
    fn test_breach_relaxes_toward_ambient() {
        let mut h = Habitat::new();
        let a = room_100m2(&mut h, "A", 0.0);
        h.set_breach_level(a, 1.0).unwrap();

        simulator().step(&mut h, 1.0);

        // k = 1.0 × 0.5 × 1.0 = 0.5: halfway to Mars
        let room = h.room(a).unwrap();
        assert_abs_diff_eq!(room.o2_level(), (21.0 + 0.13) / 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(room.co2_level(), (400.0 + 950_000.0) / 2.0, epsilon = 1e-6);
    }

    #[test]
    fn test_closed_door_still_leaks() {
        let mut h = Habitat::new();
        let a = room_100m2(&mut h, "A", 0.0);
        let b = room_100m2(&mut h, "B", 10.0);
        h.set_levels(b, GasPair::new(15.0, 400.0)).unwrap();
        h.add_door(a, DoorEndpoint::Room(b), false).unwrap();

        simulator().step(&mut h, 1.0);

        let o2_a = h.room(a).unwrap().o2_level();
        assert!(o2_a < 21.0);
        assert!(o2_a > 20.0);
    }

    #[test]
    fn test_exterior_door_leaves_ambient_unchanged() {
        let mut h = Habitat::new();
        let a = room_100m2(&mut h, "Airlock", 0.0);
        h.add_door(a, DoorEndpoint::Ambient, true).unwrap();
        let sim = simulator();

        sim.step(&mut h, 1.0);

        assert_eq!(*sim.ambient(), AmbientBaseline::mars());
        assert_abs_diff_eq!(
            h.room(a).unwrap().o2_level(),
            21.0 + 0.2 * (0.13 - 21.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_large_dt_never_overshoots() {
        let mut h = Habitat::new();
        let a = room_100m2(&mut h, "A", 0.0);
        let b = room_100m2(&mut h, "B", 10.0);
        h.set_levels(b, GasPair::new(15.0, 400.0)).unwrap();
        h.add_door(a, DoorEndpoint::Room(b), true).unwrap();
        h.set_breach_level(b, 1.0).unwrap();

        simulator().step(&mut h, 100.0);

        let (ra, rb) = (h.room(a).unwrap(), h.room(b).unwrap());
        assert!(ra.o2_level() >= 0.0 && rb.o2_level() >= 0.0);
        assert!(ra.co2_level() <= 950_000.0 && rb.co2_level() <= 950_000.0);
    }

    #[test]
    fn test_invalid_dt_is_noop() {
        let mut h = Habitat::new();
        let a = room_100m2(&mut h, "A", 0.0);
        h.set_population(a, 4).unwrap();
        let sim = simulator();

        sim.step(&mut h, 0.0);
        sim.step(&mut h, -1.0);
        sim.step(&mut h, f64::NAN);

        assert_eq!(h.room(a).unwrap().o2_level(), 21.0);
    }

    #[test]
    fn test_levels_stay_non_negative_under_heavy_load() {
        let mut h = Habitat::new();
        let a = h
            .add_room("Closet", RoomKind::Storage, Shape::rect(0.0, 0.0, 1.0, 1.0))
            .unwrap();
        h.set_population(a, 50).unwrap();
        let sim = simulator();

        for _ in 0..100 {
            sim.step(&mut h, 1.0);
        }

        assert_eq!(h.room(a).unwrap().o2_level(), 0.0);
        assert!(h.room(a).unwrap().co2_level() > 0.0);
    }
}
