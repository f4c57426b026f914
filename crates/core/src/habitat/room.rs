//! Room state
//!
//! A room carries its footprint, its current gas levels and the two knobs
//! that drive the gas model: population and breach severity.

use crate::core_types::{GasPair, RoomId, NORMAL_CO2_PPM, NORMAL_O2_PERCENT};
use crate::geometry::Shape;
use serde::{Deserialize, Serialize};

/// Default floor-to-ceiling height used to derive volume, meters
pub const DEFAULT_CEILING_HEIGHT_M: f64 = 2.5;

/// Volume floor so a sliver-sized room never divides by ~0, liters
pub const MIN_ROOM_VOLUME_L: f64 = 1000.0;

/// Liters per cubic meter
const LITERS_PER_M3: f64 = 1000.0;

/// Functional role of a room (descriptive only, no effect on the gas model)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RoomKind {
    /// Crew sleeping and living space
    #[default]
    LivingQuarters,
    /// Laboratory
    Laboratory,
    /// Plant growth area
    Greenhouse,
    /// Command center
    CommandCenter,
    /// Airlock to the exterior
    Airlock,
    /// Corridor
    Corridor,
    /// Storage
    Storage,
    /// Medical bay
    MedicalBay,
}

impl RoomKind {
    /// Human-readable label
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::LivingQuarters => "Living Quarters",
            Self::Laboratory => "Laboratory",
            Self::Greenhouse => "Greenhouse",
            Self::CommandCenter => "Command Center",
            Self::Airlock => "Airlock",
            Self::Corridor => "Corridor",
            Self::Storage => "Storage",
            Self::MedicalBay => "Medical Bay",
        }
    }
}

/// A habitat room and its atmospheric state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    id: RoomId,
    /// Display name
    pub name: String,
    /// Functional role
    pub kind: RoomKind,
    shape: Shape,
    ceiling_height_m: f64,
    pub(crate) o2_level: f64,
    pub(crate) co2_level: f64,
    population: u32,
    breach_level: f64,
}

impl Room {
    /// Create a room at nominal habitat atmosphere, empty and sealed
    pub(crate) fn new(id: RoomId, name: String, kind: RoomKind, shape: Shape) -> Self {
        Self {
            id,
            name,
            kind,
            shape,
            ceiling_height_m: DEFAULT_CEILING_HEIGHT_M,
            o2_level: NORMAL_O2_PERCENT,
            co2_level: NORMAL_CO2_PPM,
            population: 0,
            breach_level: 0.0,
        }
    }

    /// Room identity
    pub fn id(&self) -> RoomId {
        self.id
    }

    /// Footprint
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// O₂ level, percent
    pub fn o2_level(&self) -> f64 {
        self.o2_level
    }

    /// CO₂ level, ppm
    pub fn co2_level(&self) -> f64 {
        self.co2_level
    }

    /// Both gas levels
    pub fn levels(&self) -> GasPair {
        GasPair::new(self.o2_level, self.co2_level)
    }

    /// Number of occupants
    pub fn population(&self) -> u32 {
        self.population
    }

    /// Breach severity in [0, 1]
    pub fn breach_level(&self) -> f64 {
        self.breach_level
    }

    /// Footprint area, m²
    pub fn area_m2(&self) -> f64 {
        self.shape.area()
    }

    /// Ceiling height, m
    pub fn ceiling_height_m(&self) -> f64 {
        self.ceiling_height_m
    }

    /// Air volume in liters, floored at [`MIN_ROOM_VOLUME_L`]
    pub fn volume_liters(&self) -> f64 {
        (self.area_m2() * self.ceiling_height_m * LITERS_PER_M3).max(MIN_ROOM_VOLUME_L)
    }

    /// Point containment against the footprint
    pub fn contains(&self, point: crate::core_types::Point2) -> bool {
        self.shape.contains(point)
    }

    pub(crate) fn set_population(&mut self, population: u32) {
        self.population = population;
    }

    pub(crate) fn set_breach_level(&mut self, level: f64) {
        self.breach_level = if level.is_finite() {
            level.clamp(0.0, 1.0)
        } else {
            0.0
        };
    }

    pub(crate) fn set_levels(&mut self, levels: GasPair) {
        let levels = levels.non_negative();
        self.o2_level = levels.o2;
        self.co2_level = levels.co2;
    }

    pub(crate) fn set_ceiling_height(&mut self, height_m: f64) {
        if height_m.is_finite() && height_m > 0.0 {
            self.ceiling_height_m = height_m;
        }
    }

    /// Floor both levels at zero
    pub(crate) fn clamp_levels(&mut self) {
        self.o2_level = self.o2_level.max(0.0);
        self.co2_level = self.co2_level.max(0.0);
    }
}
