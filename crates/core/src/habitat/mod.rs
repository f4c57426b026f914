//! Habitat registry
//!
//! `Habitat` owns every room, door and sensor of a design session and is the
//! only place ids are assigned. Rooms and doors are kept in id order, which
//! makes every iteration (and therefore every simulation step) deterministic.

mod door;
mod room;

pub use door::{
    Door, DoorEndpoint, DOOR_CLOSED_LEAK_RATE, DOOR_OPEN_FLOW_RATE, MIN_DOOR_LEAK_RATE,
};
pub use room::{Room, RoomKind, DEFAULT_CEILING_HEIGHT_M, MIN_ROOM_VOLUME_L};

use crate::core_types::{
    AmbientBaseline, DoorId, GasPair, IdCounter, Point2, RoomId, SensorId,
};
use crate::error::HabitatError;
use crate::geometry::Shape;
use crate::sensor::{Sensor, SensorModel};
use rustc_hash::FxHashMap;
use tracing::{debug, warn};

/// Registry of rooms, doors and sensors
#[derive(Debug, Clone, Default)]
pub struct Habitat {
    rooms: Vec<Room>,
    room_index: FxHashMap<RoomId, usize>,
    doors: Vec<Door>,
    sensors: Vec<Sensor>,
    room_ids: IdCounter,
    door_ids: IdCounter,
    sensor_ids: IdCounter,
}

impl Habitat {
    /// Create an empty habitat
    pub fn new() -> Self {
        Self::default()
    }

    // ====== Rooms ======

    /// Add a room at nominal atmosphere
    ///
    /// # Errors
    /// `InvalidShape` when the footprint has non-finite coordinates or no area.
    pub fn add_room(
        &mut self,
        name: impl Into<String>,
        kind: RoomKind,
        shape: Shape,
    ) -> Result<RoomId, HabitatError> {
        shape.validate().map_err(HabitatError::InvalidShape)?;
        let id = RoomId::new(self.room_ids.next_raw());
        let room = Room::new(id, name.into(), kind, shape);
        debug!(
            "Added room {} '{}' ({:.1} m²)",
            id,
            room.name,
            room.area_m2()
        );
        self.room_index.insert(id, self.rooms.len());
        self.rooms.push(room);
        Ok(id)
    }

    /// Remove a room and every door that references it
    ///
    /// Returns the removed room and the ids of the doors removed with it.
    ///
    /// # Errors
    /// `UnknownRoom` when the id is not registered.
    pub fn remove_room(&mut self, id: RoomId) -> Result<(Room, Vec<DoorId>), HabitatError> {
        let idx = *self
            .room_index
            .get(&id)
            .ok_or(HabitatError::UnknownRoom(id))?;
        let room = self.rooms.remove(idx);
        self.rebuild_room_index();

        let mut removed_doors = Vec::new();
        self.doors.retain(|door| {
            if door.references(id) {
                removed_doors.push(door.id());
                false
            } else {
                true
            }
        });
        debug!(
            "Removed room {} and {} attached door(s)",
            id,
            removed_doors.len()
        );
        Ok((room, removed_doors))
    }

    /// Look up a room
    pub fn room(&self, id: RoomId) -> Option<&Room> {
        self.room_index.get(&id).map(|&idx| &self.rooms[idx])
    }

    /// Look up a room mutably
    pub fn room_mut(&mut self, id: RoomId) -> Option<&mut Room> {
        match self.room_index.get(&id) {
            Some(&idx) => Some(&mut self.rooms[idx]),
            None => None,
        }
    }

    /// All rooms in id order
    pub fn rooms(&self) -> &[Room] {
        &self.rooms
    }

    pub(crate) fn rooms_mut(&mut self) -> &mut [Room] {
        &mut self.rooms
    }

    /// Whether a room id is registered
    pub fn has_room(&self, id: RoomId) -> bool {
        self.room_index.contains_key(&id)
    }

    /// Set a room's occupant count
    ///
    /// # Errors
    /// `UnknownRoom` when the id is not registered.
    pub fn set_population(&mut self, id: RoomId, population: u32) -> Result<(), HabitatError> {
        self.checked_room_mut(id)?.set_population(population);
        Ok(())
    }

    /// Set a room's breach severity, clamped to [0, 1]
    ///
    /// # Errors
    /// `UnknownRoom` when the id is not registered.
    pub fn set_breach_level(&mut self, id: RoomId, level: f64) -> Result<(), HabitatError> {
        self.checked_room_mut(id)?.set_breach_level(level);
        Ok(())
    }

    /// Overwrite a room's gas levels, floored at zero
    ///
    /// # Errors
    /// `UnknownRoom` when the id is not registered.
    pub fn set_levels(&mut self, id: RoomId, levels: GasPair) -> Result<(), HabitatError> {
        self.checked_room_mut(id)?.set_levels(levels);
        Ok(())
    }

    /// Set a room's ceiling height (ignored unless finite and positive)
    ///
    /// # Errors
    /// `UnknownRoom` when the id is not registered.
    pub fn set_ceiling_height(&mut self, id: RoomId, height_m: f64) -> Result<(), HabitatError> {
        self.checked_room_mut(id)?.set_ceiling_height(height_m);
        Ok(())
    }

    /// Room containing a point
    ///
    /// Overlapping footprints resolve to the lowest room id.
    pub fn room_at(&self, point: Point2) -> Option<RoomId> {
        self.rooms
            .iter()
            .find(|room| room.contains(point))
            .map(Room::id)
    }

    /// Bounding box of every room footprint, `None` without rooms
    pub fn bounds(&self) -> Option<(Point2, Point2)> {
        self.rooms
            .iter()
            .map(|room| room.shape().bounding_box())
            .reduce(|(min_a, max_a), (min_b, max_b)| (min_a.inf(&min_b), max_a.sup(&max_b)))
    }

    /// Ground-truth gas levels at a point: the containing room, else ambient
    pub fn truth_at(&self, point: Point2, ambient: &AmbientBaseline) -> GasPair {
        self.rooms
            .iter()
            .find(|room| room.contains(point))
            .map_or_else(|| ambient.levels(), Room::levels)
    }

    // ====== Doors ======

    /// Connect room `a` to another room or to the exterior
    ///
    /// # Errors
    /// `UnknownRoom` for an unregistered endpoint, `SelfReferencingDoor` when
    /// both sides are the same room.
    pub fn add_door(
        &mut self,
        a: RoomId,
        b: DoorEndpoint,
        is_open: bool,
    ) -> Result<DoorId, HabitatError> {
        if !self.has_room(a) {
            return Err(HabitatError::UnknownRoom(a));
        }
        if let DoorEndpoint::Room(b_id) = b {
            if b_id == a {
                return Err(HabitatError::SelfReferencingDoor(a));
            }
            if !self.has_room(b_id) {
                return Err(HabitatError::UnknownRoom(b_id));
            }
        }
        let id = DoorId::new(self.door_ids.next_raw());
        self.doors.push(Door::new(id, a, b, is_open));
        Ok(id)
    }

    /// Remove a door
    ///
    /// # Errors
    /// `UnknownDoor` when the id is not registered.
    pub fn remove_door(&mut self, id: DoorId) -> Result<Door, HabitatError> {
        let idx = self.door_position(id)?;
        Ok(self.doors.remove(idx))
    }

    /// Look up a door
    pub fn door(&self, id: DoorId) -> Option<&Door> {
        self.doors.iter().find(|d| d.id() == id)
    }

    /// Look up a door mutably (e.g. to override flow rates)
    pub fn door_mut(&mut self, id: DoorId) -> Option<&mut Door> {
        self.doors.iter_mut().find(|d| d.id() == id)
    }

    /// All doors in id order
    pub fn doors(&self) -> &[Door] {
        &self.doors
    }

    /// Open or close a door
    ///
    /// # Errors
    /// `UnknownDoor` when the id is not registered.
    pub fn set_door_open(&mut self, id: DoorId, is_open: bool) -> Result<(), HabitatError> {
        let idx = self.door_position(id)?;
        self.doors[idx].is_open = is_open;
        Ok(())
    }

    /// Flip a door, returning its new open state
    ///
    /// # Errors
    /// `UnknownDoor` when the id is not registered.
    pub fn toggle_door(&mut self, id: DoorId) -> Result<bool, HabitatError> {
        let idx = self.door_position(id)?;
        self.doors[idx].toggle();
        Ok(self.doors[idx].is_open)
    }

    /// Drop doors whose endpoints are no longer registered
    ///
    /// A dangling door is a configuration error; it is removed rather than
    /// computed against stale state.
    pub fn prune_invalid_doors(&mut self) -> Vec<DoorId> {
        let room_index = &self.room_index;
        let mut removed = Vec::new();
        self.doors.retain(|door| {
            let a_ok = room_index.contains_key(&door.room_a());
            let b_ok = match door.endpoint_b() {
                DoorEndpoint::Room(b) => room_index.contains_key(&b),
                DoorEndpoint::Ambient => true,
            };
            if a_ok && b_ok {
                true
            } else {
                warn!(
                    "Removing door {} with dangling room reference ({} -> {:?})",
                    door.id(),
                    door.room_a(),
                    door.endpoint_b()
                );
                removed.push(door.id());
                false
            }
        });
        removed
    }

    // ====== Sensors ======

    /// Place a sensor
    pub fn add_sensor(&mut self, position: Point2, model: SensorModel) -> SensorId {
        let id = SensorId::new(self.sensor_ids.next_raw());
        self.sensors.push(Sensor::new(id, position, model));
        id
    }

    /// Remove a sensor
    ///
    /// # Errors
    /// `UnknownSensor` when the id is not registered.
    pub fn remove_sensor(&mut self, id: SensorId) -> Result<Sensor, HabitatError> {
        let idx = self
            .sensors
            .iter()
            .position(|s| s.id() == id)
            .ok_or(HabitatError::UnknownSensor(id))?;
        Ok(self.sensors.remove(idx))
    }

    /// Look up a sensor
    pub fn sensor(&self, id: SensorId) -> Option<&Sensor> {
        self.sensors.iter().find(|s| s.id() == id)
    }

    /// All sensors in id order
    pub fn sensors(&self) -> &[Sensor] {
        &self.sensors
    }

    pub(crate) fn sensors_mut(&mut self) -> &mut [Sensor] {
        &mut self.sensors
    }

    /// Replace a sensor's noise variances
    ///
    /// # Errors
    /// `UnknownSensor` when the id is not registered.
    pub fn set_sensor_variances(
        &mut self,
        id: SensorId,
        o2_variance: f64,
        co2_variance: f64,
    ) -> Result<(), HabitatError> {
        self.checked_sensor_mut(id)?.model = SensorModel::new(o2_variance, co2_variance);
        Ok(())
    }

    /// Set or clear a sensor's spatial averaging radius
    ///
    /// # Errors
    /// `UnknownSensor` when the id is not registered.
    pub fn set_sensing_radius(
        &mut self,
        id: SensorId,
        radius: Option<f64>,
    ) -> Result<(), HabitatError> {
        self.checked_sensor_mut(id)?.set_sensing_radius(radius);
        Ok(())
    }

    /// Sensors currently located inside a room
    pub fn sensors_in_room(&self, id: RoomId) -> impl Iterator<Item = &Sensor> + '_ {
        self.sensors
            .iter()
            .filter(move |s| self.room_at(s.position()) == Some(id))
    }

    // ====== Private Methods ======

    fn rebuild_room_index(&mut self) {
        self.room_index.clear();
        for (idx, room) in self.rooms.iter().enumerate() {
            self.room_index.insert(room.id(), idx);
        }
    }

    fn checked_room_mut(&mut self, id: RoomId) -> Result<&mut Room, HabitatError> {
        self.room_mut(id).ok_or(HabitatError::UnknownRoom(id))
    }

    fn checked_sensor_mut(&mut self, id: SensorId) -> Result<&mut Sensor, HabitatError> {
        self.sensors
            .iter_mut()
            .find(|s| s.id() == id)
            .ok_or(HabitatError::UnknownSensor(id))
    }

    fn door_position(&self, id: DoorId) -> Result<usize, HabitatError> {
        self.doors
            .iter()
            .position(|d| d.id() == id)
            .ok_or(HabitatError::UnknownDoor(id))
    }
}
