//! Doors between rooms, or between a room and the exterior
//!
//! A closed door is never a perfect seal: it keeps exchanging gas at a small
//! leak rate, so `flow_rate` is always strictly positive.

use crate::core_types::{DoorId, RoomId};
use serde::{Deserialize, Serialize};

/// Exchange rate through an open door, fraction of the level difference per hour
pub const DOOR_OPEN_FLOW_RATE: f64 = 0.2;

/// Exchange rate through a closed door, fraction per hour
pub const DOOR_CLOSED_LEAK_RATE: f64 = 0.01;

/// Lowest leak rate a closed door may be configured with
pub const MIN_DOOR_LEAK_RATE: f64 = 1e-4;

/// Far side of a door
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DoorEndpoint {
    /// Another room
    Room(RoomId),
    /// The exterior atmosphere (infinite reservoir)
    Ambient,
}

/// A door connecting room `a` to endpoint `b`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Door {
    id: DoorId,
    a: RoomId,
    b: DoorEndpoint,
    /// Whether the door is open
    pub is_open: bool,
    open_flow_rate: f64,
    closed_leak_rate: f64,
}

impl Door {
    pub(crate) fn new(id: DoorId, a: RoomId, b: DoorEndpoint, is_open: bool) -> Self {
        Self {
            id,
            a,
            b,
            is_open,
            open_flow_rate: DOOR_OPEN_FLOW_RATE,
            closed_leak_rate: DOOR_CLOSED_LEAK_RATE,
        }
    }

    /// Door identity
    pub fn id(&self) -> DoorId {
        self.id
    }

    /// Room on the near side
    pub fn room_a(&self) -> RoomId {
        self.a
    }

    /// Far side endpoint
    pub fn endpoint_b(&self) -> DoorEndpoint {
        self.b
    }

    /// Effective exchange rate per hour for the current open state
    pub fn flow_rate(&self) -> f64 {
        if self.is_open {
            self.open_flow_rate
        } else {
            self.closed_leak_rate
        }
    }

    /// Flip the open state
    pub fn toggle(&mut self) {
        self.is_open = !self.is_open;
    }

    /// Override both exchange rates
    ///
    /// The leak rate is floored at [`MIN_DOOR_LEAK_RATE`] and the open rate
    /// can never fall below the leak rate.
    pub fn set_flow_rates(&mut self, open_flow_rate: f64, closed_leak_rate: f64) {
        let leak = if closed_leak_rate.is_finite() {
            closed_leak_rate.max(MIN_DOOR_LEAK_RATE)
        } else {
            DOOR_CLOSED_LEAK_RATE
        };
        let open = if open_flow_rate.is_finite() {
            open_flow_rate.max(leak)
        } else {
            DOOR_OPEN_FLOW_RATE.max(leak)
        };
        self.open_flow_rate = open;
        self.closed_leak_rate = leak;
    }

    /// Whether either side is this room
    pub fn references(&self, room: RoomId) -> bool {
        self.a == room || self.b == DoorEndpoint::Room(room)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn door(open: bool) -> Door {
        Door::new(
            DoorId::new(1),
            RoomId::new(1),
            DoorEndpoint::Room(RoomId::new(2)),
            open,
        )
    }

    #[test]
    fn test_open_door_flows_faster_than_closed() {
        let open = door(true);
        let closed = door(false);
        assert_eq!(open.flow_rate(), DOOR_OPEN_FLOW_RATE);
        assert_eq!(closed.flow_rate(), DOOR_CLOSED_LEAK_RATE);
        assert!(closed.flow_rate() > 0.0);
    }

    #[test]
    fn test_toggle() {
        let mut d = door(true);
        d.toggle();
        assert!(!d.is_open);
        d.toggle();
        assert!(d.is_open);
    }

    #[test]
    fn test_closed_door_never_fully_sealed() {
        let mut d = door(false);
        d.set_flow_rates(0.3, 0.0);
        assert_eq!(d.flow_rate(), MIN_DOOR_LEAK_RATE);
        d.is_open = true;
        assert_eq!(d.flow_rate(), 0.3);
    }

    #[test]
    fn test_references() {
        let d = door(true);
        assert!(d.references(RoomId::new(1)));
        assert!(d.references(RoomId::new(2)));
        assert!(!d.references(RoomId::new(3)));

        let exterior = Door::new(DoorId::new(2), RoomId::new(5), DoorEndpoint::Ambient, false);
        assert!(exterior.references(RoomId::new(5)));
        assert!(!exterior.references(RoomId::new(1)));
    }
}
