//! Identity newtypes for habitat entities.
//!
//! Ids are handed out by the [`Habitat`](crate::habitat::Habitat) registry in
//! monotonic order and are never reused within a session, so a stale id can
//! only ever fail a lookup, never alias a newer entity.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[repr(transparent)]
        pub struct $name(u32);

        impl $name {
            /// Wrap a raw id value
            #[inline]
            #[must_use]
            pub const fn new(value: u32) -> Self {
                Self(value)
            }

            /// Get the raw id value
            #[inline]
            #[must_use]
            pub const fn value(self) -> u32 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

entity_id!(
    /// Identity of a room
    RoomId,
    "R"
);
entity_id!(
    /// Identity of a door
    DoorId,
    "D"
);
entity_id!(
    /// Identity of a sensor
    SensorId,
    "S"
);

/// Monotonic id source owned by the registry
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub(crate) struct IdCounter {
    next: u32,
}

impl IdCounter {
    /// Hand out the next raw id, starting at 1
    pub(crate) fn next_raw(&mut self) -> u32 {
        self.next += 1;
        self.next
    }
}
