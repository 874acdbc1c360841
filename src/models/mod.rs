//! Domain model types for depot dispatch.
//!
//! Provides the core abstractions: locations with sparse distance maps,
//! deliveries with a status lifecycle and parsed constraints, delivery
//! groups moved as loading units, and vehicles with a driving state machine.

mod delivery;
mod group;
mod location;
mod vehicle;

pub use delivery::{
    parse_constraint_notes, Delivery, DeliveryConstraints, DeliveryId, DeliveryStatus, StatusError,
    StatusLogEntry,
};
pub use group::{DeliveryGroup, DeliveryStore, GroupId, GroupStore};
pub use location::{synthetic_locations, Location, LocationId};
pub use vehicle::{
    LoadError, Vehicle, VehicleError, VehicleId, VehicleLogEntry, VehicleState, DEFAULT_CAPACITY,
    DEFAULT_SPEED,
};

pub(crate) use delivery::parse_clock_time;
