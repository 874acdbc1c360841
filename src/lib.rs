//! # parcel-dispatch
//!
//! Depot delivery planning library: capacity-constrained load building,
//! route optimization, and a discrete-event simulation of the delivery day.
//!
//! ## Modules
//!
//! - [`models`] — Domain model types (Location, Delivery, DeliveryGroup, Vehicle)
//! - [`distance`] — Symmetric point-to-point distance tables
//! - [`optimizer`] — Route strategies (exact, nearest-neighbor, coproximity) and selection
//! - [`loading`] — Pickup prioritization and greedy load building
//! - [`sim`] — Logical clock and scheduled events
//! - [`feed`] — Feed record types and destination resolution
//! - [`dispatch`] — Orchestration context and the event loop

pub mod dispatch;
pub mod distance;
pub mod feed;
pub mod loading;
pub mod models;
pub mod optimizer;
pub mod sim;
