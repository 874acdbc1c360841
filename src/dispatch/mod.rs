//! Orchestration context: stores, fleet, clock, and the event loop.
//!
//! The [`Dispatcher`] owns everything a delivery day needs: the location
//! list and its distance table, the delivery and group stores, the fleet,
//! the group→vehicle registry, and the simulation clock. Callers drive it
//! through three kinds of operations:
//!
//! - loading: [`Dispatcher::load_vehicle`] builds a load, installs the
//!   route, and sends the vehicle out;
//! - inspection: [`Dispatcher::delivery_status`],
//!   [`Dispatcher::all_statuses`], [`Dispatcher::vehicle_carrying`];
//! - corrections: [`Dispatcher::change_destination`] now or
//!   [`Dispatcher::defer_address_change`] at a scheduled checkpoint.
//!
//! [`Dispatcher::run_until_idle`] ticks the clock until no events remain,
//! handling truck arrivals, delayed-cargo arrivals, and checkpoints as they
//! fire.

use std::collections::{BTreeMap, HashMap};

use log::{info, warn};
use serde::Serialize;
use thiserror::Error;

use crate::distance::KeyedDistanceTable;
use crate::loading::{LoadBuilder, LoadOutcome};
use crate::models::{
    Delivery, DeliveryId, DeliveryStatus, DeliveryStore, GroupId, GroupStore, LoadError, Location,
    LocationId, Vehicle, VehicleError, VehicleId, VehicleState,
};
use crate::sim::{EventKind, SimClock, SimEvent, SimTime};

/// A rejected orchestration operation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DispatchError {
    /// The dispatcher needs at least the depot location.
    #[error("no locations were provided; the first location is the depot")]
    NoLocations,
    /// The vehicle id is not part of the fleet.
    #[error("unknown vehicle {vehicle}")]
    UnknownVehicle {
        /// Offending id.
        vehicle: VehicleId,
    },
    /// The delivery id does not exist.
    #[error("unknown delivery {delivery}")]
    UnknownDelivery {
        /// Offending id.
        delivery: DeliveryId,
    },
    /// The corrected address matches no known location.
    #[error("delivery {delivery}: no location matches address {address:?}")]
    UnresolvedAddress {
        /// Affected delivery.
        delivery: DeliveryId,
        /// The address that failed to resolve.
        address: String,
    },
    /// The delivery is aboard a vehicle; its destination cannot change until
    /// it is back at the depot.
    #[error("delivery {delivery} is aboard a vehicle")]
    InFlight {
        /// Affected delivery.
        delivery: DeliveryId,
    },
    /// The delivery has reached a terminal status.
    #[error("delivery {delivery} is already in a terminal status")]
    AlreadyFinal {
        /// Affected delivery.
        delivery: DeliveryId,
    },
    /// A load operation was rejected.
    #[error(transparent)]
    Load(#[from] LoadError),
    /// A drive or unload operation was rejected.
    #[error(transparent)]
    Vehicle(#[from] VehicleError),
    /// A status transition was rejected.
    #[error(transparent)]
    Status(#[from] crate::models::StatusError),
}

/// Point-in-time view of the whole delivery pool, taken at status-check
/// checkpoints.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSnapshot {
    /// Time the snapshot was taken.
    pub time: SimTime,
    /// Status per delivery, ascending by id.
    pub statuses: Vec<(DeliveryId, DeliveryStatus)>,
    /// Fleet-wide distance driven so far.
    pub total_miles: f64,
}

/// An address correction waiting for its checkpoint.
#[derive(Debug, Clone, PartialEq)]
struct AddressChange {
    delivery: DeliveryId,
    address: String,
    zip: String,
    at: SimTime,
}

/// Owns one delivery day end to end.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    locations: Vec<Location>,
    table: KeyedDistanceTable,
    depot: LocationId,
    deliveries: DeliveryStore,
    groups: GroupStore,
    vehicles: BTreeMap<VehicleId, Vehicle>,
    carrier: HashMap<GroupId, VehicleId>,
    clock: SimClock,
    pending_changes: Vec<AddressChange>,
    snapshots: Vec<StatusSnapshot>,
}

impl Dispatcher {
    /// Creates a dispatcher over the given locations and deliveries.
    ///
    /// The first location is the depot. A delayed-cargo event is scheduled
    /// for every delivery whose delay-until time lies ahead of `start`.
    pub fn new(
        locations: Vec<Location>,
        deliveries: Vec<Delivery>,
        start: SimTime,
    ) -> Result<Self, DispatchError> {
        let depot = locations
            .first()
            .map(Location::id)
            .ok_or(DispatchError::NoLocations)?;
        let table = KeyedDistanceTable::from_locations(&locations);
        let deliveries = DeliveryStore::new(deliveries);
        let groups = GroupStore::build(&deliveries);

        let mut clock = SimClock::new(start);
        for delivery in deliveries.iter() {
            if let Some(at) = delivery.constraints().delay_until {
                if at > start {
                    clock.schedule(SimEvent::delayed_cargo(at));
                }
            }
        }

        Ok(Self {
            locations,
            table,
            depot,
            deliveries,
            groups,
            vehicles: BTreeMap::new(),
            carrier: HashMap::new(),
            clock,
            pending_changes: Vec::new(),
            snapshots: Vec::new(),
        })
    }

    /// Adds `count` vehicles (ids starting after the current largest) parked
    /// at the depot with default capacity and speed.
    pub fn add_vehicles(&mut self, count: usize) {
        let next = self.vehicles.keys().max().map_or(1, |id| id + 1);
        for id in next..next + count {
            self.vehicles.insert(id, Vehicle::new(id, self.depot));
        }
    }

    /// Adds a preconfigured vehicle to the fleet.
    pub fn add_vehicle(&mut self, vehicle: Vehicle) {
        self.vehicles.insert(vehicle.id(), vehicle);
    }

    /// Current logical time.
    pub fn now(&self) -> SimTime {
        self.clock.now()
    }

    /// The depot's location id.
    pub fn depot(&self) -> LocationId {
        self.depot
    }

    /// Looks up a vehicle.
    pub fn vehicle(&self, id: VehicleId) -> Option<&Vehicle> {
        self.vehicles.get(&id)
    }

    /// The delivery store.
    pub fn deliveries(&self) -> &DeliveryStore {
        &self.deliveries
    }

    /// The group store.
    pub fn groups(&self) -> &GroupStore {
        &self.groups
    }

    /// Snapshots collected at status-check checkpoints, oldest first.
    pub fn snapshots(&self) -> &[StatusSnapshot] {
        &self.snapshots
    }

    /// Events still pending on the clock.
    pub fn pending_events(&self) -> usize {
        self.clock.pending()
    }

    /// Fleet-wide distance driven so far.
    pub fn total_miles(&self) -> f64 {
        self.vehicles.values().map(Vehicle::miles_driven).sum()
    }

    /// Current status of one delivery.
    pub fn delivery_status(&self, id: DeliveryId) -> Result<DeliveryStatus, DispatchError> {
        self.deliveries
            .get(id)
            .map(Delivery::status)
            .ok_or(DispatchError::UnknownDelivery { delivery: id })
    }

    /// Status of every delivery, ascending by id.
    pub fn all_statuses(&self) -> Vec<(DeliveryId, DeliveryStatus)> {
        self.deliveries
            .iter()
            .map(|d| (d.id(), d.status()))
            .collect()
    }

    /// The vehicle currently carrying a delivery, if any.
    pub fn vehicle_carrying(&self, delivery: DeliveryId) -> Option<VehicleId> {
        self.groups
            .group_of(delivery)
            .and_then(|gid| self.carrier.get(&gid))
            .copied()
    }

    /// Builds a load for the vehicle and, when anything was loaded, sends it
    /// out on its first leg and schedules the arrival.
    pub fn load_vehicle(
        &mut self,
        id: VehicleId,
        limit: Option<usize>,
    ) -> Result<LoadOutcome, DispatchError> {
        let now = self.clock.now();
        let vehicle = self
            .vehicles
            .get_mut(&id)
            .ok_or(DispatchError::UnknownVehicle { vehicle: id })?;

        let builder = LoadBuilder::new(&self.table, self.depot);
        let outcome = builder.build_load(vehicle, &self.groups, &mut self.deliveries, now, limit)?;

        if let LoadOutcome::Planned(plan) = &outcome {
            for gid in &plan.groups {
                self.carrier.insert(*gid, id);
            }
            if !plan.groups.is_empty() {
                if let Some(next) = vehicle.next_stop() {
                    let arrival = vehicle.drive_to(next, now, &self.table, &self.groups)?;
                    self.clock.schedule(SimEvent::truck_arrival(arrival, id));
                }
            }
        }
        Ok(outcome)
    }

    /// Redirects a delivery to a corrected address, regrouping it
    /// atomically. Rejected while the delivery is aboard a vehicle or
    /// already in a terminal status.
    pub fn change_destination(
        &mut self,
        delivery: DeliveryId,
        address: &str,
        zip: &str,
    ) -> Result<LocationId, DispatchError> {
        let current = self
            .deliveries
            .get(delivery)
            .ok_or(DispatchError::UnknownDelivery { delivery })?;
        if current.status() == DeliveryStatus::LoadedOnTruck
            || self.vehicle_carrying(delivery).is_some()
        {
            return Err(DispatchError::InFlight { delivery });
        }
        if current.status().is_terminal() {
            return Err(DispatchError::AlreadyFinal { delivery });
        }
        let destination = self
            .locations
            .iter()
            .find(|l| l.matches_address(address, zip))
            .map(Location::id)
            .ok_or_else(|| DispatchError::UnresolvedAddress {
                delivery,
                address: address.to_string(),
            })?;

        if let Some(d) = self.deliveries.get_mut(delivery) {
            d.set_destination(destination);
        }
        self.groups.regroup(delivery, &self.deliveries);
        info!("delivery {delivery} redirected to location {destination}");
        Ok(destination)
    }

    /// Queues an address correction and schedules the constraint-change
    /// checkpoint that will apply it.
    pub fn defer_address_change(
        &mut self,
        delivery: DeliveryId,
        address: &str,
        zip: &str,
        at: SimTime,
    ) {
        self.pending_changes.push(AddressChange {
            delivery,
            address: address.to_string(),
            zip: zip.to_string(),
            at,
        });
        self.clock.schedule(SimEvent::constraint_change(at));
    }

    /// Schedules a status-check checkpoint at each given time.
    pub fn seed_checkpoints(&mut self, times: &[SimTime]) {
        for &time in times {
            self.clock.schedule(SimEvent::status_check(time));
        }
    }

    /// Advances the clock one tick and handles every event that came due.
    /// Returns the fired events.
    pub fn step(&mut self) -> Result<Vec<SimEvent>, DispatchError> {
        let fired = self.clock.advance();
        for event in &fired {
            let now = self.clock.now();
            match event.kind {
                EventKind::TruckArrival => {
                    if let Some(vehicle) = event.vehicle {
                        self.handle_truck_arrival(vehicle, now)?;
                    }
                }
                EventKind::DelayedCargoArrival => self.handle_delayed_cargo(now)?,
                EventKind::StatusCheck => self.take_snapshot(now),
                EventKind::ConstraintChange => self.apply_due_changes(now),
            }
        }
        Ok(fired)
    }

    /// Runs the event loop until no events remain. Returns the final time.
    pub fn run_until_idle(&mut self) -> Result<SimTime, DispatchError> {
        while !self.clock.is_idle() {
            self.step()?;
        }
        Ok(self.clock.now())
    }

    fn handle_truck_arrival(
        &mut self,
        vehicle_id: VehicleId,
        now: SimTime,
    ) -> Result<(), DispatchError> {
        let vehicle = self
            .vehicles
            .get_mut(&vehicle_id)
            .ok_or(DispatchError::UnknownVehicle { vehicle: vehicle_id })?;
        vehicle.arrive(now);

        match vehicle.state() {
            VehicleState::AtStop(_) => {
                let unloaded = vehicle.unload_here(now, &self.groups, &mut self.deliveries)?;
                for gid in &unloaded {
                    self.carrier.remove(gid);
                }
                if let Some(next) = vehicle.next_stop() {
                    let arrival = vehicle.drive_to(next, now, &self.table, &self.groups)?;
                    self.clock
                        .schedule(SimEvent::truck_arrival(arrival, vehicle_id));
                }
            }
            VehicleState::AtDepot => {
                if !vehicle.aboard().is_empty() {
                    let returned =
                        vehicle.unload_returned(now, &self.groups, &mut self.deliveries)?;
                    for gid in &returned {
                        self.carrier.remove(gid);
                    }
                }
                match self.load_vehicle(vehicle_id, None)? {
                    LoadOutcome::NothingAvailable => {
                        info!("vehicle {vehicle_id} idle at depot; pool exhausted");
                    }
                    LoadOutcome::Planned(_) => {}
                }
            }
            VehicleState::EnRoute(_) => {}
        }
        Ok(())
    }

    /// Promotes delayed deliveries whose cargo has landed and puts idle
    /// vehicles back to work.
    fn handle_delayed_cargo(&mut self, now: SimTime) -> Result<(), DispatchError> {
        let due: Vec<DeliveryId> = self
            .deliveries
            .iter()
            .filter(|d| {
                d.status() == DeliveryStatus::Delayed
                    && d.constraints().delay_until.is_none_or(|t| t <= now)
            })
            .map(Delivery::id)
            .collect();
        if due.is_empty() {
            return Ok(());
        }
        info!("{} delayed deliveries arrived at the depot", due.len());
        for id in due {
            self.deliveries
                .update_status(id, DeliveryStatus::ReadyForPickup, now)?;
            self.groups.regroup(id, &self.deliveries);
        }

        let idle: Vec<VehicleId> = self
            .vehicles
            .iter()
            .filter(|(_, v)| v.state() == VehicleState::AtDepot && v.aboard().is_empty())
            .map(|(id, _)| *id)
            .collect();
        for id in idle {
            self.load_vehicle(id, None)?;
        }
        Ok(())
    }

    fn take_snapshot(&mut self, now: SimTime) {
        let snapshot = StatusSnapshot {
            time: now,
            statuses: self.all_statuses(),
            total_miles: self.total_miles(),
        };
        info!(
            "status check at {now}: {} deliveries, {:.1} driven",
            snapshot.statuses.len(),
            snapshot.total_miles
        );
        self.snapshots.push(snapshot);
    }

    fn apply_due_changes(&mut self, now: SimTime) {
        let (due, rest): (Vec<AddressChange>, Vec<AddressChange>) = self
            .pending_changes
            .drain(..)
            .partition(|change| change.at <= now);
        self.pending_changes = rest;
        for change in due {
            if let Err(err) =
                self.change_destination(change.delivery, &change.address, &change.zip)
            {
                warn!(
                    "deferred address change for delivery {} dropped: {err}",
                    change.delivery
                );
            }
        }
    }
}
