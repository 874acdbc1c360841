//! Vehicle state machine: loading, driving, unloading, and the event log.

use log::info;
use serde::Serialize;
use thiserror::Error;

use crate::distance::DistanceTable;
use crate::models::delivery::{DeliveryStatus, StatusError};
use crate::models::group::{DeliveryGroup, DeliveryStore, GroupId, GroupStore};
use crate::models::location::LocationId;
use crate::sim::SimTime;

/// Identifier of a vehicle.
pub type VehicleId = usize;

/// Default per-vehicle delivery capacity.
pub const DEFAULT_CAPACITY: usize = 16;

/// Default vehicle speed, in distance units per hour.
pub const DEFAULT_SPEED: f64 = 18.0;

/// Where a vehicle is in its driving protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VehicleState {
    /// Parked at the depot; the only state in which loading is allowed.
    AtDepot,
    /// Driving toward a location.
    EnRoute(LocationId),
    /// Stopped at a non-depot location on the route.
    AtStop(LocationId),
}

/// One entry in a vehicle's chronological event log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum VehicleLogEntry {
    /// A delivery group was loaded aboard.
    Loaded {
        /// Group loaded.
        group: GroupId,
        /// Deliveries in the group.
        count: usize,
        /// Time of loading.
        time: SimTime,
    },
    /// A delivery group was taken off.
    Unloaded {
        /// Group unloaded.
        group: GroupId,
        /// Deliveries in the group.
        count: usize,
        /// Time of unloading.
        time: SimTime,
    },
    /// The vehicle traversed one edge of its route.
    Drove {
        /// Leg origin.
        from: LocationId,
        /// Leg destination.
        to: LocationId,
        /// Edge distance.
        distance: f64,
        /// Departure time.
        time: SimTime,
    },
}

/// A rejected loading operation. Recoverable: the caller skips the group and
/// retries with another.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LoadError {
    /// Loading would exceed the vehicle's capacity. The load is unchanged.
    #[error(
        "loading {requested} deliveries would put vehicle {vehicle} at \
         {would_be}/{capacity}"
    )]
    CapacityExceeded {
        /// Affected vehicle.
        vehicle: VehicleId,
        /// Deliveries the rejected load would have added.
        requested: usize,
        /// Aboard count had the load gone through.
        would_be: usize,
        /// Vehicle capacity.
        capacity: usize,
    },
    /// A delivery's eligible-truck list excludes this vehicle.
    #[error("delivery {delivery} may not ride on vehicle {vehicle}")]
    NotEligible {
        /// Offending delivery.
        delivery: usize,
        /// Affected vehicle.
        vehicle: VehicleId,
    },
    /// The group is not ready for pickup; signals an ordering bug upstream.
    #[error("group {group} is {status:?}, not ReadyForPickup")]
    InvalidStatus {
        /// Offending group.
        group: GroupId,
        /// The group's current status.
        status: DeliveryStatus,
    },
    /// Loading is only possible at the depot, before departure.
    #[error("vehicle {vehicle} may only be loaded at the depot")]
    NotAtDepot {
        /// Affected vehicle.
        vehicle: VehicleId,
    },
    /// The group id does not exist in the store.
    #[error("unknown group {group}")]
    UnknownGroup {
        /// Offending id.
        group: GroupId,
    },
    /// A member delivery rejected the status transition.
    #[error(transparent)]
    Status(#[from] StatusError),
}

/// A rejected driving or unloading operation. Recoverable: the orchestration
/// layer pauses for operator intervention.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VehicleError {
    /// The target is not on the vehicle's remaining route.
    #[error("location {location} is not on vehicle {vehicle}'s remaining route")]
    NotOnRoute {
        /// Affected vehicle.
        vehicle: VehicleId,
        /// Requested target.
        location: LocationId,
    },
    /// The vehicle is already at the requested location.
    #[error("vehicle {vehicle} is already at location {location}")]
    AlreadyThere {
        /// Affected vehicle.
        vehicle: VehicleId,
        /// Requested target.
        location: LocationId,
    },
    /// An empty vehicle may only head back to the depot.
    #[error("vehicle {vehicle} is empty and {location} is not the depot")]
    EmptyVehicle {
        /// Affected vehicle.
        vehicle: VehicleId,
        /// Requested target.
        location: LocationId,
    },
    /// No aboard group is destined for the current location.
    #[error("nothing aboard vehicle {vehicle} is destined for location {location}")]
    NothingToUnload {
        /// Affected vehicle.
        vehicle: VehicleId,
        /// Current location.
        location: LocationId,
    },
    /// The distance table has no entry for the traversed edge.
    #[error("no known distance between locations {from} and {to}")]
    MissingDistance {
        /// Leg origin.
        from: LocationId,
        /// Leg destination.
        to: LocationId,
    },
    /// A member delivery rejected the status transition.
    #[error(transparent)]
    Status(#[from] StatusError),
}

/// A capacity-constrained delivery vehicle.
///
/// Owns the groups currently aboard (by id), the planned visiting order, and
/// a chronological load/unload/drive log. All group and delivery data lives
/// in the stores; the vehicle holds only identifiers.
#[derive(Debug, Clone)]
pub struct Vehicle {
    id: VehicleId,
    capacity: usize,
    speed: f64,
    depot: LocationId,
    location: LocationId,
    state: VehicleState,
    aboard: Vec<GroupId>,
    route: Vec<LocationId>,
    next_leg: usize,
    log: Vec<VehicleLogEntry>,
}

impl Vehicle {
    /// Creates a vehicle parked at the depot with default capacity and speed.
    pub fn new(id: VehicleId, depot: LocationId) -> Self {
        Self {
            id,
            capacity: DEFAULT_CAPACITY,
            speed: DEFAULT_SPEED,
            depot,
            location: depot,
            state: VehicleState::AtDepot,
            aboard: Vec::new(),
            route: Vec::new(),
            next_leg: 0,
            log: Vec::new(),
        }
    }

    /// Sets the delivery capacity.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the speed in distance units per hour.
    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    /// Vehicle identifier.
    pub fn id(&self) -> VehicleId {
        self.id
    }

    /// Maximum number of deliveries aboard.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Speed in distance units per hour.
    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Current location.
    pub fn location(&self) -> LocationId {
        self.location
    }

    /// Current protocol state.
    pub fn state(&self) -> VehicleState {
        self.state
    }

    /// Groups currently aboard.
    pub fn aboard(&self) -> &[GroupId] {
        &self.aboard
    }

    /// The full planned route, depot to depot.
    pub fn route(&self) -> &[LocationId] {
        &self.route
    }

    /// The not-yet-driven tail of the route.
    pub fn remaining_route(&self) -> &[LocationId] {
        self.route.get(self.next_leg..).unwrap_or(&[])
    }

    /// Next planned stop, if the route is not exhausted.
    pub fn next_stop(&self) -> Option<LocationId> {
        self.remaining_route().first().copied()
    }

    /// Chronological event log.
    pub fn log(&self) -> &[VehicleLogEntry] {
        &self.log
    }

    /// Total deliveries aboard.
    pub fn delivery_count(&self, groups: &GroupStore) -> usize {
        groups.total_count(&self.aboard)
    }

    /// Deduplicated destinations of the groups aboard, in load order.
    pub fn stop_set(&self, groups: &GroupStore) -> Vec<LocationId> {
        let mut stops = Vec::new();
        for gid in &self.aboard {
            if let Some(dest) = groups.get(*gid).map(DeliveryGroup::destination) {
                if !stops.contains(&dest) {
                    stops.push(dest);
                }
            }
        }
        stops
    }

    /// Total distance driven so far.
    pub fn miles_driven(&self) -> f64 {
        self.log
            .iter()
            .map(|entry| match entry {
                VehicleLogEntry::Drove { distance, .. } => *distance,
                _ => 0.0,
            })
            .sum()
    }

    /// Terminal condition: back at the depot with the route exhausted and
    /// nothing aboard.
    pub fn is_done(&self) -> bool {
        self.state == VehicleState::AtDepot
            && self.aboard.is_empty()
            && self.next_leg >= self.route.len()
    }

    /// Loads a delivery group. Only valid at the depot, for groups that are
    /// `ReadyForPickup`, whose members all allow this vehicle, and that fit
    /// the remaining capacity. On success every member delivery becomes
    /// `LoadedOnTruck` and the load is logged; on failure the vehicle is
    /// unchanged.
    pub fn load_group(
        &mut self,
        gid: GroupId,
        now: SimTime,
        groups: &GroupStore,
        deliveries: &mut DeliveryStore,
    ) -> Result<(), LoadError> {
        if self.state != VehicleState::AtDepot {
            return Err(LoadError::NotAtDepot { vehicle: self.id });
        }
        let group = groups.get(gid).ok_or(LoadError::UnknownGroup { group: gid })?;
        match group.status(deliveries) {
            Some(DeliveryStatus::ReadyForPickup) => {}
            status => {
                return Err(LoadError::InvalidStatus {
                    group: gid,
                    status: status.unwrap_or(DeliveryStatus::Initialized),
                })
            }
        }
        for member in group.members() {
            if let Some(delivery) = deliveries.get(*member) {
                if !delivery.eligible_for(self.id) {
                    return Err(LoadError::NotEligible {
                        delivery: *member,
                        vehicle: self.id,
                    });
                }
            }
        }
        let would_be = self.delivery_count(groups) + group.count();
        if would_be > self.capacity {
            return Err(LoadError::CapacityExceeded {
                vehicle: self.id,
                requested: group.count(),
                would_be,
                capacity: self.capacity,
            });
        }
        for member in group.members() {
            deliveries.update_status(*member, DeliveryStatus::LoadedOnTruck, now)?;
        }
        self.aboard.push(gid);
        self.log.push(VehicleLogEntry::Loaded {
            group: gid,
            count: group.count(),
            time: now,
        });
        info!(
            "loaded group {gid} ({} deliveries) onto vehicle {}; {}/{} aboard",
            group.count(),
            self.id,
            would_be,
            self.capacity
        );
        Ok(())
    }

    /// Installs a freshly optimized route. The leading depot entry, when
    /// present, counts as already visited.
    pub fn set_route(&mut self, route: Vec<LocationId>) {
        self.next_leg = usize::from(route.first() == Some(&self.location));
        self.route = route;
    }

    /// Drives toward `target`, which must be on the remaining route. Looks
    /// up the edge distance, logs the leg, updates the current location, and
    /// returns the arrival time (`now + distance / speed × 100`) for the
    /// caller to schedule.
    ///
    /// An empty vehicle may only drive back to the depot.
    pub fn drive_to<T: DistanceTable>(
        &mut self,
        target: LocationId,
        now: SimTime,
        table: &T,
        groups: &GroupStore,
    ) -> Result<SimTime, VehicleError> {
        if target == self.location {
            return Err(VehicleError::AlreadyThere {
                vehicle: self.id,
                location: target,
            });
        }
        let Some(offset) = self.remaining_route().iter().position(|l| *l == target) else {
            return Err(VehicleError::NotOnRoute {
                vehicle: self.id,
                location: target,
            });
        };
        if self.delivery_count(groups) == 0 && target != self.depot {
            return Err(VehicleError::EmptyVehicle {
                vehicle: self.id,
                location: target,
            });
        }
        let distance =
            table
                .lookup(self.location, target)
                .ok_or(VehicleError::MissingDistance {
                    from: self.location,
                    to: target,
                })?;
        self.log.push(VehicleLogEntry::Drove {
            from: self.location,
            to: target,
            distance,
            time: now,
        });
        info!(
            "vehicle {} departs {} for {} ({distance:.1} away)",
            self.id, self.location, target
        );
        self.location = target;
        self.state = VehicleState::EnRoute(target);
        self.next_leg += offset + 1;
        Ok(now + distance / self.speed * 100.0)
    }

    /// Completes the current leg when the truck-arrival event fires.
    pub fn arrive(&mut self, _now: SimTime) {
        if let VehicleState::EnRoute(target) = self.state {
            self.state = if target == self.depot {
                VehicleState::AtDepot
            } else {
                VehicleState::AtStop(target)
            };
        }
    }

    /// Unloads every aboard group destined for the current location, marking
    /// the members `Delivered`. Returns the unloaded group ids.
    pub fn unload_here(
        &mut self,
        now: SimTime,
        groups: &GroupStore,
        deliveries: &mut DeliveryStore,
    ) -> Result<Vec<GroupId>, VehicleError> {
        let location = self.location;
        self.unload_matching(now, groups, deliveries, location, DeliveryStatus::Delivered)
    }

    /// Unloads everything still aboard as `ReturnToHub`. Used when the
    /// vehicle is recalled to the depot with undeliverable cargo.
    pub fn unload_returned(
        &mut self,
        now: SimTime,
        groups: &GroupStore,
        deliveries: &mut DeliveryStore,
    ) -> Result<Vec<GroupId>, VehicleError> {
        let unloaded = self.aboard.clone();
        if unloaded.is_empty() {
            return Err(VehicleError::NothingToUnload {
                vehicle: self.id,
                location: self.location,
            });
        }
        for gid in &unloaded {
            self.record_unload(*gid, now, groups, deliveries, DeliveryStatus::ReturnToHub)?;
        }
        self.aboard.clear();
        Ok(unloaded)
    }

    fn unload_matching(
        &mut self,
        now: SimTime,
        groups: &GroupStore,
        deliveries: &mut DeliveryStore,
        location: LocationId,
        status: DeliveryStatus,
    ) -> Result<Vec<GroupId>, VehicleError> {
        let here: Vec<GroupId> = self
            .aboard
            .iter()
            .copied()
            .filter(|gid| groups.get(*gid).map(DeliveryGroup::destination) == Some(location))
            .collect();
        if here.is_empty() {
            return Err(VehicleError::NothingToUnload {
                vehicle: self.id,
                location,
            });
        }
        for gid in &here {
            self.record_unload(*gid, now, groups, deliveries, status)?;
        }
        self.aboard.retain(|gid| !here.contains(gid));
        Ok(here)
    }

    fn record_unload(
        &mut self,
        gid: GroupId,
        now: SimTime,
        groups: &GroupStore,
        deliveries: &mut DeliveryStore,
        status: DeliveryStatus,
    ) -> Result<(), VehicleError> {
        let count = groups.get(gid).map_or(0, DeliveryGroup::count);
        if let Some(group) = groups.get(gid) {
            for member in group.members() {
                deliveries.update_status(*member, status, now)?;
            }
        }
        self.log.push(VehicleLogEntry::Unloaded {
            group: gid,
            count,
            time: now,
        });
        info!(
            "unloaded group {gid} ({count} deliveries) from vehicle {}",
            self.id
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::KeyedDistanceTable;
    use crate::models::delivery::Delivery;
    use crate::sim::END_OF_DAY;

    const DEPOT: LocationId = 1;

    fn fixtures() -> (DeliveryStore, GroupStore, KeyedDistanceTable) {
        let mut deliveries = DeliveryStore::new([
            Delivery::new(1, 5, END_OF_DAY, 1.0, "", 800.0),
            Delivery::new(2, 5, END_OF_DAY, 1.0, "", 800.0),
            Delivery::new(3, 7, END_OF_DAY, 1.0, "", 800.0),
        ]);
        for id in 1..=3 {
            deliveries
                .update_status(id, DeliveryStatus::ReadyForPickup, 800.0)
                .unwrap();
        }
        let groups = GroupStore::build(&deliveries);
        let mut table = KeyedDistanceTable::new();
        table.set(DEPOT, 5, 4.0);
        table.set(DEPOT, 7, 6.0);
        table.set(5, 7, 3.0);
        (deliveries, groups, table)
    }

    #[test]
    fn test_load_only_at_depot() {
        let (mut deliveries, groups, table) = fixtures();
        let mut vehicle = Vehicle::new(1, DEPOT);
        let g5 = groups.group_of(1).unwrap();
        let g7 = groups.group_of(3).unwrap();
        vehicle
            .load_group(g5, 800.0, &groups, &mut deliveries)
            .unwrap();
        vehicle.set_route(vec![DEPOT, 5, DEPOT]);
        vehicle.drive_to(5, 805.0, &table, &groups).unwrap();

        let err = vehicle
            .load_group(g7, 810.0, &groups, &mut deliveries)
            .unwrap_err();
        assert!(matches!(err, LoadError::NotAtDepot { .. }));
    }

    #[test]
    fn test_capacity_violation_leaves_load_unchanged() {
        let (mut deliveries, groups, _) = fixtures();
        let mut vehicle = Vehicle::new(1, DEPOT).with_capacity(1);
        let g5 = groups.group_of(1).unwrap(); // two deliveries
        let err = vehicle
            .load_group(g5, 800.0, &groups, &mut deliveries)
            .unwrap_err();
        assert!(matches!(err, LoadError::CapacityExceeded { .. }));
        assert!(vehicle.aboard().is_empty());
        assert_eq!(
            deliveries.get(1).unwrap().status(),
            DeliveryStatus::ReadyForPickup
        );
    }

    #[test]
    fn test_load_rejects_ineligible_delivery() {
        let mut deliveries = DeliveryStore::new([Delivery::new(
            4,
            9,
            END_OF_DAY,
            1.0,
            "Can only be on truck 2",
            800.0,
        )]);
        deliveries
            .update_status(4, DeliveryStatus::ReadyForPickup, 800.0)
            .unwrap();
        let groups = GroupStore::build(&deliveries);
        let g9 = groups.group_of(4).unwrap();

        let mut vehicle = Vehicle::new(1, DEPOT);
        let err = vehicle
            .load_group(g9, 800.0, &groups, &mut deliveries)
            .unwrap_err();
        assert!(matches!(
            err,
            LoadError::NotEligible {
                delivery: 4,
                vehicle: 1
            }
        ));
        assert!(vehicle.aboard().is_empty());
        assert_eq!(
            deliveries.get(4).unwrap().status(),
            DeliveryStatus::ReadyForPickup
        );

        let mut allowed = Vehicle::new(2, DEPOT);
        allowed
            .load_group(g9, 800.0, &groups, &mut deliveries)
            .unwrap();
        assert_eq!(
            deliveries.get(4).unwrap().status(),
            DeliveryStatus::LoadedOnTruck
        );
    }

    #[test]
    fn test_load_rejects_non_ready_group() {
        let (mut deliveries, groups, _) = fixtures();
        deliveries
            .update_status(3, DeliveryStatus::Delayed, 800.0)
            .unwrap();
        let g7 = groups.group_of(3).unwrap();
        let mut vehicle = Vehicle::new(1, DEPOT);
        let err = vehicle
            .load_group(g7, 800.0, &groups, &mut deliveries)
            .unwrap_err();
        assert!(matches!(err, LoadError::InvalidStatus { .. }));
    }

    #[test]
    fn test_drive_rejects_unlisted_current_and_empty_targets() {
        let (mut deliveries, groups, table) = fixtures();
        let mut vehicle = Vehicle::new(1, DEPOT);

        // Empty vehicle may not head anywhere but the depot.
        vehicle.set_route(vec![DEPOT, 5, DEPOT]);
        let err = vehicle.drive_to(5, 800.0, &table, &groups).unwrap_err();
        assert!(matches!(err, VehicleError::EmptyVehicle { .. }));

        let g5 = groups.group_of(1).unwrap();
        vehicle
            .load_group(g5, 800.0, &groups, &mut deliveries)
            .unwrap();

        let err = vehicle.drive_to(7, 800.0, &table, &groups).unwrap_err();
        assert!(matches!(err, VehicleError::NotOnRoute { .. }));

        let err = vehicle.drive_to(DEPOT, 800.0, &table, &groups).unwrap_err();
        assert!(matches!(err, VehicleError::AlreadyThere { .. }));
    }

    #[test]
    fn test_drive_logs_and_returns_arrival_time() {
        let (mut deliveries, groups, table) = fixtures();
        let mut vehicle = Vehicle::new(1, DEPOT).with_speed(18.0);
        let g5 = groups.group_of(1).unwrap();
        vehicle
            .load_group(g5, 800.0, &groups, &mut deliveries)
            .unwrap();
        vehicle.set_route(vec![DEPOT, 5, DEPOT]);

        let arrival = vehicle.drive_to(5, 800.0, &table, &groups).unwrap();
        // 4.0 distance at 18/h scaled by 100.
        assert!((arrival - (800.0 + 4.0 / 18.0 * 100.0)).abs() < 1e-9);
        assert_eq!(vehicle.location(), 5);
        assert_eq!(vehicle.state(), VehicleState::EnRoute(5));
        assert!((vehicle.miles_driven() - 4.0).abs() < 1e-9);

        vehicle.arrive(arrival);
        assert_eq!(vehicle.state(), VehicleState::AtStop(5));
    }

    #[test]
    fn test_unload_here_delivers_matching_groups() {
        let (mut deliveries, groups, table) = fixtures();
        let mut vehicle = Vehicle::new(1, DEPOT);
        let g5 = groups.group_of(1).unwrap();
        vehicle
            .load_group(g5, 800.0, &groups, &mut deliveries)
            .unwrap();
        vehicle.set_route(vec![DEPOT, 5, DEPOT]);
        let arrival = vehicle.drive_to(5, 805.0, &table, &groups).unwrap();
        vehicle.arrive(arrival);

        let unloaded = vehicle
            .unload_here(arrival, &groups, &mut deliveries)
            .unwrap();
        assert_eq!(unloaded, vec![g5]);
        assert!(vehicle.aboard().is_empty());
        assert_eq!(
            deliveries.get(1).unwrap().status(),
            DeliveryStatus::Delivered
        );
        assert_eq!(
            deliveries.get(2).unwrap().status(),
            DeliveryStatus::Delivered
        );

        let err = vehicle
            .unload_here(arrival, &groups, &mut deliveries)
            .unwrap_err();
        assert!(matches!(err, VehicleError::NothingToUnload { .. }));
    }

    #[test]
    fn test_done_after_returning_empty_to_depot() {
        let (mut deliveries, groups, table) = fixtures();
        let mut vehicle = Vehicle::new(1, DEPOT);
        let g5 = groups.group_of(1).unwrap();
        vehicle
            .load_group(g5, 800.0, &groups, &mut deliveries)
            .unwrap();
        vehicle.set_route(vec![DEPOT, 5, DEPOT]);

        let t1 = vehicle.drive_to(5, 800.0, &table, &groups).unwrap();
        vehicle.arrive(t1);
        vehicle.unload_here(t1, &groups, &mut deliveries).unwrap();
        let t2 = vehicle.drive_to(DEPOT, t1, &table, &groups).unwrap();
        vehicle.arrive(t2);
        assert!(vehicle.is_done());
    }
}
