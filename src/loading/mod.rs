//! Greedy capacity-constrained load building.
//!
//! Partitioned delivery groups (see [`GroupStore`]) are assigned to one
//! vehicle at a time: start from the highest-priority ready group, then keep
//! adding the nearest feasible destination until the vehicle is full,
//! honoring linked-group closures and truck-eligibility restrictions. The
//! finished stop set is handed to the route optimizer.

use log::{debug, info};

use crate::distance::DistanceTable;
use crate::models::{
    DeliveryGroup, DeliveryStatus, DeliveryStore, GroupId, GroupStore, LoadError, LocationId,
    Vehicle,
};
use crate::optimizer::{optimize, route_length};
use crate::sim::{SimTime, END_OF_DAY};

/// The result of one successful `build_load` pass.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadPlan {
    /// Vehicle the plan was built for.
    pub vehicle: usize,
    /// Groups loaded during this pass, in load order.
    pub groups: Vec<GroupId>,
    /// Optimized visiting order, depot to depot.
    pub route: Vec<LocationId>,
    /// Total route distance over known edges.
    pub route_total: f64,
}

/// Outcome of a `build_load` call.
///
/// An exhausted pickup pool is an expected termination signal for the
/// caller, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// A load was planned (possibly partial, possibly empty when every
    /// available group is infeasible for this vehicle).
    Planned(LoadPlan),
    /// No group is ready for pickup anywhere in the pool.
    NothingAvailable,
}

/// Builds loads for vehicles from the shared group pool.
///
/// Holds only the distance table and the depot; all delivery and group data
/// stays in the stores passed per call.
#[derive(Debug, Clone, Copy)]
pub struct LoadBuilder<'a, T: DistanceTable> {
    table: &'a T,
    depot: LocationId,
}

impl<'a, T: DistanceTable> LoadBuilder<'a, T> {
    /// Creates a builder for the given distance table and depot.
    pub fn new(table: &'a T, depot: LocationId) -> Self {
        Self { table, depot }
    }

    /// Ready groups in pickup order: ascending by remaining time to
    /// deadline, minus a distance-scaled bonus for being far from the depot
    /// (earlier effective deadlines and farther groups first).
    pub fn available_prioritized(
        &self,
        groups: &GroupStore,
        deliveries: &DeliveryStore,
        now: SimTime,
    ) -> Vec<GroupId> {
        let mut available: Vec<(GroupId, f64)> = groups
            .live_groups()
            .filter(|g| g.status(deliveries) == Some(DeliveryStatus::ReadyForPickup))
            .map(|g| {
                let bonus = self
                    .table
                    .lookup(self.depot, g.destination())
                    .unwrap_or(0.0)
                    / 100.0;
                (g.id(), (g.deadline() - now) - bonus)
            })
            .collect();
        available.sort_by(|a, b| a.1.total_cmp(&b.1));
        available.into_iter().map(|(id, _)| id).collect()
    }

    /// The group that should be picked up next, or `None` when the pool is
    /// exhausted.
    pub fn next_pickup_priority(
        &self,
        groups: &GroupStore,
        deliveries: &DeliveryStore,
        now: SimTime,
    ) -> Option<GroupId> {
        self.available_prioritized(groups, deliveries, now)
            .into_iter()
            .next()
    }

    /// Fills a vehicle up to `limit` (capped at its capacity) and installs
    /// the optimized route for the resulting stop set.
    ///
    /// Groups whose deadline falls before end-of-day are loaded first,
    /// earliest deadline outright; otherwise the nearest unvisited and
    /// unskipped destination to the last-loaded one wins. A chosen group
    /// brings its whole linked closure or nothing: if the closure does not
    /// fit the remaining capacity, or any member delivery is barred from
    /// this vehicle, the destination goes on the skip list and the pass
    /// moves on. The skip list guarantees forward progress; a partial load
    /// is a valid result.
    pub fn build_load(
        &self,
        vehicle: &mut Vehicle,
        groups: &GroupStore,
        deliveries: &mut DeliveryStore,
        now: SimTime,
        limit: Option<usize>,
    ) -> Result<LoadOutcome, LoadError> {
        let Some(start) = self.next_pickup_priority(groups, deliveries, now) else {
            info!("no deliveries available for pickup");
            return Ok(LoadOutcome::NothingAvailable);
        };

        let max_size = limit
            .unwrap_or(vehicle.capacity())
            .min(vehicle.capacity());
        let mut skip: Vec<LocationId> = Vec::new();
        let mut loaded: Vec<GroupId> = Vec::new();
        let mut last_dest = groups
            .get(start)
            .map(DeliveryGroup::destination)
            .unwrap_or(self.depot);

        while vehicle.delivery_count(groups) < max_size {
            let available = self.available_prioritized(groups, deliveries, now);
            let Some(chosen) =
                self.choose_next(vehicle, groups, &available, &skip, last_dest, start)
            else {
                debug!(
                    "no feasible candidate remains for vehicle {}; stopping with {} aboard",
                    vehicle.id(),
                    vehicle.delivery_count(groups)
                );
                break;
            };

            let closure = groups.linked_closure(chosen);
            let closure_count = groups.total_count(&closure);
            let dest = groups
                .get(chosen)
                .map(DeliveryGroup::destination)
                .unwrap_or(last_dest);
            if closure.len() > 1 {
                debug!(
                    "attempting linked closure of {} groups ({closure_count} deliveries)",
                    closure.len()
                );
            }

            let fits = vehicle.delivery_count(groups) + closure_count <= vehicle.capacity();
            let eligible = closure.iter().all(|gid| {
                groups.get(*gid).is_some_and(|g| {
                    g.members().iter().all(|member| {
                        deliveries
                            .get(*member)
                            .is_some_and(|d| d.eligible_for(vehicle.id()))
                    })
                })
            });
            // A closure loads whole or not at all, so every group must be
            // pickable now; a delayed linked partner defers the lot.
            let ready = closure.iter().all(|gid| {
                vehicle.aboard().contains(gid)
                    || groups
                        .get(*gid)
                        .is_some_and(|g| g.status(deliveries) == Some(DeliveryStatus::ReadyForPickup))
            });

            if fits && eligible && ready {
                for gid in closure {
                    if !vehicle.aboard().contains(&gid) {
                        vehicle.load_group(gid, now, groups, deliveries)?;
                        loaded.push(gid);
                    }
                    if let Some(group) = groups.get(gid) {
                        skip.push(group.destination());
                    }
                }
                last_dest = dest;
            } else {
                debug!(
                    "skipping destination {dest} for vehicle {}: fits={fits} \
                     eligible={eligible} ready={ready}",
                    vehicle.id()
                );
                skip.push(dest);
            }
        }

        let stops = vehicle.stop_set(groups);
        let route = optimize(&stops, self.table, self.depot);
        let route_total = route_length(&route, self.table, self.depot).total;
        vehicle.set_route(route.clone());
        info!(
            "vehicle {} loaded with {} groups, {} stops, route total {route_total:.2}",
            vehicle.id(),
            loaded.len(),
            stops.len()
        );
        Ok(LoadOutcome::Planned(LoadPlan {
            vehicle: vehicle.id(),
            groups: loaded,
            route,
            route_total,
        }))
    }

    /// Picks the next candidate group, or `None` when nothing feasible
    /// remains.
    ///
    /// Deadline-constrained groups (due before end-of-day) win outright,
    /// earliest first, first-found on ties. Otherwise the nearest
    /// unvisited-and-unskipped destination to `last_dest` is chosen; on the
    /// very first pick the starting group stands in for "nearest".
    fn choose_next(
        &self,
        vehicle: &Vehicle,
        groups: &GroupStore,
        available: &[GroupId],
        skip: &[LocationId],
        last_dest: LocationId,
        start: GroupId,
    ) -> Option<GroupId> {
        let on_route = vehicle.stop_set(groups);
        let open: Vec<&DeliveryGroup> = available
            .iter()
            .filter_map(|gid| groups.get(*gid))
            .filter(|g| !on_route.contains(&g.destination()) && !skip.contains(&g.destination()))
            .collect();

        // Priority override: any deadline before end-of-day beats proximity.
        let mut priority: Vec<&&DeliveryGroup> =
            open.iter().filter(|g| g.deadline() < END_OF_DAY).collect();
        priority.sort_by(|a, b| a.deadline().total_cmp(&b.deadline()));
        if let Some(first) = priority.first() {
            return Some(first.id());
        }

        if vehicle.delivery_count(groups) == 0 {
            let start_dest = groups.get(start).map(DeliveryGroup::destination)?;
            if let Some(group) = open.iter().find(|g| g.destination() == start_dest) {
                return Some(group.id());
            }
        }

        let candidates: Vec<LocationId> = open.iter().map(|g| g.destination()).collect();
        let nearest = self.table.nearest_of_set(last_dest, &candidates)?;
        open.iter()
            .find(|g| g.destination() == nearest)
            .map(|g| g.id())
    }
}
