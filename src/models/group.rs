//! Delivery groups and the authoritative group store.
//!
//! Deliveries bound for the same destination with the same status and
//! deadline move as a unit. The [`GroupStore`] is the single owner of group
//! membership: it keeps the delivery→group map and the bidirectional
//! linked-group graph, so every other component holds only [`GroupId`]s.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use log::warn;

use crate::models::delivery::{Delivery, DeliveryId, DeliveryStatus, StatusError};
use crate::models::location::LocationId;
use crate::sim::SimTime;

/// Index of a group in the [`GroupStore`] arena. Stable for the lifetime of
/// the store; a drained group keeps its slot but becomes invisible to
/// availability queries.
pub type GroupId = usize;

/// The authoritative collection of deliveries for one run, keyed by id.
///
/// Iteration order is ascending by delivery id, which keeps grouping and
/// prioritization deterministic.
#[derive(Debug, Clone, Default)]
pub struct DeliveryStore {
    inner: BTreeMap<DeliveryId, Delivery>,
}

impl DeliveryStore {
    /// Builds a store from a collection of deliveries.
    pub fn new(deliveries: impl IntoIterator<Item = Delivery>) -> Self {
        Self {
            inner: deliveries.into_iter().map(|d| (d.id(), d)).collect(),
        }
    }

    /// Looks up a delivery.
    pub fn get(&self, id: DeliveryId) -> Option<&Delivery> {
        self.inner.get(&id)
    }

    /// Looks up a delivery mutably.
    pub fn get_mut(&mut self, id: DeliveryId) -> Option<&mut Delivery> {
        self.inner.get_mut(&id)
    }

    /// Iterates deliveries in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &Delivery> {
        self.inner.values()
    }

    /// Number of deliveries.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` when the store is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Transitions a delivery's status, appending to its history.
    pub fn update_status(
        &mut self,
        id: DeliveryId,
        status: DeliveryStatus,
        now: SimTime,
    ) -> Result<(), StatusError> {
        match self.inner.get_mut(&id) {
            Some(delivery) => delivery.update_status(status, now),
            None => {
                warn!("status update for unknown delivery {id} ignored");
                Ok(())
            }
        }
    }
}

/// A cluster of deliveries sharing destination, grouping status, and
/// deadline.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryGroup {
    id: GroupId,
    destination: LocationId,
    deadline: SimTime,
    members: Vec<DeliveryId>,
}

impl DeliveryGroup {
    /// Group identifier.
    pub fn id(&self) -> GroupId {
        self.id
    }

    /// Destination shared by all members.
    pub fn destination(&self) -> LocationId {
        self.destination
    }

    /// Deadline shared by all members.
    pub fn deadline(&self) -> SimTime {
        self.deadline
    }

    /// Member delivery ids.
    pub fn members(&self) -> &[DeliveryId] {
        &self.members
    }

    /// Number of deliveries in this group.
    pub fn count(&self) -> usize {
        self.members.len()
    }

    /// Returns `true` when the group has been drained by regrouping.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Current status of the group (all members share one; the first member
    /// is authoritative). `None` for a drained group.
    pub fn status(&self, deliveries: &DeliveryStore) -> Option<DeliveryStatus> {
        self.members
            .first()
            .and_then(|id| deliveries.get(*id))
            .map(Delivery::status)
    }
}

/// Arena of delivery groups plus the delivery→group registry and the
/// linked-group graph.
///
/// # Examples
///
/// ```
/// use parcel_dispatch::models::{Delivery, DeliveryStore, GroupStore};
/// use parcel_dispatch::sim::END_OF_DAY;
///
/// let deliveries = DeliveryStore::new([
///     Delivery::new(1, 5, END_OF_DAY, 1.0, "", 800.0),
///     Delivery::new(2, 5, END_OF_DAY, 1.0, "", 800.0),
///     Delivery::new(3, 7, END_OF_DAY, 1.0, "Must be delivered with 1", 800.0),
/// ]);
/// let groups = GroupStore::build(&deliveries);
/// assert_eq!(groups.len(), 2);
///
/// let g1 = groups.group_of(1).unwrap();
/// let g3 = groups.group_of(3).unwrap();
/// assert_eq!(groups.group_of(2), Some(g1));
/// assert_eq!(groups.linked_closure(g1), vec![g1, g3]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct GroupStore {
    groups: Vec<DeliveryGroup>,
    owner: HashMap<DeliveryId, GroupId>,
    linked: Vec<BTreeSet<GroupId>>,
}

impl GroupStore {
    /// Partitions all deliveries by (destination, status, deadline) and
    /// builds the linkage graph. Deliveries are visited in id order, so
    /// group ids are deterministic.
    pub fn build(deliveries: &DeliveryStore) -> Self {
        let mut store = Self::default();
        let mut by_key: HashMap<(LocationId, DeliveryStatus, u64), GroupId> = HashMap::new();

        for delivery in deliveries.iter() {
            let key = (
                delivery.destination(),
                delivery.status(),
                delivery.deadline().to_bits(),
            );
            let gid = *by_key
                .entry(key)
                .or_insert_with(|| store.push_group(delivery.destination(), delivery.deadline()));
            store.groups[gid].members.push(delivery.id());
            store.owner.insert(delivery.id(), gid);
        }
        store.rebuild_linkage(deliveries);
        store
    }

    fn push_group(&mut self, destination: LocationId, deadline: SimTime) -> GroupId {
        let id = self.groups.len();
        self.groups.push(DeliveryGroup {
            id,
            destination,
            deadline,
            members: Vec::new(),
        });
        self.linked.push(BTreeSet::new());
        id
    }

    /// Recomputes the bidirectional linked-group sets from every member's
    /// linkage list. Links to unknown delivery ids are reported and skipped.
    fn rebuild_linkage(&mut self, deliveries: &DeliveryStore) {
        for set in &mut self.linked {
            set.clear();
        }
        let mut edges: Vec<(GroupId, GroupId)> = Vec::new();
        for group in &self.groups {
            for member in &group.members {
                let Some(delivery) = deliveries.get(*member) else {
                    continue;
                };
                for linked_id in &delivery.constraints().linked_to {
                    match self.owner.get(linked_id) {
                        Some(&other) if other != group.id => edges.push((group.id, other)),
                        Some(_) => {}
                        None => {
                            warn!(
                                "delivery {member} is linked to unknown delivery {linked_id}; \
                                 link ignored"
                            );
                        }
                    }
                }
            }
        }
        for (a, b) in edges {
            self.linked[a].insert(b);
            self.linked[b].insert(a);
        }
    }

    /// Looks up a group.
    pub fn get(&self, id: GroupId) -> Option<&DeliveryGroup> {
        self.groups.get(id)
    }

    /// The group currently owning a delivery.
    pub fn group_of(&self, delivery: DeliveryId) -> Option<GroupId> {
        self.owner.get(&delivery).copied()
    }

    /// Groups directly linked to the given group.
    pub fn linked_to(&self, id: GroupId) -> impl Iterator<Item = GroupId> + '_ {
        self.linked.get(id).into_iter().flatten().copied()
    }

    /// Full linked-group closure of `start`, including `start` itself,
    /// sorted ascending. Worklist traversal; safe on cyclic link graphs.
    pub fn linked_closure(&self, start: GroupId) -> Vec<GroupId> {
        let mut visited: BTreeSet<GroupId> = BTreeSet::new();
        let mut worklist = vec![start];
        while let Some(current) = worklist.pop() {
            if !visited.insert(current) {
                continue;
            }
            worklist.extend(self.linked_to(current));
        }
        visited.into_iter().collect()
    }

    /// Total delivery count across a set of groups.
    pub fn total_count(&self, ids: &[GroupId]) -> usize {
        ids.iter()
            .filter_map(|id| self.get(*id))
            .map(DeliveryGroup::count)
            .sum()
    }

    /// Iterates non-drained groups.
    pub fn live_groups(&self) -> impl Iterator<Item = &DeliveryGroup> {
        self.groups.iter().filter(|g| !g.is_empty())
    }

    /// Number of non-drained groups.
    pub fn len(&self) -> usize {
        self.live_groups().count()
    }

    /// Returns `true` when no live groups remain.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Moves a delivery into the group matching its current (destination,
    /// status, deadline), removing the stale membership first and rebuilding
    /// the linkage graph. Used after an address correction.
    ///
    /// A delivery never has two owners: the old membership is gone before
    /// the new group exists.
    pub fn regroup(&mut self, delivery_id: DeliveryId, deliveries: &DeliveryStore) {
        let Some(delivery) = deliveries.get(delivery_id) else {
            warn!("regroup requested for unknown delivery {delivery_id}");
            return;
        };

        if let Some(old) = self.owner.remove(&delivery_id) {
            self.groups[old].members.retain(|m| *m != delivery_id);
        }

        let target = self.groups.iter().position(|g| {
            !g.is_empty()
                && g.destination == delivery.destination()
                && g.deadline.to_bits() == delivery.deadline().to_bits()
                && g.status(deliveries) == Some(delivery.status())
        });
        let gid = match target {
            Some(gid) => gid,
            None => self.push_group(delivery.destination(), delivery.deadline()),
        };
        self.groups[gid].members.push(delivery_id);
        self.owner.insert(delivery_id, gid);
        self.rebuild_linkage(deliveries);
    }
}
