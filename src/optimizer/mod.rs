//! Route optimization strategies and automatic strategy selection.
//!
//! - [`exact`] — exhaustive permutation search, O(n!), optimal
//! - [`nearest_neighbor`] — greedy nearest-unvisited heuristic, O(n²)
//! - [`coproximity`] — "antisocial coproximity" heuristic, O(n³)
//! - [`optimize`] — exact below [`EXACT_CUTOFF`] stops, otherwise the
//!   shorter of the two heuristics (ties favor coproximity)
//!
//! All strategies take a stop set, a [`DistanceTable`], and the depot, and
//! return a visiting order that starts and ends at the depot and contains
//! each distinct input stop exactly once.

mod coproximity;
mod exact;
mod nearest_neighbor;

pub use coproximity::coproximity;
pub use exact::exact;
pub use nearest_neighbor::nearest_neighbor;

use log::{debug, info, warn};

use crate::distance::DistanceTable;
use crate::models::LocationId;

/// Largest stop count the exact search handles in acceptable time
/// (under ~10 s single-threaded, determined experimentally).
pub const EXACT_CUTOFF: usize = 8;

/// Total length of a route, with any unknown-distance edges reported.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteMetrics {
    /// Sum of the known edge distances.
    pub total: f64,
    /// Number of edges with no known distance, skipped from the sum.
    pub gaps: usize,
}

/// Sums a route's edge distances, treating the depot as implicit start and
/// end when the sequence omits it.
///
/// An edge with no known distance is never silently counted as zero: it is
/// skipped, warned about, and tallied in [`RouteMetrics::gaps`].
pub fn route_length<T: DistanceTable>(
    route: &[LocationId],
    table: &T,
    depot: LocationId,
) -> RouteMetrics {
    let mut sequence: Vec<LocationId> = Vec::with_capacity(route.len() + 2);
    if route.first() != Some(&depot) {
        sequence.push(depot);
    }
    sequence.extend_from_slice(route);
    if sequence.last() != Some(&depot) {
        sequence.push(depot);
    }

    let mut metrics = RouteMetrics {
        total: 0.0,
        gaps: 0,
    };
    for pair in sequence.windows(2) {
        let (from, to) = (pair[0], pair[1]);
        if from == to {
            continue;
        }
        match table.lookup(from, to) {
            Some(d) => metrics.total += d,
            None => {
                warn!("no known distance between {from} and {to}; edge skipped in route length");
                metrics.gaps += 1;
            }
        }
    }
    metrics
}

/// Deduplicates a stop set, drops the depot itself, and sorts ascending so
/// every strategy sees the same deterministic input order.
pub(crate) fn prepare_stops(stops: &[LocationId], depot: LocationId) -> Vec<LocationId> {
    let mut unique: Vec<LocationId> = Vec::new();
    for &stop in stops {
        if stop != depot && !unique.contains(&stop) {
            unique.push(stop);
        }
    }
    unique.sort_unstable();
    unique
}

/// Picks a strategy automatically and returns its route.
///
/// Below [`EXACT_CUTOFF`] distinct stops the exact search is affordable and
/// optimal. Above it, both heuristics run and the shorter route wins, with
/// ties going to coproximity.
///
/// # Examples
///
/// ```
/// use parcel_dispatch::distance::{DistanceTable, KeyedDistanceTable};
/// use parcel_dispatch::optimizer::optimize;
///
/// let mut table = KeyedDistanceTable::new();
/// table.set(1, 2, 5.0);
/// table.set(2, 3, 5.0);
/// table.set(1, 3, 12.0);
///
/// let route = optimize(&[2, 3], &table, 1);
/// assert_eq!(route, vec![1, 2, 3, 1]);
/// ```
pub fn optimize<T: DistanceTable>(
    stops: &[LocationId],
    table: &T,
    depot: LocationId,
) -> Vec<LocationId> {
    let unique = prepare_stops(stops, depot);
    if unique.is_empty() {
        return vec![depot];
    }
    if unique.len() < EXACT_CUTOFF {
        debug!("route selection: exact search ({} stops)", unique.len());
        return exact(&unique, table, depot);
    }

    let nn = nearest_neighbor(&unique, table, depot);
    let nn_total = route_length(&nn, table, depot).total;
    let cpm = coproximity(&unique, table, depot);
    let cpm_total = route_length(&cpm, table, depot).total;

    if cpm_total <= nn_total {
        info!(
            "route selection: coproximity at {cpm_total:.2} \
             (nearest-neighbor {nn_total:.2}, {} stops)",
            unique.len()
        );
        cpm
    } else {
        info!(
            "route selection: nearest-neighbor at {nn_total:.2} \
             (coproximity {cpm_total:.2}, {} stops)",
            unique.len()
        );
        nn
    }
}
