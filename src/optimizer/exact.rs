//! Exhaustive permutation search.
//!
//! Enumerates every visiting order of the stop set and keeps the global
//! minimum round trip. O(n!); only viable below
//! [`EXACT_CUTOFF`](crate::optimizer::EXACT_CUTOFF) stops.

use crate::distance::DistanceTable;
use crate::models::LocationId;
use crate::optimizer::{prepare_stops, route_length};

/// Finds the shortest depot-to-depot route over the stop set by brute
/// force.
///
/// Stops are sorted ascending before the search and equal-length candidates
/// are resolved by strict comparison, so ties break toward the
/// smallest-id-first permutation deterministically.
pub fn exact<T: DistanceTable>(
    stops: &[LocationId],
    table: &T,
    depot: LocationId,
) -> Vec<LocationId> {
    let remaining = prepare_stops(stops, depot);
    if remaining.is_empty() {
        return vec![depot];
    }
    let (best, _) = best_completion(vec![depot], remaining, table, depot);
    best
}

/// Finds the best completion of a partial path over the remaining stops.
///
/// Every call owns its path and remaining set outright; sibling branches
/// share no mutable state, so the top-level branches can be farmed out to
/// worker threads unchanged if the search ever needs to be parallel.
fn best_completion<T: DistanceTable>(
    path: Vec<LocationId>,
    remaining: Vec<LocationId>,
    table: &T,
    depot: LocationId,
) -> (Vec<LocationId>, f64) {
    if remaining.is_empty() {
        let mut complete = path;
        complete.push(depot);
        let total = route_length(&complete, table, depot).total;
        return (complete, total);
    }

    let mut best_path: Vec<LocationId> = Vec::new();
    let mut best_total = f64::INFINITY;
    for (i, &stop) in remaining.iter().enumerate() {
        let mut child_path = path.clone();
        child_path.push(stop);
        let mut child_remaining = remaining.clone();
        child_remaining.remove(i);

        let (candidate, total) = best_completion(child_path, child_remaining, table, depot);
        if total < best_total {
            best_total = total;
            best_path = candidate;
        }
    }
    (best_path, best_total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::KeyedDistanceTable;

    #[test]
    fn test_single_stop() {
        let mut table = KeyedDistanceTable::new();
        table.set(1, 2, 3.0);
        assert_eq!(exact(&[2], &table, 1), vec![1, 2, 1]);
    }

    #[test]
    fn test_finds_global_minimum() {
        // Square with a shortcut: optimal order is 2, 4, 3.
        let mut table = KeyedDistanceTable::new();
        table.set(1, 2, 1.0);
        table.set(2, 4, 1.0);
        table.set(4, 3, 1.0);
        table.set(3, 1, 1.0);
        table.set(1, 4, 10.0);
        table.set(2, 3, 10.0);

        let route = exact(&[2, 3, 4], &table, 1);
        let total = route_length(&route, &table, 1).total;
        assert!((total - 4.0).abs() < 1e-9);
        assert!(route == vec![1, 2, 4, 3, 1] || route == vec![1, 3, 4, 2, 1]);
    }

    #[test]
    fn test_tie_break_is_smallest_id_first() {
        // All pairwise distances equal: every permutation ties.
        let mut table = KeyedDistanceTable::new();
        for a in 1..=4usize {
            for b in (a + 1)..=4 {
                table.set(a, b, 2.0);
            }
        }
        assert_eq!(exact(&[4, 3, 2], &table, 1), vec![1, 2, 3, 4, 1]);
    }
}
