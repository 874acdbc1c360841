//! Nearest-neighbor constructive heuristic.
//!
//! Starting at the depot, always visit the closest unvisited stop. O(n²).
//! Solution quality is typically worst of the three strategies but it is
//! the cheapest, making it the baseline the coproximity route is compared
//! against.

use log::warn;

use crate::distance::DistanceTable;
use crate::models::LocationId;
use crate::optimizer::prepare_stops;

/// Builds a depot-to-depot route by repeatedly appending the unvisited stop
/// nearest to the current position.
///
/// A stop with no known distance from the current position is deferred
/// until it is the only choice left; if every remaining stop is unreachable
/// the first (lowest-id) one is taken and the gap is reported.
pub fn nearest_neighbor<T: DistanceTable>(
    stops: &[LocationId],
    table: &T,
    depot: LocationId,
) -> Vec<LocationId> {
    let mut remaining = prepare_stops(stops, depot);
    if remaining.is_empty() {
        return vec![depot];
    }

    let mut route = Vec::with_capacity(remaining.len() + 2);
    route.push(depot);
    let mut current = depot;
    while !remaining.is_empty() {
        let next = match table.nearest_of_set(current, &remaining) {
            Some(next) => next,
            None => {
                warn!(
                    "no known distance from {current} to any of {} remaining stops; \
                     taking {} unrouted",
                    remaining.len(),
                    remaining[0]
                );
                remaining[0]
            }
        };
        remaining.retain(|l| *l != next);
        route.push(next);
        current = next;
    }
    route.push(depot);
    route
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::KeyedDistanceTable;

    #[test]
    fn test_follows_chain_of_nearest_stops() {
        // Stops on a line: 1 - 2 - 3 - 4, so greedy order is 2, 3, 4.
        let mut table = KeyedDistanceTable::new();
        for a in 1..=4usize {
            for b in (a + 1)..=4 {
                table.set(a, b, (b - a) as f64);
            }
        }
        assert_eq!(nearest_neighbor(&[4, 2, 3], &table, 1), vec![1, 2, 3, 4, 1]);
    }

    #[test]
    fn test_greedy_choice_can_be_suboptimal() {
        // Greedy grabs 2 (closest to depot) even though 3-first is shorter
        // overall.
        let mut table = KeyedDistanceTable::new();
        table.set(1, 2, 1.0);
        table.set(1, 3, 2.0);
        table.set(2, 3, 10.0);
        let route = nearest_neighbor(&[2, 3], &table, 1);
        assert_eq!(route, vec![1, 2, 3, 1]);
    }

    #[test]
    fn test_unreachable_stop_still_routed() {
        let mut table = KeyedDistanceTable::new();
        table.set(1, 2, 1.0);
        // 3 has no known distances at all.
        let route = nearest_neighbor(&[2, 3], &table, 1);
        assert_eq!(route.len(), 4);
        assert!(route.contains(&3));
    }

    #[test]
    fn test_empty_stop_set() {
        let table = KeyedDistanceTable::new();
        assert_eq!(nearest_neighbor(&[], &table, 1), vec![1]);
    }
}
