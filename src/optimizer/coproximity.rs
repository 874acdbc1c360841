//! Antisocial coproximity heuristic.
//!
//! Scores each candidate stop by how close it is to the current position
//! relative to how far it sits from everything else still unrouted:
//!
//! ```text
//! score = mean distance from candidate to other remaining stops
//!         ----------------------------------------------------
//!            distance from current position to candidate
//! ```
//!
//! Preferring near-to-me-but-far-from-the-rest stops keeps outliers from
//! being stranded for the end of the route. Usually beats plain
//! nearest-neighbor on total length at O(n³) cost.

use log::debug;

use crate::distance::DistanceTable;
use crate::models::LocationId;
use crate::optimizer::prepare_stops;

/// Builds a depot-to-depot route by repeatedly appending the
/// highest-coproximity candidate.
pub fn coproximity<T: DistanceTable>(
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
        let mut best: Option<(LocationId, f64)> = None;
        for &candidate in &remaining {
            let score = coproximity_score(candidate, current, &remaining, table);
            // Strict comparison keeps the first (lowest-id) candidate on
            // ties.
            if best.is_none_or(|(_, b)| score > b) {
                best = Some((candidate, score));
            }
        }
        let Some((next, _)) = best else {
            break; // unreachable: remaining is non-empty
        };
        remaining.retain(|l| *l != next);
        route.push(next);
        current = next;
    }
    route.push(depot);
    route
}

/// The coproximity score of one candidate.
///
/// A candidate at distance zero from the current position scores infinite
/// preference rather than dividing by zero. A candidate with no known
/// distance from the current position scores lowest, so reachable stops are
/// always preferred.
fn coproximity_score<T: DistanceTable>(
    candidate: LocationId,
    current: LocationId,
    remaining: &[LocationId],
    table: &T,
) -> f64 {
    let mut sum = 0.0;
    let mut known = 0usize;
    for &other in remaining {
        if other == candidate {
            continue;
        }
        if let Some(d) = table.lookup(candidate, other) {
            sum += d;
            known += 1;
        }
    }
    let average = if known > 0 { sum / known as f64 } else { 0.0 };

    match table.lookup(current, candidate) {
        None => {
            debug!("no known distance from {current} to {candidate}; scored last");
            f64::NEG_INFINITY
        }
        Some(d) if d == 0.0 => f64::INFINITY,
        Some(d) => average / d,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::KeyedDistanceTable;
    use crate::optimizer::route_length;

    #[test]
    fn test_prefers_close_but_antisocial_stop() {
        // 2 and 3 are equally close to the depot, but 3 is far from the
        // remaining stop 4 while 2 is near it, so 3 scores higher.
        let mut table = KeyedDistanceTable::new();
        table.set(1, 2, 4.0);
        table.set(1, 3, 4.0);
        table.set(1, 4, 6.0);
        table.set(2, 3, 9.0);
        table.set(2, 4, 2.0);
        table.set(3, 4, 20.0);

        let route = coproximity(&[2, 3, 4], &table, 1);
        assert_eq!(route[1], 3);
    }

    #[test]
    fn test_zero_distance_candidate_picked_immediately() {
        let mut table = KeyedDistanceTable::new();
        table.set(1, 2, 0.0);
        table.set(1, 3, 1.0);
        table.set(2, 3, 5.0);
        let route = coproximity(&[3, 2], &table, 1);
        assert_eq!(route, vec![1, 2, 3, 1]);
    }

    #[test]
    fn test_route_is_complete_and_closed() {
        let mut table = KeyedDistanceTable::new();
        for a in 1..=6usize {
            for b in (a + 1)..=6 {
                table.set(a, b, ((a * 7 + b * 3) % 11 + 1) as f64);
            }
        }
        let stops = [2, 3, 4, 5, 6];
        let route = coproximity(&stops, &table, 1);
        assert_eq!(route.first(), Some(&1));
        assert_eq!(route.last(), Some(&1));
        for stop in stops {
            assert_eq!(route.iter().filter(|l| **l == stop).count(), 1);
        }
        assert_eq!(route_length(&route, &table, 1).gaps, 0);
    }

    #[test]
    fn test_empty_stop_set() {
        let table = KeyedDistanceTable::new();
        assert_eq!(coproximity(&[], &table, 1), vec![1]);
    }
}
