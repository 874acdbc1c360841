//! Symmetric point-to-point distance lookup between locations.
//!
//! Two interchangeable representations satisfy the same contract:
//!
//! - [`KeyedDistanceTable`] — associative lookup keyed by location pair
//! - [`DenseDistanceTable`] — dense matrix indexed by location id
//!
//! Both are symmetric (`lookup(a, b) == lookup(b, a)`) and keep "no known
//! distance" (`None`) distinct from a distance of zero.

mod keyed;
mod matrix;

pub use keyed::KeyedDistanceTable;
pub use matrix::DenseDistanceTable;

use std::collections::HashMap;

use crate::models::LocationId;

/// Contract for symmetric distance storage.
///
/// `set` and `lookup` are O(1) amortized; `neighbors_of` is O(n).
pub trait DistanceTable {
    /// Records a symmetric distance between two locations.
    fn set(&mut self, a: LocationId, b: LocationId, distance: f64);

    /// Distance between two locations, or `None` when no distance is known.
    /// `None` is a valid outcome distinct from a distance of zero.
    fn lookup(&self, a: LocationId, b: LocationId) -> Option<f64>;

    /// All known neighbors of a location, with distances.
    fn neighbors_of(&self, a: LocationId) -> HashMap<LocationId, f64>;

    /// The candidate nearest to `from`, ignoring candidates with no known
    /// distance. `None` when no candidate has a known distance.
    fn nearest_of_set(&self, from: LocationId, candidates: &[LocationId]) -> Option<LocationId> {
        candidates
            .iter()
            .copied()
            .filter_map(|c| self.lookup(from, c).map(|d| (c, d)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(c, _)| c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashMap as StdHashMap;

    fn both() -> (KeyedDistanceTable, DenseDistanceTable) {
        (KeyedDistanceTable::new(), DenseDistanceTable::new())
    }

    #[test]
    fn test_lookup_is_symmetric() {
        let (mut keyed, mut dense) = both();
        for table in [&mut keyed as &mut dyn DistanceTable, &mut dense] {
            table.set(13, 46, 45.2);
            assert_eq!(table.lookup(13, 46), Some(45.2));
            assert_eq!(table.lookup(46, 13), Some(45.2));
        }
    }

    #[test]
    fn test_unset_pair_is_not_found_not_zero() {
        let (keyed, dense) = both();
        assert_eq!(keyed.lookup(7, 99), None);
        assert_eq!(dense.lookup(7, 99), None);
    }

    #[test]
    fn test_zero_distance_is_found() {
        let (mut keyed, mut dense) = both();
        for table in [&mut keyed as &mut dyn DistanceTable, &mut dense] {
            table.set(1, 2, 0.0);
            assert_eq!(table.lookup(1, 2), Some(0.0));
        }
    }

    #[test]
    fn test_set_overwrites() {
        let (mut keyed, mut dense) = both();
        for table in [&mut keyed as &mut dyn DistanceTable, &mut dense] {
            table.set(1, 2, 10.0);
            table.set(2, 1, 4.5);
            assert_eq!(table.lookup(1, 2), Some(4.5));
        }
    }

    #[test]
    fn test_nearest_of_set_skips_unknowns() {
        let (mut keyed, _) = both();
        keyed.set(1, 2, 8.0);
        keyed.set(1, 3, 3.0);
        // 4 has no known distance from 1.
        assert_eq!(keyed.nearest_of_set(1, &[2, 3, 4]), Some(3));
        assert_eq!(keyed.nearest_of_set(1, &[4]), None);
        assert_eq!(keyed.nearest_of_set(1, &[]), None);
    }

    #[test]
    fn test_neighbors_of() {
        let (mut keyed, mut dense) = both();
        for table in [&mut keyed as &mut dyn DistanceTable, &mut dense] {
            table.set(1, 2, 5.0);
            table.set(1, 3, 7.0);
            table.set(2, 3, 1.0);
            let neighbors = table.neighbors_of(1);
            assert_eq!(neighbors.len(), 2);
            assert_eq!(neighbors.get(&2), Some(&5.0));
            assert_eq!(neighbors.get(&3), Some(&7.0));
        }
    }

    proptest! {
        #[test]
        fn prop_symmetry_holds_for_both_representations(
            entries in proptest::collection::vec(
                (1usize..40, 1usize..40, 0.0f64..500.0),
                1..30,
            )
        ) {
            let mut keyed = KeyedDistanceTable::new();
            let mut dense = DenseDistanceTable::new();
            let mut expected: StdHashMap<(usize, usize), f64> = StdHashMap::new();
            for (a, b, d) in entries {
                keyed.set(a, b, d);
                dense.set(a, b, d);
                expected.insert((a.min(b), a.max(b)), d);
            }
            for ((a, b), d) in expected {
                prop_assert_eq!(keyed.lookup(a, b), Some(d));
                prop_assert_eq!(keyed.lookup(b, a), Some(d));
                prop_assert_eq!(dense.lookup(a, b), Some(d));
                prop_assert_eq!(dense.lookup(b, a), Some(d));
            }
        }
    }
}
