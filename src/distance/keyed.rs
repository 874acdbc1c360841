//! Associative distance table keyed by location pair.

use std::collections::HashMap;

use crate::distance::DistanceTable;
use crate::models::{Location, LocationId};

/// Distance table backed by a hash map keyed on the unordered location pair.
///
/// Each pair is stored once under its normalized (low, high) key, so
/// symmetry holds by construction.
///
/// # Examples
///
/// ```
/// use parcel_dispatch::distance::{DistanceTable, KeyedDistanceTable};
///
/// let mut table = KeyedDistanceTable::new();
/// table.set(1, 2, 5.0);
/// assert_eq!(table.lookup(2, 1), Some(5.0));
/// assert_eq!(table.lookup(7, 99), None);
/// ```
#[derive(Debug, Clone, Default)]
pub struct KeyedDistanceTable {
    inner: HashMap<(LocationId, LocationId), f64>,
}

impl KeyedDistanceTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table from the locations' sparse distance maps.
    pub fn from_locations(locations: &[Location]) -> Self {
        let mut table = Self::new();
        for location in locations {
            for (&other, &distance) in location.distances() {
                table.set(location.id(), other, distance);
            }
        }
        table
    }

    /// Number of known pairs.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` when no distances are known.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    fn key(a: LocationId, b: LocationId) -> (LocationId, LocationId) {
        (a.min(b), a.max(b))
    }
}

impl DistanceTable for KeyedDistanceTable {
    fn set(&mut self, a: LocationId, b: LocationId, distance: f64) {
        self.inner.insert(Self::key(a, b), distance);
    }

    fn lookup(&self, a: LocationId, b: LocationId) -> Option<f64> {
        self.inner.get(&Self::key(a, b)).copied()
    }

    fn neighbors_of(&self, a: LocationId) -> HashMap<LocationId, f64> {
        self.inner
            .iter()
            .filter_map(|(&(low, high), &d)| {
                if low == a {
                    Some((high, d))
                } else if high == a {
                    Some((low, d))
                } else {
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as StdHashMap;

    #[test]
    fn test_from_locations() {
        let locations = vec![
            Location::new(1, "Hub", "a", "z", StdHashMap::from([(2, 7.2), (3, -1.0)])),
            Location::new(2, "Annex", "b", "z", StdHashMap::from([(1, 7.2)])),
        ];
        let table = KeyedDistanceTable::from_locations(&locations);
        assert_eq!(table.lookup(1, 2), Some(7.2));
        // The unknown sentinel never made it into the location, so no entry.
        assert_eq!(table.lookup(1, 3), None);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_self_pair_allowed_but_distinct() {
        let mut table = KeyedDistanceTable::new();
        table.set(4, 4, 0.0);
        assert_eq!(table.lookup(4, 4), Some(0.0));
        assert_eq!(table.lookup(4, 5), None);
    }
}
