//! Dense distance matrix indexed by location id.

use std::collections::HashMap;

use crate::distance::DistanceTable;
use crate::models::{Location, LocationId};

/// Distance table backed by a row-major matrix indexed directly by location
/// id. Both (a, b) and (b, a) cells are written on `set`, so symmetry holds
/// by construction. The matrix grows on demand when an id exceeds the
/// current dimension.
///
/// Trades memory (O(max_id²)) for branch-free indexing; the keyed table is
/// the better fit for very sparse id spaces.
#[derive(Debug, Clone, Default)]
pub struct DenseDistanceTable {
    data: Vec<Option<f64>>,
    dim: usize,
}

impl DenseDistanceTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a table pre-sized for ids up to `max_id`.
    pub fn with_max_id(max_id: LocationId) -> Self {
        let dim = max_id + 1;
        Self {
            data: vec![None; dim * dim],
            dim,
        }
    }

    /// Builds a table from the locations' sparse distance maps.
    pub fn from_locations(locations: &[Location]) -> Self {
        let max_id = locations
            .iter()
            .flat_map(|l| l.distances().keys().copied().chain([l.id()]))
            .max()
            .unwrap_or(0);
        let mut table = Self::with_max_id(max_id);
        for location in locations {
            for (&other, &distance) in location.distances() {
                table.set(location.id(), other, distance);
            }
        }
        table
    }

    /// Current matrix dimension (largest representable id + 1).
    pub fn dim(&self) -> usize {
        self.dim
    }

    fn grow(&mut self, min_dim: usize) {
        let new_dim = min_dim.max(self.dim * 2).max(4);
        let mut data = vec![None; new_dim * new_dim];
        for row in 0..self.dim {
            for col in 0..self.dim {
                data[row * new_dim + col] = self.data[row * self.dim + col];
            }
        }
        self.data = data;
        self.dim = new_dim;
    }
}

impl DistanceTable for DenseDistanceTable {
    fn set(&mut self, a: LocationId, b: LocationId, distance: f64) {
        let needed = a.max(b) + 1;
        if needed > self.dim {
            self.grow(needed);
        }
        self.data[a * self.dim + b] = Some(distance);
        self.data[b * self.dim + a] = Some(distance);
    }

    fn lookup(&self, a: LocationId, b: LocationId) -> Option<f64> {
        if a >= self.dim || b >= self.dim {
            return None;
        }
        self.data[a * self.dim + b]
    }

    fn neighbors_of(&self, a: LocationId) -> HashMap<LocationId, f64> {
        if a >= self.dim {
            return HashMap::new();
        }
        (0..self.dim)
            .filter(|&b| b != a)
            .filter_map(|b| self.data[a * self.dim + b].map(|d| (b, d)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as StdHashMap;

    #[test]
    fn test_grow_preserves_entries() {
        let mut table = DenseDistanceTable::new();
        table.set(1, 2, 5.0);
        table.set(30, 2, 9.0); // forces growth
        assert_eq!(table.lookup(1, 2), Some(5.0));
        assert_eq!(table.lookup(2, 30), Some(9.0));
    }

    #[test]
    fn test_out_of_range_lookup_is_none() {
        let table = DenseDistanceTable::with_max_id(3);
        assert_eq!(table.lookup(2, 3), None);
        assert_eq!(table.lookup(10, 2), None);
    }

    #[test]
    fn test_from_locations_sizes_to_largest_id() {
        let locations = vec![Location::new(
            1,
            "Hub",
            "a",
            "z",
            StdHashMap::from([(27, 3.5)]),
        )];
        let table = DenseDistanceTable::from_locations(&locations);
        assert_eq!(table.lookup(27, 1), Some(3.5));
        assert!(table.dim() >= 28);
    }
}
