//! Delivery location type and synthetic location generation.

use std::collections::HashMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Identifier of a location. Positive; id of the depot comes from the feed.
pub type LocationId = usize;

/// A deliverable street address with a sparse distance map to other
/// locations.
///
/// Immutable after load. Distances are as fed in: non-negative values are
/// known distances, anything absent means "no known distance yet" (the feed
/// encodes unknowns as negative entries, which are dropped on construction).
///
/// # Examples
///
/// ```
/// use std::collections::HashMap;
/// use parcel_dispatch::models::Location;
///
/// let loc = Location::new(2, "City Annex", "195 W Oakland Ave", "84115",
///                         HashMap::from([(1, 7.2)]));
/// assert_eq!(loc.id(), 2);
/// assert_eq!(loc.distance_to(1), Some(7.2));
/// assert_eq!(loc.distance_to(9), None);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    id: LocationId,
    name: String,
    address: String,
    zip: String,
    distances: HashMap<LocationId, f64>,
}

impl Location {
    /// Creates a location. Negative distance entries (feed sentinel for
    /// "unknown") are dropped.
    pub fn new(
        id: LocationId,
        name: impl Into<String>,
        address: impl Into<String>,
        zip: impl Into<String>,
        distances: HashMap<LocationId, f64>,
    ) -> Self {
        let distances = distances.into_iter().filter(|(_, d)| *d >= 0.0).collect();
        Self {
            id,
            name: name.into(),
            address: address.into(),
            zip: zip.into(),
            distances,
        }
    }

    /// Location identifier.
    pub fn id(&self) -> LocationId {
        self.id
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Street address.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Postal code.
    pub fn zip(&self) -> &str {
        &self.zip
    }

    /// Known distances keyed by other location id.
    pub fn distances(&self) -> &HashMap<LocationId, f64> {
        &self.distances
    }

    /// Distance to another location, if known to this record.
    pub fn distance_to(&self, other: LocationId) -> Option<f64> {
        self.distances.get(&other).copied()
    }

    /// Case-insensitive match on (street address, postal code), used to
    /// resolve delivery feed records.
    pub fn matches_address(&self, address: &str, zip: &str) -> bool {
        self.address.trim().eq_ignore_ascii_case(address.trim())
            && self.zip.trim().eq_ignore_ascii_case(zip.trim())
    }
}

/// Generates `count` synthetic locations with random pairwise distances,
/// starting at `base_id`. Useful for benchmarks and stress tests where real
/// feed data would be overkill.
///
/// Every generated location carries distances to all ids in
/// `base_id..base_id + count`, so any pair of generated locations can be
/// routed between.
pub fn synthetic_locations<R: Rng>(count: usize, base_id: LocationId, rng: &mut R) -> Vec<Location> {
    let mut output = Vec::with_capacity(count);
    for i in 0..count {
        let id = base_id + i;
        let mut distances = HashMap::new();
        for j in 0..count {
            if i == j {
                continue;
            }
            distances.insert(base_id + j, rng.random_range(0.5..50.0));
        }
        output.push(Location::new(
            id,
            format!("Synthetic {id}"),
            format!("{id} Nowhere Rd"),
            "00000",
            distances,
        ));
    }
    output
}
