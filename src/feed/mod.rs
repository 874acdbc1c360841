//! Feed record types and destination resolution.
//!
//! The depot's data arrives as two record streams: locations (with the
//! pairwise distance map) and deliveries (addressed by street address and
//! postal code, not by location id). This module carries the serde-derived
//! record types, turns location records into [`Location`]s, and resolves
//! delivery records against them. Parsing the transport format itself (CSV
//! or otherwise) stays outside the crate.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::models::{
    parse_clock_time, Delivery, DeliveryId, DeliveryStatus, Location, LocationId,
};
use crate::sim::{SimTime, END_OF_DAY};

/// One location row from the feed.
///
/// The address field may carry the postal code in a trailing parenthesized
/// suffix (`"195 W Oakland Ave (84115)"`), which [`build_locations`] splits
/// off.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    /// Location id assigned by the feed.
    pub id: LocationId,
    /// Display name.
    pub name: String,
    /// Street address, optionally with a `(zip)` suffix.
    pub address: String,
    /// Distances to other location ids. Negative values mean "unknown".
    pub distances: Vec<(LocationId, f64)>,
}

/// One delivery row from the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryRecord {
    /// Delivery id assigned by the feed.
    pub id: DeliveryId,
    /// Destination street address.
    pub address: String,
    /// Destination postal code.
    pub zip: String,
    /// Deadline text: `"EOD"` or a clock time like `"10:30 AM"`.
    pub deadline: String,
    /// Shipment mass in kilograms.
    pub mass_kg: f64,
    /// Free-text constraint notes.
    pub notes: String,
}

/// Outcome summary of a feed resolution pass. Unresolved records are
/// reported, never fatal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedReport {
    /// Number of records successfully resolved.
    pub resolved: usize,
    /// Records whose (address, zip) matched no location, with the offending
    /// address.
    pub unresolved: Vec<(DeliveryId, String)>,
}

impl FeedReport {
    /// Returns `true` when every record resolved.
    pub fn is_clean(&self) -> bool {
        self.unresolved.is_empty()
    }
}

/// Builds locations from feed records and identifies the depot.
///
/// The first record is the depot by convention. A trailing parenthesized
/// suffix on the address becomes the postal code.
///
/// # Examples
///
/// ```
/// use parcel_dispatch::feed::{build_locations, LocationRecord};
///
/// let records = vec![LocationRecord {
///     id: 1,
///     name: "Hub".into(),
///     address: "4001 South 700 East (84107)".into(),
///     distances: vec![],
/// }];
/// let (locations, depot) = build_locations(&records);
/// assert_eq!(depot, Some(1));
/// assert_eq!(locations[0].zip(), "84107");
/// ```
pub fn build_locations(records: &[LocationRecord]) -> (Vec<Location>, Option<LocationId>) {
    let depot = records.first().map(|r| r.id);
    let locations = records
        .iter()
        .map(|record| {
            let (address, zip) = split_address(&record.address);
            Location::new(
                record.id,
                record.name.clone(),
                address,
                zip,
                record.distances.iter().copied().collect(),
            )
        })
        .collect();
    (locations, depot)
}

/// Splits `"street (zip)"` into its parts; no suffix means no postal code.
fn split_address(raw: &str) -> (String, String) {
    let trimmed = raw.trim();
    if let Some(open) = trimmed.rfind('(') {
        if let Some(stripped) = trimmed[open..].strip_prefix('(') {
            let zip = stripped.trim_end_matches(')').trim();
            return (trimmed[..open].trim().to_string(), zip.to_string());
        }
    }
    (trimmed.to_string(), String::new())
}

/// Parses a feed deadline: `"EOD"` (any case) or a clock time with an
/// optional meridiem. Unparseable text falls back to end of day with a
/// warning.
pub fn parse_deadline(text: &str) -> SimTime {
    let trimmed = text.trim();
    if trimmed.eq_ignore_ascii_case("eod") || trimmed.is_empty() {
        return END_OF_DAY;
    }
    let mut parts = trimmed.split_whitespace();
    let clock = parts.next().unwrap_or_default();
    match parse_clock_time(clock, parts.next()) {
        Some(time) => time,
        None => {
            warn!("unparseable deadline {text:?}; treated as end of day");
            END_OF_DAY
        }
    }
}

/// Resolves delivery records against known locations.
///
/// The destination is matched by case-insensitive (address, zip). Matched
/// records become deliveries in `ReadyForPickup` (or `Delayed`, when the
/// notes carry a delay past `now`); unmatched records are collected in the
/// report and skipped.
pub fn resolve_deliveries(
    records: &[DeliveryRecord],
    locations: &[Location],
    now: SimTime,
) -> (Vec<Delivery>, FeedReport) {
    let mut deliveries = Vec::with_capacity(records.len());
    let mut report = FeedReport::default();

    for record in records {
        let Some(destination) = locations
            .iter()
            .find(|l| l.matches_address(&record.address, &record.zip))
            .map(Location::id)
        else {
            warn!(
                "delivery {} addressed to unknown location {:?} ({}); skipped",
                record.id, record.address, record.zip
            );
            report.unresolved.push((record.id, record.address.clone()));
            continue;
        };

        let mut delivery = Delivery::new(
            record.id,
            destination,
            parse_deadline(&record.deadline),
            record.mass_kg,
            record.notes.clone(),
            now,
        );
        let initial = match delivery.constraints().delay_until {
            Some(available_at) if available_at > now => DeliveryStatus::Delayed,
            _ => DeliveryStatus::ReadyForPickup,
        };
        if let Err(err) = delivery.update_status(initial, now) {
            warn!("delivery {} rejected initial status: {err}", record.id);
        }
        deliveries.push(delivery);
        report.resolved += 1;
    }
    (deliveries, report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location_records() -> Vec<LocationRecord> {
        vec![
            LocationRecord {
                id: 1,
                name: "Hub".into(),
                address: "4001 South 700 East (84107)".into(),
                distances: vec![(2, 7.2), (3, -1.0)],
            },
            LocationRecord {
                id: 2,
                name: "Annex".into(),
                address: "195 W Oakland Ave (84115)".into(),
                distances: vec![(1, 7.2)],
            },
        ]
    }

    #[test]
    fn test_build_locations_splits_zip_and_picks_depot() {
        let (locations, depot) = build_locations(&location_records());
        assert_eq!(depot, Some(1));
        assert_eq!(locations[0].address(), "4001 South 700 East");
        assert_eq!(locations[0].zip(), "84107");
        // The negative "unknown" sentinel never reaches the location.
        assert_eq!(locations[0].distance_to(3), None);
        assert_eq!(locations[0].distance_to(2), Some(7.2));
    }

    #[test]
    fn test_build_locations_without_zip_suffix() {
        let records = vec![LocationRecord {
            id: 1,
            name: "Hub".into(),
            address: "4001 South 700 East".into(),
            distances: vec![],
        }];
        let (locations, _) = build_locations(&records);
        assert_eq!(locations[0].address(), "4001 South 700 East");
        assert_eq!(locations[0].zip(), "");
    }

    #[test]
    fn test_empty_feed_has_no_depot() {
        let (locations, depot) = build_locations(&[]);
        assert!(locations.is_empty());
        assert_eq!(depot, None);
    }

    #[test]
    fn test_parse_deadline() {
        assert_eq!(parse_deadline("EOD"), END_OF_DAY);
        assert_eq!(parse_deadline("eod"), END_OF_DAY);
        assert_eq!(parse_deadline("10:30 AM"), 1030.0);
        assert_eq!(parse_deadline("1:10 PM"), 1310.0);
        assert_eq!(parse_deadline("9:00"), 900.0);
        assert_eq!(parse_deadline("whenever"), END_OF_DAY);
    }

    fn delivery_record(id: usize, address: &str, zip: &str, notes: &str) -> DeliveryRecord {
        DeliveryRecord {
            id,
            address: address.into(),
            zip: zip.into(),
            deadline: "EOD".into(),
            mass_kg: 2.0,
            notes: notes.into(),
        }
    }

    #[test]
    fn test_resolution_matches_address_and_zip() {
        let (locations, _) = build_locations(&location_records());
        let records = vec![
            delivery_record(1, "195 W Oakland Ave", "84115", ""),
            delivery_record(2, "195 W Oakland Ave", "84119", ""), // wrong zip
            delivery_record(3, "500 Nowhere St", "84107", ""),
        ];
        let (deliveries, report) = resolve_deliveries(&records, &locations, 800.0);

        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].destination(), 2);
        assert_eq!(deliveries[0].status(), DeliveryStatus::ReadyForPickup);
        assert_eq!(report.resolved, 1);
        assert_eq!(
            report.unresolved,
            vec![
                (2, "195 W Oakland Ave".to_string()),
                (3, "500 Nowhere St".to_string()),
            ]
        );
        assert!(!report.is_clean());
    }

    #[test]
    fn test_delayed_notes_set_initial_status() {
        let (locations, _) = build_locations(&location_records());
        let records = vec![delivery_record(
            1,
            "195 W Oakland Ave",
            "84115",
            "Delayed on flight---will not arrive to depot until 9:05 am",
        )];
        let (deliveries, report) = resolve_deliveries(&records, &locations, 800.0);
        assert!(report.is_clean());
        assert_eq!(deliveries[0].status(), DeliveryStatus::Delayed);

        // Resolving after the cargo has landed goes straight to ready.
        let (deliveries, _) = resolve_deliveries(&records, &locations, 910.0);
        assert_eq!(deliveries[0].status(), DeliveryStatus::ReadyForPickup);
    }

    #[test]
    fn test_delivery_record_serde_round_trip() {
        let record = delivery_record(7, "195 W Oakland Ave", "84115", "Can only be on truck 2");
        let json = serde_json::to_string(&record).unwrap();
        let back: DeliveryRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
