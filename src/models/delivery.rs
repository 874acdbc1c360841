//! Delivery value object: status lifecycle, status log, and constraint notes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::location::LocationId;
use crate::sim::SimTime;

/// Identifier of a delivery.
pub type DeliveryId = usize;

/// Lifecycle status of a delivery.
///
/// Normal flow: `Initialized → (ReadyForPickup | Delayed) → LoadedOnTruck →
/// Delivered`, with `ReturnToHub` as the alternate terminal for cargo that
/// could not be delivered. A `Delayed` delivery must pass through
/// `ReadyForPickup` before it can be loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeliveryStatus {
    /// Created but not yet staged for pickup.
    Initialized,
    /// At the depot, available for loading.
    ReadyForPickup,
    /// Not yet at the depot; cannot be loaded until it arrives.
    Delayed,
    /// Aboard a vehicle.
    LoadedOnTruck,
    /// Delivered to its destination. Terminal.
    Delivered,
    /// Returned to the depot undeliverable. Terminal.
    ReturnToHub,
}

impl DeliveryStatus {
    /// Returns `true` for the two terminal states.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::ReturnToHub)
    }
}

/// One entry in a delivery's status history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatusLogEntry {
    /// Status entered.
    pub status: DeliveryStatus,
    /// Logical time of the transition.
    pub time: SimTime,
}

/// A rejected status transition.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StatusError {
    /// The requested transition is not allowed by the lifecycle.
    #[error("delivery {delivery}: cannot transition from {from:?} to {to:?}")]
    ForbiddenTransition {
        /// Affected delivery.
        delivery: DeliveryId,
        /// Current status.
        from: DeliveryStatus,
        /// Requested status.
        to: DeliveryStatus,
    },
    /// The delivery is delayed and its arrival time has not passed.
    #[error("delivery {delivery} is delayed until {available_at} (now {now})")]
    NotYetAvailable {
        /// Affected delivery.
        delivery: DeliveryId,
        /// Time the cargo becomes available.
        available_at: SimTime,
        /// Current logical time.
        now: SimTime,
    },
}

/// Constraints parsed from a delivery's free-text notes at creation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeliveryConstraints {
    /// Cargo does not reach the depot before this time.
    pub delay_until: Option<SimTime>,
    /// Vehicles the delivery may ride on. Empty means any.
    pub eligible_trucks: Vec<usize>,
    /// Other deliveries this one must travel with.
    pub linked_to: Vec<DeliveryId>,
}

/// Parses constraint notes in the feed's grammar.
///
/// Recognized forms (case-insensitive):
/// - `"Delayed on flight---will not arrive to depot until 9:05 am"` sets a
///   delay-until time;
/// - `"Can only be on truck 2"` restricts eligible vehicles;
/// - `"Must be delivered with 15, 19"` links deliveries together.
///
/// # Examples
///
/// ```
/// use parcel_dispatch::models::parse_constraint_notes;
///
/// let c = parse_constraint_notes("Must be delivered with 15, 19");
/// assert_eq!(c.linked_to, vec![15, 19]);
///
/// let c = parse_constraint_notes("Delayed---will not arrive until 9:05 am");
/// assert_eq!(c.delay_until, Some(905.0));
/// ```
pub fn parse_constraint_notes(notes: &str) -> DeliveryConstraints {
    let lowered = notes.to_lowercase();
    let tokens: Vec<&str> = lowered.split_whitespace().collect();

    let mut constraints = DeliveryConstraints::default();
    let mut collecting_links = false;

    for (i, raw) in tokens.iter().enumerate() {
        let token = raw.trim_matches(|c: char| !c.is_ascii_alphanumeric() && c != ':');

        if collecting_links {
            if let Ok(id) = token.parse::<DeliveryId>() {
                constraints.linked_to.push(id);
                continue;
            }
            collecting_links = false;
        }

        if token == "with" && i > 0 && tokens[i - 1].starts_with("delivered") {
            collecting_links = true;
        } else if token == "truck" {
            if let Some(id) = tokens.get(i + 1).and_then(|t| {
                t.trim_matches(|c: char| !c.is_ascii_digit())
                    .parse::<usize>()
                    .ok()
            }) {
                constraints.eligible_trucks.push(id);
            }
        } else if token.contains(':') {
            let meridiem = tokens.get(i + 1).copied();
            if let Some(time) = parse_clock_time(token, meridiem) {
                constraints.delay_until = Some(time);
            }
        }
    }
    constraints
}

/// Parses `"H:MM"` (with an optional trailing `am`/`pm` token) into HHMM
/// logical time. Returns `None` for anything that does not look like a
/// clock time.
pub(crate) fn parse_clock_time(token: &str, meridiem: Option<&str>) -> Option<SimTime> {
    let (hours, minutes) = token.split_once(':')?;
    let hours: u32 = hours.trim().parse().ok()?;
    let minutes: u32 = minutes
        .trim_matches(|c: char| !c.is_ascii_digit())
        .parse()
        .ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    let pm = meridiem
        .map(|m| m.trim_matches(|c: char| !c.is_ascii_alphabetic()))
        .is_some_and(|m| m.eq_ignore_ascii_case("pm"));
    let hours = if pm && hours < 12 { hours + 12 } else { hours };
    Some(f64::from(hours * 100 + minutes))
}

/// One shipment bound for a single destination.
///
/// Mutated only through [`Delivery::update_status`], which appends to the
/// status history. The destination may change once via the orchestration
/// layer's address-correction path, which regroups the delivery atomically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delivery {
    id: DeliveryId,
    destination: LocationId,
    deadline: SimTime,
    mass_kg: f64,
    notes: String,
    constraints: DeliveryConstraints,
    status: DeliveryStatus,
    history: Vec<StatusLogEntry>,
}

impl Delivery {
    /// Creates a delivery in `Initialized` state, parsing constraints from
    /// the notes.
    pub fn new(
        id: DeliveryId,
        destination: LocationId,
        deadline: SimTime,
        mass_kg: f64,
        notes: impl Into<String>,
        created_at: SimTime,
    ) -> Self {
        let notes = notes.into();
        let constraints = parse_constraint_notes(&notes);
        Self {
            id,
            destination,
            deadline,
            mass_kg,
            notes,
            constraints,
            status: DeliveryStatus::Initialized,
            history: vec![StatusLogEntry {
                status: DeliveryStatus::Initialized,
                time: created_at,
            }],
        }
    }

    /// Delivery identifier.
    pub fn id(&self) -> DeliveryId {
        self.id
    }

    /// Destination location id.
    pub fn destination(&self) -> LocationId {
        self.destination
    }

    /// Delivery deadline ([`crate::sim::END_OF_DAY`] when unconstrained).
    pub fn deadline(&self) -> SimTime {
        self.deadline
    }

    /// Shipment mass in kilograms.
    pub fn mass_kg(&self) -> f64 {
        self.mass_kg
    }

    /// Raw constraint notes.
    pub fn notes(&self) -> &str {
        &self.notes
    }

    /// Constraints parsed from the notes.
    pub fn constraints(&self) -> &DeliveryConstraints {
        &self.constraints
    }

    /// Current status.
    pub fn status(&self) -> DeliveryStatus {
        self.status
    }

    /// Chronological status history, oldest first.
    pub fn history(&self) -> &[StatusLogEntry] {
        &self.history
    }

    /// Time remaining until the deadline. Negative when overdue.
    pub fn remaining_time(&self, now: SimTime) -> f64 {
        self.deadline - now
    }

    /// Returns `true` if this delivery may ride on the given vehicle.
    /// An empty eligible-truck list means any vehicle.
    pub fn eligible_for(&self, vehicle: usize) -> bool {
        self.constraints.eligible_trucks.is_empty()
            || self.constraints.eligible_trucks.contains(&vehicle)
    }

    /// Transitions to a new status, appending to the history.
    ///
    /// Rejected transitions: leaving a terminal state, `Delayed` directly to
    /// `LoadedOnTruck`, and `ReadyForPickup` before the delay-until time has
    /// passed.
    pub fn update_status(&mut self, status: DeliveryStatus, now: SimTime) -> Result<(), StatusError> {
        if self.status.is_terminal() {
            return Err(StatusError::ForbiddenTransition {
                delivery: self.id,
                from: self.status,
                to: status,
            });
        }
        if self.status == DeliveryStatus::Delayed && status == DeliveryStatus::LoadedOnTruck {
            return Err(StatusError::ForbiddenTransition {
                delivery: self.id,
                from: self.status,
                to: status,
            });
        }
        if status == DeliveryStatus::ReadyForPickup {
            if let Some(available_at) = self.constraints.delay_until {
                if now < available_at {
                    return Err(StatusError::NotYetAvailable {
                        delivery: self.id,
                        available_at,
                        now,
                    });
                }
            }
        }
        self.status = status;
        self.history.push(StatusLogEntry { status, time: now });
        Ok(())
    }

    /// Points the delivery at a new destination. Callers must regroup the
    /// delivery in the same operation to keep group membership consistent.
    pub(crate) fn set_destination(&mut self, destination: LocationId) {
        self.destination = destination;
    }
}
