//! Logical simulation clock and scheduled events.
//!
//! Time is an abstract monotonically increasing counter in HHMM-style units
//! (800.0 = start of the delivery day, 1700.0 = end of day), not wall-clock
//! time. The clock advances in fixed ticks; events fire exactly once when the
//! clock reaches or passes their scheduled time and are removed from the
//! pending set. Same-tick events fire in the order they were scheduled.

use serde::{Deserialize, Serialize};

/// Logical simulation time.
pub type SimTime = f64;

/// Deadline sentinel meaning "any time before the end of the day".
pub const END_OF_DAY: SimTime = 1700.0;

/// Default clock increment per [`SimClock::advance`] call.
pub const DEFAULT_TICK: f64 = 1.0;

/// What a scheduled event represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// A vehicle reaches the destination of its current leg.
    TruckArrival,
    /// Delayed cargo becomes available at the depot.
    DelayedCargoArrival,
    /// Mandatory status-reporting checkpoint.
    StatusCheck,
    /// Mandatory constraint-change checkpoint (e.g. an address correction).
    ConstraintChange,
}

/// A scheduled simulation event.
///
/// # Examples
///
/// ```
/// use parcel_dispatch::sim::{EventKind, SimEvent};
///
/// let ev = SimEvent::truck_arrival(930.0, 1);
/// assert_eq!(ev.kind, EventKind::TruckArrival);
/// assert_eq!(ev.vehicle, Some(1));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimEvent {
    /// Event type.
    pub kind: EventKind,
    /// Logical time at which the event is due.
    pub time: SimTime,
    /// Vehicle the event concerns, if any.
    pub vehicle: Option<usize>,
}

impl SimEvent {
    /// A truck-arrival event for the given vehicle.
    pub fn truck_arrival(time: SimTime, vehicle: usize) -> Self {
        Self {
            kind: EventKind::TruckArrival,
            time,
            vehicle: Some(vehicle),
        }
    }

    /// A delayed-cargo-arrival event.
    pub fn delayed_cargo(time: SimTime) -> Self {
        Self {
            kind: EventKind::DelayedCargoArrival,
            time,
            vehicle: None,
        }
    }

    /// A status-check checkpoint.
    pub fn status_check(time: SimTime) -> Self {
        Self {
            kind: EventKind::StatusCheck,
            time,
            vehicle: None,
        }
    }

    /// A constraint-change checkpoint.
    pub fn constraint_change(time: SimTime) -> Self {
        Self {
            kind: EventKind::ConstraintChange,
            time,
            vehicle: None,
        }
    }
}

/// Logical clock with a pending-event list.
///
/// # Examples
///
/// ```
/// use parcel_dispatch::sim::{SimClock, SimEvent};
///
/// let mut clock = SimClock::new(800.0);
/// clock.schedule(SimEvent::status_check(801.0));
/// let fired = clock.advance();
/// assert_eq!(fired.len(), 1);
/// assert!(clock.is_idle());
/// ```
#[derive(Debug, Clone)]
pub struct SimClock {
    now: SimTime,
    tick: f64,
    pending: Vec<(u64, SimEvent)>,
    seq: u64,
}

impl SimClock {
    /// Creates a clock starting at the given time with the default tick.
    pub fn new(start: SimTime) -> Self {
        Self {
            now: start,
            tick: DEFAULT_TICK,
            pending: Vec::new(),
            seq: 0,
        }
    }

    /// Sets the tick increment.
    pub fn with_tick(mut self, tick: f64) -> Self {
        self.tick = tick;
        self
    }

    /// Current logical time.
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Schedules an event. Events already in the past fire on the next tick.
    pub fn schedule(&mut self, event: SimEvent) {
        self.pending.push((self.seq, event));
        self.seq += 1;
    }

    /// Advances time by one tick and returns the events that came due,
    /// ordered by (time, schedule order). Fired events are removed.
    pub fn advance(&mut self) -> Vec<SimEvent> {
        self.now += self.tick;
        self.take_due()
    }

    /// Number of events still pending.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Returns `true` when no events remain.
    pub fn is_idle(&self) -> bool {
        self.pending.is_empty()
    }

    /// Time of the next pending event, if any.
    pub fn next_event_time(&self) -> Option<SimTime> {
        self.pending
            .iter()
            .map(|(_, ev)| ev.time)
            .min_by(f64::total_cmp)
    }

    fn take_due(&mut self) -> Vec<SimEvent> {
        let now = self.now;
        let mut due: Vec<(u64, SimEvent)> = Vec::new();
        self.pending.retain(|entry| {
            if entry.1.time <= now {
                due.push(*entry);
                false
            } else {
                true
            }
        });
        due.sort_by(|a, b| a.1.time.total_cmp(&b.1.time).then(a.0.cmp(&b.0)));
        due.into_iter().map(|(_, ev)| ev).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_fires_due_events_once() {
        let mut clock = SimClock::new(800.0);
        clock.schedule(SimEvent::delayed_cargo(905.0));
        clock.schedule(SimEvent::status_check(802.0));

        let fired = clock.advance(); // 801.0
        assert!(fired.is_empty());

        let fired = clock.advance(); // 802.0
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].kind, EventKind::StatusCheck);

        // Already-fired events never refire.
        let fired = clock.advance();
        assert!(fired.is_empty());
        assert_eq!(clock.pending(), 1);
    }

    #[test]
    fn test_same_tick_events_fire_in_schedule_order() {
        let mut clock = SimClock::new(0.0).with_tick(10.0);
        clock.schedule(SimEvent::truck_arrival(5.0, 2));
        clock.schedule(SimEvent::truck_arrival(5.0, 1));
        clock.schedule(SimEvent::truck_arrival(3.0, 3));

        let fired = clock.advance();
        assert_eq!(fired.len(), 3);
        assert_eq!(fired[0].vehicle, Some(3)); // earliest time first
        assert_eq!(fired[1].vehicle, Some(2)); // then schedule order
        assert_eq!(fired[2].vehicle, Some(1));
    }

    #[test]
    fn test_next_event_time() {
        let mut clock = SimClock::new(0.0);
        assert!(clock.next_event_time().is_none());
        clock.schedule(SimEvent::status_check(50.0));
        clock.schedule(SimEvent::status_check(20.0));
        assert_eq!(clock.next_event_time(), Some(20.0));
    }
}
