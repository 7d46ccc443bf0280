//! Change notification events
//!
//! The driver only decides which events to raise and in what order. Raising
//! them, and notifying subscribers, is the job of an [`EventSink`] supplied by
//! the host. Events are collected in a [`PendingEventList`] during an update
//! and handed to the sink only after the data block commit.

use daq_model::{Direction, Timestamp};
use std::fmt;
use std::sync::Arc;

/// An event that can be raised by a point or a batch transaction
#[derive(Debug)]
pub struct Event {
    name: &'static str,
    source: Arc<str>,
    direction: Direction,
}

impl Event {
    pub fn new(name: &'static str, source: Arc<str>, direction: Direction) -> Arc<Self> {
        Arc::new(Self {
            name,
            source,
            direction,
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Id of the point or batch transaction raising the event
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.source, self.name)
    }
}

/// Events collected during one update, in accumulation order
#[derive(Debug, Default)]
pub struct PendingEventList {
    events: Vec<Arc<Event>>,
}

impl PendingEventList {
    /// Preallocate for the worst-case event count of a transaction
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, event: &Arc<Event>) {
        self.events.push(Arc::clone(event));
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.events.capacity()
    }

    pub fn as_slice(&self) -> &[Arc<Event>] {
        &self.events
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Event>> {
        self.events.iter()
    }

    /// Whether `event` (by identity) is in the list
    pub fn contains(&self, event: &Arc<Event>) -> bool {
        self.events.iter().any(|e| Arc::ptr_eq(e, event))
    }

    /// Event names in order, mostly for diagnostics
    pub fn names(&self) -> Vec<&'static str> {
        self.events.iter().map(|e| e.name()).collect()
    }
}

/// Host-side event raising
pub trait EventSink: Send + Sync {
    /// Raise `events` in order; called after the state they describe was committed
    fn raise(&self, timestamp: Timestamp, events: &[Arc<Event>]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_display() {
        let event = Event::new("read", Arc::from("poll1"), Direction::Input);
        assert_eq!(event.to_string(), "poll1.read");
        assert_eq!(event.source(), "poll1");
    }

    #[test]
    fn test_pending_list_keeps_order_and_identity() {
        let a = Event::new("valueChanged", Arc::from("p"), Direction::Input);
        let b = Event::new("qualityChanged", Arc::from("p"), Direction::Input);
        let other = Event::new("valueChanged", Arc::from("p"), Direction::Input);

        let mut list = PendingEventList::with_capacity(4);
        list.push(&b);
        list.push(&a);

        assert_eq!(list.names(), vec!["qualityChanged", "valueChanged"]);
        assert!(list.contains(&a));
        assert!(!list.contains(&other));
        assert!(list.capacity() >= 4);
    }
}
