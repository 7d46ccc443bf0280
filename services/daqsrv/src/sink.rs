//! Event sink logging every raised event

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use daq_driver::{Event, EventSink};
use daq_model::Timestamp;
use tracing::debug;

#[derive(Debug, Default)]
pub struct TracingEventSink {
    raised: AtomicU64,
}

impl TracingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events raised since creation
    pub fn raised(&self) -> u64 {
        self.raised.load(Ordering::Relaxed)
    }
}

impl EventSink for TracingEventSink {
    fn raise(&self, timestamp: Timestamp, events: &[Arc<Event>]) {
        for event in events {
            debug!("Event {} @ {}", event, timestamp.to_rfc3339());
        }
        self.raised.fetch_add(events.len() as u64, Ordering::Relaxed);
    }
}
