//! Read state shared by all inputs of one batch transaction
//!
//! A transaction reads all of its inputs in one go, so whether the read
//! itself worked is recorded once, here, and combined into every point's
//! state. Attributes exposed: `updateTime`, `quality`, `error`. Event: `read`,
//! raised on every update whatever the outcome.

use daq_model::{attributes, events, Attribute, Direction, ErrorCode, HandleError, Timestamp, Value};
use daq_store::{DataArray, DataBlock, SlotHandle, WriteSentinel};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::Result;
use crate::event::{Event, PendingEventList};
use crate::handle::ReadHandle;
use crate::value_cell::{StateChanges, StatusCell};

/// Outcome of the shared part of a read cycle, handed to every input
#[derive(Debug, Clone, Copy)]
pub struct CommonUpdate {
    pub state: StatusCell,
    pub changes: StateChanges,
}

impl CommonUpdate {
    pub fn error(&self) -> Option<ErrorCode> {
        self.state.error
    }
}

/// Tracker for the transaction-level read state
#[derive(Debug)]
pub struct CommonReadState {
    source: Arc<str>,
    read_event: Arc<Event>,
    slot: Option<SlotHandle<StatusCell>>,
}

impl CommonReadState {
    pub const ATTRIBUTES: [Attribute; 3] =
        [attributes::UPDATE_TIME, attributes::QUALITY, attributes::ERROR];

    /// Events this tracker can raise in one update
    pub const EVENT_COUNT: usize = 1;

    pub fn new(source: Arc<str>) -> Self {
        let read_event = Event::new(events::READ, Arc::clone(&source), Direction::Input);
        Self {
            source,
            read_event,
            slot: None,
        }
    }

    /// Reserve the state slot and account for the `read` event
    pub fn attach(&mut self, array: &mut DataArray, event_count: &mut usize) {
        self.slot = Some(array.append(StatusCell::default()));
        *event_count += Self::EVENT_COUNT;
    }

    pub fn is_attached(&self) -> bool {
        self.slot.is_some()
    }

    fn slot(&self) -> std::result::Result<SlotHandle<StatusCell>, HandleError> {
        self.slot.ok_or(HandleError::InvalidArgument)
    }

    pub fn read_event(&self) -> &Arc<Event> {
        &self.read_event
    }

    /// Visit attributes until `visit` returns true; returns whether it did
    pub fn for_each_attribute(&self, visit: &mut dyn FnMut(&Attribute) -> bool) -> bool {
        Self::ATTRIBUTES.iter().any(|a| visit(a))
    }

    /// Visit events until `visit` returns true; returns whether it did
    pub fn for_each_event(&self, visit: &mut dyn FnMut(&Arc<Event>) -> bool) -> bool {
        visit(&self.read_event)
    }

    pub fn resolve_attribute(
        &self,
        name: &str,
    ) -> std::result::Result<Option<Attribute>, HandleError> {
        self.slot()?;
        Ok(Attribute::resolve(name, &Self::ATTRIBUTES))
    }

    pub fn resolve_event(
        &self,
        name: &str,
    ) -> std::result::Result<Option<Arc<Event>>, HandleError> {
        self.slot()?;
        Ok((name == events::READ).then(|| Arc::clone(&self.read_event)))
    }

    /// Read handle for one of this tracker's attributes, or None if it is not one
    pub fn make_read_handle(
        &self,
        block: &Arc<DataBlock>,
        attribute: &Attribute,
    ) -> std::result::Result<Option<ReadHandle>, HandleError> {
        let slot = self.slot()?;
        let block = Arc::clone(block);
        let data_type = attribute.data_type();
        let handle = match *attribute {
            a if a == attributes::UPDATE_TIME => {
                ReadHandle::new(block, slot, data_type, |s: &StatusCell| {
                    Value::Timestamp(s.update_time)
                })
            }
            a if a == attributes::QUALITY => {
                ReadHandle::new(block, slot, data_type, |s: &StatusCell| Value::Quality(s.quality))
            }
            a if a == attributes::ERROR => {
                ReadHandle::new(block, slot, data_type, |s: &StatusCell| Value::Error(s.error))
            }
            _ => return Ok(None),
        };
        Ok(Some(handle))
    }

    /// Committed state
    pub fn state(&self, block: &DataBlock) -> Result<StatusCell> {
        Ok(block.read(self.slot()?)?)
    }

    /// Record the outcome of a transaction read
    ///
    /// Always queues `read`. Must run before any input of the transaction is
    /// updated in the same cycle.
    pub fn update(
        &self,
        sentinel: &mut WriteSentinel<'_>,
        timestamp: Timestamp,
        error: Option<ErrorCode>,
        events: &mut PendingEventList,
    ) -> Result<CommonUpdate> {
        let slot = self.slot()?;
        let (state, changes) = sentinel.get(slot)?.updated(timestamp, error);
        sentinel.set(slot, state)?;
        events.push(&self.read_event);

        if changes.quality {
            match error {
                Some(e) => warn!("Batch '{}' read failed: {}", self.source, e),
                None => info!("Batch '{}' read recovered", self.source),
            }
        } else if changes.error {
            warn!("Batch '{}' read error changed: {:?}", self.source, error);
        }

        Ok(CommonUpdate { state, changes })
    }
}
