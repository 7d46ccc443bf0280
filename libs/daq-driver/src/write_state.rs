//! Write state of an output
//!
//! Records the outcome of the last write cycle that included the output.
//! Attributes: `writeTime`, `writeError`. Events: `written` after a successful
//! write, `writeError` after a failed one. Exactly one of them is queued per
//! update.

use daq_model::{attributes, events, Attribute, Direction, ErrorCode, HandleError, Timestamp, Value};
use daq_store::{DataArray, DataBlock, SlotHandle, WriteSentinel};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::Result;
use crate::event::{Event, PendingEventList};
use crate::handle::ReadHandle;
use crate::value_cell::{StateChanges, StatusCell};

#[derive(Debug)]
pub struct WriteState {
    source: Arc<str>,
    written: Arc<Event>,
    write_error: Arc<Event>,
    slot: Option<SlotHandle<StatusCell>>,
}

impl WriteState {
    pub const ATTRIBUTES: [Attribute; 2] = [attributes::WRITE_TIME, attributes::WRITE_ERROR];

    pub const EVENT_COUNT: usize = 1;

    pub fn new(source: Arc<str>) -> Self {
        Self {
            written: Event::new(events::WRITTEN, Arc::clone(&source), Direction::Output),
            write_error: Event::new(events::WRITE_ERROR, Arc::clone(&source), Direction::Output),
            source,
            slot: None,
        }
    }

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

    pub fn for_each_attribute(&self, visit: &mut dyn FnMut(&Attribute) -> bool) -> bool {
        Self::ATTRIBUTES.iter().any(|a| visit(a))
    }

    pub fn for_each_event(&self, visit: &mut dyn FnMut(&Arc<Event>) -> bool) -> bool {
        visit(&self.written) || visit(&self.write_error)
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
        Ok(match name {
            events::WRITTEN => Some(Arc::clone(&self.written)),
            events::WRITE_ERROR => Some(Arc::clone(&self.write_error)),
            _ => None,
        })
    }

    pub fn make_read_handle(
        &self,
        block: &Arc<DataBlock>,
        attribute: &Attribute,
    ) -> std::result::Result<Option<ReadHandle>, HandleError> {
        let slot = self.slot()?;
        let block = Arc::clone(block);
        let data_type = attribute.data_type();
        Ok(match attribute.name() {
            "writeTime" => Some(ReadHandle::new(block, slot, data_type, |s: &StatusCell| {
                Value::Timestamp(s.update_time)
            })),
            "writeError" => Some(ReadHandle::new(block, slot, data_type, |s: &StatusCell| {
                Value::Error(s.error)
            })),
            _ => None,
        })
    }

    /// Committed state
    pub fn status(&self, block: &DataBlock) -> Result<StatusCell> {
        Ok(block.read(self.slot()?)?)
    }

    /// Record the outcome of a write that included this output
    pub fn update(
        &self,
        sentinel: &mut WriteSentinel<'_>,
        timestamp: Timestamp,
        error: Option<ErrorCode>,
        events: &mut PendingEventList,
    ) -> Result<StateChanges> {
        let slot = self.slot()?;
        let (status, changes) = sentinel.get(slot)?.updated(timestamp, error);
        sentinel.set(slot, status)?;

        match error {
            None => {
                events.push(&self.written);
                debug!("Output '{}' written", self.source);
            }
            Some(e) => {
                events.push(&self.write_error);
                warn!("Output '{}' write failed: {}", self.source, e);
            }
        }
        Ok(changes)
    }
}
