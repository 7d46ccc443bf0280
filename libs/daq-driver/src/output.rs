//! Output points
//!
//! An output is read back from the device like an input and additionally
//! accepts values through its write handle. A scheduled value waits in a
//! single-value slot until the next write cycle of the output's transaction;
//! scheduling again before that replaces it.

use bytes::Bytes;
use daq_model::{
    attributes, Access, Attribute, ByteOrder, DataType, Directions, ErrorCode, HandleError,
    PointValue, Timestamp,
};
use daq_store::{DataArray, WriteSentinel};
use std::sync::Arc;
use tracing::trace;

use crate::batch::{BatchId, BatchTransaction, WriteCommand};
use crate::common_read_state::CommonUpdate;
use crate::error::Result;
use crate::event::{Event, PendingEventList};
use crate::handle::{ReadHandle, WriteHandle};
use crate::pending::SingleValueQueue;
use crate::point::{decode_at, AbstractInput, AbstractOutput, DataPoint, PointId};
use crate::read_state::PerValueReadState;
use crate::value_cell::{ChangeSet, StateChanges};
use crate::write_state::WriteState;

pub struct OutputPoint<T: PointValue> {
    id: Arc<str>,
    batch: BatchId,
    offset: usize,
    byte_order: ByteOrder,
    read_state: PerValueReadState<T>,
    write_state: WriteState,
    pending: Arc<SingleValueQueue<T>>,
}

impl<T: PointValue> OutputPoint<T> {
    pub fn new(id: Arc<str>, batch: BatchId, offset: usize, byte_order: ByteOrder) -> Self {
        Self {
            read_state: PerValueReadState::new(Arc::clone(&id)),
            write_state: WriteState::new(Arc::clone(&id)),
            pending: Arc::new(SingleValueQueue::new()),
            id,
            batch,
            offset,
            byte_order,
        }
    }

    pub fn value_attribute() -> Attribute {
        Attribute::new(attributes::VALUE, Access::ReadWrite, T::DATA_TYPE)
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn read_state(&self) -> &PerValueReadState<T> {
        &self.read_state
    }

    pub fn write_state(&self) -> &WriteState {
        &self.write_state
    }

    /// Schedule `value` for the next write cycle
    pub fn schedule_value(&self, value: T) {
        if self.pending.enqueue(value) {
            trace!("Output '{}': pending value replaced", self.id);
        }
    }

    fn ensure_attached(&self) -> std::result::Result<(), HandleError> {
        if self.read_state.is_attached() && self.write_state.is_attached() {
            Ok(())
        } else {
            Err(HandleError::InvalidArgument)
        }
    }
}

impl<T: PointValue> DataPoint for OutputPoint<T> {
    fn id(&self) -> &str {
        &self.id
    }

    fn data_type(&self) -> DataType {
        T::DATA_TYPE
    }

    fn directions(&self) -> Directions {
        Directions::INPUT_OUTPUT
    }

    fn batch(&self) -> BatchId {
        self.batch
    }

    fn for_each_attribute(&self, visit: &mut dyn FnMut(&Attribute) -> bool) -> bool {
        visit(&Self::value_attribute())
            || self.read_state.for_each_attribute(visit)
            || self.write_state.for_each_attribute(visit)
    }

    fn for_each_event(
        &self,
        batch: &BatchTransaction,
        visit: &mut dyn FnMut(&Arc<Event>) -> bool,
    ) -> bool {
        self.read_state.for_each_event(visit)
            || batch.common().for_each_event(visit)
            || self.write_state.for_each_event(visit)
    }

    fn resolve_attribute(&self, name: &str) -> std::result::Result<Option<Attribute>, HandleError> {
        self.ensure_attached()?;
        if name == attributes::VALUE {
            return Ok(Some(Self::value_attribute()));
        }
        if let Some(attribute) = self.read_state.resolve_attribute(name)? {
            return Ok(Some(attribute));
        }
        self.write_state.resolve_attribute(name)
    }

    fn resolve_event(
        &self,
        batch: &BatchTransaction,
        name: &str,
    ) -> std::result::Result<Option<Arc<Event>>, HandleError> {
        if let Some(event) = self.read_state.resolve_event(name)? {
            return Ok(Some(event));
        }
        if let Some(event) = batch.common().resolve_event(name)? {
            return Ok(Some(event));
        }
        self.write_state.resolve_event(name)
    }

    fn make_read_handle(
        &self,
        batch: &BatchTransaction,
        attribute: &Attribute,
    ) -> std::result::Result<Option<ReadHandle>, HandleError> {
        if *attribute == Self::value_attribute() {
            return self.read_state.value_read_handle(batch.read_block()).map(Some);
        }
        if let Some(handle) = self.read_state.make_read_handle(batch.read_block(), attribute)? {
            return Ok(Some(handle));
        }
        self.write_state.make_read_handle(batch.write_block(), attribute)
    }

    fn make_write_handle(&self, attribute: &Attribute) -> Option<WriteHandle> {
        (*attribute == Self::value_attribute())
            .then(|| WriteHandle::new(Arc::downgrade(&self.pending)))
    }

    fn as_input(&self) -> Option<&dyn AbstractInput> {
        Some(self)
    }

    fn as_input_mut(&mut self) -> Option<&mut dyn AbstractInput> {
        Some(self)
    }

    fn as_output(&self) -> Option<&dyn AbstractOutput> {
        Some(self)
    }

    fn as_output_mut(&mut self) -> Option<&mut dyn AbstractOutput> {
        Some(self)
    }
}

impl<T: PointValue> AbstractInput for OutputPoint<T> {
    fn attach_input(&mut self, array: &mut DataArray, event_count: &mut usize) {
        self.read_state.attach(array, event_count);
    }

    fn update_read_state(
        &self,
        sentinel: &mut WriteSentinel<'_>,
        timestamp: Timestamp,
        payload: std::result::Result<&Bytes, ErrorCode>,
        common: &CommonUpdate,
        events: &mut PendingEventList,
    ) -> Result<ChangeSet> {
        let outcome = decode_at::<T>(payload, self.offset, self.byte_order);
        self.read_state
            .update(sentinel, timestamp, outcome, common, events)
    }
}

impl<T: PointValue> AbstractOutput for OutputPoint<T> {
    fn attach_output(&mut self, array: &mut DataArray, event_count: &mut usize) {
        self.write_state.attach(array, event_count);
    }

    fn add_to_write_command(&self, point: PointId, command: &mut WriteCommand) -> bool {
        match self.pending.dequeue() {
            Some(value) => {
                command.push(point, self.offset, value.encode(self.byte_order));
                true
            }
            None => false,
        }
    }

    fn update_write_state(
        &self,
        sentinel: &mut WriteSentinel<'_>,
        timestamp: Timestamp,
        error: Option<ErrorCode>,
        events: &mut PendingEventList,
    ) -> Result<StateChanges> {
        self.write_state.update(sentinel, timestamp, error, events)
    }

    fn has_pending_value(&self) -> bool {
        self.pending.is_pending()
    }
}
