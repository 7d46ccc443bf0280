//! Input points

use bytes::Bytes;
use daq_model::{
    attributes, Access, Attribute, ByteOrder, DataType, Directions, ErrorCode, HandleError,
    PointValue, Timestamp,
};
use daq_store::{DataArray, WriteSentinel};
use std::sync::Arc;

use crate::batch::{BatchId, BatchTransaction};
use crate::common_read_state::CommonUpdate;
use crate::error::Result;
use crate::event::{Event, PendingEventList};
use crate::handle::{ReadHandle, WriteHandle};
use crate::point::{decode_at, AbstractInput, AbstractOutput, DataPoint};
use crate::read_state::PerValueReadState;
use crate::value_cell::ChangeSet;

/// A read-only point decoded from its transaction's read payload
pub struct InputPoint<T: PointValue> {
    id: Arc<str>,
    batch: BatchId,
    offset: usize,
    byte_order: ByteOrder,
    read_state: PerValueReadState<T>,
}

impl<T: PointValue> InputPoint<T> {
    pub fn new(id: Arc<str>, batch: BatchId, offset: usize, byte_order: ByteOrder) -> Self {
        Self {
            read_state: PerValueReadState::new(Arc::clone(&id)),
            id,
            batch,
            offset,
            byte_order,
        }
    }

    pub fn value_attribute() -> Attribute {
        Attribute::new(attributes::VALUE, Access::ReadOnly, T::DATA_TYPE)
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    pub fn read_state(&self) -> &PerValueReadState<T> {
        &self.read_state
    }

    fn ensure_attached(&self) -> std::result::Result<(), HandleError> {
        if self.read_state.is_attached() {
            Ok(())
        } else {
            Err(HandleError::InvalidArgument)
        }
    }
}

impl<T: PointValue> DataPoint for InputPoint<T> {
    fn id(&self) -> &str {
        &self.id
    }

    fn data_type(&self) -> DataType {
        T::DATA_TYPE
    }

    fn directions(&self) -> Directions {
        Directions::INPUT
    }

    fn batch(&self) -> BatchId {
        self.batch
    }

    fn for_each_attribute(&self, visit: &mut dyn FnMut(&Attribute) -> bool) -> bool {
        visit(&Self::value_attribute()) || self.read_state.for_each_attribute(visit)
    }

    fn for_each_event(
        &self,
        batch: &BatchTransaction,
        visit: &mut dyn FnMut(&Arc<Event>) -> bool,
    ) -> bool {
        self.read_state.for_each_event(visit) || batch.common().for_each_event(visit)
    }

    fn resolve_attribute(&self, name: &str) -> std::result::Result<Option<Attribute>, HandleError> {
        self.ensure_attached()?;
        if name == attributes::VALUE {
            return Ok(Some(Self::value_attribute()));
        }
        self.read_state.resolve_attribute(name)
    }

    fn resolve_event(
        &self,
        batch: &BatchTransaction,
        name: &str,
    ) -> std::result::Result<Option<Arc<Event>>, HandleError> {
        if let Some(event) = self.read_state.resolve_event(name)? {
            return Ok(Some(event));
        }
        batch.common().resolve_event(name)
    }

    fn make_read_handle(
        &self,
        batch: &BatchTransaction,
        attribute: &Attribute,
    ) -> std::result::Result<Option<ReadHandle>, HandleError> {
        if *attribute == Self::value_attribute() {
            return self.read_state.value_read_handle(batch.read_block()).map(Some);
        }
        self.read_state.make_read_handle(batch.read_block(), attribute)
    }

    fn make_write_handle(&self, _attribute: &Attribute) -> Option<WriteHandle> {
        None
    }

    fn as_input(&self) -> Option<&dyn AbstractInput> {
        Some(self)
    }

    fn as_input_mut(&mut self) -> Option<&mut dyn AbstractInput> {
        Some(self)
    }

    fn as_output(&self) -> Option<&dyn AbstractOutput> {
        None
    }

    fn as_output_mut(&mut self) -> Option<&mut dyn AbstractOutput> {
        None
    }
}

impl<T: PointValue> AbstractInput for InputPoint<T> {
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
