//! Data point interfaces
//!
//! Every point implements [`DataPoint`], which covers identity and the
//! attribute/event/handle surface. Input and output capabilities are separate
//! traits; a point advertises them through `as_input()` / `as_output()`, so
//! the batch transaction can drive each without knowing the concrete type.

use bytes::Bytes;
use daq_model::{
    Attribute, ByteOrder, DataType, Directions, ErrorCode, HandleError, PointValue, Timestamp,
};
use daq_store::{DataArray, WriteSentinel};
use std::fmt;
use std::sync::Arc;

use crate::batch::{BatchId, BatchTransaction, WriteCommand};
use crate::common_read_state::CommonUpdate;
use crate::error::Result;
use crate::event::{Event, PendingEventList};
use crate::handle::{ReadHandle, WriteHandle};
use crate::value_cell::{ChangeSet, StateChanges};

/// Index of a point in its driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PointId(pub(crate) usize);

impl PointId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for PointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A point exposed to the host
///
/// Methods that need transaction state take the point's own batch
/// transaction, which the driver looks up from [`DataPoint::batch`].
pub trait DataPoint: Send + Sync {
    fn id(&self) -> &str;

    /// Data type of the `value` attribute
    fn data_type(&self) -> DataType;

    fn directions(&self) -> Directions;

    fn batch(&self) -> BatchId;

    /// Visit attributes until `visit` returns true; returns whether it did
    fn for_each_attribute(&self, visit: &mut dyn FnMut(&Attribute) -> bool) -> bool;

    /// Visit events until `visit` returns true; returns whether it did
    fn for_each_event(
        &self,
        batch: &BatchTransaction,
        visit: &mut dyn FnMut(&Arc<Event>) -> bool,
    ) -> bool;

    fn resolve_attribute(&self, name: &str) -> std::result::Result<Option<Attribute>, HandleError>;

    fn resolve_event(
        &self,
        batch: &BatchTransaction,
        name: &str,
    ) -> std::result::Result<Option<Arc<Event>>, HandleError>;

    fn make_read_handle(
        &self,
        batch: &BatchTransaction,
        attribute: &Attribute,
    ) -> std::result::Result<Option<ReadHandle>, HandleError>;

    /// Write handle for a writable attribute; None if the attribute is not writable
    fn make_write_handle(&self, attribute: &Attribute) -> Option<WriteHandle>;

    fn as_input(&self) -> Option<&dyn AbstractInput>;
    fn as_input_mut(&mut self) -> Option<&mut dyn AbstractInput>;
    fn as_output(&self) -> Option<&dyn AbstractOutput>;
    fn as_output_mut(&mut self) -> Option<&mut dyn AbstractOutput>;
}

/// A point that is updated from a transaction's read payload
pub trait AbstractInput: Send + Sync {
    /// Reserve read block slots and account for the events an update can raise
    fn attach_input(&mut self, array: &mut DataArray, event_count: &mut usize);

    /// Decode this point from `payload` and record the new read state
    ///
    /// `payload` is the transaction's read result; decode failures are stored
    /// as state, never returned.
    fn update_read_state(
        &self,
        sentinel: &mut WriteSentinel<'_>,
        timestamp: Timestamp,
        payload: std::result::Result<&Bytes, ErrorCode>,
        common: &CommonUpdate,
        events: &mut PendingEventList,
    ) -> Result<ChangeSet>;
}

/// A point that contributes values to a transaction's write command
pub trait AbstractOutput: Send + Sync {
    /// Reserve write block slots and account for the events an update can raise
    fn attach_output(&mut self, array: &mut DataArray, event_count: &mut usize);

    /// Move the pending value, if any, into `command`; returns whether one was added
    fn add_to_write_command(&self, point: PointId, command: &mut WriteCommand) -> bool;

    /// Record the outcome of a write command this point contributed to
    fn update_write_state(
        &self,
        sentinel: &mut WriteSentinel<'_>,
        timestamp: Timestamp,
        error: Option<ErrorCode>,
        events: &mut PendingEventList,
    ) -> Result<StateChanges>;

    /// Whether a value is waiting for the next write cycle
    fn has_pending_value(&self) -> bool;
}

/// Decode a value at `offset` of a read payload
pub(crate) fn decode_at<T: PointValue>(
    payload: std::result::Result<&Bytes, ErrorCode>,
    offset: usize,
    byte_order: ByteOrder,
) -> std::result::Result<T, ErrorCode> {
    let bytes = payload?
        .get(offset..)
        .ok_or(ErrorCode::PayloadTooShort)?;
    T::decode(bytes, byte_order)
}
