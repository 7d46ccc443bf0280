//! Per-value read state
//!
//! Tracks value, quality, error, update time and change time of one input
//! inside the transaction's read data block, and decides which change events
//! an update raises.

use daq_model::{
    attributes, events, Attribute, Direction, ErrorCode, HandleError, PointValue, Timestamp, Value,
};
use daq_store::{DataArray, DataBlock, SlotHandle, WriteSentinel};
use std::sync::Arc;
use tracing::trace;

use crate::common_read_state::CommonUpdate;
use crate::error::Result;
use crate::event::{Event, PendingEventList};
use crate::handle::ReadHandle;
use crate::value_cell::{ChangeSet, ValueCell};

#[derive(Debug)]
pub struct PerValueReadState<T: PointValue> {
    source: Arc<str>,
    value_changed: Arc<Event>,
    quality_changed: Arc<Event>,
    error_changed: Arc<Event>,
    slot: Option<SlotHandle<ValueCell<T>>>,
}

impl<T: PointValue> PerValueReadState<T> {
    /// Attributes besides `value`, whose access depends on the point kind
    pub const ATTRIBUTES: [Attribute; 4] = [
        attributes::QUALITY,
        attributes::ERROR,
        attributes::UPDATE_TIME,
        attributes::CHANGE_TIME,
    ];

    pub const EVENT_COUNT: usize = 3;

    pub fn new(source: Arc<str>) -> Self {
        let event = |name| Event::new(name, Arc::clone(&source), Direction::Input);
        Self {
            value_changed: event(events::VALUE_CHANGED),
            quality_changed: event(events::QUALITY_CHANGED),
            error_changed: event(events::ERROR_CHANGED),
            source,
            slot: None,
        }
    }

    pub fn attach(&mut self, array: &mut DataArray, event_count: &mut usize) {
        self.slot = Some(array.append(ValueCell::<T>::default()));
        *event_count += Self::EVENT_COUNT;
    }

    pub fn is_attached(&self) -> bool {
        self.slot.is_some()
    }

    fn slot(&self) -> std::result::Result<SlotHandle<ValueCell<T>>, HandleError> {
        self.slot.ok_or(HandleError::InvalidArgument)
    }

    fn events(&self) -> [&Arc<Event>; 3] {
        [&self.value_changed, &self.quality_changed, &self.error_changed]
    }

    pub fn for_each_attribute(&self, visit: &mut dyn FnMut(&Attribute) -> bool) -> bool {
        Self::ATTRIBUTES.iter().any(|a| visit(a))
    }

    pub fn for_each_event(&self, visit: &mut dyn FnMut(&Arc<Event>) -> bool) -> bool {
        self.events().into_iter().any(|e| visit(e))
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
        Ok(self
            .events()
            .into_iter()
            .find(|e| e.name() == name)
            .map(Arc::clone))
    }

    /// Read handle for the point's value
    pub fn value_read_handle(
        &self,
        block: &Arc<DataBlock>,
    ) -> std::result::Result<ReadHandle, HandleError> {
        Ok(ReadHandle::new(
            Arc::clone(block),
            self.slot()?,
            T::DATA_TYPE,
            |cell: &ValueCell<T>| cell.value.to_value(),
        ))
    }

    pub fn make_read_handle(
        &self,
        block: &Arc<DataBlock>,
        attribute: &Attribute,
    ) -> std::result::Result<Option<ReadHandle>, HandleError> {
        let slot = self.slot()?;
        let block = Arc::clone(block);
        let data_type = attribute.data_type();
        let handle = match attribute.name() {
            "quality" => ReadHandle::new(block, slot, data_type, |c: &ValueCell<T>| {
                Value::Quality(c.quality)
            }),
            "error" => {
                ReadHandle::new(block, slot, data_type, |c: &ValueCell<T>| Value::Error(c.error))
            }
            "updateTime" => ReadHandle::new(block, slot, data_type, |c: &ValueCell<T>| {
                Value::Timestamp(c.update_time)
            }),
            "changeTime" => ReadHandle::new(block, slot, data_type, |c: &ValueCell<T>| {
                Value::Timestamp(c.change_time)
            }),
            _ => return Ok(None),
        };
        Ok(Some(handle))
    }

    /// Committed state
    pub fn cell(&self, block: &DataBlock) -> Result<ValueCell<T>> {
        Ok(block.read(self.slot()?)?)
    }

    /// Apply one read outcome
    ///
    /// `outcome` is this point's own decode result; `common` is the update the
    /// transaction's common read state made earlier in the same cycle. Queues
    /// at most one event per changed aspect: `valueChanged`, `qualityChanged`,
    /// `errorChanged`, in that order.
    pub fn update(
        &self,
        sentinel: &mut WriteSentinel<'_>,
        timestamp: Timestamp,
        outcome: std::result::Result<T, ErrorCode>,
        common: &CommonUpdate,
        events: &mut PendingEventList,
    ) -> Result<ChangeSet> {
        let slot = self.slot()?;
        let (cell, changes) = sentinel.get(slot)?.updated(timestamp, outcome, common.error());

        if changes.value {
            events.push(&self.value_changed);
        }
        if changes.quality {
            events.push(&self.quality_changed);
        }
        if changes.error {
            events.push(&self.error_changed);
        }

        if changes.any() {
            trace!(
                "Point '{}': value={:?} quality={} error={:?} (batch changes: {:?})",
                self.source,
                cell.value,
                cell.quality,
                cell.error,
                common.changes
            );
        }

        sentinel.set(slot, cell)?;
        Ok(changes)
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::value_cell::{StateChanges, StatusCell};
    use chrono::DateTime;
    use daq_model::Quality;

    fn ts(millis: i64) -> Timestamp {
        DateTime::from_timestamp_millis(millis).unwrap()
    }

    fn common(error: Option<ErrorCode>) -> CommonUpdate {
        CommonUpdate {
            state: StatusCell {
                quality: Quality::from_error(error),
                error,
                update_time: ts(0),
            },
            changes: StateChanges::default(),
        }
    }

    fn attached<T: PointValue>() -> (PerValueReadState<T>, Arc<DataBlock>) {
        let mut state = PerValueReadState::<T>::new(Arc::from("temp"));
        let mut array = DataArray::new();
        let mut event_count = 0;
        state.attach(&mut array, &mut event_count);
        assert_eq!(event_count, 3);
        (state, Arc::new(DataBlock::new(array)))
    }

    fn apply<T: PointValue>(
        state: &PerValueReadState<T>,
        block: &DataBlock,
        at: i64,
        outcome: std::result::Result<T, ErrorCode>,
        shared: Option<ErrorCode>,
    ) -> Vec<&'static str> {
        let mut events = PendingEventList::with_capacity(3);
        let mut sentinel = block.write().unwrap();
        state
            .update(&mut sentinel, ts(at), outcome, &common(shared), &mut events)
            .unwrap();
        sentinel.commit();
        events.names()
    }

    #[test]
    fn test_first_good_read_raises_all_three() {
        let (state, block) = attached::<f64>();
        assert_eq!(
            apply(&state, &block, 1, Ok(2.0), None),
            vec!["valueChanged", "qualityChanged", "errorChanged"]
        );
    }

    #[test]
    fn test_unchanged_read_raises_nothing() {
        let (state, block) = attached::<u32>();
        apply(&state, &block, 1, Ok(5), None);
        assert!(apply(&state, &block, 2, Ok(5), None).is_empty());

        let cell = state.cell(&block).unwrap();
        assert_eq!(cell.update_time, ts(2));
        assert_eq!(cell.change_time, ts(1));
    }

    #[test]
    fn test_error_to_other_error_raises_error_changed_only() {
        let (state, block) = attached::<i16>();
        apply(&state, &block, 1, Err(ErrorCode::Timeout), None);
        assert_eq!(
            apply(&state, &block, 2, Err(ErrorCode::InvalidValue), None),
            vec!["errorChanged"]
        );
    }

    #[test]
    fn test_shared_failure_masks_good_decode() {
        let (state, block) = attached::<f64>();
        apply(&state, &block, 1, Ok(1.0), None);
        assert_eq!(
            apply(&state, &block, 2, Ok(9.0), Some(ErrorCode::ConnectionLost)),
            vec!["qualityChanged", "errorChanged"]
        );
        let cell = state.cell(&block).unwrap();
        assert_eq!(cell.value, 1.0);
        assert_eq!(cell.error, Some(ErrorCode::ConnectionLost));
    }

    #[test]
    fn test_value_read_handle() {
        let (state, block) = attached::<bool>();
        let handle = state.value_read_handle(&block).unwrap();
        assert_eq!(handle.read().unwrap(), Value::Bool(false));
        apply(&state, &block, 1, Ok(true), None);
        assert_eq!(handle.read().unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_resolve_event_returns_same_instance() {
        let (state, _block) = attached::<f32>();
        let first = state.resolve_event("qualityChanged").unwrap().unwrap();
        let second = state.resolve_event("qualityChanged").unwrap().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(state.resolve_event("read").unwrap().is_none());
    }

    #[test]
    fn test_unattached_handle_fails() {
        let state = PerValueReadState::<f64>::new(Arc::from("x"));
        let block = Arc::new(DataBlock::new(DataArray::new()));
        assert_eq!(
            state.value_read_handle(&block).unwrap_err(),
            HandleError::InvalidArgument
        );
    }
}
