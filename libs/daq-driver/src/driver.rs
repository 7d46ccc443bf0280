//! Driver: point and transaction arena
//!
//! The [`Driver`] owns every point and every batch transaction. Batches refer
//! to their points by [`PointId`] and points to their batch by [`BatchId`], so
//! there are no reference cycles and everything is dropped together.
//!
//! A driver is assembled with [`DriverBuilder`]; `build()` attaches every
//! tracker to its transaction's data blocks, so a finished driver is always
//! fully resolved.

use bytes::Bytes;
use daq_model::{
    Attribute, ByteOrder, DataType, ErrorCode, HandleError, PointValue, Timestamp, Value,
};
use daq_store::{Clock, DataArray, DataBlock};
use rustc_hash::FxHashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::batch::{BatchId, BatchTransaction, WriteCommand};
use crate::common_read_state::CommonReadState;
use crate::error::{DriverError, Result};
use crate::event::{Event, EventSink, PendingEventList};
use crate::handle::{ReadHandle, WriteHandle};
use crate::input::InputPoint;
use crate::output::OutputPoint;
use crate::point::{DataPoint, PointId};
use crate::transport::Transport;

// ============================================================================
// Builder
// ============================================================================

struct BatchSpec {
    id: Arc<str>,
    poll_interval: Duration,
    inputs: Vec<PointId>,
    outputs: Vec<PointId>,
}

#[derive(Default)]
pub struct DriverBuilder {
    batches: Vec<BatchSpec>,
    batch_index: FxHashMap<Arc<str>, BatchId>,
    points: Vec<Box<dyn DataPoint>>,
    point_index: FxHashMap<Arc<str>, PointId>,
}

impl DriverBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_batch(&mut self, id: &str, poll_interval: Duration) -> Result<BatchId> {
        if self.batch_index.contains_key(id) {
            return Err(DriverError::DuplicateId {
                kind: "batch transaction",
                id: id.to_string(),
            });
        }
        let batch_id = BatchId(self.batches.len());
        let id: Arc<str> = Arc::from(id);
        self.batch_index.insert(Arc::clone(&id), batch_id);
        self.batches.push(BatchSpec {
            id,
            poll_interval,
            inputs: Vec::new(),
            outputs: Vec::new(),
        });
        Ok(batch_id)
    }

    /// Resolve a batch transaction reference by name
    pub fn resolve_batch(&self, id: &str) -> Result<BatchId> {
        self.batch_index
            .get(id)
            .copied()
            .ok_or_else(|| DriverError::UnknownBatch(id.to_string()))
    }

    pub fn add_input<T: PointValue>(
        &mut self,
        id: &str,
        batch: &str,
        offset: usize,
        byte_order: ByteOrder,
    ) -> Result<PointId> {
        let batch = self.resolve_batch(batch)?;
        let id = self.claim_point_id(id)?;
        let point = InputPoint::<T>::new(Arc::clone(&id), batch, offset, byte_order);
        Ok(self.register(id, Box::new(point)))
    }

    pub fn add_output<T: PointValue>(
        &mut self,
        id: &str,
        batch: &str,
        offset: usize,
        byte_order: ByteOrder,
    ) -> Result<PointId> {
        let batch = self.resolve_batch(batch)?;
        let id = self.claim_point_id(id)?;
        let point = OutputPoint::<T>::new(Arc::clone(&id), batch, offset, byte_order);
        Ok(self.register(id, Box::new(point)))
    }

    fn claim_point_id(&self, id: &str) -> Result<Arc<str>> {
        if self.point_index.contains_key(id) {
            return Err(DriverError::DuplicateId {
                kind: "point",
                id: id.to_string(),
            });
        }
        Ok(Arc::from(id))
    }

    fn register(&mut self, id: Arc<str>, point: Box<dyn DataPoint>) -> PointId {
        let point_id = PointId(self.points.len());
        if let Some(batch) = self.batches.get_mut(point.batch().0) {
            if point.as_input().is_some() {
                batch.inputs.push(point_id);
            }
            if point.as_output().is_some() {
                batch.outputs.push(point_id);
            }
        }
        self.point_index.insert(id, point_id);
        self.points.push(point);
        point_id
    }

    /// Attach every tracker and freeze the data blocks
    pub fn build(self) -> Result<Driver> {
        let DriverBuilder {
            batches: specs,
            batch_index,
            mut points,
            point_index,
        } = self;

        let mut batches = Vec::with_capacity(specs.len());
        for spec in specs {
            let mut common = CommonReadState::new(Arc::clone(&spec.id));

            let mut read_array = DataArray::new();
            let mut read_events = 0;
            common.attach(&mut read_array, &mut read_events);
            for id in &spec.inputs {
                let input = points
                    .get_mut(id.0)
                    .and_then(|p| p.as_input_mut())
                    .ok_or(DriverError::InvalidIndex {
                        kind: "input",
                        index: id.0,
                    })?;
                input.attach_input(&mut read_array, &mut read_events);
            }

            let mut write_array = DataArray::new();
            let mut write_events = 0;
            for id in &spec.outputs {
                let output = points
                    .get_mut(id.0)
                    .and_then(|p| p.as_output_mut())
                    .ok_or(DriverError::InvalidIndex {
                        kind: "output",
                        index: id.0,
                    })?;
                output.attach_output(&mut write_array, &mut write_events);
            }

            if spec.inputs.is_empty() {
                warn!("Batch transaction '{}' has no points", spec.id);
            }
            debug!(
                "Batch transaction '{}': {} inputs, {} outputs, {} read / {} write events max",
                spec.id,
                spec.inputs.len(),
                spec.outputs.len(),
                read_events,
                write_events
            );

            batches.push(BatchTransaction {
                id: spec.id,
                poll_interval: spec.poll_interval,
                common,
                inputs: spec.inputs,
                outputs: spec.outputs,
                read_block: Arc::new(DataBlock::new(read_array)),
                write_block: Arc::new(DataBlock::new(write_array)),
                read_event_capacity: read_events,
                write_event_capacity: write_events,
            });
        }

        info!(
            "Driver built: {} batch transactions, {} points",
            batches.len(),
            points.len()
        );

        Ok(Driver {
            batches,
            batch_index,
            points,
            point_index,
        })
    }
}

// ============================================================================
// Driver
// ============================================================================

/// Summary of one executed cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub batch: BatchId,
    pub timestamp: Timestamp,
    /// Transport error, if the read or write failed
    pub error: Option<ErrorCode>,
    /// Points updated (read cycle) or written (write cycle)
    pub points: usize,
    pub events: usize,
}

pub struct Driver {
    batches: Vec<BatchTransaction>,
    batch_index: FxHashMap<Arc<str>, BatchId>,
    points: Vec<Box<dyn DataPoint>>,
    point_index: FxHashMap<Arc<str>, PointId>,
}

impl Driver {
    pub fn builder() -> DriverBuilder {
        DriverBuilder::new()
    }

    pub fn batch_id(&self, id: &str) -> Option<BatchId> {
        self.batch_index.get(id).copied()
    }

    pub fn point_id(&self, id: &str) -> Option<PointId> {
        self.point_index.get(id).copied()
    }

    pub fn batch(&self, id: BatchId) -> Result<&BatchTransaction> {
        self.batches.get(id.0).ok_or(DriverError::InvalidIndex {
            kind: "batch transaction",
            index: id.0,
        })
    }

    pub fn point(&self, id: PointId) -> Result<&dyn DataPoint> {
        self.points
            .get(id.0)
            .map(|p| p.as_ref())
            .ok_or(DriverError::InvalidIndex {
                kind: "point",
                index: id.0,
            })
    }

    pub fn batches(&self) -> impl Iterator<Item = (BatchId, &BatchTransaction)> {
        self.batches.iter().enumerate().map(|(i, b)| (BatchId(i), b))
    }

    pub fn points(&self) -> impl Iterator<Item = (PointId, &dyn DataPoint)> {
        self.points
            .iter()
            .enumerate()
            .map(|(i, p)| (PointId(i), p.as_ref()))
    }

    fn point_with_batch(&self, id: PointId) -> Result<(&dyn DataPoint, &BatchTransaction)> {
        let point = self.point(id)?;
        let batch = self.batch(point.batch())?;
        Ok((point, batch))
    }

    // ------------------------------------------------------------------------
    // Attribute, event and handle access
    // ------------------------------------------------------------------------

    pub fn resolve_attribute(&self, point: PointId, name: &str) -> Result<Attribute> {
        self.point(point)?
            .resolve_attribute(name)?
            .ok_or(DriverError::Handle(HandleError::Unknown))
    }

    pub fn resolve_event(&self, point: PointId, name: &str) -> Result<Arc<Event>> {
        let (point, batch) = self.point_with_batch(point)?;
        point
            .resolve_event(batch, name)?
            .ok_or(DriverError::Handle(HandleError::Unknown))
    }

    /// Every attribute of a point, in lookup order
    pub fn attributes(&self, point: PointId) -> Result<Vec<Attribute>> {
        let mut attributes = Vec::new();
        self.point(point)?.for_each_attribute(&mut |a| {
            attributes.push(*a);
            false
        });
        Ok(attributes)
    }

    /// Every event of a point, in lookup order
    pub fn events(&self, point: PointId) -> Result<Vec<Arc<Event>>> {
        let (point, batch) = self.point_with_batch(point)?;
        let mut events = Vec::new();
        point.for_each_event(batch, &mut |e| {
            events.push(Arc::clone(e));
            false
        });
        Ok(events)
    }

    pub fn read_handle(&self, point: PointId, attribute: &Attribute) -> Result<ReadHandle> {
        let (point, batch) = self.point_with_batch(point)?;
        if !attribute.access().is_readable() {
            return Err(HandleError::Unknown.into());
        }
        point
            .make_read_handle(batch, attribute)?
            .ok_or(DriverError::Handle(HandleError::Unknown))
    }

    pub fn write_handle(&self, point: PointId, attribute: &Attribute) -> Result<WriteHandle> {
        let point = self.point(point)?;
        if !attribute.access().is_writable() {
            return Err(HandleError::ReadOnly.into());
        }
        point
            .make_write_handle(attribute)
            .ok_or(DriverError::Handle(HandleError::Unknown))
    }

    /// Read the committed value of a point attribute by name
    pub fn read_value(&self, point: PointId, name: &str) -> Result<Value> {
        let attribute = self.resolve_attribute(point, name)?;
        Ok(self.read_handle(point, &attribute)?.read()?)
    }

    /// Schedule a value for an output's next write cycle
    pub fn schedule_value(&self, point: PointId, value: Value) -> Result<()> {
        let attribute = self.resolve_attribute(point, daq_model::attributes::VALUE)?;
        Ok(self.write_handle(point, &attribute)?.write(value)?)
    }

    pub fn resolve_batch_attribute(&self, batch: BatchId, name: &str) -> Result<Attribute> {
        self.batch(batch)?
            .resolve_attribute(name)?
            .ok_or(DriverError::Handle(HandleError::Unknown))
    }

    pub fn resolve_batch_event(&self, batch: BatchId, name: &str) -> Result<Arc<Event>> {
        self.batch(batch)?
            .resolve_event(name)?
            .ok_or(DriverError::Handle(HandleError::Unknown))
    }

    pub fn batch_read_handle(&self, batch: BatchId, attribute: &Attribute) -> Result<ReadHandle> {
        self.batch(batch)?
            .make_read_handle(attribute)?
            .ok_or(DriverError::Handle(HandleError::Unknown))
    }

    // ------------------------------------------------------------------------
    // Cycles
    // ------------------------------------------------------------------------

    /// Record the result of a transaction read
    ///
    /// Updates the common read state, then every input in registration
    /// order, and commits the read block once. Returns the events to raise,
    /// in order. On `Err` nothing was committed.
    pub fn apply_read_result(
        &self,
        batch_id: BatchId,
        timestamp: Timestamp,
        payload: std::result::Result<&Bytes, ErrorCode>,
    ) -> Result<PendingEventList> {
        let batch = self.batch(batch_id)?;
        let mut events = PendingEventList::with_capacity(batch.read_event_capacity);
        let mut sentinel = batch.read_block.write()?;

        let common = batch
            .common
            .update(&mut sentinel, timestamp, payload.err(), &mut events)?;

        let mut changed = 0;
        for &id in &batch.inputs {
            let input = self.point(id)?.as_input().ok_or(DriverError::InvalidIndex {
                kind: "input",
                index: id.0,
            })?;
            if input
                .update_read_state(&mut sentinel, timestamp, payload, &common, &mut events)?
                .any()
            {
                changed += 1;
            }
        }

        sentinel.commit();
        debug!(
            "Batch '{}' read: {} of {} points changed, {} events",
            batch.id,
            changed,
            batch.inputs.len(),
            events.len()
        );
        Ok(events)
    }

    /// Drain the pending values of a transaction's outputs into one command
    ///
    /// Returns None if no output had a value pending.
    pub fn take_write_command(&self, batch_id: BatchId) -> Result<Option<WriteCommand>> {
        let batch = self.batch(batch_id)?;
        let mut command = WriteCommand::new();
        for &id in &batch.outputs {
            if let Some(output) = self.point(id)?.as_output() {
                output.add_to_write_command(id, &mut command);
            }
        }
        Ok((!command.is_empty()).then_some(command))
    }

    /// Record the outcome of an executed write command
    ///
    /// Only the outputs that contributed to `command` are updated.
    pub fn apply_write_result(
        &self,
        batch_id: BatchId,
        timestamp: Timestamp,
        command: &WriteCommand,
        result: std::result::Result<(), ErrorCode>,
    ) -> Result<PendingEventList> {
        let batch = self.batch(batch_id)?;
        let error = result.err();
        let mut events = PendingEventList::with_capacity(batch.write_event_capacity);
        let mut sentinel = batch.write_block.write()?;

        for id in command.points() {
            let point = self.point(id)?;
            let output = point
                .as_output()
                .filter(|_| point.batch() == batch_id)
                .ok_or(DriverError::InvalidIndex {
                    kind: "output",
                    index: id.0,
                })?;
            output.update_write_state(&mut sentinel, timestamp, error, &mut events)?;
        }

        sentinel.commit();
        debug!(
            "Batch '{}' write: {} points, error={:?}",
            batch.id,
            command.len(),
            error
        );
        Ok(events)
    }

    /// Read the transaction through `transport` and raise the resulting events
    pub async fn run_read_cycle(
        &self,
        batch_id: BatchId,
        transport: &dyn Transport,
        clock: &dyn Clock,
        sink: &dyn EventSink,
    ) -> Result<CycleReport> {
        let batch = self.batch(batch_id)?;
        let payload = transport.read(batch.id()).await;
        let timestamp = clock.now();

        let events = self.apply_read_result(batch_id, timestamp, payload.as_ref().map_err(|e| *e))?;
        sink.raise(timestamp, events.as_slice());

        Ok(CycleReport {
            batch: batch_id,
            timestamp,
            error: payload.err(),
            points: batch.inputs.len(),
            events: events.len(),
        })
    }

    /// Write the pending output values of the transaction, if any
    ///
    /// Returns None without touching the transport when nothing is pending.
    pub async fn run_write_cycle(
        &self,
        batch_id: BatchId,
        transport: &dyn Transport,
        clock: &dyn Clock,
        sink: &dyn EventSink,
    ) -> Result<Option<CycleReport>> {
        let batch = self.batch(batch_id)?;
        let Some(command) = self.take_write_command(batch_id)? else {
            return Ok(None);
        };

        let result = transport.write(batch.id(), &command).await;
        let timestamp = clock.now();

        let events = self.apply_write_result(batch_id, timestamp, &command, result)?;
        sink.raise(timestamp, events.as_slice());

        Ok(Some(CycleReport {
            batch: batch_id,
            timestamp,
            error: result.err(),
            points: command.len(),
            events: events.len(),
        }))
    }

    /// Data type of a point's value, for diagnostics
    pub fn point_data_type(&self, point: PointId) -> Result<DataType> {
        Ok(self.point(point)?.data_type())
    }
}

impl std::fmt::Debug for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver")
            .field("batches", &self.batches)
            .field("points", &self.points.len())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use chrono::DateTime;
    use daq_model::{attributes, Access, Direction, Quality};
    use tracing_test::traced_test;

    fn ts(millis: i64) -> Timestamp {
        DateTime::from_timestamp_millis(millis).unwrap()
    }

    fn sample_driver() -> Driver {
        let mut builder = Driver::builder();
        builder.add_batch("poll1", Duration::from_millis(100)).unwrap();
        builder
            .add_input::<f64>("temperature", "poll1", 0, ByteOrder::BigEndian)
            .unwrap();
        builder
            .add_output::<u16>("setpoint", "poll1", 8, ByteOrder::BigEndian)
            .unwrap();
        builder.build().unwrap()
    }

    #[test]
    fn test_unknown_batch_reference() {
        let mut builder = Driver::builder();
        let err = builder
            .add_input::<bool>("alarm", "missing", 0, ByteOrder::BigEndian)
            .unwrap_err();
        assert!(matches!(err, DriverError::UnknownBatch(ref b) if b == "missing"));
    }

    #[test]
    fn test_duplicate_ids() {
        let mut builder = Driver::builder();
        builder.add_batch("poll1", Duration::from_millis(1)).unwrap();
        assert!(builder.add_batch("poll1", Duration::from_millis(1)).is_err());
        builder
            .add_input::<bool>("alarm", "poll1", 0, ByteOrder::BigEndian)
            .unwrap();
        assert!(matches!(
            builder.add_output::<bool>("alarm", "poll1", 1, ByteOrder::BigEndian),
            Err(DriverError::DuplicateId { kind: "point", .. })
        ));
    }

    #[test]
    fn test_outputs_are_read_back() {
        let driver = sample_driver();
        let batch = driver.batch(driver.batch_id("poll1").unwrap()).unwrap();
        assert_eq!(batch.inputs().len(), 2);
        assert_eq!(batch.outputs().len(), 1);
        // read, 3 per input + 3 for the output's read state
        assert_eq!(batch.read_event_capacity(), 7);
        assert_eq!(batch.write_event_capacity(), 1);
    }

    #[test]
    fn test_attribute_lookup_order_and_access() {
        let driver = sample_driver();
        let setpoint = driver.point_id("setpoint").unwrap();
        let temperature = driver.point_id("temperature").unwrap();

        let names: Vec<_> = driver
            .attributes(setpoint)
            .unwrap()
            .iter()
            .map(|a| a.name())
            .collect();
        assert_eq!(
            names,
            vec!["value", "quality", "error", "updateTime", "changeTime", "writeTime", "writeError"]
        );

        let value = driver.resolve_attribute(setpoint, "value").unwrap();
        assert_eq!(value.access(), Access::ReadWrite);
        assert_eq!(value.data_type(), DataType::UInt16);

        let value = driver.resolve_attribute(temperature, "value").unwrap();
        assert_eq!(value.access(), Access::ReadOnly);
        assert!(matches!(
            driver.write_handle(temperature, &value),
            Err(DriverError::Handle(HandleError::ReadOnly))
        ));

        assert!(matches!(
            driver.resolve_attribute(temperature, "writeTime"),
            Err(DriverError::Handle(HandleError::Unknown))
        ));
    }

    #[test]
    fn test_point_events_include_batch_read() {
        let driver = sample_driver();
        let setpoint = driver.point_id("setpoint").unwrap();
        let names: Vec<_> = driver
            .events(setpoint)
            .unwrap()
            .iter()
            .map(|e| e.name())
            .collect();
        assert_eq!(
            names,
            vec!["valueChanged", "qualityChanged", "errorChanged", "read", "written", "writeError"]
        );

        let read = driver.resolve_event(setpoint, "read").unwrap();
        let batch_read = driver
            .resolve_batch_event(driver.batch_id("poll1").unwrap(), "read")
            .unwrap();
        assert!(Arc::ptr_eq(&read, &batch_read));
        let written = driver.resolve_event(setpoint, "written").unwrap();
        assert_eq!(written.direction(), Direction::Output);
    }

    #[test]
    fn test_read_result_updates_points_and_batch() {
        let driver = sample_driver();
        let batch = driver.batch_id("poll1").unwrap();
        let temperature = driver.point_id("temperature").unwrap();

        let mut image = 21.5f64.encode(ByteOrder::BigEndian).to_vec();
        image.extend_from_slice(&7u16.to_be_bytes());
        let payload = Bytes::from(image);

        let events = driver.apply_read_result(batch, ts(100), Ok(&payload)).unwrap();
        assert_eq!(events.names()[0], "read");
        assert_eq!(events.len(), 7);

        assert_eq!(driver.read_value(temperature, "value").unwrap(), Value::Float(21.5));
        assert_eq!(
            driver.read_value(temperature, "quality").unwrap(),
            Value::Quality(Quality::Good)
        );

        let batch_quality = driver
            .batch_read_handle(batch, &driver.resolve_batch_attribute(batch, "quality").unwrap())
            .unwrap();
        assert_eq!(batch_quality.read().unwrap(), Value::Quality(Quality::Good));
    }

    #[test]
    fn test_write_command_collects_only_pending_outputs() {
        let driver = sample_driver();
        let batch = driver.batch_id("poll1").unwrap();
        let setpoint = driver.point_id("setpoint").unwrap();

        assert!(driver.take_write_command(batch).unwrap().is_none());

        driver.schedule_value(setpoint, Value::UInt(5)).unwrap();
        driver.schedule_value(setpoint, Value::UInt(6)).unwrap();
        let command = driver.take_write_command(batch).unwrap().unwrap();
        assert_eq!(command.len(), 1);
        assert_eq!(command.entries()[0].offset, 8);
        assert_eq!(command.entries()[0].data.as_ref(), &[0, 6]);
        assert!(driver.take_write_command(batch).unwrap().is_none());

        let events = driver
            .apply_write_result(batch, ts(50), &command, Err(ErrorCode::Timeout))
            .unwrap();
        assert_eq!(events.names(), vec!["writeError"]);
        assert_eq!(
            driver.read_value(setpoint, "writeError").unwrap(),
            Value::Error(Some(ErrorCode::Timeout))
        );
    }

    #[test]
    fn test_write_handle_expires_with_driver() {
        let driver = sample_driver();
        let setpoint = driver.point_id("setpoint").unwrap();
        let attribute = Attribute::new(attributes::VALUE, Access::ReadWrite, DataType::UInt16);
        let handle = driver.write_handle(setpoint, &attribute).unwrap();
        handle.write(Value::UInt(1)).unwrap();

        drop(driver);
        assert_eq!(handle.write(Value::UInt(2)), Err(HandleError::Expired));
    }

    #[test]
    #[traced_test]
    fn test_read_failure_transition_is_logged() {
        let driver = sample_driver();
        let batch = driver.batch_id("poll1").unwrap();
        let payload = Bytes::from(vec![0u8; 10]);

        driver.apply_read_result(batch, ts(1), Ok(&payload)).unwrap();
        assert!(logs_contain("read recovered"));

        driver
            .apply_read_result(batch, ts(2), Err(ErrorCode::Timeout))
            .unwrap();
        assert!(logs_contain("Batch 'poll1' read failed"));
    }
}
