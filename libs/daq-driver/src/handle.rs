//! Read and write handles
//!
//! Handles are how a host reaches point state without knowing the point's
//! concrete type. A read handle reads one attribute from the committed data
//! block snapshot. A write handle schedules a value for an output's next
//! write cycle; it holds the output's pending slot weakly and reports
//! [`HandleError::Expired`] once the driver that owns the point is gone.

use daq_model::{DataType, HandleError, PointValue, Value};
use daq_store::{DataBlock, SlotHandle};
use std::fmt;
use std::sync::{Arc, Weak};

use crate::pending::SingleValueQueue;

type ReadFn = dyn Fn() -> Result<Value, HandleError> + Send + Sync;
type WriteFn = dyn Fn(Value) -> Result<(), HandleError> + Send + Sync;

/// Reads one attribute of one point
#[derive(Clone)]
pub struct ReadHandle {
    data_type: DataType,
    read: Arc<ReadFn>,
}

impl ReadHandle {
    /// Handle projecting the slot `slot` of `block` through `project`
    pub fn new<S, F>(
        block: Arc<DataBlock>,
        slot: SlotHandle<S>,
        data_type: DataType,
        project: F,
    ) -> Self
    where
        S: 'static,
        F: Fn(&S) -> Value + Send + Sync + 'static,
    {
        Self {
            data_type,
            read: Arc::new(move || {
                block
                    .read_with(slot, &project)
                    .map_err(|_| HandleError::InvalidArgument)
            }),
        }
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Current committed value of the attribute
    pub fn read(&self) -> Result<Value, HandleError> {
        (self.read)()
    }
}

impl fmt::Debug for ReadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadHandle")
            .field("data_type", &self.data_type)
            .finish_non_exhaustive()
    }
}

/// Schedules values for an output point
#[derive(Clone)]
pub struct WriteHandle {
    data_type: DataType,
    write: Arc<WriteFn>,
}

impl WriteHandle {
    pub fn new<T: PointValue>(queue: Weak<SingleValueQueue<T>>) -> Self {
        Self {
            data_type: T::DATA_TYPE,
            write: Arc::new(move |value: Value| {
                let typed = T::from_value(&value).ok_or(HandleError::TypeMismatch {
                    expected: T::DATA_TYPE,
                    actual: value.kind(),
                })?;
                let queue = queue.upgrade().ok_or(HandleError::Expired)?;
                queue.enqueue(typed);
                Ok(())
            }),
        }
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Schedule `value`, replacing any value still pending
    pub fn write(&self, value: Value) -> Result<(), HandleError> {
        (self.write)(value)
    }
}

impl fmt::Debug for WriteHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteHandle")
            .field("data_type", &self.data_type)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use daq_store::DataArray;

    #[test]
    fn test_read_handle_sees_commits() {
        let mut array = DataArray::new();
        let slot = array.append(10i32);
        let block = Arc::new(DataBlock::new(array));
        let handle = ReadHandle::new(Arc::clone(&block), slot, DataType::Int32, |v: &i32| {
            Value::Int(i64::from(*v))
        });

        assert_eq!(handle.read().unwrap(), Value::Int(10));

        let mut sentinel = block.write().unwrap();
        sentinel.set(slot, 11).unwrap();
        assert_eq!(handle.read().unwrap(), Value::Int(10));
        sentinel.commit();

        assert_eq!(handle.read().unwrap(), Value::Int(11));
    }

    #[test]
    fn test_write_handle_enqueues() {
        let queue = Arc::new(SingleValueQueue::<f64>::new());
        let handle = WriteHandle::new(Arc::downgrade(&queue));

        handle.write(Value::Float(1.0)).unwrap();
        handle.write(Value::Float(2.0)).unwrap();
        assert_eq!(queue.dequeue(), Some(2.0));
    }

    #[test]
    fn test_write_handle_type_mismatch() {
        let queue = Arc::new(SingleValueQueue::<u16>::new());
        let handle = WriteHandle::new(Arc::downgrade(&queue));

        let err = handle.write(Value::Bool(true)).unwrap_err();
        assert_eq!(
            err,
            HandleError::TypeMismatch {
                expected: DataType::UInt16,
                actual: "bool"
            }
        );
        assert!(!queue.is_pending());
    }

    #[test]
    fn test_write_handle_expires_with_target() {
        let queue = Arc::new(SingleValueQueue::<bool>::new());
        let handle = WriteHandle::new(Arc::downgrade(&queue));
        drop(queue);

        assert_eq!(handle.write(Value::Bool(true)), Err(HandleError::Expired));
    }
}
