//! Data Acquisition Model Library
//!
//! Core domain types shared by the storage layer, the driver core and the
//! service binary. This library is pure data: no I/O, no async.
//!
//! # Modules
//!
//! - `types`: Quality, error codes, timestamps, directions and data types
//! - `value`: Type-erased `Value` and the `PointValue` trait implemented by point value types
//! - `attribute`: Attribute descriptors and the well-known attribute/event names
//! - `error`: Errors returned by attribute/event accessors and handles
//!
//! # Example
//!
//! ```
//! use daq_model::{ByteOrder, PointValue, Value};
//!
//! let bytes = 3.5f64.encode(ByteOrder::BigEndian);
//! let decoded = f64::decode(&bytes, ByteOrder::BigEndian).unwrap();
//! assert_eq!(decoded.to_value(), Value::Float(3.5));
//! ```

pub mod attribute;
pub mod error;
pub mod types;
pub mod value;

// Re-exports for convenience
pub use attribute::{attributes, events, Access, Attribute};
pub use error::HandleError;
pub use types::{
    initial_timestamp, ByteOrder, DataType, Direction, Directions, ErrorCode, Quality, Timestamp,
};
pub use value::{PointValue, Value};
