//! Core domain types for data acquisition
//!
//! This module contains the fundamental types every data point is built from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Time stamp of a state update
pub type Timestamp = DateTime<Utc>;

/// The time stamp every state starts with, before its first update
pub fn initial_timestamp() -> Timestamp {
    DateTime::<Utc>::MIN_UTC
}

// ============================================================================
// Quality
// ============================================================================

/// Whether the current value of a point can be trusted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Quality {
    /// The value was read successfully
    Good,
    /// The value is stale or was never read; the error code says why
    #[default]
    Bad,
}

impl Quality {
    /// Quality from the presence of an error: `None` is Good, `Some(_)` is Bad
    pub fn from_error(error: Option<ErrorCode>) -> Self {
        if error.is_some() {
            Quality::Bad
        } else {
            Quality::Good
        }
    }

    /// Logical AND of two qualities
    ///
    /// # Examples
    /// ```
    /// # use daq_model::Quality;
    /// assert_eq!(Quality::Good.and(Quality::Good), Quality::Good);
    /// assert_eq!(Quality::Good.and(Quality::Bad), Quality::Bad);
    /// ```
    pub fn and(self, other: Quality) -> Quality {
        match (self, other) {
            (Quality::Good, Quality::Good) => Quality::Good,
            _ => Quality::Bad,
        }
    }

    pub fn is_good(&self) -> bool {
        matches!(self, Quality::Good)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::Good => "good",
            Quality::Bad => "bad",
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Error codes
// ============================================================================

/// Data error stored in a point or transaction state
///
/// These are never propagated as `Err` out of an update cycle; they are
/// recorded as state next to a Bad quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorCode {
    /// No update has happened yet
    #[error("not connected")]
    NotConnected,

    #[error("timeout waiting for device")]
    Timeout,

    #[error("connection lost")]
    ConnectionLost,

    /// Opaque error code reported by the device or transport
    #[error("device error {0}")]
    Device(u16),

    /// The payload ended before the point's value
    #[error("payload too short")]
    PayloadTooShort,

    /// The payload bytes do not form a valid value of the point's type
    #[error("invalid value in payload")]
    InvalidValue,
}

// ============================================================================
// Directions
// ============================================================================

/// I/O direction of a point or event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Direction {
    Input,
    Output,
}

/// Set of directions a point supports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Directions {
    input: bool,
    output: bool,
}

impl Directions {
    pub const INPUT: Directions = Directions {
        input: true,
        output: false,
    };
    pub const OUTPUT: Directions = Directions {
        input: false,
        output: true,
    };
    pub const INPUT_OUTPUT: Directions = Directions {
        input: true,
        output: true,
    };

    pub fn contains(&self, direction: Direction) -> bool {
        match direction {
            Direction::Input => self.input,
            Direction::Output => self.output,
        }
    }
}

// ============================================================================
// Data types
// ============================================================================

/// Data type of an attribute or point value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Bool,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    Float64,
    Quality,
    Timestamp,
    ErrorCode,
}

impl DataType {
    /// Whether a point's value can have this type
    ///
    /// Quality, time stamps and error codes only appear as state attributes.
    pub fn is_point_type(&self) -> bool {
        !matches!(
            self,
            DataType::Quality | DataType::Timestamp | DataType::ErrorCode
        )
    }

    /// Encoded size in a device payload, for point types
    pub fn encoded_size(&self) -> Option<usize> {
        match self {
            DataType::Bool => Some(1),
            DataType::Int16 | DataType::UInt16 => Some(2),
            DataType::Int32 | DataType::UInt32 | DataType::Float32 => Some(4),
            DataType::Int64 | DataType::UInt64 | DataType::Float64 => Some(8),
            DataType::Quality | DataType::Timestamp | DataType::ErrorCode => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Bool => "bool",
            DataType::Int16 => "int16",
            DataType::UInt16 => "uint16",
            DataType::Int32 => "int32",
            DataType::UInt32 => "uint32",
            DataType::Int64 => "int64",
            DataType::UInt64 => "uint64",
            DataType::Float32 => "float32",
            DataType::Float64 => "float64",
            DataType::Quality => "quality",
            DataType::Timestamp => "timestamp",
            DataType::ErrorCode => "errorcode",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Byte order
// ============================================================================

/// Byte order of a multi-byte value inside a device payload
///
/// For 32-bit value `0x12345678`:
/// - `BigEndian`: [0x12, 0x34, 0x56, 0x78]
/// - `LittleEndian`: [0x78, 0x56, 0x34, 0x12]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ByteOrder {
    /// Most significant byte first (network byte order)
    #[default]
    #[serde(alias = "ABCD", alias = "BE")]
    BigEndian,
    /// Least significant byte first
    #[serde(alias = "DCBA", alias = "LE")]
    LittleEndian,
}
