//! Point values
//!
//! `PointValue` is implemented by every type a data point can carry. It ties
//! together the four things the driver core needs from a value type:
//! change detection, payload decoding, payload encoding and conversion to the
//! type-erased [`Value`] used by read and write handles.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{ByteOrder, DataType, ErrorCode, Quality, Timestamp};

/// Type-erased value delivered by read handles and accepted by write handles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum Value {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Quality(Quality),
    Timestamp(Timestamp),
    /// Error code attribute; `None` means no error
    Error(Option<ErrorCode>),
}

impl Value {
    /// Name of the variant, used in type mismatch errors
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::UInt(_) => "uint",
            Value::Float(_) => "float",
            Value::Quality(_) => "quality",
            Value::Timestamp(_) => "timestamp",
            Value::Error(_) => "error",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::UInt(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Quality(q) => write!(f, "{}", q),
            Value::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339()),
            Value::Error(Some(e)) => write!(f, "{}", e),
            Value::Error(None) => f.write_str("none"),
        }
    }
}

/// A type that can be the value of a data point
pub trait PointValue: Clone + Default + fmt::Debug + Send + Sync + 'static {
    /// Data type reported for the point's `value` attribute
    const DATA_TYPE: DataType;

    /// Whether `other` counts as a different value
    ///
    /// Must be consistent: `a.differs(&a)` is false for every `a`, including NaN.
    fn differs(&self, other: &Self) -> bool;

    /// Decode from the start of `bytes`
    fn decode(bytes: &[u8], order: ByteOrder) -> Result<Self, ErrorCode>;

    /// Encode for a write command
    fn encode(&self, order: ByteOrder) -> Bytes;

    fn to_value(&self) -> Value;

    /// Convert from a handle value, `None` if the value does not fit
    fn from_value(value: &Value) -> Option<Self>;
}

/// Take exactly `N` bytes from the start of the payload
fn take_bytes<const N: usize>(bytes: &[u8]) -> Result<[u8; N], ErrorCode> {
    bytes
        .get(..N)
        .and_then(|b| b.try_into().ok())
        .ok_or(ErrorCode::PayloadTooShort)
}

macro_rules! impl_integer_point_value {
    ($ty:ty, $data_type:expr, $variant:ident) => {
        impl PointValue for $ty {
            const DATA_TYPE: DataType = $data_type;

            fn differs(&self, other: &Self) -> bool {
                self != other
            }

            fn decode(bytes: &[u8], order: ByteOrder) -> Result<Self, ErrorCode> {
                let raw = take_bytes::<{ std::mem::size_of::<$ty>() }>(bytes)?;
                Ok(match order {
                    ByteOrder::BigEndian => <$ty>::from_be_bytes(raw),
                    ByteOrder::LittleEndian => <$ty>::from_le_bytes(raw),
                })
            }

            fn encode(&self, order: ByteOrder) -> Bytes {
                match order {
                    ByteOrder::BigEndian => Bytes::copy_from_slice(&self.to_be_bytes()),
                    ByteOrder::LittleEndian => Bytes::copy_from_slice(&self.to_le_bytes()),
                }
            }

            fn to_value(&self) -> Value {
                Value::$variant((*self).into())
            }

            fn from_value(value: &Value) -> Option<Self> {
                match *value {
                    Value::Int(v) => <$ty>::try_from(v).ok(),
                    Value::UInt(v) => <$ty>::try_from(v).ok(),
                    _ => None,
                }
            }
        }
    };
}

impl_integer_point_value!(i16, DataType::Int16, Int);
impl_integer_point_value!(u16, DataType::UInt16, UInt);
impl_integer_point_value!(i32, DataType::Int32, Int);
impl_integer_point_value!(u32, DataType::UInt32, UInt);
impl_integer_point_value!(i64, DataType::Int64, Int);
impl_integer_point_value!(u64, DataType::UInt64, UInt);

// Floats compare by bit pattern: every difference is a change (NaN payloads,
// signed zeros), and an identical NaN is not.
macro_rules! impl_float_point_value {
    ($ty:ty, $data_type:expr) => {
        impl PointValue for $ty {
            const DATA_TYPE: DataType = $data_type;

            fn differs(&self, other: &Self) -> bool {
                self.to_bits() != other.to_bits()
            }

            fn decode(bytes: &[u8], order: ByteOrder) -> Result<Self, ErrorCode> {
                let raw = take_bytes::<{ std::mem::size_of::<$ty>() }>(bytes)?;
                Ok(match order {
                    ByteOrder::BigEndian => <$ty>::from_be_bytes(raw),
                    ByteOrder::LittleEndian => <$ty>::from_le_bytes(raw),
                })
            }

            fn encode(&self, order: ByteOrder) -> Bytes {
                match order {
                    ByteOrder::BigEndian => Bytes::copy_from_slice(&self.to_be_bytes()),
                    ByteOrder::LittleEndian => Bytes::copy_from_slice(&self.to_le_bytes()),
                }
            }

            fn to_value(&self) -> Value {
                Value::Float(f64::from(*self))
            }

            // Finite values must stay finite, integers must convert exactly
            fn from_value(value: &Value) -> Option<Self> {
                match *value {
                    Value::Float(v) => {
                        let narrowed = v as $ty;
                        (narrowed.is_finite() || !v.is_finite()).then_some(narrowed)
                    }
                    Value::Int(v) => {
                        let converted = v as $ty;
                        (converted as i128 == i128::from(v)).then_some(converted)
                    }
                    Value::UInt(v) => {
                        let converted = v as $ty;
                        (converted as u128 == u128::from(v)).then_some(converted)
                    }
                    _ => None,
                }
            }
        }
    };
}

impl_float_point_value!(f32, DataType::Float32);
impl_float_point_value!(f64, DataType::Float64);

impl PointValue for bool {
    const DATA_TYPE: DataType = DataType::Bool;

    fn differs(&self, other: &Self) -> bool {
        self != other
    }

    fn decode(bytes: &[u8], _order: ByteOrder) -> Result<Self, ErrorCode> {
        match bytes.first() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            Some(_) => Err(ErrorCode::InvalidValue),
            None => Err(ErrorCode::PayloadTooShort),
        }
    }

    fn encode(&self, _order: ByteOrder) -> Bytes {
        Bytes::copy_from_slice(&[u8::from(*self)])
    }

    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        match *value {
            Value::Bool(v) => Some(v),
            _ => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_float_nan_is_stable() {
        let nan = f64::NAN;
        assert!(!nan.differs(&nan));
        assert!(nan.differs(&1.0));
        assert!(1.0f64.differs(&nan));
    }

    #[test]
    fn test_float_signed_zero_differs() {
        assert!(0.0f64.differs(&-0.0));
        assert!(!2.5f32.differs(&2.5));
    }

    #[test]
    fn test_decode_respects_byte_order() {
        let bytes = [0x12, 0x34, 0x56, 0x78];
        assert_eq!(u32::decode(&bytes, ByteOrder::BigEndian).unwrap(), 0x1234_5678);
        assert_eq!(
            u32::decode(&bytes, ByteOrder::LittleEndian).unwrap(),
            0x7856_3412
        );
        assert_eq!(i16::decode(&bytes, ByteOrder::BigEndian).unwrap(), 0x1234);
    }

    #[test]
    fn test_decode_short_payload() {
        assert_eq!(
            f64::decode(&[0, 1, 2], ByteOrder::BigEndian),
            Err(ErrorCode::PayloadTooShort)
        );
        assert_eq!(
            bool::decode(&[], ByteOrder::BigEndian),
            Err(ErrorCode::PayloadTooShort)
        );
    }

    #[test]
    fn test_bool_rejects_invalid_byte() {
        assert_eq!(bool::decode(&[1], ByteOrder::BigEndian), Ok(true));
        assert_eq!(
            bool::decode(&[7], ByteOrder::BigEndian),
            Err(ErrorCode::InvalidValue)
        );
    }

    #[test]
    fn test_encode_matches_decode_layout() {
        let encoded = 0x0102u16.encode(ByteOrder::LittleEndian);
        assert_eq!(&encoded[..], &[0x02, 0x01]);
        assert_eq!(&true.encode(ByteOrder::BigEndian)[..], &[1]);
    }

    #[test]
    fn test_from_value_range_checks() {
        assert_eq!(u16::from_value(&Value::Int(42)), Some(42));
        assert_eq!(u16::from_value(&Value::Int(-1)), None);
        assert_eq!(i16::from_value(&Value::UInt(70_000)), None);
        assert_eq!(f64::from_value(&Value::Int(3)), Some(3.0));
        assert_eq!(bool::from_value(&Value::Int(1)), None);
    }

    #[test]
    fn test_float_from_value_rejects_lossy_input() {
        assert_eq!(f32::from_value(&Value::Float(1e300)), None);
        assert_eq!(f32::from_value(&Value::Float(-1e300)), None);
        assert_eq!(f32::from_value(&Value::Float(2.5)), Some(2.5));
        assert_eq!(f32::from_value(&Value::Float(f64::INFINITY)), Some(f32::INFINITY));
        assert!(f32::from_value(&Value::Float(f64::NAN)).unwrap().is_nan());

        assert_eq!(f64::from_value(&Value::Int(i64::MAX - 1)), None);
        assert_eq!(f64::from_value(&Value::Int(i64::MAX)), None);
        assert_eq!(f64::from_value(&Value::Int(1 << 53)), Some(9_007_199_254_740_992.0));
        assert_eq!(f64::from_value(&Value::Int(i64::MIN)), Some(-9_223_372_036_854_775_808.0));
        assert_eq!(f64::from_value(&Value::UInt(u64::MAX)), None);
        assert_eq!(f32::from_value(&Value::UInt(16_777_217)), None);
        assert_eq!(f32::from_value(&Value::Int(-16_777_216)), Some(-16_777_216.0));
    }

    #[test]
    fn test_to_value_variants() {
        assert_eq!((-5i32).to_value(), Value::Int(-5));
        assert_eq!(7u64.to_value(), Value::UInt(7));
        assert_eq!(1.5f32.to_value(), Value::Float(1.5));
        assert_eq!(Value::Error(None).to_string(), "none");
    }
}
