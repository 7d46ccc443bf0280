//! Error types for attribute, event and handle access

use thiserror::Error;

use crate::types::DataType;

/// Failure of an accessor or handle call
///
/// Unlike [`ErrorCode`](crate::ErrorCode), these are contract or usage errors,
/// never data errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleError {
    /// The attribute or event name is not known
    #[error("unknown attribute or event")]
    Unknown,

    /// Accessor used before cross references were resolved
    #[error("invalid argument: element is not attached to a transaction")]
    InvalidArgument,

    #[error("attribute is read-only")]
    ReadOnly,

    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: DataType,
        actual: &'static str,
    },

    /// The point behind a write handle no longer exists
    #[error("handle target no longer exists")]
    Expired,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_mismatch_message() {
        let err = HandleError::TypeMismatch {
            expected: DataType::Float64,
            actual: "bool",
        };
        assert_eq!(err.to_string(), "type mismatch: expected float64, got bool");
    }

    #[test]
    fn test_invalid_argument_message() {
        assert!(HandleError::InvalidArgument
            .to_string()
            .contains("not attached"));
    }
}
