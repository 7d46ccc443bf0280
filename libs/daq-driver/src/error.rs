//! Error types for daq-driver

use daq_model::HandleError;
use daq_store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DriverError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown batch transaction: {0}")]
    UnknownBatch(String),

    #[error("Duplicate {kind} id: {id}")]
    DuplicateId { kind: &'static str, id: String },

    #[error("Invalid {kind} index {index}")]
    InvalidIndex { kind: &'static str, index: usize },

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Access error: {0}")]
    Handle(#[from] HandleError),
}

pub type Result<T> = std::result::Result<T, DriverError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_batch_error() {
        let err = DriverError::UnknownBatch("poll7".to_string());
        assert_eq!(err.to_string(), "Unknown batch transaction: poll7");
    }

    #[test]
    fn test_duplicate_id_error() {
        let err = DriverError::DuplicateId {
            kind: "point",
            id: "temp".to_string(),
        };
        assert_eq!(err.to_string(), "Duplicate point id: temp");
    }

    #[test]
    fn test_from_store_error() {
        let err: DriverError = StoreError::WriteScopeBusy { block: 1 }.into();
        assert!(matches!(err, DriverError::Store(_)));
    }

    #[test]
    fn test_from_handle_error() {
        let err: DriverError = HandleError::Unknown.into();
        assert_eq!(err.to_string(), "Access error: unknown attribute or event");
    }
}
