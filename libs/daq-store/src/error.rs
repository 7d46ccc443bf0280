//! Error types for daq-store

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A second write scope was requested while one is open
    #[error("Write scope already open on data block {block}")]
    WriteScopeBusy { block: u64 },

    #[error("Slot handle belongs to data block {expected}, not {actual}")]
    ForeignHandle { expected: u64, actual: u64 },

    #[error("Slot {index} does not hold a value of type {expected}")]
    TypeMismatch {
        index: usize,
        expected: &'static str,
    },

    #[error("Slot {index} out of range (block has {len} slots)")]
    OutOfRange { index: usize, len: usize },
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_scope_busy_error() {
        let err = StoreError::WriteScopeBusy { block: 3 };
        assert_eq!(err.to_string(), "Write scope already open on data block 3");
    }

    #[test]
    fn test_out_of_range_error() {
        let err = StoreError::OutOfRange { index: 9, len: 2 };
        assert_eq!(err.to_string(), "Slot 9 out of range (block has 2 slots)");
    }
}
