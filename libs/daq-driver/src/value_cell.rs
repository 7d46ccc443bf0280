//! State cells and change detection
//!
//! [`ValueCell`] is what a per-value read state stores in the data block.
//! [`StatusCell`] is the value-less variant used for the common read state of
//! a transaction and for write states. Both compute their successor state
//! together with the set of changes, without touching storage, so the
//! transition rules can be tested in isolation.

use daq_model::{initial_timestamp, ErrorCode, PointValue, Quality, Timestamp};

/// Which parts of a point's state changed in one update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChangeSet {
    pub value: bool,
    pub quality: bool,
    pub error: bool,
}

impl ChangeSet {
    pub fn any(&self) -> bool {
        self.value || self.quality || self.error
    }
}

/// Which parts of a value-less state changed in one update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StateChanges {
    pub quality: bool,
    pub error: bool,
}

impl StateChanges {
    pub fn any(&self) -> bool {
        self.quality || self.error
    }
}

/// State of one value inside the data block
#[derive(Debug, Clone)]
pub struct ValueCell<T> {
    /// Last successfully read value; kept while the quality is Bad
    pub value: T,
    pub quality: Quality,
    /// Set iff the quality is Bad
    pub error: Option<ErrorCode>,
    /// Time of the last update attempt, successful or not
    pub update_time: Timestamp,
    /// Time of the last update that changed anything
    pub change_time: Timestamp,
}

impl<T: PointValue> Default for ValueCell<T> {
    fn default() -> Self {
        Self {
            value: T::default(),
            quality: Quality::Bad,
            error: Some(ErrorCode::NotConnected),
            update_time: initial_timestamp(),
            change_time: initial_timestamp(),
        }
    }
}

impl<T: PointValue> ValueCell<T> {
    /// Successor state after an update
    ///
    /// The resulting quality is Good only if the value was decoded AND the
    /// transaction itself is Good. A transaction error takes precedence over
    /// the point's own decode error.
    pub fn updated(
        &self,
        timestamp: Timestamp,
        outcome: Result<T, ErrorCode>,
        shared_error: Option<ErrorCode>,
    ) -> (Self, ChangeSet) {
        let shared_quality = Quality::from_error(shared_error);
        let (decoded, decode_error) = match outcome {
            Ok(value) => (Some(value), None),
            Err(error) => (None, Some(error)),
        };

        let quality = Quality::from_error(decode_error).and(shared_quality);
        let error = shared_error.or(decode_error);
        let value = match decoded {
            Some(value) if quality.is_good() => value,
            _ => self.value.clone(),
        };

        let changes = ChangeSet {
            value: value.differs(&self.value),
            quality: quality != self.quality,
            error: error != self.error,
        };

        let update_time = self.update_time.max(timestamp);
        let change_time = if changes.any() {
            update_time
        } else {
            self.change_time
        };

        (
            Self {
                value,
                quality,
                error,
                update_time,
                change_time,
            },
            changes,
        )
    }
}

/// Value-less state: transaction read state or write state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusCell {
    pub quality: Quality,
    pub error: Option<ErrorCode>,
    pub update_time: Timestamp,
}

impl Default for StatusCell {
    fn default() -> Self {
        Self {
            quality: Quality::Bad,
            error: Some(ErrorCode::NotConnected),
            update_time: initial_timestamp(),
        }
    }
}

impl StatusCell {
    /// Successor state after an operation that ended with `error`
    pub fn updated(&self, timestamp: Timestamp, error: Option<ErrorCode>) -> (Self, StateChanges) {
        let quality = Quality::from_error(error);
        let changes = StateChanges {
            quality: quality != self.quality,
            error: error != self.error,
        };
        (
            Self {
                quality,
                error,
                update_time: self.update_time.max(timestamp),
            },
            changes,
        )
    }
}
