//! Data Acquisition Driver Core
//!
//! Tracks the read and write state of data points that are polled from a
//! device in batch transactions, and decides which change events each cycle
//! raises.
//!
//! # Key Components
//!
//! - **Driver / DriverBuilder**: arena of points and batch transactions
//! - **BatchTransaction**: groups points read and written through one transport call
//! - **InputPoint / OutputPoint**: typed points implementing `DataPoint`
//! - **CommonReadState / PerValueReadState / WriteState**: state trackers
//! - **SingleValueQueue**: pending output value, last write wins
//! - **ReadHandle / WriteHandle**: type-erased attribute access for hosts
//! - **Transport / EventSink**: I/O and event raising supplied by the host
//!
//! # Read cycle
//!
//! ```text
//! Transport::read ──▶ CommonReadState::update ──▶ every input: update_read_state
//!                                                        │
//!                  EventSink::raise ◀── commit ◀─────────┘
//! ```
//!
//! A failed read never produces an `Err`: the error is stored as the Bad
//! state of the transaction and of every point, which keep their last value.

pub mod batch;
pub mod common_read_state;
pub mod config;
pub mod driver;
pub mod error;
pub mod event;
pub mod handle;
pub mod input;
pub mod output;
pub mod pending;
pub mod point;
pub mod read_state;
pub mod transport;
pub mod value_cell;
pub mod write_state;

// Re-exports
pub use batch::{BatchId, BatchTransaction, WriteCommand, WriteEntry};
pub use common_read_state::{CommonReadState, CommonUpdate};
pub use config::{BatchConfig, DriverConfig, PointConfig, ServiceConfig};
pub use driver::{CycleReport, Driver, DriverBuilder};
pub use error::{DriverError, Result};
pub use event::{Event, EventSink, PendingEventList};
pub use handle::{ReadHandle, WriteHandle};
pub use input::InputPoint;
pub use output::OutputPoint;
pub use pending::SingleValueQueue;
pub use point::{AbstractInput, AbstractOutput, DataPoint, PointId};
pub use read_state::PerValueReadState;
pub use transport::Transport;
pub use value_cell::{ChangeSet, StateChanges, StatusCell, ValueCell};
pub use write_state::WriteState;
