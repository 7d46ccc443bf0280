//! Data Acquisition Service
//!
//! Runs the batch transactions of a driver configuration against a simulated
//! device: one polling task per transaction, write cycle first, then read
//! cycle, until shutdown.

pub mod bootstrap;
pub mod runtime;
pub mod simulator;
pub mod sink;

pub use runtime::{run, RunOptions, RunSummary};
pub use simulator::SimulatedTransport;
pub use sink::TracingEventSink;
