//! Data Block Storage for batched point state
//!
//! Every transaction keeps the state of all its points in one data block.
//! Trackers reserve typed slots in a [`DataArray`] while the driver is being
//! built; the array is then frozen into a [`DataBlock`].
//!
//! # Key Components
//!
//! - **DataArray**: slot allocation during configuration
//! - **DataBlock**: the live block; lock-free snapshot reads
//! - **WriteSentinel**: scoped, all-or-nothing write access to a block
//! - **Clock**: time stamp source for update cycles
//!
//! # Consistency
//!
//! ```text
//! reader ──load()──▶ ArcSwap<Vec<Slot>> ◀──store()── WriteSentinel::commit()
//!                                                      ▲
//!                                  staged copy ────────┘ (dropped = rolled back)
//! ```
//!
//! Readers always see either the state before a cycle or the state after its
//! commit, never a mix.

pub mod array;
pub mod block;
pub mod error;
pub mod time;

// Re-exports
pub use array::{DataArray, SlotHandle};
pub use block::{DataBlock, WriteSentinel};
pub use error::{Result, StoreError};
pub use time::{Clock, FixedClock, SystemClock};
