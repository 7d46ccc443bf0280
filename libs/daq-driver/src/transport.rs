//! Physical transport
//!
//! The driver core never talks to a device itself. A [`Transport`] performs
//! the actual I/O for one batch transaction: a read returns the device image
//! the inputs decode from, a write applies an encoded write command.

use async_trait::async_trait;
use bytes::Bytes;
use daq_model::ErrorCode;

use crate::batch::WriteCommand;

#[async_trait]
pub trait Transport: Send + Sync {
    /// Read the payload of batch transaction `batch`
    async fn read(&self, batch: &str) -> Result<Bytes, ErrorCode>;

    /// Execute a write command for batch transaction `batch`
    async fn write(&self, batch: &str, command: &WriteCommand) -> Result<(), ErrorCode>;
}
