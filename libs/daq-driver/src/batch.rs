//! Batch transactions
//!
//! A batch transaction groups points that are read (and written) together
//! through one transport call. It owns two data blocks: the read block with
//! the common read state and every input's read state, and the write block
//! with every output's write state. Read and write cycles therefore commit
//! independently of each other.

use bytes::Bytes;
use daq_model::{Attribute, HandleError};
use daq_store::DataBlock;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::common_read_state::CommonReadState;
use crate::error::Result;
use crate::event::Event;
use crate::handle::ReadHandle;
use crate::point::PointId;
use crate::value_cell::StatusCell;

/// Index of a batch transaction in its driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BatchId(pub(crate) usize);

impl BatchId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One encoded value in a write command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteEntry {
    pub point: PointId,
    /// Byte offset in the device image
    pub offset: usize,
    pub data: Bytes,
}

/// Values collected from the outputs of one transaction for a single write
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteCommand {
    entries: Vec<WriteEntry>,
}

impl WriteCommand {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, point: PointId, offset: usize, data: Bytes) {
        self.entries.push(WriteEntry { point, offset, data });
    }

    pub fn entries(&self) -> &[WriteEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Points that contributed, in command order
    pub fn points(&self) -> impl Iterator<Item = PointId> + '_ {
        self.entries.iter().map(|e| e.point)
    }
}

pub struct BatchTransaction {
    pub(crate) id: Arc<str>,
    pub(crate) poll_interval: Duration,
    pub(crate) common: CommonReadState,
    pub(crate) inputs: Vec<PointId>,
    pub(crate) outputs: Vec<PointId>,
    pub(crate) read_block: Arc<DataBlock>,
    pub(crate) write_block: Arc<DataBlock>,
    pub(crate) read_event_capacity: usize,
    pub(crate) write_event_capacity: usize,
}

impl BatchTransaction {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn common(&self) -> &CommonReadState {
        &self.common
    }

    /// Points updated by read cycles, outputs included
    pub fn inputs(&self) -> &[PointId] {
        &self.inputs
    }

    /// Points contributing to write cycles
    pub fn outputs(&self) -> &[PointId] {
        &self.outputs
    }

    pub fn has_outputs(&self) -> bool {
        !self.outputs.is_empty()
    }

    pub fn read_block(&self) -> &Arc<DataBlock> {
        &self.read_block
    }

    pub fn write_block(&self) -> &Arc<DataBlock> {
        &self.write_block
    }

    /// Upper bound of events one read cycle can raise
    pub fn read_event_capacity(&self) -> usize {
        self.read_event_capacity
    }

    /// Upper bound of events one write cycle can raise
    pub fn write_event_capacity(&self) -> usize {
        self.write_event_capacity
    }

    /// Committed transaction read state
    pub fn read_state(&self) -> Result<StatusCell> {
        self.common.state(&self.read_block)
    }

    pub fn resolve_attribute(
        &self,
        name: &str,
    ) -> std::result::Result<Option<Attribute>, HandleError> {
        self.common.resolve_attribute(name)
    }

    pub fn resolve_event(
        &self,
        name: &str,
    ) -> std::result::Result<Option<Arc<Event>>, HandleError> {
        self.common.resolve_event(name)
    }

    pub fn make_read_handle(
        &self,
        attribute: &Attribute,
    ) -> std::result::Result<Option<ReadHandle>, HandleError> {
        self.common.make_read_handle(&self.read_block, attribute)
    }
}

impl fmt::Debug for BatchTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchTransaction")
            .field("id", &self.id)
            .field("poll_interval", &self.poll_interval)
            .field("inputs", &self.inputs.len())
            .field("outputs", &self.outputs.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_command_order() {
        let mut command = WriteCommand::new();
        assert!(command.is_empty());
        command.push(PointId(3), 4, Bytes::from_static(&[1]));
        command.push(PointId(1), 0, Bytes::from_static(&[2, 3]));

        assert_eq!(command.len(), 2);
        assert_eq!(command.points().collect::<Vec<_>>(), vec![PointId(3), PointId(1)]);
        assert_eq!(command.entries()[1].data.as_ref(), &[2, 3]);
    }
}
