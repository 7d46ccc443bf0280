//! Live data blocks and write sentinels
//!
//! A [`DataBlock`] publishes its slots as an immutable snapshot through
//! `ArcSwap`. Readers load the current snapshot without locking. Writers open
//! a [`WriteSentinel`], which stages a copy of the slot table; `commit()`
//! publishes the copy in one atomic store. A sentinel dropped without commit
//! discards everything it staged.
//!
//! Only one sentinel may be open per block. The transaction that owns the
//! block runs its cycles one at a time, so a second sentinel means a broken
//! caller; it is refused with [`StoreError::WriteScopeBusy`] instead of
//! blocking.

use arc_swap::ArcSwap;
use parking_lot::{Mutex, MutexGuard};
use std::any::type_name;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

use crate::array::{DataArray, Slot, SlotHandle};
use crate::error::{Result, StoreError};

/// Shared storage for the state of every point in one transaction
pub struct DataBlock {
    id: u64,
    snapshot: ArcSwap<Vec<Slot>>,
    write_scope: Mutex<()>,
    commits: AtomicU64,
}

impl DataBlock {
    /// Freeze an array into a live block
    pub fn new(array: DataArray) -> Self {
        debug!("Data block {}: {} slots", array.id(), array.len());
        Self {
            id: array.id(),
            snapshot: ArcSwap::from_pointee(array.slots),
            write_scope: Mutex::new(()),
            commits: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn len(&self) -> usize {
        self.snapshot.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of commits since creation
    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::Acquire)
    }

    fn check<T>(&self, handle: &SlotHandle<T>) -> Result<()> {
        if handle.block_id() != self.id {
            return Err(StoreError::ForeignHandle {
                expected: handle.block_id(),
                actual: self.id,
            });
        }
        Ok(())
    }

    /// Read a committed slot value
    pub fn read<T: Clone + 'static>(&self, handle: SlotHandle<T>) -> Result<T> {
        self.read_with(handle, T::clone)
    }

    /// Project a committed slot value without cloning all of it
    pub fn read_with<T: 'static, R>(
        &self,
        handle: SlotHandle<T>,
        project: impl FnOnce(&T) -> R,
    ) -> Result<R> {
        self.check(&handle)?;
        let snapshot = self.snapshot.load();
        let value = downcast_slot::<T>(&snapshot, handle.index())?;
        Ok(project(value))
    }

    /// Open the write scope of this block
    pub fn write(&self) -> Result<WriteSentinel<'_>> {
        let scope = self
            .write_scope
            .try_lock()
            .ok_or(StoreError::WriteScopeBusy { block: self.id })?;
        let staged: Vec<Slot> = self.snapshot.load().iter().cloned().collect();
        Ok(WriteSentinel {
            block: self,
            staged,
            modified: 0,
            committed: false,
            _scope: scope,
        })
    }
}

fn downcast_slot<T: 'static>(slots: &[Slot], index: usize) -> Result<&T> {
    let slot = slots.get(index).ok_or(StoreError::OutOfRange {
        index,
        len: slots.len(),
    })?;
    (**slot)
        .downcast_ref::<T>()
        .ok_or(StoreError::TypeMismatch {
            index,
            expected: type_name::<T>(),
        })
}

/// Scoped write access to a data block
///
/// Reads through the sentinel see the staged state, including values set
/// earlier in the same scope.
pub struct WriteSentinel<'a> {
    block: &'a DataBlock,
    staged: Vec<Slot>,
    modified: usize,
    committed: bool,
    _scope: MutexGuard<'a, ()>,
}

impl<'a> WriteSentinel<'a> {
    /// Identifier of the block being written
    pub fn block_id(&self) -> u64 {
        self.block.id
    }

    /// Current staged value of a slot
    pub fn get<T: 'static>(&self, handle: SlotHandle<T>) -> Result<&T> {
        self.block.check(&handle)?;
        downcast_slot::<T>(&self.staged, handle.index())
    }

    /// Stage a new value for a slot
    pub fn set<T: Send + Sync + 'static>(&mut self, handle: SlotHandle<T>, value: T) -> Result<()> {
        // Type check goes through the existing slot so a bad handle never corrupts the table
        self.get(handle)?;
        self.staged[handle.index()] = Arc::new(value);
        self.modified += 1;
        Ok(())
    }

    /// Number of slot writes staged so far
    pub fn modified(&self) -> usize {
        self.modified
    }

    /// Publish every staged value at once
    ///
    /// Returns the block's commit count after this commit.
    pub fn commit(mut self) -> u64 {
        let staged = std::mem::take(&mut self.staged);
        self.block.snapshot.store(Arc::new(staged));
        self.committed = true;
        let count = self.block.commits.fetch_add(1, Ordering::AcqRel) + 1;
        trace!(
            "Data block {}: commit #{} ({} slot writes)",
            self.block.id,
            count,
            self.modified
        );
        count
    }
}

impl Drop for WriteSentinel<'_> {
    fn drop(&mut self) {
        if !self.committed && self.modified > 0 {
            debug!(
                "Data block {}: discarding {} uncommitted slot writes",
                self.block.id, self.modified
            );
        }
    }
}
