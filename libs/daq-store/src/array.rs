//! Slot allocation
//!
//! A [`DataArray`] collects the initial value of every slot while trackers
//! attach themselves. Each `append` hands back a typed [`SlotHandle`] that is
//! only valid for the block built from this array.

use std::any::{type_name, Any};
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Type-erased slot content
pub(crate) type Slot = Arc<dyn Any + Send + Sync>;

static NEXT_BLOCK_ID: AtomicU64 = AtomicU64::new(1);

/// Typed index of a slot inside one data block
pub struct SlotHandle<T> {
    block: u64,
    index: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T> SlotHandle<T> {
    /// Identifier of the block this handle belongs to
    pub fn block_id(&self) -> u64 {
        self.block
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

// Manual impls: derive would require `T: Clone`/`T: Copy`
impl<T> Clone for SlotHandle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for SlotHandle<T> {}

impl<T> PartialEq for SlotHandle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.block == other.block && self.index == other.index
    }
}

impl<T> Eq for SlotHandle<T> {}

impl<T> fmt::Debug for SlotHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotHandle")
            .field("block", &self.block)
            .field("index", &self.index)
            .field("type", &type_name::<T>())
            .finish()
    }
}

/// Slot layout of a data block under construction
pub struct DataArray {
    id: u64,
    pub(crate) slots: Vec<Slot>,
}

impl Default for DataArray {
    fn default() -> Self {
        Self::new()
    }
}

impl DataArray {
    pub fn new() -> Self {
        Self {
            id: NEXT_BLOCK_ID.fetch_add(1, Ordering::Relaxed),
            slots: Vec::new(),
        }
    }

    /// Reserve a slot holding `initial`
    pub fn append<T: Send + Sync + 'static>(&mut self, initial: T) -> SlotHandle<T> {
        let index = self.slots.len();
        self.slots.push(Arc::new(initial));
        SlotHandle {
            block: self.id,
            index,
            _marker: PhantomData,
        }
    }

    /// Identifier the finished block will carry
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
