use std::sync::Arc;

use crate::runtime::value::{ObjectRef, Value};

use super::handle::{ALLOCATION_BASE, BLOCK_BITS, BLOCK_BYTE_SIZE, BLOCK_SIZE, Handle};
use super::wrapper::ValueWrapper;

/// A run of [`BLOCK_SIZE`] consecutive handle slots owned by one thread.
///
/// While a block is some thread's current block it pins every object it
/// handed out. Once full it is retired and the pins are passed to the marking
/// service; after that its objects live only as long as something else holds
/// them.
#[derive(Debug)]
pub(crate) struct HandleBlock {
    base: u64,
    wrappers: Vec<Arc<ValueWrapper>>,
    pinned: Vec<Value>,
    retired: bool,
}

impl HandleBlock {
    pub(crate) fn new(base: u64) -> Self {
        Self {
            base,
            wrappers: Vec::with_capacity(BLOCK_SIZE),
            pinned: Vec::new(),
            retired: false,
        }
    }

    pub(crate) fn base(&self) -> u64 {
        self.base
    }

    pub(crate) fn index(&self) -> usize {
        ((self.base - ALLOCATION_BASE) >> BLOCK_BITS) as usize
    }

    pub(crate) fn is_full(&self) -> bool {
        self.wrappers.len() == BLOCK_SIZE
    }

    /// Assigns the next slot to a wrapper for `object` and pins it.
    pub(crate) fn allocate(&mut self, object: &ObjectRef) -> Arc<ValueWrapper> {
        let handle = Handle(self.base + (self.wrappers.len() as u64) * 8);
        let wrapper = Arc::new(ValueWrapper::new(handle, object));
        self.wrappers.push(Arc::clone(&wrapper));
        self.pinned.push(Value::Object(Arc::clone(object)));
        wrapper
    }

    pub(crate) fn get(&self, handle: Handle) -> Option<&Arc<ValueWrapper>> {
        self.wrappers.get(handle.slot())
    }

    /// Stops being a current block, handing back the objects it pinned.
    pub(crate) fn retire(&mut self, keep_handles_alive: bool) -> Vec<Value> {
        self.retired = true;
        if keep_handles_alive {
            Vec::new()
        } else {
            std::mem::take(&mut self.pinned)
        }
    }

    /// A retired block whose every wrapper is dead can be recycled.
    pub(crate) fn is_vacated(&self) -> bool {
        self.retired && self.pinned.is_empty() && self.wrappers.iter().all(|w| !w.is_live())
    }

    pub(crate) fn live_handles(&self) -> usize {
        self.wrappers.iter().filter(|w| w.is_live()).count()
    }

    /// Invalidates every wrapper whose referent has died.
    pub(crate) fn release_dead(&self) -> usize {
        let mut released = 0;
        for wrapper in &self.wrappers {
            if wrapper.referent().is_none() && !wrapper.is_released() {
                wrapper.release();
                released += 1;
            }
        }
        released
    }
}

/// Hands out block base addresses, reusing recycled ones first.
#[derive(Debug)]
pub(crate) struct HandleBlockAllocator {
    next_block: u64,
    free_blocks: Vec<u64>,
}

impl Default for HandleBlockAllocator {
    fn default() -> Self {
        Self {
            next_block: ALLOCATION_BASE,
            free_blocks: Vec::new(),
        }
    }
}

impl HandleBlockAllocator {
    pub(crate) fn get_free_block(&mut self) -> u64 {
        if let Some(base) = self.free_blocks.pop() {
            return base;
        }
        let base = self.next_block;
        self.next_block += BLOCK_BYTE_SIZE;
        base
    }

    pub(crate) fn add_free_block(&mut self, base: u64) {
        self.free_blocks.push(base);
    }

    pub(crate) fn free_block_count(&self) -> usize {
        self.free_blocks.len()
    }
}
