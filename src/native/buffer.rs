use std::alloc::{self, Layout};
use std::fmt;
use std::ptr::NonNull;
use std::sync::Arc;

use crate::error::{RopeError, RopeResult};
use crate::runtime::finalization::{FinalizationService, FinalizerId, FinalizerOwner};

/// A zero-filled allocation of `capacity + 1` bytes.
///
/// The extra byte keeps room for the NUL terminator C code expects after the
/// last usable byte. The memory is released by the finalizer registered at
/// allocation, once this buffer has been dropped.
pub struct NativeBuffer {
    address: NonNull<u8>,
    capacity: usize,
    finalizer: FinalizerId,
    /// Gates the finalizer: the memory is freed only after this is dropped.
    _liveness: Arc<()>,
}

// Safety: the allocation is owned by exactly one `NativeBuffer`. Writes need
// `&mut self`, and the owning string serializes access.
unsafe impl Send for NativeBuffer {}
unsafe impl Sync for NativeBuffer {}

impl NativeBuffer {
    pub fn allocate(finalizers: &FinalizationService, capacity: usize) -> RopeResult<NativeBuffer> {
        let failed = RopeError::AllocationFailed { capacity };
        let size = capacity.checked_add(1).ok_or_else(|| failed.clone())?;
        let layout = Layout::array::<u8>(size).map_err(|_| failed.clone())?;
        // Safety: `layout` is at least one byte.
        let address = NonNull::new(unsafe { alloc::alloc_zeroed(layout) }).ok_or(failed)?;

        let liveness = Arc::new(());
        let owner = Arc::downgrade(&liveness) as FinalizerOwner;
        let raw = address.as_ptr() as usize;
        let finalizer = finalizers.register(owner, move || {
            // Safety: `raw` was returned by `alloc_zeroed` with `layout`, and the
            // finalization service runs this action exactly once.
            unsafe { alloc::dealloc(raw as *mut u8, layout) };
            tracing::debug!(address = raw, capacity, "freed native buffer");
        });
        tracing::debug!(address = raw, capacity, "allocated native buffer");

        Ok(NativeBuffer {
            address,
            capacity,
            finalizer,
            _liveness: liveness,
        })
    }

    pub fn address(&self) -> usize {
        self.address.as_ptr() as usize
    }

    /// Usable bytes, not counting the terminator slot.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn finalizer(&self) -> FinalizerId {
        self.finalizer
    }

    /// All `capacity + 1` bytes.
    pub fn as_slice(&self) -> &[u8] {
        // Safety: the allocation is `capacity + 1` initialized bytes and lives
        // until `self` is dropped.
        unsafe { std::slice::from_raw_parts(self.address.as_ptr(), self.capacity + 1) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // Safety: as in `as_slice`, and `&mut self` makes this the only view.
        unsafe { std::slice::from_raw_parts_mut(self.address.as_ptr(), self.capacity + 1) }
    }
}

impl fmt::Debug for NativeBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeBuffer")
            .field("address", &format_args!("{:#x}", self.address()))
            .field("capacity", &self.capacity)
            .finish()
    }
}
