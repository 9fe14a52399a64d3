//! Compute-once caches for rope metadata.
//!
//! Two threads may race to compute the same value. Both computations are
//! deterministic, the first compare-and-set wins and the loser adopts the
//! winner's value, so every reader converges on one result.

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

use crate::encoding::CodeRange;

/// Sentinel for "character length not computed yet".
pub const UNKNOWN_CHARACTER_LENGTH: usize = usize::MAX;

#[derive(Debug)]
pub(crate) struct LazyCodeRange(AtomicU8);

impl LazyCodeRange {
    pub(crate) fn new(initial: CodeRange) -> Self {
        Self(AtomicU8::new(initial.as_u8()))
    }

    pub(crate) fn get(&self) -> CodeRange {
        CodeRange::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn get_or_compute(&self, compute: impl FnOnce() -> CodeRange) -> CodeRange {
        let current = self.get();
        if current.is_known() {
            return current;
        }
        self.publish(compute())
    }

    /// Stores `value` unless another value was published first.
    pub(crate) fn publish(&self, value: CodeRange) -> CodeRange {
        if !value.is_known() {
            return self.get();
        }
        match self.0.compare_exchange(
            CodeRange::Unknown.as_u8(),
            value.as_u8(),
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => value,
            Err(existing) => CodeRange::from_u8(existing),
        }
    }

    /// Resets to `Unknown`. Only native ropes do this, after out-of-band writes.
    pub(crate) fn clear(&self) {
        self.0.store(CodeRange::Unknown.as_u8(), Ordering::Release);
    }
}

#[derive(Debug)]
pub(crate) struct LazyLength(AtomicUsize);

impl LazyLength {
    pub(crate) fn new(initial: Option<usize>) -> Self {
        Self(AtomicUsize::new(
            initial.unwrap_or(UNKNOWN_CHARACTER_LENGTH),
        ))
    }

    pub(crate) fn get(&self) -> Option<usize> {
        match self.0.load(Ordering::Acquire) {
            UNKNOWN_CHARACTER_LENGTH => None,
            n => Some(n),
        }
    }

    pub(crate) fn get_or_compute(&self, compute: impl FnOnce() -> usize) -> usize {
        if let Some(n) = self.get() {
            return n;
        }
        self.publish(compute())
    }

    pub(crate) fn publish(&self, value: usize) -> usize {
        match self.0.compare_exchange(
            UNKNOWN_CHARACTER_LENGTH,
            value,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => value,
            Err(existing) => existing,
        }
    }

    pub(crate) fn clear(&self) {
        self.0.store(UNKNOWN_CHARACTER_LENGTH, Ordering::Release);
    }
}
