//! Deferred release of native resources.
//!
//! A finalizer pairs a weakly held owner with a release action. The action
//! runs once, after the owner is gone, from [`FinalizationService::drain`]
//! (or [`FinalizationService::finalize_now`] for an owner the caller just
//! dropped). Registration never runs anything.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, Weak};

/// Anything whose lifetime gates a finalizer.
pub type FinalizerOwner = Weak<dyn Any + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FinalizerId(u64);

struct Finalizer {
    owner: FinalizerOwner,
    action: Box<dyn FnOnce() + Send>,
}

#[derive(Default)]
pub struct FinalizationService {
    entries: Mutex<HashMap<FinalizerId, Finalizer>>,
    next_id: AtomicU64,
    total_finalized: AtomicUsize,
}

impl FinalizationService {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<FinalizerId, Finalizer>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn register(&self, owner: FinalizerOwner, action: impl FnOnce() + Send + 'static) -> FinalizerId {
        let id = FinalizerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries().insert(
            id,
            Finalizer {
                owner,
                action: Box::new(action),
            },
        );
        id
    }

    /// Runs the finalizer for `id` immediately if its owner is already gone.
    ///
    /// Returns `false` when the owner is still alive or `id` already ran.
    pub fn finalize_now(&self, id: FinalizerId) -> bool {
        let finalizer = {
            let mut entries = self.entries();
            match entries.get(&id) {
                Some(entry) if entry.owner.strong_count() == 0 => entries.remove(&id),
                _ => None,
            }
        };
        match finalizer {
            Some(finalizer) => {
                (finalizer.action)();
                self.total_finalized.fetch_add(1, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    /// Runs every finalizer whose owner has become unreachable.
    pub fn drain(&self) -> usize {
        let ready: Vec<Finalizer> = {
            let mut entries = self.entries();
            let dead: Vec<FinalizerId> = entries
                .iter()
                .filter(|(_, entry)| entry.owner.strong_count() == 0)
                .map(|(id, _)| *id)
                .collect();
            dead.iter().filter_map(|id| entries.remove(id)).collect()
        };
        // actions run outside the lock so they may register new finalizers
        let count = ready.len();
        for finalizer in ready {
            (finalizer.action)();
        }
        if count > 0 {
            self.total_finalized.fetch_add(count, Ordering::Relaxed);
            tracing::debug!(count, "drained finalization queue");
        }
        count
    }

    /// Finalizers registered and not yet run.
    pub fn pending(&self) -> usize {
        self.entries().len()
    }

    pub fn total_finalized(&self) -> usize {
        self.total_finalized.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for FinalizationService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FinalizationService")
            .field("pending", &self.pending())
            .field("total_finalized", &self.total_finalized())
            .finish()
    }
}
