//! The optional lock that serializes native calls which are not re-entrant.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, ThreadId};
use std::time::Duration;

use crate::error::RopeResult;
use crate::runtime::value::Value;

use super::call_stack::{ExtensionCallStack, ExtensionFrame};
use super::context::BridgeContext;
use super::safepoint::SafepointQueue;

#[derive(Debug, Default)]
struct LockState {
    owner: Option<ThreadId>,
    count: usize,
}

/// Reentrant mutex whose waiters keep answering safepoint requests.
#[derive(Debug)]
pub struct ExtensionLock {
    state: Mutex<LockState>,
    released: Condvar,
    poll_interval: Duration,
}

impl ExtensionLock {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            state: Mutex::new(LockState::default()),
            released: Condvar::new(),
            poll_interval,
        }
    }

    fn state(&self) -> MutexGuard<'_, LockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Takes the lock only if it is free or already ours.
    fn try_acquire(state: &mut LockState, me: ThreadId) -> bool {
        match state.owner {
            Some(owner) if owner == me => {
                state.count += 1;
                true
            }
            None => {
                state.owner = Some(me);
                state.count = 1;
                true
            }
            Some(_) => false,
        }
    }

    /// Acquires the lock, running safepoint actions while waiting.
    ///
    /// An action that fails aborts the wait and its error is returned with
    /// the lock not taken.
    pub fn lock_interruptibly(&self, safepoints: &SafepointQueue) -> RopeResult<()> {
        let me = thread::current().id();
        loop {
            let mut state = self.state();
            if Self::try_acquire(&mut state, me) {
                return Ok(());
            }
            let (mut state, _) = self
                .released
                .wait_timeout(state, self.poll_interval)
                .unwrap_or_else(|e| e.into_inner());
            if Self::try_acquire(&mut state, me) {
                return Ok(());
            }
            drop(state);
            if let Err(error) = safepoints.poll() {
                tracing::warn!(%error, "extension lock wait interrupted");
                return Err(error);
            }
        }
    }

    /// Releases one level of ownership. A thread that does not hold the
    /// lock is ignored.
    pub fn unlock(&self) {
        let me = thread::current().id();
        let mut state = self.state();
        if state.owner != Some(me) {
            return;
        }
        state.count -= 1;
        if state.count == 0 {
            state.owner = None;
            drop(state);
            self.released.notify_one();
        }
    }

    pub fn is_held_by_current_thread(&self) -> bool {
        self.state().owner == Some(thread::current().id())
    }

    pub fn is_locked(&self) -> bool {
        self.state().owner.is_some()
    }

    /// Drops every level of ownership held by this thread and returns how
    /// many there were.
    pub fn release_all(&self) -> usize {
        let me = thread::current().id();
        let mut state = self.state();
        if state.owner != Some(me) {
            return 0;
        }
        let count = std::mem::take(&mut state.count);
        state.owner = None;
        drop(state);
        self.released.notify_one();
        count
    }

    /// Re-takes the lock `count` levels deep.
    ///
    /// The lock is always reacquired. If a safepoint action fails during the
    /// wait, waiting continues and the first such error is returned once the
    /// lock is held again.
    pub fn reacquire(&self, count: usize, safepoints: &SafepointQueue) -> RopeResult<()> {
        if count == 0 {
            return Ok(());
        }
        let mut deferred = None;
        loop {
            match self.lock_interruptibly(safepoints) {
                Ok(()) => break,
                Err(error) => {
                    deferred.get_or_insert(error);
                }
            }
        }
        self.state().count = count;
        deferred.map_or(Ok(()), Err)
    }
}

/// Per-thread state for calling into native code.
#[derive(Debug, Default)]
pub struct ExtensionThread {
    pub stack: ExtensionCallStack,
    pub safepoints: Arc<SafepointQueue>,
}

impl ExtensionThread {
    pub fn new() -> Self {
        Self::default()
    }
}

struct Held<'a> {
    lock: &'a ExtensionLock,
}

impl Drop for Held<'_> {
    fn drop(&mut self) {
        self.lock.unlock();
    }
}

/// Runs a native call: pushes an extension frame for `block` and, when the
/// lock is enabled and not already held by this thread, holds it for the
/// duration of `f`. Frame and lock are released on every exit path.
pub fn call_with_extension_lock<T, F>(
    context: &BridgeContext,
    thread: &ExtensionThread,
    block: Value,
    f: F,
) -> RopeResult<T>
where
    F: FnOnce(&ExtensionFrame<'_>) -> RopeResult<T>,
{
    let frame = thread.stack.push(block);
    let lock = context.extension_lock();
    let _held = if context.options().cext_lock && !lock.is_held_by_current_thread() {
        lock.lock_interruptibly(&thread.safepoints)?;
        Some(Held { lock })
    } else {
        None
    };
    f(&frame)
}

struct Relock<'a> {
    lock: &'a ExtensionLock,
    safepoints: &'a SafepointQueue,
    count: usize,
}

impl Relock<'_> {
    fn finish(mut self) -> RopeResult<()> {
        let count = std::mem::take(&mut self.count);
        self.lock.reacquire(count, self.safepoints)
    }
}

impl Drop for Relock<'_> {
    fn drop(&mut self) {
        if self.count > 0 {
            if let Err(error) = self.lock.reacquire(self.count, self.safepoints) {
                tracing::warn!(%error, "safepoint failed while relocking after unwind");
            }
        }
    }
}

/// Runs `f` with the extension lock released, for blocking regions. The
/// lock is re-taken to its previous depth afterwards, even if `f` failed.
pub fn call_without_extension_lock<T, F>(
    context: &BridgeContext,
    thread: &ExtensionThread,
    f: F,
) -> RopeResult<T>
where
    F: FnOnce() -> RopeResult<T>,
{
    let lock = context.extension_lock();
    let relock = Relock {
        lock,
        safepoints: &thread.safepoints,
        count: lock.release_all(),
    };
    let result = f();
    relock.finish()?;
    result
}
