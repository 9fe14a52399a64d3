use std::collections::VecDeque;
use std::sync::Mutex;

use crate::error::RopeResult;

/// Action another thread asks this one to run at its next safepoint.
pub type SafepointAction = Box<dyn FnOnce() -> RopeResult<()> + Send>;

/// Per-thread queue of pending safepoint actions.
///
/// Any thread may `post`; only the owning thread `poll`s, which it does
/// while blocked on the extension lock and at other interruptible points.
#[derive(Default)]
pub struct SafepointQueue {
    actions: Mutex<VecDeque<SafepointAction>>,
}

impl SafepointQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn post<F>(&self, action: F)
    where
        F: FnOnce() -> RopeResult<()> + Send + 'static,
    {
        self.actions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(Box::new(action));
    }

    pub fn has_pending(&self) -> bool {
        !self.actions.lock().unwrap_or_else(|e| e.into_inner()).is_empty()
    }

    /// Runs pending actions in posting order. Stops at the first error and
    /// returns it; the remaining actions stay queued.
    pub fn poll(&self) -> RopeResult<usize> {
        let mut ran = 0;
        loop {
            // popped under the lock, run without it
            let next = self
                .actions
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .pop_front();
            let Some(action) = next else {
                return Ok(ran);
            };
            action()?;
            ran += 1;
        }
    }
}

impl std::fmt::Debug for SafepointQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pending = self.actions.lock().unwrap_or_else(|e| e.into_inner()).len();
        f.debug_struct("SafepointQueue")
            .field("pending", &pending)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RopeError;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_poll_runs_in_order_and_stops_on_error() {
        let queue = SafepointQueue::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        queue.post(move || {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        queue.post(|| Err(RopeError::Interrupted("raise".into())));
        queue.post(|| Ok(()));

        assert_eq!(queue.poll(), Err(RopeError::Interrupted("raise".into())));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(queue.has_pending());
        assert_eq!(queue.poll(), Ok(1));
        assert!(!queue.has_pending());
    }
}
