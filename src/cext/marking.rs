//! Approximated GC roots for native code.
//!
//! Native structs hold handles the managed side cannot see. A marker
//! registered for the owning object re-discovers those handles on each run
//! and the resulting set is attached to the owner, keeping the referents
//! reachable until the next run replaces it.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crate::error::RopeResult;
use crate::runtime::object::RubyObject;
use crate::runtime::value::{ObjectRef, Value};

use super::call_stack::ExtensionCallStack;
use super::handle::Handle;
use super::wrapper_manager::ValueWrapperManager;

/// Callback that marks the native references of one owner object.
///
/// The owner is passed in on every run rather than captured, so registering
/// a marker never keeps its owner alive.
pub type MarkerAction = dyn Fn(&ObjectRef, &mut MarkSession<'_>) -> RopeResult<()> + Send + Sync;

struct Marker {
    owner: Weak<RubyObject>,
    action: Arc<MarkerAction>,
}

/// One marking pass over a set of handles.
///
/// Adding the same handle twice records it once. That state belongs to the
/// session alone, so sessions may overlap on one thread or across threads.
pub struct MarkSession<'a> {
    wrappers: &'a ValueWrapperManager,
    previous: Vec<Value>,
    marks: Vec<Value>,
    seen: HashSet<Handle>,
}

impl<'a> MarkSession<'a> {
    /// Starts a session. `previous` stays reachable until the session ends,
    /// so nested calls never lose their ancestors' marks midway.
    pub fn start_marking(wrappers: &'a ValueWrapperManager, previous: Vec<Value>) -> Self {
        Self {
            wrappers,
            previous,
            marks: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Records the object behind `handle` as reachable. A boxed number is
    /// recorded as its box.
    ///
    /// Immediates need no marking and a handle whose referent is already
    /// gone is ignored: a weakly reachable object marking another one is an
    /// expected race.
    pub fn add_mark(&mut self, handle: Handle) {
        if !handle.is_tagged_object() || self.seen.contains(&handle) {
            return;
        }
        let Some(pin) = self.wrappers.to_wrapper(handle).and_then(|wrapper| wrapper.pin()) else {
            return;
        };
        self.seen.insert(handle);
        self.marks.push(pin);
    }

    /// Marks a managed value directly, wrapping it if it was never exposed.
    pub fn add_mark_value(&mut self, value: &Value) {
        let handle = self.wrappers.wrap(value);
        self.add_mark(handle);
    }

    pub fn previous(&self) -> &[Value] {
        &self.previous
    }

    pub fn len(&self) -> usize {
        self.marks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }

    /// Ends the session and returns what it marked.
    pub fn finish_marking(self) -> Vec<Value> {
        self.marks
    }
}

/// Registry of per-object markers plus the queue of values waiting for the
/// next marker run.
pub struct MarkingService {
    markers: Mutex<Vec<Marker>>,
    queue: Mutex<Vec<Vec<Value>>>,
    kept: Mutex<Vec<Value>>,
    marking_cache: usize,
    runs: AtomicU64,
    run_lock: Mutex<()>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl MarkingService {
    pub fn new(marking_cache: usize) -> Self {
        Self {
            markers: Mutex::new(Vec::new()),
            queue: Mutex::new(Vec::new()),
            kept: Mutex::new(Vec::with_capacity(marking_cache)),
            marking_cache: marking_cache.max(1),
            runs: AtomicU64::new(0),
            run_lock: Mutex::new(()),
        }
    }

    /// Registers `action` to mark on behalf of `owner`.
    pub fn add_marker<F>(&self, owner: &ObjectRef, action: F)
    where
        F: Fn(&ObjectRef, &mut MarkSession<'_>) -> RopeResult<()> + Send + Sync + 'static,
    {
        lock(&self.markers).push(Marker {
            owner: Arc::downgrade(owner),
            action: Arc::new(action),
        });
    }

    /// Holds `values` until the next marker run.
    pub fn queue_for_marking(&self, values: Vec<Value>) {
        lock(&self.queue).push(values);
    }

    /// Pins `value` until a marker run after the kept buffer fills.
    pub fn keep_object(&self, value: Value) {
        let full = {
            let mut kept = lock(&self.kept);
            kept.push(value);
            if kept.len() >= self.marking_cache {
                Some(std::mem::replace(
                    &mut *kept,
                    Vec::with_capacity(self.marking_cache),
                ))
            } else {
                None
            }
        };
        if let Some(values) = full {
            self.queue_for_marking(values);
        }
    }

    pub fn has_pending(&self) -> bool {
        !lock(&self.queue).is_empty()
    }

    pub(crate) fn take_queued(&self) -> Vec<Vec<Value>> {
        std::mem::take(&mut *lock(&self.queue))
    }

    /// Number of registered markers, dead owners included until the next run.
    pub fn marker_count(&self) -> usize {
        lock(&self.markers).len()
    }

    pub fn runs(&self) -> u64 {
        self.runs.load(Ordering::Relaxed)
    }

    /// Runs every live marker and attaches each result to its owner.
    ///
    /// Queued values stay pinned for the duration of the run and are released
    /// afterwards. A marker that fails is logged and skipped; its owner keeps
    /// its previous marks. Markers whose owner died are dropped. Returns the
    /// number of markers run.
    pub fn run_all_markers(&self, stack: &ExtensionCallStack, wrappers: &ValueWrapperManager) -> usize {
        let _running = lock(&self.run_lock);
        let held = self.take_queued();

        let live: Vec<(ObjectRef, Arc<MarkerAction>)> = {
            let mut markers = lock(&self.markers);
            markers.retain(|marker| marker.owner.strong_count() > 0);
            markers
                .iter()
                .filter_map(|marker| {
                    let owner = marker.owner.upgrade()?;
                    Some((owner, Arc::clone(&marker.action)))
                })
                .collect()
        };

        let _frame = stack.push(stack.block());
        let mut failures = 0;
        for (owner, action) in &live {
            let mut session = MarkSession::start_marking(wrappers, owner.marked_objects());
            match action(owner, &mut session) {
                Ok(()) => owner.set_marked_objects(session.finish_marking()),
                Err(error) => {
                    failures += 1;
                    tracing::warn!(owner = owner.type_name(), %error, "marker failed");
                }
            }
        }

        self.runs.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            markers = live.len(),
            failures,
            released_batches = held.len(),
            "ran markers"
        );
        live.len()
    }
}

impl std::fmt::Debug for MarkingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarkingService")
            .field("markers", &self.marker_count())
            .field("queued", &lock(&self.queue).len())
            .field("kept", &lock(&self.kept).len())
            .field("marking_cache", &self.marking_cache)
            .finish()
    }
}
