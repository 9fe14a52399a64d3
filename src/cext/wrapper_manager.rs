use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, Weak};
use std::thread::{self, ThreadId};

use serde::Serialize;

use crate::error::{RopeError, RopeResult};
use crate::options::Options;
use crate::runtime::object::RubyObject;
use crate::runtime::share::share_value;
use crate::runtime::value::{ObjectRef, Value};

use super::handle::Handle;
use super::handle_block::{HandleBlock, HandleBlockAllocator};
use super::marking::MarkingService;
use super::wrapper::ValueWrapper;

/// Identity of a wrapped value. Objects by address, numbers by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum WrapperKey {
    Object(usize),
    Integer(i64),
    Float(u64),
}

impl WrapperKey {
    fn of(value: &Value) -> Option<WrapperKey> {
        match value {
            Value::Object(object) => Some(WrapperKey::Object(Arc::as_ptr(object) as usize)),
            Value::Integer(v) => Some(WrapperKey::Integer(*v)),
            Value::Float(v) => Some(WrapperKey::Float(v.to_bits())),
            Value::Nil | Value::True | Value::False | Value::Undef => None,
        }
    }
}

#[derive(Debug, Default)]
struct BlockState {
    map: Vec<Option<HandleBlock>>,
    current: HashMap<ThreadId, usize>,
    allocator: HandleBlockAllocator,
}

/// Handle blocks plus what retiring one needs. Shared with the per-thread
/// holders so a block can be retired when its thread exits.
#[derive(Debug)]
struct BlockTable {
    state: Mutex<BlockState>,
    marking: Arc<MarkingService>,
    keep_handles_alive: bool,
}

impl BlockTable {
    fn lock(&self) -> MutexGuard<'_, BlockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Retires `thread`'s current block, if any, and queues its pins.
    fn retire_thread(&self, thread: ThreadId) -> bool {
        let mut state = self.lock();
        let Some(index) = state.current.remove(&thread) else {
            return false;
        };
        if let Some(Some(block)) = state.map.get_mut(index) {
            let pins = block.retire(self.keep_handles_alive);
            self.marking.queue_for_marking(pins);
        }
        true
    }
}

/// The block tables a thread allocated from. Dropped at thread exit, which
/// retires the thread's current block in each table still alive.
#[derive(Default)]
struct ThreadBlocks {
    thread: Option<ThreadId>,
    tables: Vec<Weak<BlockTable>>,
}

impl ThreadBlocks {
    fn register(&mut self, thread: ThreadId, table: &Arc<BlockTable>) {
        self.thread = Some(thread);
        self.tables.retain(|held| held.strong_count() > 0);
        if !self.tables.iter().any(|held| std::ptr::eq(held.as_ptr(), Arc::as_ptr(table))) {
            self.tables.push(Arc::downgrade(table));
        }
    }
}

impl Drop for ThreadBlocks {
    fn drop(&mut self) {
        let Some(thread) = self.thread else {
            return;
        };
        for table in self.tables.drain(..) {
            let retired = table.upgrade().is_some_and(|table| table.retire_thread(thread));
            if retired {
                tracing::debug!(?thread, "retired handle block of exiting thread");
            }
        }
    }
}

thread_local! {
    static THREAD_BLOCKS: RefCell<ThreadBlocks> = RefCell::new(ThreadBlocks::default());
}

/// Counters describing the handle table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HandleTableStats {
    pub live_wrappers: usize,
    /// Handles whose referent is still reachable, across all blocks.
    pub live_handles: usize,
    pub blocks: usize,
    pub free_blocks: usize,
    pub total_handle_allocations: u64,
}

/// Maps managed values to handles and back.
///
/// The identity table is read-mostly: lookups take the read lock and only a
/// miss takes the write lock, where the lookup is repeated before a wrapper
/// is built, so one value never gets two live handles.
///
/// Lock order is identity table, then blocks, then the marking queue.
pub struct ValueWrapperManager {
    table: RwLock<HashMap<WrapperKey, Arc<ValueWrapper>>>,
    blocks: Arc<BlockTable>,
    keep_handles_alive: bool,
    record_allocations: bool,
    handle_allocations: AtomicU64,
}

impl ValueWrapperManager {
    pub fn new(options: &Options, marking: Arc<MarkingService>) -> Self {
        Self {
            table: RwLock::new(HashMap::new()),
            blocks: Arc::new(BlockTable {
                state: Mutex::new(BlockState::default()),
                marking,
                keep_handles_alive: options.keep_handles_alive,
            }),
            keep_handles_alive: options.keep_handles_alive,
            record_allocations: options.tonative_stats,
            handle_allocations: AtomicU64::new(0),
        }
    }

    /// The handle for `value`, creating a wrapper on first exposure.
    pub fn wrap(&self, value: &Value) -> Handle {
        if let Some(handle) = Handle::for_immediate(value) {
            return handle;
        }
        let Some(key) = WrapperKey::of(value) else {
            unreachable!("{} always has an immediate handle", value.type_name());
        };
        self.intern(key, value).handle()
    }

    /// The value behind `handle`.
    pub fn unwrap(&self, handle: Handle) -> RopeResult<Value> {
        if let Some(value) = handle.decode_immediate() {
            return Ok(value);
        }
        self.to_wrapper(handle)
            .and_then(|wrapper| wrapper.referent())
            .ok_or(RopeError::HandleNotFound {
                handle: handle.raw(),
            })
    }

    /// Whether `handle` refers to a table-backed object rather than an immediate.
    pub fn is_native_object(&self, handle: Handle) -> bool {
        handle.is_tagged_object()
    }

    /// The wrapper currently registered at `handle`, live or not.
    pub fn to_wrapper(&self, handle: Handle) -> Option<Arc<ValueWrapper>> {
        let index = handle.block_index()?;
        let state = self.blocks.lock();
        state
            .map
            .get(index)
            .and_then(Option::as_ref)
            .and_then(|block| block.get(handle))
            .cloned()
    }

    /// The wrapper for `value`, created if needed. `None` for values that
    /// are encoded directly in their handle.
    pub fn wrapper_for(&self, value: &Value) -> Option<Arc<ValueWrapper>> {
        if Handle::for_immediate(value).is_some() {
            return None;
        }
        let key = WrapperKey::of(value)?;
        Some(self.intern(key, value))
    }

    /// The heap object keeping `value`'s handle resolvable: the object
    /// itself, or the box of an already wrapped number.
    pub fn pin_for(&self, value: &Value) -> Option<Value> {
        if let Value::Object(_) = value {
            return Some(value.clone());
        }
        let key = WrapperKey::of(value)?;
        let table = self.table.read().unwrap_or_else(|e| e.into_inner());
        table.get(&key).and_then(|wrapper| wrapper.pin())
    }

    fn intern(&self, key: WrapperKey, value: &Value) -> Arc<ValueWrapper> {
        {
            let table = self.table.read().unwrap_or_else(|e| e.into_inner());
            if let Some(wrapper) = Self::lookup(&table, key, value) {
                return wrapper;
            }
        }

        // exposed objects may be touched from any native thread
        share_value(value);

        let mut table = self.table.write().unwrap_or_else(|e| e.into_inner());
        if let Some(wrapper) = Self::lookup(&table, key, value) {
            return wrapper;
        }
        let object = match value {
            Value::Object(object) => Arc::clone(object),
            number => RubyObject::new_boxed(number.clone()),
        };
        let wrapper = self.allocate_handle(&object);
        table.insert(key, Arc::clone(&wrapper));
        wrapper
    }

    /// A table entry is only a hit if it still resolves: an object address
    /// can be reused once its previous occupant died, and a number's box may
    /// have been collected.
    fn lookup(
        table: &HashMap<WrapperKey, Arc<ValueWrapper>>,
        key: WrapperKey,
        value: &Value,
    ) -> Option<Arc<ValueWrapper>> {
        let wrapper = table.get(&key)?;
        let valid = match value {
            Value::Object(object) => wrapper.wraps(object),
            _ => wrapper.is_live(),
        };
        valid.then(|| Arc::clone(wrapper))
    }

    fn allocate_handle(&self, object: &ObjectRef) -> Arc<ValueWrapper> {
        if self.record_allocations {
            self.handle_allocations.fetch_add(1, Ordering::Relaxed);
        }
        let thread = thread::current().id();
        let mut state = self.blocks.lock();
        let BlockState {
            map,
            current,
            allocator,
        } = &mut *state;

        let previous = match current.get(&thread) {
            Some(&index) => map.get_mut(index).and_then(Option::as_mut),
            None => None,
        };
        let block = match previous {
            Some(block) if !block.is_full() => block,
            full => {
                let first_block = full.is_none();
                if let Some(block) = full {
                    let pins = block.retire(self.keep_handles_alive);
                    self.blocks.marking.queue_for_marking(pins);
                }
                let block = HandleBlock::new(allocator.get_free_block());
                let index = block.index();
                tracing::debug!(index, base = block.base(), "allocated handle block");
                if map.len() <= index {
                    map.resize_with(index + 1, || None);
                }
                current.insert(thread, index);
                if first_block {
                    // a thread already tearing down its locals keeps the block
                    // until retire_current_thread
                    let _ = THREAD_BLOCKS.try_with(|held| held.borrow_mut().register(thread, &self.blocks));
                }
                map[index].insert(block)
            }
        };
        block.allocate(object)
    }

    /// Retires the calling thread's current block, queueing its pins for
    /// marking. Also happens on its own when the thread exits.
    pub fn retire_current_thread(&self) {
        self.blocks.retire_thread(thread::current().id());
    }

    /// Threads that currently own a block.
    pub fn threads_with_blocks(&self) -> usize {
        self.blocks.lock().current.len()
    }

    /// Invalidates handles whose referent has died and recycles retired
    /// blocks with no live handles left. Returns the number of handles
    /// invalidated.
    pub fn release_unreachable(&self) -> usize {
        let mut table = self.table.write().unwrap_or_else(|e| e.into_inner());
        table.retain(|_, wrapper| wrapper.is_live());

        let mut state = self.blocks.lock();
        let mut released = 0;
        let mut recycled = Vec::new();
        for slot in state.map.iter_mut() {
            if let Some(block) = slot {
                released += block.release_dead();
                if !self.keep_handles_alive && block.is_vacated() {
                    recycled.push(block.base());
                    *slot = None;
                }
            }
        }
        let recycled_blocks = recycled.len();
        for base in recycled {
            state.allocator.add_free_block(base);
        }
        if released > 0 || recycled_blocks > 0 {
            tracing::debug!(released, recycled_blocks, "released unreachable handles");
        }
        released
    }

    pub fn total_handle_allocations(&self) -> u64 {
        self.handle_allocations.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> HandleTableStats {
        let live_wrappers = self.table.read().unwrap_or_else(|e| e.into_inner()).len();
        let state = self.blocks.lock();
        HandleTableStats {
            live_wrappers,
            live_handles: state.map.iter().flatten().map(HandleBlock::live_handles).sum(),
            blocks: state.map.iter().filter(|slot| slot.is_some()).count(),
            free_blocks: state.allocator.free_block_count(),
            total_handle_allocations: self.total_handle_allocations(),
        }
    }
}

impl fmt::Debug for ValueWrapperManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueWrapperManager")
            .field("stats", &self.stats())
            .field("keep_handles_alive", &self.keep_handles_alive)
            .field("record_allocations", &self.record_allocations)
            .finish()
    }
}
