//! Per-thread record of the native calls in progress.

use std::cell::RefCell;

use crate::runtime::value::Value;

#[derive(Debug)]
struct Entry {
    block: Value,
    preserved: Vec<Value>,
}

/// The stack of extension frames for one thread.
///
/// The bottom entry always exists and carries `nil` as its block. Frames are
/// pushed with [`ExtensionCallStack::push`] and popped when the returned
/// guard drops, so the stack unwinds in order on every exit path, panics
/// included. Not `Sync`: each thread owns its own stack.
#[derive(Debug)]
pub struct ExtensionCallStack {
    entries: RefCell<Vec<Entry>>,
}

impl Default for ExtensionCallStack {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtensionCallStack {
    pub fn new() -> Self {
        Self {
            entries: RefCell::new(vec![Entry {
                block: Value::Nil,
                preserved: Vec::new(),
            }]),
        }
    }

    pub fn push(&self, block: Value) -> ExtensionFrame<'_> {
        let mut entries = self.entries.borrow_mut();
        entries.push(Entry {
            block,
            preserved: Vec::new(),
        });
        ExtensionFrame {
            stack: self,
            depth: entries.len(),
        }
    }

    fn pop(&self, depth: usize) {
        let mut entries = self.entries.borrow_mut();
        debug_assert_eq!(entries.len(), depth, "extension frames popped out of order");
        entries.truncate(depth - 1);
    }

    /// The block passed to the innermost native call (`rb_block_proc`).
    pub fn block(&self) -> Value {
        self.entries
            .borrow()
            .last()
            .map_or(Value::Nil, |entry| entry.block.clone())
    }

    /// Pins `value` until the innermost frame is popped.
    pub fn keep_alive(&self, value: Value) {
        if let Some(entry) = self.entries.borrow_mut().last_mut() {
            entry.preserved.push(value);
        }
    }

    /// Values pinned by the innermost frame.
    pub fn kept_objects(&self) -> Vec<Value> {
        self.entries
            .borrow()
            .last()
            .map_or_else(Vec::new, |entry| entry.preserved.clone())
    }

    /// Number of frames above the bottom entry.
    pub fn depth(&self) -> usize {
        self.entries.borrow().len() - 1
    }
}

/// Guard for one pushed frame; pops it on drop.
#[derive(Debug)]
pub struct ExtensionFrame<'a> {
    stack: &'a ExtensionCallStack,
    depth: usize,
}

impl ExtensionFrame<'_> {
    pub fn stack(&self) -> &ExtensionCallStack {
        self.stack
    }

    pub fn keep_alive(&self, value: Value) {
        self.stack.keep_alive(value);
    }
}

impl Drop for ExtensionFrame<'_> {
    fn drop(&mut self) {
        self.stack.pop(self.depth);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rope::Rope;

    #[test]
    fn test_frames_nest_and_pop() {
        let stack = ExtensionCallStack::new();
        assert_eq!(stack.block(), Value::Nil);
        {
            let _outer = stack.push(Value::Integer(1));
            {
                let _inner = stack.push(Value::Integer(2));
                assert_eq!(stack.depth(), 2);
                assert_eq!(stack.block(), Value::Integer(2));
            }
            assert_eq!(stack.block(), Value::Integer(1));
        }
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn test_kept_objects_belong_to_innermost_frame() {
        let stack = ExtensionCallStack::new();
        let value = Value::string(Rope::utf8("pinned"));
        let frame = stack.push(Value::Nil);
        frame.keep_alive(value.clone());
        assert_eq!(stack.kept_objects(), vec![value.clone()]);
        drop(frame);
        assert!(stack.kept_objects().is_empty());
    }

    #[test]
    fn test_frame_pops_during_unwind() {
        let stack = ExtensionCallStack::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _frame = stack.push(Value::True);
            panic!("native call failed");
        }));
        assert!(result.is_err());
        assert_eq!(stack.depth(), 0);
    }
}
