use std::sync::Arc;

use crate::error::{RopeError, RopeResult};
use crate::options::Options;
use crate::rope::{Rope, compatible_encoding};
use crate::runtime::finalization::FinalizationService;
use crate::runtime::scan_stats;
use crate::runtime::symbol_table::SymbolTable;
use crate::runtime::value::Value;

use super::call_stack::ExtensionCallStack;
use super::extension_lock::ExtensionLock;
use super::handle::Handle;
use super::marking::MarkingService;
use super::telemetry::BridgeStats;
use super::wrapper_manager::ValueWrapperManager;

/// What one [`BridgeContext::collect`] pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectionSummary {
    pub markers_run: usize,
    pub handles_released: usize,
    pub buffers_freed: usize,
}

/// Process-wide state shared by every thread that calls into native code.
#[derive(Debug)]
pub struct BridgeContext {
    options: Options,
    finalizers: FinalizationService,
    marking: Arc<MarkingService>,
    wrappers: ValueWrapperManager,
    lock: ExtensionLock,
    symbols: SymbolTable,
}

impl Default for BridgeContext {
    fn default() -> Self {
        Self::new(Options::default())
    }
}

impl BridgeContext {
    pub fn new(options: Options) -> Self {
        let marking = Arc::new(MarkingService::new(options.marking_cache));
        let wrappers = ValueWrapperManager::new(&options, Arc::clone(&marking));
        let lock = ExtensionLock::new(options.safepoint_poll_interval());
        tracing::debug!(?options, "created bridge context");
        Self {
            options,
            finalizers: FinalizationService::new(),
            marking,
            wrappers,
            lock,
            symbols: SymbolTable::new(),
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn finalizers(&self) -> &FinalizationService {
        &self.finalizers
    }

    pub fn marking(&self) -> &MarkingService {
        &self.marking
    }

    pub fn wrappers(&self) -> &ValueWrapperManager {
        &self.wrappers
    }

    pub fn extension_lock(&self) -> &ExtensionLock {
        &self.lock
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn wrap(&self, value: &Value) -> Handle {
        self.wrappers.wrap(value)
    }

    pub fn unwrap(&self, handle: Handle) -> RopeResult<Value> {
        self.wrappers.unwrap(handle)
    }

    pub fn is_native_object(&self, handle: Handle) -> bool {
        self.wrappers.is_native_object(handle)
    }

    /// The handle of the symbol named `name`.
    pub fn symbol_handle(&self, name: &str) -> Handle {
        let symbol = Value::Object(self.symbols.intern_str(name));
        self.wrap(&symbol)
    }

    /// Pins `value` for the rest of the innermost extension frame and
    /// buffers it for the marking service. A wrapped bignum or float is
    /// pinned through its box.
    pub fn keep_alive(&self, stack: &ExtensionCallStack, value: Value) {
        let pinned = self.wrappers.pin_for(&value).unwrap_or(value);
        stack.keep_alive(pinned.clone());
        self.marking.keep_object(pinned);
    }

    /// Concatenates with the configured flattening depth.
    pub fn concat(&self, left: &Rope, right: &Rope) -> RopeResult<Rope> {
        let encoding = compatible_encoding(left, right)
            .ok_or_else(|| RopeError::encoding_mismatch(left.encoding(), right.encoding()))?;
        left.concat_bounded(right, encoding, self.options.flatten_depth_threshold)
    }

    /// Runs the markers, invalidates handles whose objects died, and frees
    /// native buffers whose owners are gone.
    pub fn collect(&self, stack: &ExtensionCallStack) -> CollectionSummary {
        let markers_run = self.marking.run_all_markers(stack, &self.wrappers);
        let handles_released = self.wrappers.release_unreachable();
        let buffers_freed = self.finalizers.drain();
        CollectionSummary {
            markers_run,
            handles_released,
            buffers_freed,
        }
    }

    pub fn stats(&self) -> BridgeStats {
        BridgeStats {
            handles: self.wrappers.stats(),
            markers: self.marking.marker_count(),
            marker_runs: self.marking.runs(),
            marking_pending: self.marking.has_pending(),
            pending_finalizers: self.finalizers.pending(),
            total_finalized: self.finalizers.total_finalized(),
            symbols: self.symbols.len(),
            scans: scan_stats::snapshot(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::{CodeRange, Encoding};

    #[test]
    fn test_concat_respects_flatten_threshold() {
        let context = BridgeContext::new(Options {
            flatten_depth_threshold: 2,
            ..Options::default()
        });
        let a = Rope::utf8("a");
        let ab = context.concat(&a, &Rope::utf8("b")).unwrap();
        assert_eq!(ab.depth(), 2);
        let abc = context.concat(&ab, &Rope::utf8("c")).unwrap();
        assert_eq!(abc.depth(), 1);
        assert_eq!(abc.bytes(), b"abc");
        let abcd = context.concat(&abc, &Rope::utf8("d")).unwrap();
        assert_eq!(abcd.depth(), 2);
    }

    #[test]
    fn test_concat_rejects_incompatible_encodings() {
        let context = BridgeContext::default();
        let utf16 = Rope::from_bytes(vec![0x61, 0x00], Encoding::Utf16Le, CodeRange::Unknown);
        assert!(matches!(
            context.concat(&Rope::utf8("é"), &utf16),
            Err(RopeError::EncodingMismatch { .. })
        ));
    }

    #[test]
    fn test_symbol_handles_are_stable() {
        let context = BridgeContext::default();
        let first = context.symbol_handle("to_s");
        assert_eq!(context.symbol_handle("to_s"), first);
        assert_ne!(context.symbol_handle("to_str"), first);
        assert!(context.is_native_object(first));
    }

    #[test]
    fn test_debug_shows_handle_table() {
        let context = BridgeContext::default();
        context.wrap(&Value::Float(0.5));
        let rendered = format!("{:?}", context);
        assert!(rendered.contains("ValueWrapperManager"));
        assert!(rendered.contains("live_wrappers: 1"));
    }

    #[test]
    fn test_keep_alive_pins_a_boxed_number() {
        let context = BridgeContext::default();
        let stack = ExtensionCallStack::new();
        let _frame = stack.push(Value::Nil);
        let float = Value::Float(3.75);
        let handle = context.wrap(&float);
        context.keep_alive(&stack, float.clone());
        context.wrappers().retire_current_thread();
        context.collect(&stack);
        assert_eq!(context.unwrap(handle), Ok(float));
    }

    #[test]
    fn test_collect_frees_released_native_strings() {
        let context = BridgeContext::default();
        let stack = ExtensionCallStack::new();
        let object = crate::cext::string_nodes::str_new_nul(context.finalizers(), 16).unwrap();
        assert_eq!(context.finalizers().pending(), 1);
        drop(object);
        let summary = context.collect(&stack);
        assert_eq!(summary.buffers_freed, 1);
        assert_eq!(context.stats().total_finalized, 1);
    }
}
