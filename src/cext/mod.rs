//! The bridge between managed values and native extension code.
//!
//! Native code sees values only as [`Handle`]s. Immediates encode directly
//! into the handle word; everything else goes through the wrapper table.

pub mod call_stack;
pub mod context;
pub mod extension_lock;
pub mod handle;
pub mod handle_block;
pub mod marking;
pub mod safepoint;
pub mod string_nodes;
pub mod telemetry;
pub mod wrapper;
pub mod wrapper_manager;

#[cfg(test)]
mod string_nodes_test;

pub use call_stack::{ExtensionCallStack, ExtensionFrame};
pub use context::{BridgeContext, CollectionSummary};
pub use extension_lock::{
    ExtensionLock, ExtensionThread, call_with_extension_lock, call_without_extension_lock,
};
pub use handle::Handle;
pub use marking::{MarkSession, MarkingService};
pub use safepoint::SafepointQueue;
pub use telemetry::BridgeStats;
pub use wrapper::ValueWrapper;
pub use wrapper_manager::{HandleTableStats, ValueWrapperManager};
