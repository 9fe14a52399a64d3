//! Managed-side collaborators of the rope engine and the native bridge.
//!
//! Values and objects use `Arc`, so object graphs may be cyclic (an array can
//! contain itself). Nothing here frees memory by reachability analysis; the
//! bridge tracks native reachability with weak references instead.

pub mod finalization;
pub mod object;
pub mod scan_stats;
pub mod share;
pub mod string;
pub mod symbol_table;
pub mod value;

pub use finalization::{FinalizationService, FinalizerId};
pub use object::{DataObject, ObjectPayload, RubyObject};
pub use string::{RubyString, StringStorage};
pub use symbol_table::SymbolTable;
pub use value::{ObjectRef, Value};
