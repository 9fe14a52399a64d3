//! Rope strings and the native extension bridge of a Ruby runtime.
//!
//! [`rope`] holds the immutable string representation and its operations,
//! [`native`] the mutable native-memory strings C extensions write through,
//! and [`cext`] the handle table, marking service and extension lock that
//! let native code hold on to managed values.

pub mod cext;
pub mod encoding;
pub mod error;
pub mod native;
pub mod options;
pub mod rope;
pub mod runtime;
