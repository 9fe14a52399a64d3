//! Mutable strings backed by raw memory, for handing to native code.

mod buffer;
mod native_rope;

pub use buffer::NativeBuffer;
pub use native_rope::NativeRope;
