//! The `VALUE` encoding handed to native code.
//!
//! Immediates are encoded arithmetically and need no table. Object handles
//! are 8-byte aligned addresses in a reserved region that no real allocation
//! uses, carved into blocks of [`BLOCK_SIZE`] slots.

use std::fmt;

use crate::runtime::value::Value;

pub const FALSE_HANDLE: u64 = 0b000;
pub const TRUE_HANDLE: u64 = 0b010;
pub const NIL_HANDLE: u64 = 0b100;
pub const UNDEF_HANDLE: u64 = 0b110;

pub const LONG_TAG: u64 = 1;
pub const TAG_MASK: u64 = 0b111;
pub const TAG_BITS: u32 = 3;

pub const MIN_FIXNUM_VALUE: i64 = -(1 << 62);
pub const MAX_FIXNUM_VALUE: i64 = (1 << 62) - 1;

pub const BLOCK_BITS: u32 = 15;
/// Handles per block.
pub const BLOCK_SIZE: usize = 1 << (BLOCK_BITS - TAG_BITS);
pub const BLOCK_BYTE_SIZE: u64 = (BLOCK_SIZE as u64) << TAG_BITS;
const OFFSET_MASK: u64 = (1 << BLOCK_BITS) - 1;
/// Start of the reserved handle region.
pub const ALLOCATION_BASE: u64 = 0x0bad << 48;

/// An opaque `VALUE` as seen by native code.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(pub(crate) u64);

impl Handle {
    pub const FALSE: Handle = Handle(FALSE_HANDLE);
    pub const TRUE: Handle = Handle(TRUE_HANDLE);
    pub const NIL: Handle = Handle(NIL_HANDLE);
    pub const UNDEF: Handle = Handle(UNDEF_HANDLE);

    /// Reinterprets a raw `VALUE` coming back from native code.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }

    /// The precomputed handle for an immediate, if `value` has one.
    pub fn for_immediate(value: &Value) -> Option<Handle> {
        match value {
            Value::False => Some(Handle::FALSE),
            Value::True => Some(Handle::TRUE),
            Value::Nil => Some(Handle::NIL),
            Value::Undef => Some(Handle::UNDEF),
            Value::Integer(v) if (MIN_FIXNUM_VALUE..=MAX_FIXNUM_VALUE).contains(v) => {
                Some(Handle(((*v as u64) << 1) | LONG_TAG))
            }
            _ => None,
        }
    }

    /// Decodes an immediate handle without any table lookup.
    pub fn decode_immediate(self) -> Option<Value> {
        match self.0 {
            FALSE_HANDLE => Some(Value::False),
            TRUE_HANDLE => Some(Value::True),
            NIL_HANDLE => Some(Value::Nil),
            UNDEF_HANDLE => Some(Value::Undef),
            _ if self.is_tagged_long() => Some(Value::Integer(self.untag_long())),
            _ => None,
        }
    }

    pub fn is_tagged_long(self) -> bool {
        self.0 & LONG_TAG == LONG_TAG
    }

    /// Whether this is an aligned, non-`false` handle, i.e. not an immediate.
    pub fn is_tagged_object(self) -> bool {
        self.0 != FALSE_HANDLE && self.0 & TAG_MASK == 0
    }

    pub fn untag_long(self) -> i64 {
        (self.0 as i64) >> 1
    }

    /// Position of the owning block in the block map, for handles in the
    /// reserved region.
    pub fn block_index(self) -> Option<usize> {
        if !self.is_tagged_object() || self.0 < ALLOCATION_BASE {
            return None;
        }
        Some(((self.0 - ALLOCATION_BASE) >> BLOCK_BITS) as usize)
    }

    /// Slot within the owning block.
    pub fn slot(self) -> usize {
        ((self.0 & OFFSET_MASK) >> TAG_BITS) as usize
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({:#x})", self.0)
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_singleton_handles() {
        assert_eq!(Handle::for_immediate(&Value::False), Some(Handle(0)));
        assert_eq!(Handle::for_immediate(&Value::True), Some(Handle(2)));
        assert_eq!(Handle::for_immediate(&Value::Nil), Some(Handle(4)));
        assert_eq!(Handle::for_immediate(&Value::Undef), Some(Handle(6)));
        assert_eq!(Handle(4).decode_immediate(), Some(Value::Nil));
    }

    #[test]
    fn test_fixnum_encoding() {
        for v in [0, 1, -1, 42, MIN_FIXNUM_VALUE, MAX_FIXNUM_VALUE] {
            let handle = Handle::for_immediate(&Value::Integer(v)).unwrap();
            assert!(handle.is_tagged_long());
            assert_eq!(handle.decode_immediate(), Some(Value::Integer(v)));
        }
        assert_eq!(Handle::for_immediate(&Value::Integer(3)), Some(Handle(7)));
        assert_eq!(Handle::for_immediate(&Value::Integer(MAX_FIXNUM_VALUE + 1)), None);
        assert_eq!(Handle::for_immediate(&Value::Float(1.5)), None);
    }

    #[test]
    fn test_block_geometry() {
        assert_eq!(BLOCK_SIZE, 4096);
        let handle = Handle(ALLOCATION_BASE + BLOCK_BYTE_SIZE * 2 + 8 * 5);
        assert!(handle.is_tagged_object());
        assert_eq!(handle.block_index(), Some(2));
        assert_eq!(handle.slot(), 5);
        assert_eq!(handle.decode_immediate(), None);
        assert_eq!(Handle(0x1000).block_index(), None);
        assert_eq!(Handle::NIL.block_index(), None);
    }
}
