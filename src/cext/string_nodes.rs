//! String primitives of the C API.
//!
//! Most of these force the string into native memory first, since C code
//! expects a stable `char *` it can write through.

use crate::encoding::{CodeRange, Encoding};
use crate::error::{RopeError, RopeResult};
use crate::native::NativeRope;
use crate::rope::Rope;
use crate::runtime::finalization::FinalizationService;
use crate::runtime::object::RubyObject;
use crate::runtime::string::{RubyString, StringStorage};
use crate::runtime::value::ObjectRef;

/// `rb_str_new(NULL, len)`: a zero-filled binary string already in native memory.
pub fn str_new_nul(finalizers: &FinalizationService, byte_length: usize) -> RopeResult<ObjectRef> {
    let native = NativeRope::new_buffer(finalizers, byte_length, byte_length, Encoding::Binary)?;
    Ok(RubyObject::new_native_string(native))
}

/// `rb_str_capacity`
pub fn str_capacity(string: &RubyString, finalizers: &FinalizationService) -> RopeResult<usize> {
    string.with_native(finalizers, |native| Ok(native.capacity()))
}

/// `rb_str_set_len`: an ASCII-only string stays ASCII-only, anything else
/// has to be rescanned.
pub fn str_set_len(
    string: &RubyString,
    finalizers: &FinalizationService,
    byte_length: usize,
) -> RopeResult<()> {
    string.with_native(finalizers, |native| {
        if native.raw_code_range() == CodeRange::SevenBit {
            native.set_byte_length(byte_length, Some(byte_length), CodeRange::SevenBit, finalizers)
        } else {
            native.set_byte_length(byte_length, None, CodeRange::Unknown, finalizers)
        }
    })
}

/// `rb_str_resize`: always forgets the code range, like MRI.
pub fn str_resize(
    string: &RubyString,
    finalizers: &FinalizationService,
    byte_length: usize,
) -> RopeResult<()> {
    string.with_native(finalizers, |native| {
        if native.byte_length() == byte_length {
            native.clear_code_range();
            Ok(())
        } else {
            native.resize(byte_length, finalizers)
        }
    })
}

/// `rb_enc_coderange_clear`. Only native strings can change behind the
/// engine's back; a managed rope's cached range is always accurate.
pub fn enc_coderange_clear(string: &RubyString) {
    string.with_storage(|storage| {
        if let StringStorage::Native(native) = storage {
            native.clear_code_range();
        }
    });
}

/// `RSTRING_PTR`: the address of the string's native buffer.
pub fn string_pointer_to_native(
    string: &RubyString,
    finalizers: &FinalizationService,
) -> RopeResult<usize> {
    string.to_native(finalizers)
}

pub fn string_is_native(string: &RubyString) -> bool {
    string.is_native()
}

/// Reads the byte at `index` through the string pointer.
///
/// A native string may be read anywhere up to and including its terminator
/// slot. A managed string reads as 0 from `byte_length` onwards, as if it
/// were NUL-padded.
pub fn string_pointer_read(string: &RubyString, index: usize) -> RopeResult<u8> {
    string.with_storage(|storage| match storage {
        StringStorage::Native(native) => native.read_raw(index),
        StringStorage::Managed(rope) if index < rope.byte_length() => rope.get_byte(index),
        StringStorage::Managed(_) => Ok(0),
    })
}

/// Writes the byte at `index` through the string pointer. A managed string
/// gets a modified copy of its content.
pub fn string_pointer_write(string: &RubyString, index: usize, value: u8) -> RopeResult<u8> {
    string.with_storage_mut(|storage| {
        let replacement = match storage {
            StringStorage::Native(native) => {
                native.set_byte(index, value)?;
                return Ok(value);
            }
            StringStorage::Managed(rope) => {
                if index >= rope.byte_length() {
                    return Err(RopeError::out_of_bounds(index, rope.byte_length()));
                }
                let mut bytes = rope.bytes().to_vec();
                bytes[index] = value;
                Rope::from_bytes(bytes, rope.encoding(), CodeRange::Unknown)
            }
        };
        *storage = StringStorage::Managed(replacement);
        Ok(value)
    })
}

/// Length of the C string: bytes up to the first NUL, or the whole string.
pub fn string_pointer_size(string: &RubyString) -> usize {
    string.with_storage(|storage| {
        let bytes = storage.bytes();
        bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len())
    })
}
