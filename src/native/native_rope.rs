use std::fmt;

use crate::encoding::{self, CodeRange, Encoding};
use crate::error::{RopeError, RopeResult};
use crate::rope::{LazyCodeRange, LazyLength, Rope};
use crate::runtime::finalization::FinalizationService;

use super::NativeBuffer;

/// A mutable string living in a [`NativeBuffer`].
///
/// Unlike [`Rope`], the length and contents change in place. Code range and
/// character length are cached the same way, and native writes the engine
/// cannot see must be followed by [`NativeRope::clear_code_range`].
///
/// Mutation is not synchronized here; the owning string's lock provides the
/// single writer.
pub struct NativeRope {
    buffer: NativeBuffer,
    byte_length: usize,
    encoding: Encoding,
    code_range: LazyCodeRange,
    character_length: LazyLength,
}

impl NativeRope {
    /// A zero-filled native string of `byte_length` bytes with room for `capacity`.
    pub fn new_buffer(
        finalizers: &FinalizationService,
        byte_length: usize,
        capacity: usize,
        encoding: Encoding,
    ) -> RopeResult<NativeRope> {
        let buffer = NativeBuffer::allocate(finalizers, capacity.max(byte_length))?;
        Ok(NativeRope {
            buffer,
            byte_length,
            encoding,
            code_range: LazyCodeRange::new(CodeRange::Unknown),
            character_length: LazyLength::new(None),
        })
    }

    /// Copies the flattened content of `rope` into a fresh buffer.
    pub fn from_rope(finalizers: &FinalizationService, rope: &Rope) -> RopeResult<NativeRope> {
        let bytes = rope.bytes();
        let mut buffer = NativeBuffer::allocate(finalizers, bytes.len())?;
        buffer.as_mut_slice()[..bytes.len()].copy_from_slice(bytes);
        Ok(NativeRope {
            buffer,
            byte_length: bytes.len(),
            encoding: rope.encoding(),
            code_range: LazyCodeRange::new(rope.raw_code_range()),
            character_length: LazyLength::new(rope.raw_character_length()),
        })
    }

    pub fn byte_length(&self) -> usize {
        self.byte_length
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Address of the first byte, for handing to native code.
    pub fn native_pointer(&self) -> usize {
        self.buffer.address()
    }

    /// The logical content.
    pub fn bytes(&self) -> &[u8] {
        &self.buffer.as_slice()[..self.byte_length]
    }

    pub fn get_byte(&self, index: usize) -> RopeResult<u8> {
        if index >= self.byte_length {
            return Err(RopeError::out_of_bounds(index, self.byte_length));
        }
        Ok(self.buffer.as_slice()[index])
    }

    /// Reads anywhere in the allocation, including past the logical length
    /// and the terminator slot.
    pub fn read_raw(&self, index: usize) -> RopeResult<u8> {
        self.buffer
            .as_slice()
            .get(index)
            .copied()
            .ok_or_else(|| RopeError::out_of_bounds(index, self.capacity() + 1))
    }

    /// Writes one byte anywhere in the allocation, as C code may.
    pub fn set_byte(&mut self, index: usize, value: u8) -> RopeResult<()> {
        let limit = self.capacity() + 1;
        let slot = self
            .buffer
            .as_mut_slice()
            .get_mut(index)
            .ok_or_else(|| RopeError::out_of_bounds(index, limit))?;
        *slot = value;
        if index < self.byte_length {
            self.clear_code_range();
        }
        Ok(())
    }

    pub fn code_range(&self) -> CodeRange {
        self.code_range.get_or_compute(|| {
            let (code_range, characters) =
                encoding::calculate_code_range_and_length(self.encoding, self.bytes());
            self.character_length.publish(characters);
            code_range
        })
    }

    pub fn raw_code_range(&self) -> CodeRange {
        self.code_range.get()
    }

    pub fn character_length(&self) -> usize {
        if let Some(n) = self.character_length.get() {
            return n;
        }
        let code_range = self.code_range();
        self.character_length.get_or_compute(|| {
            encoding::character_length(self.encoding, code_range, self.bytes(), 0, self.byte_length)
        })
    }

    /// Forgets the cached code range and character length after native writes.
    pub fn clear_code_range(&self) {
        self.code_range.clear();
        self.character_length.clear();
    }

    /// Changes the logical length, reallocating when it exceeds the capacity.
    ///
    /// `character_length` and `code_range` describe the new content when the
    /// caller knows them; pass `None` and `Unknown` otherwise.
    pub fn set_byte_length(
        &mut self,
        byte_length: usize,
        character_length: Option<usize>,
        code_range: CodeRange,
        finalizers: &FinalizationService,
    ) -> RopeResult<()> {
        if byte_length > self.capacity() {
            self.resize(byte_length, finalizers)?;
        }
        self.byte_length = byte_length;
        self.terminate();
        self.code_range = LazyCodeRange::new(code_range);
        self.character_length = LazyLength::new(character_length);
        Ok(())
    }

    /// Sets the length to `byte_length`, moving to a larger buffer when needed.
    ///
    /// On reallocation the first `min(old, new)` bytes are copied and the old
    /// buffer is released. If the new allocation fails nothing changes.
    pub fn resize(&mut self, byte_length: usize, finalizers: &FinalizationService) -> RopeResult<()> {
        if byte_length > self.capacity() {
            let mut buffer = NativeBuffer::allocate(finalizers, byte_length)?;
            let kept = self.byte_length.min(byte_length);
            buffer.as_mut_slice()[..kept].copy_from_slice(&self.bytes()[..kept]);
            let old = std::mem::replace(&mut self.buffer, buffer);
            let old_capacity = old.capacity();
            let old_finalizer = old.finalizer();
            drop(old);
            finalizers.finalize_now(old_finalizer);
            tracing::debug!(
                old_capacity,
                new_capacity = byte_length,
                "reallocated native string"
            );
        }
        self.byte_length = byte_length;
        self.terminate();
        self.clear_code_range();
        Ok(())
    }

    /// C callers rely on `ptr[len] == 0`. The slot always exists since the
    /// buffer carries one byte past its capacity.
    fn terminate(&mut self) {
        let end = self.byte_length;
        if let Some(slot) = self.buffer.as_mut_slice().get_mut(end) {
            *slot = 0;
        }
    }

    /// Copies the current content into an immutable leaf.
    pub fn to_rope(&self) -> Rope {
        let rope = Rope::from_bytes(self.bytes().to_vec(), self.encoding, self.raw_code_range());
        if let Some(n) = self.character_length.get() {
            rope.publish_character_length(n);
        }
        rope
    }
}

impl fmt::Debug for NativeRope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeRope")
            .field("address", &format_args!("{:#x}", self.native_pointer()))
            .field("byte_length", &self.byte_length)
            .field("capacity", &self.capacity())
            .field("encoding", &self.encoding.name())
            .field("code_range", &self.raw_code_range())
            .finish()
    }
}
