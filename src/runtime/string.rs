use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::encoding::{CodeRange, Encoding};
use crate::error::RopeResult;
use crate::native::NativeRope;
use crate::rope::Rope;
use crate::runtime::finalization::FinalizationService;

/// Where a string's bytes currently live.
#[derive(Debug)]
pub enum StringStorage {
    Managed(Rope),
    Native(NativeRope),
}

impl StringStorage {
    pub fn byte_length(&self) -> usize {
        match self {
            StringStorage::Managed(rope) => rope.byte_length(),
            StringStorage::Native(native) => native.byte_length(),
        }
    }

    pub fn encoding(&self) -> Encoding {
        match self {
            StringStorage::Managed(rope) => rope.encoding(),
            StringStorage::Native(native) => native.encoding(),
        }
    }

    pub fn code_range(&self) -> CodeRange {
        match self {
            StringStorage::Managed(rope) => rope.code_range(),
            StringStorage::Native(native) => native.code_range(),
        }
    }

    pub fn character_length(&self) -> usize {
        match self {
            StringStorage::Managed(rope) => rope.character_length(),
            StringStorage::Native(native) => native.character_length(),
        }
    }

    pub fn get_byte(&self, index: usize) -> RopeResult<u8> {
        match self {
            StringStorage::Managed(rope) => rope.get_byte(index),
            StringStorage::Native(native) => native.get_byte(index),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        match self {
            StringStorage::Managed(rope) => rope.bytes(),
            StringStorage::Native(native) => native.bytes(),
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, StringStorage::Native(_))
    }
}

/// The owning string object.
///
/// Readers and writers go through one lock, so a reader never sees a torn
/// replacement, and a native string has a single writer.
#[derive(Debug)]
pub struct RubyString {
    storage: RwLock<StringStorage>,
}

impl RubyString {
    pub fn new(rope: Rope) -> Self {
        Self {
            storage: RwLock::new(StringStorage::Managed(rope)),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, StringStorage> {
        self.storage.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, StringStorage> {
        self.storage.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn from_native(native: NativeRope) -> Self {
        Self {
            storage: RwLock::new(StringStorage::Native(native)),
        }
    }

    /// The current content as an immutable rope. A native string is copied.
    pub fn get_rope(&self) -> Rope {
        match &*self.read() {
            StringStorage::Managed(rope) => rope.clone(),
            StringStorage::Native(native) => native.to_rope(),
        }
    }

    /// Replaces the content. A displaced native buffer is released by the
    /// next finalization drain.
    pub fn set_rope(&self, rope: Rope) {
        *self.write() = StringStorage::Managed(rope);
    }

    pub fn is_native(&self) -> bool {
        self.read().is_native()
    }

    pub fn byte_length(&self) -> usize {
        self.read().byte_length()
    }

    pub fn encoding(&self) -> Encoding {
        self.read().encoding()
    }

    pub fn with_storage<R>(&self, f: impl FnOnce(&StringStorage) -> R) -> R {
        f(&self.read())
    }

    pub fn with_storage_mut<R>(&self, f: impl FnOnce(&mut StringStorage) -> R) -> R {
        f(&mut self.write())
    }

    /// Moves the content into native memory, once. Returns the buffer address.
    pub fn to_native(&self, finalizers: &FinalizationService) -> RopeResult<usize> {
        self.with_native(finalizers, |native| Ok(native.native_pointer()))
    }

    /// Runs `f` on the native form of this string, converting it first if
    /// needed. Conversion and `f` happen under one write lock.
    pub fn with_native<R>(
        &self,
        finalizers: &FinalizationService,
        f: impl FnOnce(&mut NativeRope) -> RopeResult<R>,
    ) -> RopeResult<R> {
        let mut storage = self.write();
        if let StringStorage::Managed(rope) = &*storage {
            let native = NativeRope::from_rope(finalizers, rope)?;
            tracing::debug!(
                byte_length = native.byte_length(),
                address = native.native_pointer(),
                "converted string to native"
            );
            *storage = StringStorage::Native(native);
        }
        match &mut *storage {
            StringStorage::Native(native) => f(native),
            StringStorage::Managed(_) => unreachable!("string was converted above"),
        }
    }
}
