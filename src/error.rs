use thiserror::Error;

use crate::encoding::Encoding;

/// Errors raised by the rope engine and the native bridge.
///
/// These map onto Ruby-level exceptions at the calling layer (`IndexError`,
/// `NoMemoryError`, `RuntimeError`, ...). Nothing in this crate swallows them
/// except where a documented fallback exists (marking an unresolvable handle).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RopeError {
    #[error("index {index} out of bounds for length {length}")]
    OutOfBounds { index: usize, length: usize },

    #[error("byte length overflow")]
    LengthOverflow,

    #[error("failed to allocate native buffer of {capacity} bytes")]
    AllocationFailed { capacity: usize },

    #[error("native handle not found ({handle:#x})")]
    HandleNotFound { handle: u64 },

    #[error("incompatible character encodings: {left} and {right}")]
    EncodingMismatch {
        left: &'static str,
        right: &'static str,
    },

    #[error("invalid byte sequence in {0}")]
    InvalidByteSequence(&'static str),

    #[error("wrong argument type {actual} (expected {expected})")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("interrupted: {0}")]
    Interrupted(String),
}

impl RopeError {
    pub(crate) fn out_of_bounds(index: usize, length: usize) -> Self {
        RopeError::OutOfBounds { index, length }
    }

    pub(crate) fn encoding_mismatch(left: Encoding, right: Encoding) -> Self {
        RopeError::EncodingMismatch {
            left: left.name(),
            right: right.name(),
        }
    }
}

pub type RopeResult<T> = Result<T, RopeError>;
