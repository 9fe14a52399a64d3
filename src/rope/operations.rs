use crate::encoding::{CharLen, CodeRange, Encoding, precise_char_len};
use crate::error::{RopeError, RopeResult};

use super::{DEFAULT_FLATTEN_DEPTH, Rope, RopeKind};

/// The encoding a concatenation of `left` and `right` would carry, if any.
///
/// Same encodings are compatible. An empty side adopts the other side's
/// encoding. Between two ASCII-compatible encodings a 7-bit side yields to the
/// other side's encoding.
pub fn compatible_encoding(left: &Rope, right: &Rope) -> Option<Encoding> {
    let (l, r) = (left.encoding(), right.encoding());
    if l == r {
        return Some(l);
    }
    if right.is_empty() {
        return Some(l);
    }
    if left.is_empty() {
        return Some(r);
    }
    if !l.is_ascii_compatible() || !r.is_ascii_compatible() {
        return None;
    }
    if right.is_ascii_only() {
        Some(l)
    } else if left.is_ascii_only() {
        Some(r)
    } else {
        None
    }
}

/// Code range of `rope` reinterpreted in `encoding`, using only cached state.
fn cached_range_in(encoding: Encoding, rope: &Rope) -> CodeRange {
    match rope.raw_code_range() {
        code_range if rope.encoding() == encoding => code_range,
        CodeRange::SevenBit
            if encoding.is_ascii_compatible() && rope.encoding().is_ascii_compatible() =>
        {
            CodeRange::SevenBit
        }
        _ => CodeRange::Unknown,
    }
}

impl Rope {
    /// Concatenates with `other`, negotiating the result encoding.
    pub fn concat(&self, other: &Rope) -> RopeResult<Rope> {
        let encoding = compatible_encoding(self, other)
            .ok_or_else(|| RopeError::encoding_mismatch(self.encoding(), other.encoding()))?;
        self.concat_with_encoding(other, encoding)
    }

    pub fn concat_with_encoding(&self, other: &Rope, encoding: Encoding) -> RopeResult<Rope> {
        self.concat_bounded(other, encoding, DEFAULT_FLATTEN_DEPTH)
    }

    /// Concatenates, flattening into a leaf when the result would be deeper
    /// than `max_depth`.
    pub fn concat_bounded(&self, other: &Rope, encoding: Encoding, max_depth: u32) -> RopeResult<Rope> {
        let byte_length = self
            .byte_length()
            .checked_add(other.byte_length())
            .ok_or(RopeError::LengthOverflow)?;
        if other.is_empty() {
            return Ok(self.with_encoding(encoding));
        }
        if self.is_empty() {
            return Ok(other.with_encoding(encoding));
        }

        let code_range = match cached_range_in(encoding, self).common(cached_range_in(encoding, other)) {
            CodeRange::Broken => CodeRange::Unknown,
            code_range => code_range,
        };
        let depth = self.depth().max(other.depth()) + 1;
        if depth > max_depth {
            tracing::debug!(depth, byte_length, "concatenation too deep, flattening");
            let mut bytes = Vec::with_capacity(byte_length);
            bytes.extend_from_slice(self.bytes());
            bytes.extend_from_slice(other.bytes());
            return Ok(Rope::leaf(bytes.into(), encoding, code_range));
        }

        let kind = RopeKind::Concat {
            left: self.clone(),
            right: other.clone(),
        };
        Ok(Rope::from_node(kind, encoding, byte_length, depth, code_range, None))
    }

    /// `byte_length` bytes starting at `byte_offset`, sharing structure where possible.
    pub fn substring(&self, byte_offset: usize, byte_length: usize) -> RopeResult<Rope> {
        let end = byte_offset
            .checked_add(byte_length)
            .ok_or(RopeError::LengthOverflow)?;
        if end > self.byte_length() {
            return Err(RopeError::out_of_bounds(end, self.byte_length()));
        }
        let encoding = self.encoding();
        if byte_length == 0 {
            return Ok(Rope::empty(encoding));
        }
        if byte_length == self.byte_length() {
            return Ok(self.clone());
        }
        if byte_length == 1 && encoding.is_ascii_compatible() {
            return Ok(Rope::single_byte(encoding, self.get_byte(byte_offset)?));
        }

        match &self.0.kind {
            RopeKind::Substring {
                child,
                byte_offset: base,
            } => return child.substring(base + byte_offset, byte_length),
            RopeKind::Concat { left, right } => {
                let split = left.byte_length();
                if end <= split && left.encoding() == encoding {
                    return left.substring(byte_offset, byte_length);
                }
                if byte_offset >= split && right.encoding() == encoding {
                    return right.substring(byte_offset - split, byte_length);
                }
            }
            RopeKind::Repeating { child, .. } => {
                let unit = child.byte_length();
                if byte_offset / unit == (end - 1) / unit {
                    return child.substring(byte_offset % unit, byte_length);
                }
            }
            RopeKind::Leaf(_) => {}
        }

        let code_range = if self.raw_code_range() == CodeRange::SevenBit {
            CodeRange::SevenBit
        } else {
            CodeRange::Unknown
        };
        let kind = RopeKind::Substring {
            child: self.clone(),
            byte_offset,
        };
        Ok(Rope::from_node(
            kind,
            encoding,
            byte_length,
            self.depth() + 1,
            code_range,
            None,
        ))
    }

    /// This rope repeated `times` times.
    pub fn repeat(&self, times: usize) -> RopeResult<Rope> {
        let byte_length = self
            .byte_length()
            .checked_mul(times)
            .ok_or(RopeError::LengthOverflow)?;
        if byte_length == 0 {
            return Ok(Rope::empty(self.encoding()));
        }
        if times == 1 {
            return Ok(self.clone());
        }
        let code_range = match self.raw_code_range() {
            CodeRange::Broken => CodeRange::Unknown,
            code_range => code_range,
        };
        let character_length = self
            .raw_character_length()
            .filter(|_| code_range.is_known())
            .map(|n| n * times);
        let kind = RopeKind::Repeating {
            child: self.clone(),
            times,
        };
        Ok(Rope::from_node(
            kind,
            self.encoding(),
            byte_length,
            self.depth() + 1,
            code_range,
            character_length,
        ))
    }

    /// The same bytes labelled with another encoding.
    pub fn with_encoding(&self, encoding: Encoding) -> Rope {
        if encoding == self.encoding() {
            return self.clone();
        }
        if self.is_empty() {
            return Rope::empty(encoding);
        }
        let code_range = cached_range_in(encoding, self);
        let code_range = if code_range == CodeRange::SevenBit {
            code_range
        } else {
            CodeRange::Unknown
        };
        Rope::leaf(self.flattened().clone(), encoding, code_range)
    }

    /// Byte offset of the character at `char_index`. `character_length()` maps
    /// to `byte_length()`.
    pub fn char_offset_to_byte_offset(&self, char_index: usize) -> RopeResult<usize> {
        let byte_length = self.byte_length();
        let encoding = self.encoding();
        if encoding.is_single_byte() || self.code_range() == CodeRange::SevenBit {
            if char_index > byte_length {
                return Err(RopeError::out_of_bounds(char_index, byte_length));
            }
            return Ok(char_index);
        }

        let bytes = self.bytes();
        let mut p = 0;
        for _ in 0..char_index {
            if p >= byte_length {
                return Err(RopeError::out_of_bounds(char_index, self.character_length()));
            }
            p += match precise_char_len(encoding, bytes, p, byte_length) {
                CharLen::Found(n) => n,
                CharLen::Invalid | CharLen::NeedMore(_) => {
                    encoding.min_length().min(byte_length - p)
                }
            };
        }
        Ok(p)
    }

    /// Character-indexed substring.
    pub fn substring_chars(&self, char_offset: usize, char_length: usize) -> RopeResult<Rope> {
        let char_end = char_offset
            .checked_add(char_length)
            .ok_or(RopeError::LengthOverflow)?;
        let start = self.char_offset_to_byte_offset(char_offset)?;
        let end = self.char_offset_to_byte_offset(char_end)?;
        self.substring(start, end - start)
    }
}
