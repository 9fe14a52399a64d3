use crate::error::{RopeError, RopeResult};

use super::{CodeRange, Encoding};

/// Result of measuring the character that starts at a byte position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharLen {
    /// A complete, valid character of this many bytes.
    Found(usize),
    /// The bytes can never start a valid character.
    Invalid,
    /// A valid prefix; this many more bytes are required.
    NeedMore(usize),
}

impl CharLen {
    pub fn is_found(self) -> bool {
        matches!(self, CharLen::Found(_))
    }
}

/// Measures the character starting at `start`, looking no further than `end`.
pub fn precise_char_len(encoding: Encoding, bytes: &[u8], start: usize, end: usize) -> CharLen {
    let bytes = &bytes[start..end];
    if bytes.is_empty() {
        return CharLen::NeedMore(encoding.min_length());
    }
    match encoding {
        Encoding::Binary | Encoding::Iso8859_1 => CharLen::Found(1),
        Encoding::UsAscii => {
            if bytes[0] < 0x80 {
                CharLen::Found(1)
            } else {
                CharLen::Invalid
            }
        }
        Encoding::Utf8 => utf8_char_len(bytes),
        Encoding::Utf16Le => utf16le_char_len(bytes),
    }
}

fn utf8_char_len(bytes: &[u8]) -> CharLen {
    let lead = bytes[0];
    if lead < 0x80 {
        return CharLen::Found(1);
    }
    // (sequence length, allowed range of the second byte)
    let (len, lo, hi) = match lead {
        0xC2..=0xDF => (2, 0x80, 0xBF),
        0xE0 => (3, 0xA0, 0xBF),
        0xE1..=0xEC | 0xEE..=0xEF => (3, 0x80, 0xBF),
        0xED => (3, 0x80, 0x9F),
        0xF0 => (4, 0x90, 0xBF),
        0xF1..=0xF3 => (4, 0x80, 0xBF),
        0xF4 => (4, 0x80, 0x8F),
        _ => return CharLen::Invalid,
    };
    for i in 1..len {
        let Some(&b) = bytes.get(i) else {
            return CharLen::NeedMore(len - i);
        };
        let (l, h) = if i == 1 { (lo, hi) } else { (0x80, 0xBF) };
        if b < l || b > h {
            return CharLen::Invalid;
        }
    }
    CharLen::Found(len)
}

fn utf16le_char_len(bytes: &[u8]) -> CharLen {
    if bytes.len() < 2 {
        return CharLen::NeedMore(2 - bytes.len());
    }
    let unit = u16::from_le_bytes([bytes[0], bytes[1]]);
    match unit {
        0xD800..=0xDBFF => {
            if bytes.len() < 4 {
                return CharLen::NeedMore(4 - bytes.len());
            }
            let low = u16::from_le_bytes([bytes[2], bytes[3]]);
            if (0xDC00..=0xDFFF).contains(&low) {
                CharLen::Found(4)
            } else {
                CharLen::Invalid
            }
        }
        0xDC00..=0xDFFF => CharLen::Invalid,
        _ => CharLen::Found(2),
    }
}

/// Bytes to skip past an invalid sequence at `p`.
fn invalid_step(encoding: Encoding, remaining: usize) -> usize {
    encoding.min_length().min(remaining)
}

/// Scans `bytes` once, returning both the code range and the character count.
///
/// Each byte (or minimum-width unit) of an invalid sequence counts as one
/// character, matching how Ruby measures broken strings.
pub fn calculate_code_range_and_length(encoding: Encoding, bytes: &[u8]) -> (CodeRange, usize) {
    if encoding.is_ascii_compatible() && bytes.is_ascii() {
        return (CodeRange::SevenBit, bytes.len());
    }
    if encoding.is_single_byte() && encoding != Encoding::UsAscii {
        return (CodeRange::Valid, bytes.len());
    }

    let end = bytes.len();
    let mut p = 0;
    let mut characters = 0;
    let mut broken = false;
    while p < end {
        match precise_char_len(encoding, bytes, p, end) {
            CharLen::Found(n) => p += n,
            CharLen::Invalid | CharLen::NeedMore(_) => {
                broken = true;
                p += invalid_step(encoding, end - p);
            }
        }
        characters += 1;
    }

    let code_range = if broken {
        CodeRange::Broken
    } else {
        CodeRange::Valid
    };
    (code_range, characters)
}

pub fn calculate_code_range(encoding: Encoding, bytes: &[u8]) -> CodeRange {
    calculate_code_range_and_length(encoding, bytes).0
}

/// Number of characters in `bytes[start..end]`.
///
/// A `SevenBit` hint (or a single-byte encoding) answers in O(1); a `Valid`
/// UTF-8 hint only counts lead bytes; anything else is a full scan.
pub fn character_length(
    encoding: Encoding,
    code_range_hint: CodeRange,
    bytes: &[u8],
    start: usize,
    end: usize,
) -> usize {
    if code_range_hint == CodeRange::SevenBit || encoding.is_single_byte() {
        return end - start;
    }
    let slice = &bytes[start..end];
    if code_range_hint == CodeRange::Valid && encoding == Encoding::Utf8 {
        return slice.iter().filter(|&&b| (b & 0xC0) != 0x80).count();
    }
    calculate_code_range_and_length(encoding, slice).1
}

/// Length and code point of the first character (`rb_enc_codepoint_len`).
pub fn codepoint_len(
    encoding: Encoding,
    code_range: CodeRange,
    bytes: &[u8],
) -> RopeResult<(usize, u32)> {
    if bytes.is_empty() {
        return Err(RopeError::out_of_bounds(0, 0));
    }
    if code_range == CodeRange::SevenBit {
        return Ok((1, bytes[0] as u32));
    }
    let len = match precise_char_len(encoding, bytes, 0, bytes.len()) {
        CharLen::Found(len) => len,
        _ => return Err(RopeError::InvalidByteSequence(encoding.name())),
    };
    Ok((len, decode(encoding, &bytes[..len])))
}

fn decode(encoding: Encoding, ch: &[u8]) -> u32 {
    match encoding {
        Encoding::Utf8 => match ch.len() {
            1 => ch[0] as u32,
            2 => ((ch[0] as u32 & 0x1F) << 6) | (ch[1] as u32 & 0x3F),
            3 => ((ch[0] as u32 & 0x0F) << 12) | ((ch[1] as u32 & 0x3F) << 6) | (ch[2] as u32 & 0x3F),
            _ => {
                ((ch[0] as u32 & 0x07) << 18)
                    | ((ch[1] as u32 & 0x3F) << 12)
                    | ((ch[2] as u32 & 0x3F) << 6)
                    | (ch[3] as u32 & 0x3F)
            }
        },
        Encoding::Utf16Le => {
            let high = u16::from_le_bytes([ch[0], ch[1]]) as u32;
            if ch.len() == 4 {
                let low = u16::from_le_bytes([ch[2], ch[3]]) as u32;
                0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00)
            } else {
                high
            }
        }
        _ => ch[0] as u32,
    }
}

/// The ASCII character at the start of `bytes`, if there is one.
pub fn ascii_get(encoding: Encoding, bytes: &[u8]) -> Option<u8> {
    if encoding.is_ascii_compatible() {
        bytes.first().copied().filter(|b| b.is_ascii())
    } else if bytes.len() >= 2 && bytes[1] == 0 && bytes[0] < 0x80 {
        Some(bytes[0])
    } else {
        None
    }
}
