//! Encoding service.
//!
//! Pure functions over byte slices: validity, character length and code range.
//! Only the handful of encodings the rope engine needs to exercise its
//! single-byte, multi-byte and ASCII-incompatible paths are modelled.

use std::fmt;

mod code_range;
mod scan;

pub use code_range::CodeRange;
pub use scan::{
    CharLen, ascii_get, calculate_code_range, calculate_code_range_and_length, character_length,
    codepoint_len, precise_char_len,
};

/// Character encoding attached to a rope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// ASCII-8BIT: raw bytes, every byte is one valid character.
    Binary,
    UsAscii,
    Utf8,
    Iso8859_1,
    Utf16Le,
}

impl Encoding {
    /// All supported encodings, in table order.
    pub const ALL: [Encoding; 5] = [
        Encoding::Binary,
        Encoding::UsAscii,
        Encoding::Utf8,
        Encoding::Iso8859_1,
        Encoding::Utf16Le,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Encoding::Binary => "ASCII-8BIT",
            Encoding::UsAscii => "US-ASCII",
            Encoding::Utf8 => "UTF-8",
            Encoding::Iso8859_1 => "ISO-8859-1",
            Encoding::Utf16Le => "UTF-16LE",
        }
    }

    /// Looks an encoding up by its Ruby name, case-insensitively.
    pub fn from_name(name: &str) -> Option<Encoding> {
        let name = name.to_ascii_uppercase();
        match name.as_str() {
            "BINARY" => Some(Encoding::Binary),
            "ASCII" => Some(Encoding::UsAscii),
            _ => Self::ALL.into_iter().find(|enc| enc.name() == name),
        }
    }

    /// Position of this encoding in [`Encoding::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    /// Whether bytes `0x00..0x80` mean the same thing as in US-ASCII.
    pub fn is_ascii_compatible(self) -> bool {
        !matches!(self, Encoding::Utf16Le)
    }

    /// Minimum number of bytes in one character.
    pub fn min_length(self) -> usize {
        match self {
            Encoding::Utf16Le => 2,
            _ => 1,
        }
    }

    /// Maximum number of bytes in one character.
    pub fn max_length(self) -> usize {
        match self {
            Encoding::Utf8 | Encoding::Utf16Le => 4,
            _ => 1,
        }
    }

    /// Every character is exactly one byte, so character length equals byte length.
    pub fn is_single_byte(self) -> bool {
        self.max_length() == 1
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_lookup_by_name() {
        assert_eq!(Encoding::from_name("utf-8"), Some(Encoding::Utf8));
        assert_eq!(Encoding::from_name("BINARY"), Some(Encoding::Binary));
        assert_eq!(Encoding::from_name("ascii-8bit"), Some(Encoding::Binary));
        assert_eq!(Encoding::from_name("Shift_JIS"), None);
    }

    #[test]
    fn test_encoding_widths() {
        assert!(Encoding::Binary.is_single_byte());
        assert!(Encoding::UsAscii.is_single_byte());
        assert!(!Encoding::Utf8.is_single_byte());
        assert_eq!(Encoding::Utf16Le.min_length(), 2);
        assert!(!Encoding::Utf16Le.is_ascii_compatible());
    }

    #[test]
    fn test_index_matches_table_order() {
        for (i, enc) in Encoding::ALL.iter().enumerate() {
            assert_eq!(enc.index(), i);
        }
    }
}
