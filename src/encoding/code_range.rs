/// Classification of a byte sequence's validity in its encoding.
///
/// `Unknown` means "not computed yet"; once a rope caches a definite value it
/// never goes back to `Unknown` unless explicitly cleared (native ropes only).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CodeRange {
    Unknown = 0,
    /// Only bytes below `0x80`.
    SevenBit = 1,
    Valid = 2,
    Broken = 3,
}

impl CodeRange {
    pub fn from_u8(raw: u8) -> CodeRange {
        match raw {
            1 => CodeRange::SevenBit,
            2 => CodeRange::Valid,
            3 => CodeRange::Broken,
            _ => CodeRange::Unknown,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn is_known(self) -> bool {
        self != CodeRange::Unknown
    }

    /// Code range of the concatenation of two byte sequences with these ranges.
    ///
    /// `Broken` is returned as-is: two broken halves may form valid characters,
    /// so callers must rescan in that case.
    pub fn common(self, other: CodeRange) -> CodeRange {
        match (self, other) {
            (CodeRange::Unknown, _) | (_, CodeRange::Unknown) => CodeRange::Unknown,
            (CodeRange::Broken, _) | (_, CodeRange::Broken) => CodeRange::Broken,
            (CodeRange::SevenBit, CodeRange::SevenBit) => CodeRange::SevenBit,
            _ => CodeRange::Valid,
        }
    }

    /// Short label used by rope debug output.
    pub fn label(self) -> &'static str {
        match self {
            CodeRange::Unknown => "CR_UNKNOWN",
            CodeRange::SevenBit => "CR_7BIT",
            CodeRange::Valid => "CR_VALID",
            CodeRange::Broken => "CR_BROKEN",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::CodeRange;

    #[test]
    fn test_round_trips_through_u8() {
        for cr in [
            CodeRange::Unknown,
            CodeRange::SevenBit,
            CodeRange::Valid,
            CodeRange::Broken,
        ] {
            assert_eq!(CodeRange::from_u8(cr.as_u8()), cr);
        }
        assert_eq!(CodeRange::from_u8(200), CodeRange::Unknown);
    }

    #[test]
    fn test_common_code_range() {
        use CodeRange::*;
        assert_eq!(SevenBit.common(SevenBit), SevenBit);
        assert_eq!(SevenBit.common(Valid), Valid);
        assert_eq!(Valid.common(Valid), Valid);
        assert_eq!(Valid.common(Broken), Broken);
        assert_eq!(Unknown.common(SevenBit), Unknown);
    }
}
