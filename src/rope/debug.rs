//! Textual renderings of rope content and structure for diagnostics.

use std::fmt::Write;

use crate::encoding;

use super::{Rope, RopeKind};

impl Rope {
    pub(crate) fn kind_name(&self) -> &'static str {
        match self.kind() {
            RopeKind::Leaf(_) => "LeafRope",
            RopeKind::Concat { .. } => "ConcatRope",
            RopeKind::Substring { .. } => "SubstringRope",
            RopeKind::Repeating { .. } => "RepeatingRope",
        }
    }

    /// Every byte as a `\xNN` escape.
    pub fn dump_string(&self) -> String {
        let mut out = String::with_capacity(self.byte_length() * 4);
        for b in self.bytes() {
            let _ = write!(out, "\\x{b:02x}");
        }
        out
    }

    /// An expression that rebuilds a rope with the same shape, such as
    /// `("ab" + "cd")[1, 2]`. Substring offsets are in characters.
    pub fn structure(&self) -> String {
        match self.kind() {
            RopeKind::Leaf(_) => format!("\"{self}\""),
            RopeKind::Concat { left, right } => {
                format!("({} + {})", left.structure(), right.structure())
            }
            RopeKind::Substring { child, byte_offset } => {
                let char_offset = encoding::character_length(
                    child.encoding(),
                    child.code_range(),
                    child.bytes(),
                    0,
                    *byte_offset,
                );
                format!(
                    "{}[{}, {}]",
                    child.structure(),
                    char_offset,
                    self.character_length()
                )
            }
            RopeKind::Repeating { child, times } => format!("({}*{})", child.structure(), times),
        }
    }

    /// Indented tree dump, one node per line.
    ///
    /// Legend: BN bytes not yet flattened, BL byte length, CL character
    /// length, CR code range, O byte offset, T times, D depth, LD/RD left and
    /// right depth, E encoding. Code ranges and character lengths are shown
    /// as cached, so printing never triggers a scan.
    pub fn debug_print(&self, print_string: bool) -> String {
        let mut out = String::new();
        self.debug_print_into(&mut out, 0, print_string);
        out
    }

    fn debug_print_into(&self, out: &mut String, level: usize, print_string: bool) {
        let indent = "  ".repeat(level);
        let character_length = self
            .raw_character_length()
            .map_or_else(|| "?".to_string(), |n| n.to_string());
        let common = format!(
            "BN: {}; BL: {}; CL: {}; CR: {}",
            !self.has_bytes(),
            self.byte_length(),
            character_length,
            self.raw_code_range().label()
        );
        let encoding = self.encoding().name();
        let depth = self.depth();
        match self.kind() {
            RopeKind::Leaf(_) => {
                let _ = write!(out, "{indent}");
                if print_string {
                    let _ = write!(out, "\"{self}\" ");
                }
                let _ = writeln!(out, "({}; {common}; D: {depth}; E: {encoding})", self.kind_name());
            }
            RopeKind::Concat { left, right } => {
                let _ = writeln!(
                    out,
                    "{indent}({}; {common}; D: {depth}; LD: {}; RD: {}; E: {encoding})",
                    self.kind_name(),
                    left.depth(),
                    right.depth()
                );
                left.debug_print_into(out, level + 1, print_string);
                right.debug_print_into(out, level + 1, print_string);
            }
            RopeKind::Substring { child, byte_offset } => {
                let _ = writeln!(
                    out,
                    "{indent}({}; {common}; O: {byte_offset}; D: {depth}; E: {encoding})",
                    self.kind_name()
                );
                child.debug_print_into(out, level + 1, print_string);
            }
            RopeKind::Repeating { child, times } => {
                let _ = writeln!(
                    out,
                    "{indent}({}; {common}; T: {times}; D: {depth}; E: {encoding})",
                    self.kind_name()
                );
                child.debug_print_into(out, level + 1, print_string);
            }
        }
    }
}
