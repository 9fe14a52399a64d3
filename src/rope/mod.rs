//! Immutable, encoding-aware byte ropes.
//!
//! A [`Rope`] is a cheap-to-clone handle to a shared node. Concatenation,
//! substring and repetition build new nodes over existing ones without
//! copying bytes; the flattened byte array, code range and character length
//! are computed on first request and cached in the node.
//!
//! Nodes are never mutated after construction except for those caches, which
//! only move from "unknown" to a final value.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

use crate::encoding::{self, CodeRange, Encoding};
use crate::error::{RopeError, RopeResult};
use crate::runtime::scan_stats;

mod constants;
mod debug;
mod lazy;
mod operations;


pub(crate) use lazy::{LazyCodeRange, LazyLength};
pub use lazy::UNKNOWN_CHARACTER_LENGTH;
pub use operations::compatible_encoding;

/// Concatenations deeper than this are flattened into a leaf.
pub const DEFAULT_FLATTEN_DEPTH: u32 = 1024;

/// Handle to an immutable rope node.
#[derive(Clone)]
pub struct Rope(Arc<RopeNode>);

struct RopeNode {
    encoding: Encoding,
    byte_length: usize,
    depth: u32,
    code_range: LazyCodeRange,
    character_length: LazyLength,
    /// Flatten cache for composite nodes. Leaves keep their bytes in `kind`.
    bytes: OnceLock<Arc<[u8]>>,
    hash: OnceLock<u64>,
    kind: RopeKind,
}

/// Structural variant of a rope node.
#[derive(Clone)]
pub enum RopeKind {
    Leaf(Arc<[u8]>),
    Concat { left: Rope, right: Rope },
    /// A byte window into `child`. Never nested: the child is not itself a substring.
    Substring { child: Rope, byte_offset: usize },
    Repeating { child: Rope, times: usize },
}

impl Rope {
    fn from_node(
        kind: RopeKind,
        encoding: Encoding,
        byte_length: usize,
        depth: u32,
        code_range: CodeRange,
        character_length: Option<usize>,
    ) -> Rope {
        let character_length = if code_range == CodeRange::SevenBit || encoding.is_single_byte() {
            Some(byte_length)
        } else {
            character_length
        };
        Rope(Arc::new(RopeNode {
            encoding,
            byte_length,
            depth,
            code_range: LazyCodeRange::new(code_range),
            character_length: LazyLength::new(character_length),
            bytes: OnceLock::new(),
            hash: OnceLock::new(),
            kind,
        }))
    }

    pub(crate) fn leaf(bytes: Arc<[u8]>, encoding: Encoding, code_range: CodeRange) -> Rope {
        let byte_length = bytes.len();
        Self::from_node(RopeKind::Leaf(bytes), encoding, byte_length, 1, code_range, None)
    }

    /// Builds a leaf over `bytes`.
    ///
    /// `code_range` is trusted when it is not `Unknown`; pass `Unknown` to have
    /// it computed on first query.
    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>, encoding: Encoding, code_range: CodeRange) -> Rope {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Rope::empty(encoding);
        }
        Self::leaf(bytes, encoding, code_range)
    }

    /// A UTF-8 rope. The code range is known up front since `str` is valid UTF-8.
    pub fn utf8(s: &str) -> Rope {
        let code_range = if s.is_ascii() {
            CodeRange::SevenBit
        } else {
            CodeRange::Valid
        };
        Rope::from_bytes(s.as_bytes(), Encoding::Utf8, code_range)
    }

    /// A US-ASCII rope.
    pub fn ascii(s: &str) -> Rope {
        Rope::from_bytes(s.as_bytes(), Encoding::UsAscii, CodeRange::Unknown)
    }

    pub fn encoding(&self) -> Encoding {
        self.0.encoding
    }

    pub fn byte_length(&self) -> usize {
        self.0.byte_length
    }

    pub fn is_empty(&self) -> bool {
        self.0.byte_length == 0
    }

    /// Tree depth; a leaf has depth 1.
    pub fn depth(&self) -> u32 {
        self.0.depth
    }

    pub fn kind(&self) -> &RopeKind {
        &self.0.kind
    }

    /// Whether two handles point at the same node.
    pub fn ptr_eq(&self, other: &Rope) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// The cached code range, without computing it.
    pub fn raw_code_range(&self) -> CodeRange {
        self.0.code_range.get()
    }

    /// The cached character length, without computing it.
    pub fn raw_character_length(&self) -> Option<usize> {
        self.0.character_length.get()
    }

    /// Seeds the character length cache with a value known from elsewhere.
    pub(crate) fn publish_character_length(&self, n: usize) {
        self.0.character_length.publish(n);
    }

    /// Whether the flattened byte array is available without a walk.
    pub fn has_bytes(&self) -> bool {
        matches!(self.0.kind, RopeKind::Leaf(_)) || self.0.bytes.get().is_some()
    }

    pub fn code_range(&self) -> CodeRange {
        self.0.code_range.get_or_compute(|| self.compute_code_range())
    }

    pub fn is_ascii_only(&self) -> bool {
        self.code_range() == CodeRange::SevenBit
    }

    pub fn character_length(&self) -> usize {
        if let Some(n) = self.0.character_length.get() {
            return n;
        }
        let computed = self.compute_character_length();
        self.0.character_length.publish(computed)
    }

    /// The child's code range as seen from this node's encoding, if it can be reused.
    fn inherited_code_range(&self, child: &Rope) -> Option<CodeRange> {
        if child.encoding() == self.encoding() {
            return Some(child.code_range());
        }
        let ascii = self.encoding().is_ascii_compatible() && child.encoding().is_ascii_compatible();
        (ascii && child.code_range() == CodeRange::SevenBit).then_some(CodeRange::SevenBit)
    }

    fn compute_code_range(&self) -> CodeRange {
        let inherited = match &self.0.kind {
            RopeKind::Leaf(_) => None,
            RopeKind::Concat { left, right } => {
                match (self.inherited_code_range(left), self.inherited_code_range(right)) {
                    (Some(l), Some(r)) => Some(l.common(r)),
                    _ => None,
                }
            }
            RopeKind::Substring { child, .. } => {
                (child.code_range() == CodeRange::SevenBit).then_some(CodeRange::SevenBit)
            }
            RopeKind::Repeating { child, .. } => self.inherited_code_range(child),
        };
        match inherited {
            Some(code_range) if code_range.is_known() && code_range != CodeRange::Broken => {
                code_range
            }
            _ => self.scan(),
        }
    }

    /// Full scan of the flattened bytes. Fills the character length as a side effect.
    fn scan(&self) -> CodeRange {
        scan_stats::record_code_range_scan();
        let (code_range, characters) =
            encoding::calculate_code_range_and_length(self.encoding(), self.bytes());
        self.0.character_length.publish(characters);
        code_range
    }

    fn compute_character_length(&self) -> usize {
        let byte_length = self.byte_length();
        if self.encoding().is_single_byte() {
            return byte_length;
        }
        let code_range = self.code_range();
        if let Some(n) = self.0.character_length.get() {
            return n;
        }
        if code_range == CodeRange::SevenBit {
            return byte_length;
        }
        if code_range == CodeRange::Valid {
            let reusable = |child: &Rope| {
                matches!(
                    self.inherited_code_range(child),
                    Some(CodeRange::SevenBit | CodeRange::Valid)
                )
            };
            match &self.0.kind {
                RopeKind::Concat { left, right } if reusable(left) && reusable(right) => {
                    return left.character_length() + right.character_length();
                }
                RopeKind::Repeating { child, times } if reusable(child) => {
                    return child.character_length() * times;
                }
                _ => {}
            }
        }
        scan_stats::record_character_length_scan();
        encoding::character_length(self.encoding(), code_range, self.bytes(), 0, byte_length)
    }

    /// The full content, flattening and caching on first call.
    pub fn bytes(&self) -> &[u8] {
        self.flattened()
    }

    fn flattened(&self) -> &Arc<[u8]> {
        match &self.0.kind {
            RopeKind::Leaf(bytes) => bytes,
            _ => self.0.bytes.get_or_init(|| {
                scan_stats::record_flatten();
                tracing::trace!(
                    byte_length = self.byte_length(),
                    depth = self.depth(),
                    "flattening rope"
                );
                let mut out = Vec::with_capacity(self.byte_length());
                flatten_into(self, &mut out);
                out.into()
            }),
        }
    }

    /// A leaf with the same content, sharing the flatten cache.
    pub fn flatten(&self) -> Rope {
        if matches!(self.0.kind, RopeKind::Leaf(_)) {
            return self.clone();
        }
        let leaf = Rope::leaf(self.flattened().clone(), self.encoding(), self.raw_code_range());
        if let Some(n) = self.raw_character_length() {
            leaf.publish_character_length(n);
        }
        leaf
    }

    pub fn get_byte(&self, index: usize) -> RopeResult<u8> {
        if index >= self.byte_length() {
            return Err(RopeError::out_of_bounds(index, self.byte_length()));
        }
        let mut node = self;
        let mut index = index;
        loop {
            if let Some(bytes) = node.0.bytes.get() {
                return Ok(bytes[index]);
            }
            match &node.0.kind {
                RopeKind::Leaf(bytes) => return Ok(bytes[index]),
                RopeKind::Concat { left, right } => {
                    if index < left.byte_length() {
                        node = left;
                    } else {
                        index -= left.byte_length();
                        node = right;
                    }
                }
                RopeKind::Substring { child, byte_offset } => {
                    index += byte_offset;
                    node = child;
                }
                RopeKind::Repeating { child, .. } => {
                    index %= child.byte_length();
                    node = child;
                }
            }
        }
    }

    /// Cached hash over encoding and flattened bytes.
    pub fn hash_code(&self) -> u64 {
        *self.0.hash.get_or_init(|| {
            let mut hasher = DefaultHasher::new();
            self.encoding().hash(&mut hasher);
            self.bytes().hash(&mut hasher);
            hasher.finish()
        })
    }
}

/// Depth-first copy of `rope` into `out`, driven by a worklist so deep trees
/// do not recurse.
fn flatten_into(rope: &Rope, out: &mut Vec<u8>) {
    let mut worklist: Vec<(&Rope, usize, usize)> = vec![(rope, 0, rope.byte_length())];
    while let Some((node, offset, len)) = worklist.pop() {
        if len == 0 {
            continue;
        }
        if let Some(bytes) = node.0.bytes.get() {
            out.extend_from_slice(&bytes[offset..offset + len]);
            continue;
        }
        match &node.0.kind {
            RopeKind::Leaf(bytes) => out.extend_from_slice(&bytes[offset..offset + len]),
            RopeKind::Concat { left, right } => {
                let split = left.byte_length();
                let end = offset + len;
                // right first so the left side pops first
                if end > split {
                    let start = offset.max(split);
                    worklist.push((right, start - split, end - start));
                }
                if offset < split {
                    worklist.push((left, offset, end.min(split) - offset));
                }
            }
            RopeKind::Substring { child, byte_offset } => {
                worklist.push((child, byte_offset + offset, len));
            }
            RopeKind::Repeating { child, .. } => {
                let unit = child.bytes();
                let end = offset + len;
                let mut pos = offset;
                while pos < end {
                    let start = pos % unit.len();
                    let n = (unit.len() - start).min(end - pos);
                    out.extend_from_slice(&unit[start..start + n]);
                    pos += n;
                }
            }
        }
    }
}

impl PartialEq for Rope {
    fn eq(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        if self.byte_length() != other.byte_length() || self.encoding() != other.encoding() {
            return false;
        }
        if let (Some(a), Some(b)) = (self.0.hash.get(), other.0.hash.get()) {
            if a != b {
                return false;
            }
        }
        self.bytes() == other.bytes()
    }
}

impl Eq for Rope {}

impl Hash for Rope {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash_code());
    }
}

impl From<&str> for Rope {
    fn from(s: &str) -> Self {
        Rope::utf8(s)
    }
}

impl From<String> for Rope {
    fn from(s: String) -> Self {
        Rope::utf8(&s)
    }
}

impl fmt::Display for Rope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.encoding() {
            Encoding::Utf16Le => {
                let units = self
                    .bytes()
                    .chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]]));
                for ch in char::decode_utf16(units) {
                    write!(f, "{}", ch.unwrap_or(char::REPLACEMENT_CHARACTER))?;
                }
                Ok(())
            }
            Encoding::Iso8859_1 => {
                for &b in self.bytes() {
                    write!(f, "{}", char::from(b))?;
                }
                Ok(())
            }
            _ => write!(f, "{}", String::from_utf8_lossy(self.bytes())),
        }
    }
}

impl fmt::Debug for Rope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rope")
            .field("kind", &self.kind_name())
            .field("encoding", &self.encoding().name())
            .field("byte_length", &self.byte_length())
            .field("code_range", &self.raw_code_range())
            .finish()
    }
}
