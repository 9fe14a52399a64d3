use rbrope::encoding::{CodeRange, Encoding};
use rbrope::error::RopeError;
use rbrope::rope::Rope;

fn abcd() -> Rope {
    Rope::utf8("ab").concat(&Rope::utf8("cd")).unwrap()
}

#[test]
fn dump_string_escapes_every_byte() {
    let rope = Rope::utf8("aé");
    insta::assert_snapshot!(rope.dump_string(), @r"\x61\xc3\xa9");
}

#[test]
fn structure_of_nested_operations() {
    let rope = abcd().substring(1, 2).unwrap();
    insta::assert_snapshot!(rope.structure(), @r#"("ab" + "cd")[1, 2]"#);

    let repeated = Rope::utf8("ab").repeat(3).unwrap();
    insta::assert_snapshot!(repeated.structure(), @r#"("ab"*3)"#);
}

#[test]
fn debug_print_concat() {
    let rope = abcd();
    insta::assert_snapshot!(rope.debug_print(true).trim_end(), @r#"
(ConcatRope; BN: true; BL: 4; CL: 4; CR: CR_7BIT; D: 2; LD: 1; RD: 1; E: UTF-8)
  "ab" (LeafRope; BN: false; BL: 2; CL: 2; CR: CR_7BIT; D: 1; E: UTF-8)
  "cd" (LeafRope; BN: false; BL: 2; CL: 2; CR: CR_7BIT; D: 1; E: UTF-8)
"#);
}

#[test]
fn debug_print_substring_without_strings() {
    let rope = abcd().substring(1, 2).unwrap();
    insta::assert_snapshot!(rope.debug_print(false).trim_end(), @r"
(SubstringRope; BN: true; BL: 2; CL: 2; CR: CR_7BIT; O: 1; D: 3; E: UTF-8)
  (ConcatRope; BN: true; BL: 4; CL: 4; CR: CR_7BIT; D: 2; LD: 1; RD: 1; E: UTF-8)
    (LeafRope; BN: false; BL: 2; CL: 2; CR: CR_7BIT; D: 1; E: UTF-8)
    (LeafRope; BN: false; BL: 2; CL: 2; CR: CR_7BIT; D: 1; E: UTF-8)
");
}

#[test]
fn debug_print_does_not_compute_unknown_values() {
    let rope = Rope::from_bytes(&b"xyz"[..], Encoding::Utf8, CodeRange::Unknown);
    let repeated = rope.repeat(2).unwrap();
    insta::assert_snapshot!(repeated.debug_print(true).trim_end(), @r#"
(RepeatingRope; BN: true; BL: 6; CL: ?; CR: CR_UNKNOWN; T: 2; D: 2; E: UTF-8)
  "xyz" (LeafRope; BN: false; BL: 3; CL: ?; CR: CR_UNKNOWN; D: 1; E: UTF-8)
"#);
    assert_eq!(repeated.raw_code_range(), CodeRange::Unknown);
    assert!(!repeated.has_bytes());
}

#[test]
fn flattening_fills_the_cache() {
    let rope = abcd();
    assert!(!rope.has_bytes());
    assert_eq!(rope.bytes(), b"abcd");
    assert!(rope.has_bytes());
    assert_eq!(rope.flatten().bytes(), b"abcd");
}

#[test]
fn mixed_encodings_negotiate() {
    let ascii = Rope::ascii("abc");
    let utf8 = Rope::utf8("é");
    let joined = ascii.concat(&utf8).unwrap();
    assert_eq!(joined.encoding(), Encoding::Utf8);
    assert_eq!(joined.character_length(), 4);
    assert_eq!(joined.code_range(), CodeRange::Valid);

    let binary = Rope::from_bytes(vec![0xFF], Encoding::Binary, CodeRange::Unknown);
    assert_eq!(
        utf8.concat(&binary),
        Err(RopeError::EncodingMismatch {
            left: "UTF-8",
            right: "ASCII-8BIT"
        })
    );
}

#[test]
fn broken_bytes_count_per_byte() {
    let rope = Rope::from_bytes(&b"a\xFF\xFEb"[..], Encoding::Utf8, CodeRange::Unknown);
    assert_eq!(rope.code_range(), CodeRange::Broken);
    assert_eq!(rope.character_length(), 4);
    let doubled = rope.concat(&rope).unwrap();
    assert_eq!(doubled.code_range(), CodeRange::Broken);
    assert_eq!(doubled.character_length(), 8);
}

#[test]
fn substring_bounds_are_checked() {
    let rope = abcd();
    assert_eq!(
        rope.substring(3, 2),
        Err(RopeError::OutOfBounds { index: 5, length: 4 })
    );
    assert_eq!(rope.substring(usize::MAX, 2), Err(RopeError::LengthOverflow));
    assert!(rope.substring(4, 0).unwrap().is_empty());
}

#[test]
fn repeat_overflow_is_reported() {
    assert_eq!(
        Rope::utf8("ab").repeat(usize::MAX),
        Err(RopeError::LengthOverflow)
    );
    assert!(Rope::utf8("ab").repeat(0).unwrap().is_empty());
}

#[test]
fn utf16_character_indexing() {
    let bytes: Vec<u8> = "h€y".encode_utf16().flat_map(u16::to_le_bytes).collect();
    let rope = Rope::from_bytes(bytes, Encoding::Utf16Le, CodeRange::Unknown);
    assert_eq!(rope.character_length(), 3);
    assert_eq!(rope.char_offset_to_byte_offset(2), Ok(4));
    assert_eq!(rope.substring_chars(1, 1).unwrap().to_string(), "€");
}
