use crate::cext::string_nodes::*;
use crate::encoding::{CodeRange, Encoding};
use crate::error::RopeError;
use crate::rope::Rope;
use crate::runtime::finalization::FinalizationService;
use crate::runtime::string::{RubyString, StringStorage};

fn raw_code_range(string: &RubyString) -> CodeRange {
    string.with_storage(|storage| match storage {
        StringStorage::Native(native) => native.raw_code_range(),
        StringStorage::Managed(rope) => rope.raw_code_range(),
    })
}

#[test]
fn new_nul_is_native_and_zeroed() {
    let finalizers = FinalizationService::new();
    let object = str_new_nul(&finalizers, 4).unwrap();
    let string = object.as_string().unwrap();
    assert!(string_is_native(string));
    assert_eq!(string.encoding(), Encoding::Binary);
    assert_eq!(string.get_rope().bytes(), &[0, 0, 0, 0]);
    assert_eq!(string_pointer_size(string), 0);
    assert_eq!(str_capacity(string, &finalizers).unwrap(), 4);
}

#[test]
fn set_len_keeps_seven_bit() {
    let finalizers = FinalizationService::new();
    let string = RubyString::new(Rope::utf8("hello"));
    str_set_len(&string, &finalizers, 3).unwrap();
    assert!(string.is_native());
    assert_eq!(raw_code_range(&string), CodeRange::SevenBit);
    assert_eq!(string.get_rope(), Rope::utf8("hel"));
}

#[test]
fn set_len_on_non_ascii_forgets_code_range() {
    let finalizers = FinalizationService::new();
    let string = RubyString::new(Rope::utf8("héllo"));
    str_set_len(&string, &finalizers, 3).unwrap();
    assert_eq!(raw_code_range(&string), CodeRange::Unknown);
    assert_eq!(string.with_storage(|s| s.character_length()), 2);
}

#[test]
fn resize_grows_and_preserves_prefix() {
    let finalizers = FinalizationService::new();
    let string = RubyString::new(Rope::utf8("abc"));
    str_resize(&string, &finalizers, 64).unwrap();
    assert!(str_capacity(&string, &finalizers).unwrap() >= 64);
    assert_eq!(&string.get_rope().bytes()[..3], b"abc");
    assert_eq!(string.byte_length(), 64);

    str_resize(&string, &finalizers, 64).unwrap();
    assert_eq!(raw_code_range(&string), CodeRange::Unknown);
}

#[test]
fn pointer_read_boundaries() {
    let finalizers = FinalizationService::new();
    let managed = RubyString::new(Rope::utf8("ab"));
    assert_eq!(string_pointer_read(&managed, 1), Ok(b'b'));
    assert_eq!(string_pointer_read(&managed, 2), Ok(0));
    assert_eq!(string_pointer_read(&managed, 100), Ok(0));

    string_pointer_to_native(&managed, &finalizers).unwrap();
    assert_eq!(string_pointer_read(&managed, 2), Ok(0));
    assert_eq!(
        string_pointer_read(&managed, 3),
        Err(RopeError::OutOfBounds { index: 3, length: 3 })
    );
}

#[test]
fn pointer_write_copies_managed_content() {
    let original = Rope::utf8("cat");
    let string = RubyString::new(original.clone());
    assert_eq!(string_pointer_write(&string, 0, b'b'), Ok(b'b'));
    assert_eq!(string.get_rope(), Rope::utf8("bat"));
    assert_eq!(original.bytes(), b"cat");
    assert!(!string.is_native());
    assert!(string_pointer_write(&string, 3, b'x').is_err());
}

#[test]
fn pointer_write_in_place_for_native() {
    let finalizers = FinalizationService::new();
    let string = RubyString::new(Rope::utf8("a\0c"));
    let address = string_pointer_to_native(&string, &finalizers).unwrap();
    assert_eq!(string_pointer_size(&string), 1);
    string_pointer_write(&string, 1, b'b').unwrap();
    assert_eq!(string_pointer_size(&string), 3);
    assert_eq!(string_pointer_to_native(&string, &finalizers).unwrap(), address);
    enc_coderange_clear(&string);
    assert_eq!(raw_code_range(&string), CodeRange::Unknown);
}
