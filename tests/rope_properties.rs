use proptest::prelude::*;
use rbrope::encoding::{CodeRange, Encoding};
use rbrope::rope::Rope;
use rbrope::runtime::scan_stats;

/// Ropes of every node kind over arbitrary bytes.
fn arb_rope() -> impl Strategy<Value = Rope> {
    let leaf = prop::collection::vec(any::<u8>(), 0..24)
        .prop_map(|bytes| Rope::from_bytes(bytes, Encoding::Utf8, CodeRange::Unknown));
    leaf.prop_recursive(4, 64, 2, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone()).prop_map(|(a, b)| a.concat(&b).unwrap()),
            (inner.clone(), any::<prop::sample::Index>(), any::<prop::sample::Index>()).prop_map(
                |(r, start, len)| {
                    let offset = start.index(r.byte_length() + 1);
                    let length = len.index(r.byte_length() - offset + 1);
                    r.substring(offset, length).unwrap()
                }
            ),
            (inner, 0usize..4).prop_map(|(r, n)| r.repeat(n).unwrap()),
        ]
    })
}

proptest! {
    #[test]
    fn concat_flattens_to_joined_bytes(a in arb_rope(), b in arb_rope()) {
        let joined = a.concat(&b).unwrap();
        let mut expected = a.bytes().to_vec();
        expected.extend_from_slice(b.bytes());
        prop_assert_eq!(joined.bytes(), expected.as_slice());
        prop_assert_eq!(joined.byte_length(), expected.len());
    }

    #[test]
    fn substring_flattens_to_slice(
        r in arb_rope(),
        start in any::<prop::sample::Index>(),
        len in any::<prop::sample::Index>(),
    ) {
        let offset = start.index(r.byte_length() + 1);
        let length = len.index(r.byte_length() - offset + 1);
        let sub = r.substring(offset, length).unwrap();
        prop_assert_eq!(sub.bytes(), &r.bytes()[offset..offset + length]);
    }

    #[test]
    fn repeat_flattens_to_repeated_bytes(r in arb_rope(), n in 0usize..6) {
        let repeated = r.repeat(n).unwrap();
        prop_assert_eq!(repeated.byte_length(), r.byte_length() * n);
        let expected = r.bytes().repeat(n);
        prop_assert_eq!(repeated.bytes(), expected.as_slice());
    }

    #[test]
    fn get_byte_agrees_with_flattened(r in arb_rope()) {
        let bytes = r.bytes().to_vec();
        for (i, b) in bytes.iter().enumerate() {
            prop_assert_eq!(r.get_byte(i), Ok(*b));
        }
        prop_assert!(r.get_byte(bytes.len()).is_err());
    }

    #[test]
    fn derived_metadata_matches_a_fresh_scan(r in arb_rope()) {
        let leaf = Rope::from_bytes(r.bytes().to_vec(), Encoding::Utf8, CodeRange::Unknown);
        prop_assert_eq!(r.code_range(), leaf.code_range());
        prop_assert_eq!(r.character_length(), leaf.character_length());
    }

    #[test]
    fn code_range_is_scanned_at_most_once(bytes in prop::collection::vec(any::<u8>(), 1..64)) {
        let rope = Rope::from_bytes(bytes, Encoding::Utf8, CodeRange::Unknown);
        let before = scan_stats::snapshot();
        let first = (rope.code_range(), rope.character_length());
        let second = (rope.code_range(), rope.character_length());
        let after = scan_stats::snapshot();
        prop_assert_eq!(first, second);
        prop_assert!(after.code_range_scans - before.code_range_scans <= 1);
        prop_assert!(after.character_length_scans - before.character_length_scans <= 1);
    }
}
