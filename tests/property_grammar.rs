//! Property-based tests for the name grammar, allocator and bit widths
//!
//! Uses proptest to check the invariants across many random inputs

use e57_container::core::allocator::SpaceAllocator;
use e57_container::validation::{
    check_element_name_legal, parse_element_name, parse_path_name, unparse_path_name,
};
use e57_container::{bits_needed, NamespaceRegistry, FILE_HEADER_SIZE};
use proptest::prelude::*;

proptest! {
    #[test]
    fn prop_plain_names_are_legal(name in "[A-Za-z_][A-Za-z0-9_.\\-]{0,16}") {
        let registry = NamespaceRegistry::new();
        prop_assert!(check_element_name_legal(&name, false, &registry).is_ok());
        let parsed = parse_element_name(&name, false).unwrap();
        prop_assert_eq!(parsed.prefix, "");
        prop_assert_eq!(parsed.local_part, name.as_str());
    }

    #[test]
    fn prop_digit_first_needs_numeric_mode(name in "[0-9][A-Za-z0-9]{0,8}") {
        prop_assert!(parse_element_name(&name, false).is_err());
        let all_digits = name.chars().all(|c| c.is_ascii_digit());
        prop_assert_eq!(parse_element_name(&name, true).is_ok(), all_digits);
    }

    #[test]
    fn prop_prefix_must_be_registered(
        prefix in "[a-z][a-z0-9]{0,6}",
        local in "[a-z][a-z0-9]{0,6}",
    ) {
        let name = format!("{}:{}", prefix, local);
        let mut registry = NamespaceRegistry::new();
        prop_assert!(check_element_name_legal(&name, false, &registry).is_err());

        registry.add(&prefix, "urn:prop").unwrap();
        prop_assert!(check_element_name_legal(&name, false, &registry).is_ok());
        let parsed = parse_element_name(&name, false).unwrap();
        prop_assert_eq!(parsed.prefix, prefix.as_str());
        prop_assert_eq!(parsed.local_part, local.as_str());
    }

    #[test]
    fn prop_second_colon_rejected(a in "[a-z]{1,4}", b in "[a-z]{1,4}", c in "[a-z]{1,4}") {
        let name = format!("{}:{}:{}", a, b, c);
        prop_assert!(parse_element_name(&name, false).is_err());
    }

    #[test]
    fn prop_path_roundtrip(
        fields in prop::collection::vec("[a-z_][a-z0-9_]{0,8}", 1..6),
        is_relative in any::<bool>(),
    ) {
        let registry = NamespaceRegistry::new();
        let path = unparse_path_name(is_relative, &fields);
        let parsed = parse_path_name(&path, &registry).unwrap();
        prop_assert_eq!(parsed.is_relative, is_relative);
        prop_assert_eq!(&parsed.fields, &fields);
        prop_assert_eq!(parsed.to_string(), path);
    }

    #[test]
    fn prop_bits_needed_is_tight(minimum in -1_000_000i64..1_000_000, span in 0i64..1_000_000) {
        let maximum = minimum + span;
        let bits = bits_needed(minimum, maximum);
        let values = (span as u128) + 1;
        prop_assert!(values <= 1u128 << bits);
        if bits > 0 {
            prop_assert!(values > 1u128 << (bits - 1));
        }
    }

    #[test]
    fn prop_allocations_never_overlap(sizes in prop::collection::vec(0u64..100_000, 1..50)) {
        let mut allocator = SpaceAllocator::new(FILE_HEADER_SIZE as u64);
        let mut expected = FILE_HEADER_SIZE as u64;
        for size in sizes {
            let start = allocator.reserve(size).unwrap();
            prop_assert_eq!(start, expected);
            expected += size;
        }
        prop_assert_eq!(allocator.cursor(), expected);
    }
}
