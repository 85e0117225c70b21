#![no_main]
use e57_container::validation::{is_element_name_extended, parse_path_name};
use e57_container::NamespaceRegistry;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let mut registry = NamespaceRegistry::new();
    let _ = registry.add("ext", "urn:fuzz");

    let _ = is_element_name_extended(text);
    if let Ok(path) = parse_path_name(text, &registry) {
        // Anything accepted must print back without panicking
        let _ = path.to_string();
    }
});
