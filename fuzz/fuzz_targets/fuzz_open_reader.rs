#![no_main]
use e57_container::{ImageFile, ImageFileConfig, OpenMode, ReadChecksumPolicy};
use libfuzzer_sys::fuzz_target;

// Arbitrary bytes opened as a reader must fail cleanly, never panic
fuzz_target!(|data: &[u8]| {
    let dir = match tempfile::TempDir::new() {
        Ok(dir) => dir,
        Err(_) => return,
    };
    let path = dir.path().join("fuzz.e57");
    if std::fs::write(&path, data).is_err() {
        return;
    }

    // Checksums off so the header and XML parsers see the fuzzed bytes
    let config = ImageFileConfig::default().with_checksum_policy(ReadChecksumPolicy::NONE);
    if let Ok(imf) = ImageFile::open(&path, OpenMode::Reader, config) {
        let _ = imf.root();
        let _ = imf.dump_string();
        let _ = imf.close();
    }
});
