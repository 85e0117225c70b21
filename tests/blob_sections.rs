//! Binary section tests
//!
//! Blobs are allocated from the append-only space behind the header and
//! addressed by payload offset, independent of page checksums.

use e57_container::core::io::{CheckedFile, FileMode, OffsetMode};
use e57_container::{E57Error, FileHeader, ImageFile, Node, ReadChecksumPolicy, FILE_HEADER_SIZE};
use std::path::Path;
use tempfile::TempDir;

/// Write a reader-ready file whose XML section declares `blobs`
fn write_with_blobs(path: &Path, blobs: &str) {
    let xml = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <e57Root type=\"Structure\">{}</e57Root>",
        blobs
    );
    let mut file = CheckedFile::open(path, FileMode::WriteCreate, ReadChecksumPolicy::ALL).unwrap();
    file.seek(FILE_HEADER_SIZE as u64, OffsetMode::Logical);
    let xml_physical_offset = file.position(OffsetMode::Physical);
    file.write_str(&xml).unwrap();

    let header = FileHeader::new(
        file.length(OffsetMode::Physical),
        xml_physical_offset,
        xml.len() as u64,
    );
    file.seek(0, OffsetMode::Logical);
    file.write(&header.to_bytes()).unwrap();
    file.close().unwrap();
}

fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect()
}

#[test]
fn test_blob_write_and_read_back() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("blob.e57");
    let payload = pattern(3000, 7);

    let imf = ImageFile::create(&path).unwrap();
    let blob = imf.new_blob("/thumbnail", payload.len() as u64).unwrap();
    assert_eq!(blob.blob_length(), Some(3000));
    assert!(blob.is_attached());
    // First allocation starts right behind the header
    assert_eq!(blob.blob_file_offset(), Some(48));

    imf.blob_write("/thumbnail", &payload[..1000], 0).unwrap();
    imf.blob_write("/thumbnail", &payload[1000..], 1000).unwrap();

    let mut check = vec![0u8; 500];
    imf.blob_read("/thumbnail", &mut check, 900).unwrap();
    assert_eq!(check, &payload[900..1400]);
    imf.close().unwrap();

    let imf = ImageFile::open_reader(&path).unwrap();
    let mut read_back = vec![0u8; payload.len()];
    imf.blob_read("/thumbnail", &mut read_back, 0).unwrap();
    assert_eq!(read_back, payload);
}

#[test]
fn test_unwritten_blob_reads_zeros() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("zeros.e57");

    let imf = ImageFile::create(&path).unwrap();
    imf.new_blob("/reserved", 2048).unwrap();
    imf.close().unwrap();

    let imf = ImageFile::open_reader(&path).unwrap();
    let mut buf = vec![0xAAu8; 2048];
    imf.blob_read("/reserved", &mut buf, 0).unwrap();
    assert!(buf.iter().all(|&b| b == 0));
}

#[test]
fn test_consecutive_blobs_do_not_overlap() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("two.e57");

    let imf = ImageFile::create(&path).unwrap();
    let first = imf.new_blob("/first", 1500).unwrap();
    let second = imf.new_blob("/second", 100).unwrap();

    // Second section starts at logical 48 + 16 + 1500 = 1564
    assert_eq!(first.blob_file_offset(), Some(48));
    assert_eq!(second.blob_file_offset(), Some(1024 + 544));

    imf.blob_write("/first", &[0xFF; 1500], 0).unwrap();
    imf.blob_write("/second", &[0x11; 100], 0).unwrap();
    imf.close().unwrap();

    let imf = ImageFile::open_reader(&path).unwrap();
    let mut first_data = vec![0u8; 1500];
    let mut second_data = vec![0u8; 100];
    imf.blob_read("/first", &mut first_data, 0).unwrap();
    imf.blob_read("/second", &mut second_data, 0).unwrap();
    assert!(first_data.iter().all(|&b| b == 0xFF));
    assert!(second_data.iter().all(|&b| b == 0x11));
}

#[test]
fn test_section_header_on_disk() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("section.e57");

    let imf = ImageFile::create(&path).unwrap();
    let blob = imf.new_blob("/data", 40).unwrap();
    imf.close().unwrap();

    let mut file = CheckedFile::open(&path, FileMode::ReadOnly, ReadChecksumPolicy::ALL).unwrap();
    file.seek(blob.blob_file_offset().unwrap(), OffsetMode::Physical);
    let mut section_header = [0u8; 16];
    file.read(&mut section_header).unwrap();

    assert_eq!(section_header[0], 0);
    assert_eq!(&section_header[1..8], &[0u8; 7]);
    assert_eq!(&section_header[8..16], &56u64.to_le_bytes());
}

#[test]
fn test_blob_range_checks() {
    let dir = TempDir::new().unwrap();
    let imf = ImageFile::create(dir.path().join("range.e57")).unwrap();
    imf.new_blob("/blob", 10).unwrap();
    imf.set("/text", Node::string("not a blob")).unwrap();

    assert!(matches!(
        imf.blob_write("/blob", &[0u8; 11], 0),
        Err(E57Error::BadApiArgument(_))
    ));
    assert!(matches!(
        imf.blob_write("/blob", &[0u8; 2], 9),
        Err(E57Error::BadApiArgument(_))
    ));
    let mut buf = [0u8; 1];
    assert!(matches!(
        imf.blob_read("/blob", &mut buf, u64::MAX),
        Err(E57Error::BadApiArgument(_))
    ));
    assert!(matches!(
        imf.blob_read("/text", &mut buf, 0),
        Err(E57Error::BadApiArgument(_))
    ));
    assert!(matches!(
        imf.blob_read("/nothing", &mut buf, 0),
        Err(E57Error::PathUndefined { .. })
    ));
    assert!(matches!(
        imf.new_blob("/blob", 5),
        Err(E57Error::SetTwice { .. })
    ));

    imf.blob_write("/blob", &[1u8; 10], 0).unwrap();
    imf.cancel().unwrap();
}

#[test]
fn test_blob_write_on_reader() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("reader.e57");

    let imf = ImageFile::create(&path).unwrap();
    imf.new_blob("/blob", 4).unwrap();
    imf.close().unwrap();

    let imf = ImageFile::open_reader(&path).unwrap();
    assert!(matches!(
        imf.blob_write("/blob", &[1, 2, 3, 4], 0),
        Err(E57Error::FileReadOnly { .. })
    ));
}

#[test]
fn test_blob_outside_file_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("crafted.e57");
    write_with_blobs(
        &path,
        "<huge type=\"Blob\" fileOffset=\"18446744073709551615\" length=\"18446744073709551615\"/>\
         <long type=\"Blob\" fileOffset=\"48\" length=\"100000\"/>\
         <fits type=\"Blob\" fileOffset=\"48\" length=\"8\"/>",
    );

    let imf = ImageFile::open_reader(&path).unwrap();
    let mut buf = [0u8; 4];
    assert!(matches!(
        imf.blob_read("/huge", &mut buf, 1_000_000_000_000_000_000),
        Err(E57Error::BadFileLength(_))
    ));
    assert!(matches!(
        imf.blob_read("/huge", &mut buf, 0),
        Err(E57Error::BadFileLength(_))
    ));
    assert!(matches!(
        imf.blob_read("/long", &mut buf, 0),
        Err(E57Error::BadFileLength(_))
    ));

    // A section inside the file stays readable; here it overlaps the XML
    imf.blob_read("/fits", &mut buf, 4).unwrap();
    assert_eq!(&buf, b"enco");
}
