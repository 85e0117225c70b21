use crate::error::{E57Error, Result};
use crate::io::PHYSICAL_PAGE_SIZE;
use serde::{Deserialize, Serialize};

pub const MAGIC: [u8; 8] = *b"ASTM-E57";
pub const FORMAT_MAJOR: u32 = 1;
pub const FORMAT_MINOR: u32 = 0;

/// Size of the encoded header record in bytes
pub const FILE_HEADER_SIZE: usize = 48;

/// E57 file header
///
/// Fixed 48-byte little-endian record at logical offset 0. It locates the
/// XML section and records the physical length of the whole file so that
/// truncated or partially written files are rejected on open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHeader {
    /// Magic signature: "ASTM-E57"
    #[serde(with = "signature")]
    pub signature: [u8; 8],

    pub major_version: u32,

    pub minor_version: u32,

    /// Total physical length of the file, checksums included
    pub file_physical_length: u64,

    /// Physical offset of the first byte of the XML section
    pub xml_physical_offset: u64,

    /// Logical length of the XML section, checksums excluded
    pub xml_logical_length: u64,

    /// Physical page size (always 1024 for non-prototype files)
    pub page_size: u64,
}

mod signature {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(sig: &[u8; 8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&String::from_utf8_lossy(sig))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[u8; 8], D::Error> {
        let text = String::deserialize(d)?;
        let bytes = text.as_bytes();
        if bytes.len() != 8 {
            return Err(serde::de::Error::invalid_length(bytes.len(), &"8 bytes"));
        }
        let mut sig = [0u8; 8];
        sig.copy_from_slice(bytes);
        Ok(sig)
    }
}

impl FileHeader {
    /// Create a header for the current format version
    pub fn new(
        file_physical_length: u64,
        xml_physical_offset: u64,
        xml_logical_length: u64,
    ) -> Self {
        FileHeader {
            signature: MAGIC,
            major_version: FORMAT_MAJOR,
            minor_version: FORMAT_MINOR,
            file_physical_length,
            xml_physical_offset,
            xml_logical_length,
            page_size: PHYSICAL_PAGE_SIZE as u64,
        }
    }

    /// Validate signature, version compatibility and lengths
    ///
    /// `actual_physical_length` is the measured length of the file on disk.
    /// `file_name` is only used for error context.
    pub fn validate(&self, actual_physical_length: u64, file_name: &str) -> Result<()> {
        if self.signature != MAGIC {
            return Err(E57Error::BadFileSignature {
                file_name: file_name.to_string(),
            });
        }

        // Any minor version of an older major is readable; within the
        // current major only minors up to ours.
        if self.major_version > FORMAT_MAJOR
            || (self.major_version == FORMAT_MAJOR && self.minor_version > FORMAT_MINOR)
        {
            return Err(E57Error::UnknownFileVersion {
                file_name: file_name.to_string(),
                major: self.major_version,
                minor: self.minor_version,
            });
        }

        if self.file_physical_length != actual_physical_length {
            return Err(E57Error::BadFileLength(format!(
                "fileName={} header.filePhysicalLength={} file->length={}",
                file_name, self.file_physical_length, actual_physical_length
            )));
        }

        // Prototype files (major 0) may use another page size
        if self.major_version != 0 && self.page_size != PHYSICAL_PAGE_SIZE as u64 {
            return Err(E57Error::BadFileLength(format!(
                "fileName={} header.pageSize={}",
                file_name, self.page_size
            )));
        }

        Ok(())
    }

    /// Serialize header to bytes
    pub fn to_bytes(&self) -> [u8; FILE_HEADER_SIZE] {
        let mut bytes = [0u8; FILE_HEADER_SIZE];

        bytes[0..8].copy_from_slice(&self.signature);
        bytes[8..12].copy_from_slice(&self.major_version.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.minor_version.to_le_bytes());
        bytes[16..24].copy_from_slice(&self.file_physical_length.to_le_bytes());
        bytes[24..32].copy_from_slice(&self.xml_physical_offset.to_le_bytes());
        bytes[32..40].copy_from_slice(&self.xml_logical_length.to_le_bytes());
        bytes[40..48].copy_from_slice(&self.page_size.to_le_bytes());

        bytes
    }

    /// Deserialize header fields from bytes without validating them
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < FILE_HEADER_SIZE {
            return Err(E57Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "Insufficient bytes for header",
            )));
        }

        let mut signature = [0u8; 8];
        signature.copy_from_slice(&bytes[0..8]);

        Ok(FileHeader {
            signature,
            major_version: read_u32(&bytes[8..12]),
            minor_version: read_u32(&bytes[12..16]),
            file_physical_length: read_u64(&bytes[16..24]),
            xml_physical_offset: read_u64(&bytes[24..32]),
            xml_logical_length: read_u64(&bytes[32..40]),
            page_size: read_u64(&bytes[40..48]),
        })
    }

    /// Deserialize and validate against the measured physical length
    pub fn decode(bytes: &[u8], actual_physical_length: u64, file_name: &str) -> Result<Self> {
        let header = Self::from_bytes(bytes)?;
        header.validate(actual_physical_length, file_name)?;
        Ok(header)
    }
}

fn read_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(bytes);
    u32::from_le_bytes(buf)
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    u64::from_le_bytes(buf)
}
