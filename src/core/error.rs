use thiserror::Error;

#[derive(Error, Debug)]
pub enum E57Error {
    #[error("Bad API argument: {0}")]
    BadApiArgument(String),

    #[error("Bad file signature: fileName={file_name}")]
    BadFileSignature { file_name: String },

    #[error("Unknown file version: fileName={file_name} majorVersion={major} minorVersion={minor}")]
    UnknownFileVersion {
        file_name: String,
        major: u32,
        minor: u32,
    },

    #[error("Bad file length: {0}")]
    BadFileLength(String),

    #[error("Image file not open: fileName={file_name}")]
    ImageFileNotOpen { file_name: String },

    #[error("Duplicate namespace prefix: prefix={prefix} uri={uri}")]
    DuplicateNamespacePrefix { prefix: String, uri: String },

    #[error("Duplicate namespace URI: prefix={prefix} uri={uri}")]
    DuplicateNamespaceUri { prefix: String, uri: String },

    #[error("Bad path name: {0}")]
    BadPathName(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Page checksum verification failed: fileName={file_name} page={page}")]
    BadChecksum { file_name: String, page: u64 },

    #[error("File is read-only: fileName={file_name}")]
    FileReadOnly { file_name: String },

    #[error("Path undefined: {path}")]
    PathUndefined { path: String },

    #[error("Element already defined: {path}")]
    SetTwice { path: String },

    #[error("Value out of bounds: {0}")]
    ValueOutOfBounds(String),

    #[error("Homogeneous vector violation: {0}")]
    HomogeneousViolation(String),

    #[error("Node is already attached to a different image file")]
    DifferentDestImageFile,

    #[error("XML parser error: {0}")]
    XmlParser(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, E57Error>;
