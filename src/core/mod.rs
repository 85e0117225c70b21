//! E57 container core
//!
//! - [`error`] - Error types for container operations
//! - [`config`] - Open-time settings and checksum policy
//! - [`header`] - The 48-byte file header
//! - [`io`] - Checksummed paged file access
//! - [`allocator`] - Append-only space allocation
//! - [`namespace`] - Extension namespace registry
//! - [`validation`] - Element and path name grammar
//! - [`bits`] - Bit width of integer ranges
//! - [`node`] - Element tree nodes
//! - [`xml`] - XML section reader and writer
//! - [`image_file`] - Container lifecycle
//! - [`dump`] - Diagnostic dumps
//!
//! ## File layout
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ Header (48 bytes, logical offset 0)         │
//! │  - Magic: "ASTM-E57"                        │
//! │  - Version 1.0, lengths, XML location       │
//! ├─────────────────────────────────────────────┤
//! │ Binary sections                             │
//! │  - Allocated in order, never reused         │
//! ├─────────────────────────────────────────────┤
//! │ XML section                                 │
//! │  - Element tree, padded to 4 bytes          │
//! └─────────────────────────────────────────────┘
//!
//! Every 1024-byte physical page ends in a CRC-32C of its 1020 content bytes.
//! ```

pub mod allocator;
pub mod bits;
pub mod config;
pub mod dump;
pub mod error;
pub mod header;
pub mod image_file;
pub mod io;
pub mod namespace;
pub mod node;
pub mod validation;
pub mod xml;

pub use config::{ImageFileConfig, OpenMode, ReadChecksumPolicy};
pub use dump::Dump;
pub use error::{E57Error, Result};
pub use header::{FileHeader, FILE_HEADER_SIZE, FORMAT_MAJOR, FORMAT_MINOR};
pub use image_file::ImageFileImpl;
pub use namespace::{NamespaceBinding, NamespaceRegistry};
pub use node::{FloatPrecision, Node, NodeKind, NodeType, MAX_TREE_DEPTH};
pub use validation::PathName;
