//! # e57-container - ASTM E57 Container Manager
//!
//! `e57-container` opens, validates, allocates within and finalizes ASTM E57
//! point-cloud interchange files. An E57 file is a 48-byte header, zero or
//! more binary sections, and an XML section describing a tree of typed
//! elements, all stored in 1024-byte pages that each end in a CRC-32C.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use e57_container::{ImageFile, Node, Result};
//!
//! # fn main() -> Result<()> {
//! // Write a new file
//! let imf = ImageFile::create("scan.e57")?;
//! imf.set("/formatName", Node::string("ASTM E57 3D Imaging Data File"))?;
//! imf.set("/versionMajor", Node::unbounded_integer(1))?;
//!
//! let blob = imf.new_blob("/thumbnail", 4)?;
//! imf.blob_write("/thumbnail", &[1, 2, 3, 4], 0)?;
//! assert_eq!(blob.blob_length(), Some(4));
//!
//! // Finalize; dropping an unclosed writer deletes the file instead
//! imf.close()?;
//!
//! // Read it back
//! let imf = ImageFile::open_reader("scan.e57")?;
//! let name = imf.get("/formatName")?;
//! assert_eq!(name.string_value(), Some("ASTM E57 3D Imaging Data File"));
//! imf.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Extension namespaces
//!
//! ```rust,no_run
//! use e57_container::{ImageFile, Node, Result};
//!
//! # fn main() -> Result<()> {
//! let imf = ImageFile::create("ext.e57")?;
//! imf.extensions_add("demo", "http://example.com/demo-extension")?;
//! imf.set("/demo:note", Node::string("vendor data"))?;
//! imf.close()?;
//! # Ok(())
//! # }
//! ```

// Core implementation
pub mod core;

// Re-export core modules internally so crate:: paths in core still work
#[allow(unused_imports)]
pub(crate) use crate::core::{allocator, config, dump, error, header, image_file, io, namespace, node, xml};

pub use crate::core::{bits, validation};

// Re-export core types that users need
pub use crate::core::{
    bits::bits_needed,
    config::{ImageFileConfig, OpenMode, ReadChecksumPolicy},
    dump::Dump,
    error::{E57Error, Result},
    header::{FileHeader, FILE_HEADER_SIZE, FORMAT_MAJOR, FORMAT_MINOR},
    namespace::{NamespaceBinding, NamespaceRegistry},
    node::{FloatPrecision, Node, NodeKind, NodeType, MAX_TREE_DEPTH},
    validation::{unparse_path_name, PathName},
};

use crate::core::image_file::ImageFileImpl;
use std::cell::RefCell;
use std::fmt;
use std::path::Path;
use std::rc::{Rc, Weak};
use tracing::{debug, warn};

/// Shareable handle to an open E57 container
///
/// Clones refer to the same container. The handle is single-threaded; use
/// one container from one thread at a time.
///
/// A writer must be finalized with [`ImageFile::close`]. Once the last
/// handle is dropped an unclosed writer is cancelled and its file removed.
#[derive(Clone)]
pub struct ImageFile {
    inner: Rc<RefCell<ImageFileImpl>>,
}

impl ImageFile {
    /// Open a container in the given mode
    pub fn open<P: AsRef<Path>>(path: P, mode: OpenMode, config: ImageFileConfig) -> Result<Self> {
        let inner = ImageFileImpl::open(path, mode, config)?;
        Ok(ImageFile { inner })
    }

    /// Open an existing file for reading with the default configuration
    pub fn open_reader<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open(path, OpenMode::Reader, ImageFileConfig::default())
    }

    /// Create (or truncate) a file for writing with the default configuration
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open(path, OpenMode::Writer, ImageFileConfig::default())
    }

    /// Open with a textual mode (`"r"` or `"w"`) and a checksum policy
    /// percentage, clamped into 0..=100
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use e57_container::{E57Error, ImageFile};
    ///
    /// let result = ImageFile::open_with_mode_str("scan.e57", "rw", 100);
    /// assert!(matches!(result, Err(E57Error::BadApiArgument(_))));
    /// ```
    pub fn open_with_mode_str<P: AsRef<Path>>(
        path: P,
        mode: &str,
        checksum_policy: i64,
    ) -> Result<Self> {
        let mode: OpenMode = mode.parse()?;
        let config = ImageFileConfig::default()
            .with_checksum_policy(ReadChecksumPolicy::new(checksum_policy));
        Self::open(path, mode, config)
    }

    /// Finalize a writer or release a reader; no-op when already released
    pub fn close(&self) -> Result<()> {
        self.inner.borrow_mut().close()
    }

    /// Abandon the container; a writer's file is deleted
    pub fn cancel(&self) -> Result<()> {
        self.inner.borrow_mut().cancel()
    }

    pub fn is_open(&self) -> bool {
        self.inner.borrow().is_open()
    }

    pub fn is_writer(&self) -> bool {
        self.inner.borrow().is_writer()
    }

    /// Name of the file, also available when the container is not open
    pub fn file_name(&self) -> String {
        self.inner.borrow().file_name().to_string()
    }

    pub fn reader_count(&self) -> usize {
        self.inner.borrow().reader_count()
    }

    pub fn writer_count(&self) -> usize {
        self.inner.borrow().writer_count()
    }

    /// True when both handles refer to the same container
    pub fn same_file(&self, other: &ImageFile) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Decoded header of a reader, or the header written by `close`
    pub fn file_header(&self) -> Option<FileHeader> {
        self.inner.borrow().file_header().copied()
    }

    /// Copy of the root structure
    pub fn root(&self) -> Result<Node> {
        self.inner.borrow().root().cloned()
    }

    /// Copy of the element at `path`
    pub fn get(&self, path: &str) -> Result<Node> {
        self.inner.borrow().get(path)
    }

    pub fn is_defined(&self, path: &str) -> Result<bool> {
        self.inner.borrow().is_defined(path)
    }

    /// Set a new structure child at `path` (writers only)
    pub fn set(&self, path: &str, node: Node) -> Result<()> {
        debug!("Setting {} ({})", path, node.node_type());
        self.inner.borrow_mut().set(path, node)
    }

    /// Append a child to the vector at `path` (writers only)
    pub fn append(&self, path: &str, node: Node) -> Result<()> {
        self.inner.borrow_mut().append(path, node)
    }

    pub fn extensions_add(&self, prefix: &str, uri: &str) -> Result<()> {
        self.inner.borrow_mut().extensions_add(prefix, uri)
    }

    pub fn extensions_lookup_prefix(&self, prefix: &str) -> Result<Option<String>> {
        self.inner.borrow().extensions_lookup_prefix(prefix)
    }

    pub fn extensions_lookup_uri(&self, uri: &str) -> Result<Option<String>> {
        self.inner.borrow().extensions_lookup_uri(uri)
    }

    pub fn extensions_count(&self) -> Result<usize> {
        self.inner.borrow().extensions_count()
    }

    pub fn extensions_prefix(&self, index: usize) -> Result<String> {
        self.inner.borrow().extensions_prefix(index)
    }

    pub fn extensions_uri(&self, index: usize) -> Result<String> {
        self.inner.borrow().extensions_uri(index)
    }

    pub fn is_element_name_extended(&self, element_name: &str) -> bool {
        self.inner.borrow().is_element_name_extended(element_name)
    }

    pub fn check_element_name_legal(&self, element_name: &str, allow_numeric: bool) -> Result<()> {
        self.inner
            .borrow()
            .check_element_name_legal(element_name, allow_numeric)
    }

    /// False for illegal names and for a closed container
    pub fn is_element_name_legal(&self, element_name: &str, allow_numeric: bool) -> bool {
        self.inner
            .borrow()
            .is_element_name_legal(element_name, allow_numeric)
    }

    /// False for malformed paths and for a closed container
    pub fn is_path_name_legal(&self, path: &str) -> bool {
        self.inner.borrow().is_path_name_legal(path)
    }

    pub fn parse_path_name(&self, path: &str) -> Result<PathName> {
        self.inner.borrow().parse_path_name(path)
    }

    /// Reserve `byte_count` bytes of logical space and return its start
    pub fn allocate_space(&self, byte_count: u64, extend_now: bool) -> Result<u64> {
        self.inner
            .borrow_mut()
            .allocate_space(byte_count, extend_now)
    }

    /// Allocate a binary section and set a blob node for it at `path`
    pub fn new_blob(&self, path: &str, byte_count: u64) -> Result<Node> {
        self.inner.borrow_mut().new_blob(path, byte_count)
    }

    pub fn blob_write(&self, path: &str, bytes: &[u8], start: u64) -> Result<()> {
        self.inner.borrow_mut().blob_write(path, bytes, start)
    }

    pub fn blob_read(&self, path: &str, buf: &mut [u8], start: u64) -> Result<()> {
        self.inner.borrow_mut().blob_read(path, buf, start)
    }

    /// Register a live reader-role handle into this container
    pub fn attach_reader(&self) -> Result<NodeLease> {
        self.attach(LeaseRole::Reader)
    }

    /// Register a live writer-role handle; the container must be a writer
    pub fn attach_writer(&self) -> Result<NodeLease> {
        self.attach(LeaseRole::Writer)
    }

    fn attach(&self, role: LeaseRole) -> Result<NodeLease> {
        let mut inner = self.inner.borrow_mut();
        inner.check_open()?;
        match role {
            LeaseRole::Reader => inner.incr_reader_count(),
            LeaseRole::Writer => {
                if !inner.is_writer() {
                    return Err(E57Error::FileReadOnly {
                        file_name: inner.file_name().to_string(),
                    });
                }
                inner.incr_writer_count()
            }
        }
        Ok(NodeLease {
            image_file: Rc::downgrade(&self.inner),
            role,
        })
    }

    /// Structural dump of the container state and element tree
    pub fn dump_string(&self) -> String {
        self.inner.borrow().dump_string()
    }
}

impl fmt::Debug for ImageFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_borrow() {
            Ok(inner) => f
                .debug_struct("ImageFile")
                .field("file_name", &inner.file_name())
                .field("mode", &inner.mode())
                .field("is_open", &inner.is_open())
                .finish(),
            Err(_) => f.debug_struct("ImageFile").finish_non_exhaustive(),
        }
    }
}

/// Role of a [`NodeLease`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseRole {
    Reader,
    Writer,
}

/// Counts one live reader or writer handle into a container
///
/// The matching counter is incremented when the lease is created and
/// decremented when it is dropped. The lease does not keep the container
/// alive.
#[derive(Debug)]
pub struct NodeLease {
    image_file: Weak<RefCell<ImageFileImpl>>,
    role: LeaseRole,
}

impl NodeLease {
    pub fn role(&self) -> LeaseRole {
        self.role
    }
}

impl Drop for NodeLease {
    fn drop(&mut self) {
        let Some(image_file) = self.image_file.upgrade() else {
            return;
        };
        let result = match image_file.try_borrow_mut() {
            Ok(mut inner) => match self.role {
                LeaseRole::Reader => inner.decr_reader_count(),
                LeaseRole::Writer => inner.decr_writer_count(),
            },
            Err(_) => {
                warn!("Container busy, {:?} lease not released", self.role);
                return;
            }
        };
        if let Err(e) = result {
            warn!("Failed to release {:?} lease: {}", self.role, e);
        }
    }
}
