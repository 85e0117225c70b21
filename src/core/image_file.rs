//! Container lifecycle
//!
//! An [`ImageFileImpl`] owns the checksummed file, the element tree, the
//! namespace registry and the allocation cursor of one open E57 file.
//!
//! ```text
//! Unopened ──open(Reader)──> OpenReader ──close/cancel──> Closed/Cancelled
//!          ──open(Writer)──> OpenWriter ──close────────> Closed
//!                                       ──cancel/drop──> Cancelled (file removed)
//! ```
//!
//! Opening goes through a single factory that returns a fully initialized,
//! shareable handle or an error; a failed open never leaves a file handle
//! behind. Nothing here is synchronized: one container must only be used
//! from one thread at a time.

use crate::allocator::SpaceAllocator;
use crate::config::{ImageFileConfig, OpenMode};
use crate::error::{E57Error, Result};
use crate::header::{FileHeader, FILE_HEADER_SIZE};
use crate::io::{CheckedFile, FileMode, OffsetMode};
use crate::namespace::NamespaceRegistry;
use crate::node::{ImageFileRef, Node, NodeKind, MAX_TREE_DEPTH};
use crate::validation::{self, parse_path_name, PathName};
use crate::xml::{self, ROOT_ELEMENT_NAME, XML_PROLOGUE};
use std::cell::RefCell;
use std::mem::size_of_val;
use std::path::Path;
use std::rc::Rc;
use tracing::{debug, info, warn};

/// Size of the header in front of every binary section
pub const BLOB_SECTION_HEADER_SIZE: u64 = 16;

/// Section id of a blob section
const BLOB_SECTION_ID: u8 = 0;

/// Releases the file if an open does not reach the end
struct OpenGuard {
    file: Option<CheckedFile>,
}

impl OpenGuard {
    fn new(file: CheckedFile) -> Self {
        OpenGuard { file: Some(file) }
    }

    fn file(&mut self) -> Result<&mut CheckedFile> {
        self.file
            .as_mut()
            .ok_or_else(|| E57Error::Internal("open guard already disarmed".into()))
    }

    /// Hand the file over to the caller, disabling cleanup
    fn disarm(mut self) -> Result<CheckedFile> {
        self.file
            .take()
            .ok_or_else(|| E57Error::Internal("open guard already disarmed".into()))
    }
}

impl Drop for OpenGuard {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            debug!("Releasing {} after failed open", file.file_name());
            if let Err(e) = file.close() {
                warn!("Failed to release file after failed open: {}", e);
            }
        }
    }
}

/// State produced by a successful open, before it is shared
struct OpenedFile {
    file: CheckedFile,
    header: Option<FileHeader>,
    xml_logical_offset: u64,
    xml_logical_length: u64,
    namespaces: NamespaceRegistry,
    root: Node,
}

/// An open E57 container
pub struct ImageFileImpl {
    file_name: String,
    mode: OpenMode,
    config: ImageFileConfig,
    /// `None` once closed or cancelled
    file: Option<CheckedFile>,
    /// Header as decoded on open, or as written on close
    header: Option<FileHeader>,
    xml_logical_offset: u64,
    xml_logical_length: u64,
    allocator: SpaceAllocator,
    namespaces: NamespaceRegistry,
    reader_count: usize,
    writer_count: usize,
    root: Node,
    self_ref: ImageFileRef,
}

impl ImageFileImpl {
    /// Open `path` in the given mode and return a shareable container
    ///
    /// Readers validate the header and parse the XML section into the
    /// element tree. Writers create or truncate the file and start with an
    /// empty root structure.
    pub fn open<P: AsRef<Path>>(
        path: P,
        mode: OpenMode,
        config: ImageFileConfig,
    ) -> Result<Rc<RefCell<ImageFileImpl>>> {
        let path = path.as_ref();
        let file_name = path.display().to_string();
        info!("Opening image file {} (mode={})", file_name, mode);

        let opened = match mode {
            OpenMode::Reader => Self::open_reader(path, &config)?,
            OpenMode::Writer => Self::open_writer(path, &config)?,
        };
        let OpenedFile {
            file,
            header,
            xml_logical_offset,
            xml_logical_length,
            namespaces,
            mut root,
        } = opened;

        Ok(Rc::new_cyclic(|self_ref| {
            root.set_attached_recursive(self_ref);
            RefCell::new(ImageFileImpl {
                file_name,
                mode,
                config,
                file: Some(file),
                header,
                xml_logical_offset,
                xml_logical_length,
                allocator: SpaceAllocator::new(FILE_HEADER_SIZE as u64),
                namespaces,
                reader_count: 0,
                writer_count: 0,
                root,
                self_ref: self_ref.clone(),
            })
        }))
    }

    fn open_reader(path: &Path, config: &ImageFileConfig) -> Result<OpenedFile> {
        let file = CheckedFile::open(path, FileMode::ReadOnly, config.checksum_policy)?;
        let mut guard = OpenGuard::new(file);

        let header = read_file_header(guard.file()?, config)?;

        let file = guard.file()?;
        let xml_logical_offset = file.physical_to_logical(header.xml_physical_offset);
        let xml_logical_length = header.xml_logical_length;
        let xml_end = xml_logical_offset.checked_add(xml_logical_length);
        if xml_end.map_or(true, |end| end > file.length(OffsetMode::Logical)) {
            return Err(E57Error::BadFileLength(format!(
                "fileName={} xmlLogicalOffset={} xmlLogicalLength={} logicalLength={}",
                file.file_name(),
                xml_logical_offset,
                xml_logical_length,
                file.length(OffsetMode::Logical)
            )));
        }

        let mut xml_bytes = vec![0u8; xml_logical_length as usize];
        file.seek(xml_logical_offset, OffsetMode::Logical);
        file.read(&mut xml_bytes)?;
        let xml_text = String::from_utf8(xml_bytes)
            .map_err(|e| E57Error::XmlParser(format!("XML section is not UTF-8: {}", e)))?;

        let mut namespaces = NamespaceRegistry::new();
        let root = xml::parse_xml(&xml_text, &mut namespaces)?;
        debug!(
            "Parsed XML section: {} root children, {} namespaces",
            root.child_count(),
            namespaces.len()
        );

        Ok(OpenedFile {
            file: guard.disarm()?,
            header: Some(header),
            xml_logical_offset,
            xml_logical_length,
            namespaces,
            root,
        })
    }

    fn open_writer(path: &Path, config: &ImageFileConfig) -> Result<OpenedFile> {
        let file = CheckedFile::open(path, FileMode::WriteCreate, config.checksum_policy)?;
        let guard = OpenGuard::new(file);

        if config.validate_invariants {
            check_header_size()?;
        }

        Ok(OpenedFile {
            file: guard.disarm()?,
            header: None,
            xml_logical_offset: 0,
            xml_logical_length: 0,
            namespaces: NamespaceRegistry::new(),
            root: Node::structure(),
        })
    }

    /// File name; available even when the container is not open
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    pub fn config(&self) -> &ImageFileConfig {
        &self.config
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    pub fn is_writer(&self) -> bool {
        self.mode.is_writer()
    }

    pub fn check_open(&self) -> Result<()> {
        if self.file.is_none() {
            return Err(E57Error::ImageFileNotOpen {
                file_name: self.file_name.clone(),
            });
        }
        Ok(())
    }

    fn check_writer(&self) -> Result<()> {
        self.check_open()?;
        if !self.is_writer() {
            return Err(E57Error::FileReadOnly {
                file_name: self.file_name.clone(),
            });
        }
        Ok(())
    }

    fn file_mut(&mut self) -> Result<&mut CheckedFile> {
        match self.file.as_mut() {
            Some(file) => Ok(file),
            None => Err(E57Error::ImageFileNotOpen {
                file_name: self.file_name.clone(),
            }),
        }
    }

    /// Finalize a writer and release the file; no-op once released
    ///
    /// If finalizing fails the file stays open, so a later cancel or drop
    /// still removes it.
    pub fn close(&mut self) -> Result<()> {
        let mut file = match self.file.take() {
            Some(file) => file,
            None => return Ok(()),
        };

        if self.is_writer() {
            if let Err(e) = self.finalize(&mut file) {
                self.file = Some(file);
                return Err(e);
            }
        }

        file.close()?;
        info!("Closed image file {}", self.file_name);
        Ok(())
    }

    /// Write the XML section and the header
    fn finalize(&mut self, file: &mut CheckedFile) -> Result<()> {
        let xml_logical_offset = self.allocator.cursor();
        file.seek(xml_logical_offset, OffsetMode::Logical);
        let xml_physical_offset = file.position(OffsetMode::Physical);

        let mut xml = String::from(XML_PROLOGUE);
        xml.push_str(&xml::write_xml(
            &self.root,
            &self.namespaces,
            self.config.xml_indent,
            ROOT_ELEMENT_NAME,
        ));
        while xml.len() % 4 != 0 {
            xml.push(' ');
        }
        file.write_str(&xml)?;

        let xml_logical_length = file.position(OffsetMode::Logical) - xml_logical_offset;
        let header = FileHeader::new(
            file.length(OffsetMode::Physical),
            xml_physical_offset,
            xml_logical_length,
        );
        if self.config.validate_invariants {
            check_header_size()?;
        }

        file.seek(0, OffsetMode::Logical);
        file.write(&header.to_bytes())?;
        debug!(
            "Wrote header: filePhysicalLength={} xmlPhysicalOffset={} xmlLogicalLength={}",
            header.file_physical_length, header.xml_physical_offset, header.xml_logical_length
        );

        self.xml_logical_offset = xml_logical_offset;
        self.xml_logical_length = xml_logical_length;
        self.header = Some(header);
        Ok(())
    }

    /// Abandon the container; writers delete their file
    pub fn cancel(&mut self) -> Result<()> {
        let file = match self.file.take() {
            Some(file) => file,
            None => return Ok(()),
        };

        if self.is_writer() {
            info!("Cancelling image file {}, removing it", self.file_name);
            file.unlink()
        } else {
            info!("Cancelling image file {}", self.file_name);
            file.close()
        }
    }

    pub fn reader_count(&self) -> usize {
        self.reader_count
    }

    pub fn writer_count(&self) -> usize {
        self.writer_count
    }

    pub(crate) fn incr_reader_count(&mut self) {
        self.reader_count += 1;
    }

    pub(crate) fn decr_reader_count(&mut self) -> Result<()> {
        match self.reader_count.checked_sub(1) {
            Some(count) => self.reader_count = count,
            None => self.counter_underflow("readerCount")?,
        }
        Ok(())
    }

    pub(crate) fn incr_writer_count(&mut self) {
        self.writer_count += 1;
    }

    pub(crate) fn decr_writer_count(&mut self) -> Result<()> {
        match self.writer_count.checked_sub(1) {
            Some(count) => self.writer_count = count,
            None => self.counter_underflow("writerCount")?,
        }
        Ok(())
    }

    /// Counters saturate at zero unless invariant validation is enabled
    fn counter_underflow(&self, counter: &str) -> Result<()> {
        if self.config.validate_invariants {
            return Err(E57Error::Internal(format!(
                "fileName={} {} would go negative (writerCount={} readerCount={})",
                self.file_name, counter, self.writer_count, self.reader_count
            )));
        }
        warn!("{} underflow on {} ignored", counter, self.file_name);
        Ok(())
    }

    /// Header of an opened reader, or of a closed writer
    pub fn file_header(&self) -> Option<&FileHeader> {
        self.header.as_ref()
    }

    pub fn xml_logical_offset(&self) -> u64 {
        self.xml_logical_offset
    }

    pub fn xml_logical_length(&self) -> u64 {
        self.xml_logical_length
    }

    /// Logical offset of the first unallocated byte
    pub fn unused_logical_start(&self) -> u64 {
        self.allocator.cursor()
    }

    /// Reserve space in the logical content stream
    pub fn allocate_space(&mut self, byte_count: u64, extend_now: bool) -> Result<u64> {
        let file = match self.file.as_mut() {
            Some(file) => file,
            None => {
                return Err(E57Error::ImageFileNotOpen {
                    file_name: self.file_name.clone(),
                })
            }
        };
        self.allocator.allocate(file, byte_count, extend_now)
    }

    pub fn root(&self) -> Result<&Node> {
        self.check_open()?;
        Ok(&self.root)
    }

    pub(crate) fn root_unchecked(&self) -> &Node {
        &self.root
    }

    pub(crate) fn namespaces(&self) -> &NamespaceRegistry {
        &self.namespaces
    }

    pub fn extensions_add(&mut self, prefix: &str, uri: &str) -> Result<()> {
        self.check_open()?;
        self.namespaces.add(prefix, uri)
    }

    pub fn extensions_lookup_prefix(&self, prefix: &str) -> Result<Option<String>> {
        self.check_open()?;
        Ok(self.namespaces.lookup_prefix(prefix).map(str::to_string))
    }

    pub fn extensions_lookup_uri(&self, uri: &str) -> Result<Option<String>> {
        self.check_open()?;
        Ok(self.namespaces.lookup_uri(uri).map(str::to_string))
    }

    pub fn extensions_count(&self) -> Result<usize> {
        self.check_open()?;
        Ok(self.namespaces.len())
    }

    pub fn extensions_prefix(&self, index: usize) -> Result<String> {
        self.check_extension_index(index)?;
        Ok(self.namespaces.at(index).prefix.clone())
    }

    pub fn extensions_uri(&self, index: usize) -> Result<String> {
        self.check_extension_index(index)?;
        Ok(self.namespaces.at(index).uri.clone())
    }

    fn check_extension_index(&self, index: usize) -> Result<()> {
        self.check_open()?;
        if index >= self.namespaces.len() {
            return Err(E57Error::BadApiArgument(format!(
                "index={} extensionsCount={}",
                index,
                self.namespaces.len()
            )));
        }
        Ok(())
    }

    pub fn is_element_name_extended(&self, element_name: &str) -> bool {
        validation::is_element_name_extended(element_name)
    }

    pub fn check_element_name_legal(&self, element_name: &str, allow_numeric: bool) -> Result<()> {
        self.check_open()?;
        validation::check_element_name_legal(element_name, allow_numeric, &self.namespaces)
    }

    /// Like `check_element_name_legal`, but any failure, including a closed
    /// file, is `false`
    pub fn is_element_name_legal(&self, element_name: &str, allow_numeric: bool) -> bool {
        self.is_open()
            && validation::is_element_name_legal(element_name, allow_numeric, &self.namespaces)
    }

    pub fn is_path_name_legal(&self, path_name: &str) -> bool {
        self.is_open() && validation::is_path_name_legal(path_name, &self.namespaces)
    }

    pub fn parse_path_name(&self, path_name: &str) -> Result<PathName> {
        self.check_open()?;
        parse_path_name(path_name, &self.namespaces)
    }

    /// Copy of the node at `path`
    ///
    /// Relative paths are resolved from the root.
    pub fn get(&self, path_name: &str) -> Result<Node> {
        let path = self.parse_path_name(path_name)?;
        self.root
            .lookup(&path.fields)
            .cloned()
            .ok_or_else(|| E57Error::PathUndefined {
                path: path_name.to_string(),
            })
    }

    pub fn is_defined(&self, path_name: &str) -> Result<bool> {
        let path = self.parse_path_name(path_name)?;
        Ok(self.root.lookup(&path.fields).is_some())
    }

    /// Split a path into its parent fields and a new child name, checking
    /// that the parent is a structure without that child
    fn insertion_point(&self, path_name: &str) -> Result<(PathName, String)> {
        let mut path = self.parse_path_name(path_name)?;
        let child_name = match path.fields.pop() {
            Some(name) if !name.is_empty() => name,
            _ => {
                return Err(E57Error::BadPathName(format!(
                    "pathName={} does not name a child element",
                    path_name
                )))
            }
        };

        let parent = self
            .root
            .lookup(&path.fields)
            .ok_or_else(|| E57Error::PathUndefined {
                path: path.to_string(),
            })?;
        if !matches!(parent.kind(), NodeKind::Structure(_)) {
            return Err(E57Error::BadApiArgument(format!(
                "parent of {} is a {}, not a Structure",
                path_name,
                parent.node_type()
            )));
        }
        if parent.child(&child_name).is_some() {
            return Err(E57Error::SetTwice {
                path: path_name.to_string(),
            });
        }
        Ok((path, child_name))
    }

    fn check_destination(&self, node: &Node) -> Result<()> {
        match node.destination() {
            Some(dest) if !dest.ptr_eq(&self.self_ref) => Err(E57Error::DifferentDestImageFile),
            _ => Ok(()),
        }
    }

    /// Add `node` as a new structure child at `path`
    pub fn set(&mut self, path_name: &str, mut node: Node) -> Result<()> {
        self.check_writer()?;
        self.check_destination(&node)?;
        let (parent_path, child_name) = self.insertion_point(path_name)?;
        check_tree_depth(parent_path.fields.len() + 1, &node, path_name)?;
        node.check_names(&self.namespaces)?;

        node.set_attached_recursive(&self.self_ref);
        let parent = self
            .root
            .lookup_mut(&parent_path.fields)
            .ok_or_else(|| E57Error::PathUndefined {
                path: parent_path.to_string(),
            })?;
        parent.set_child(&child_name, node)
    }

    /// Append `node` to the vector at `path`
    pub fn append(&mut self, path_name: &str, mut node: Node) -> Result<()> {
        self.check_writer()?;
        self.check_destination(&node)?;
        let path = self.parse_path_name(path_name)?;
        check_tree_depth(path.fields.len() + 1, &node, path_name)?;
        node.check_names(&self.namespaces)?;

        node.set_attached_recursive(&self.self_ref);
        let target = self
            .root
            .lookup_mut(&path.fields)
            .ok_or_else(|| E57Error::PathUndefined {
                path: path_name.to_string(),
            })?;
        target.append(node)
    }

    /// Allocate a binary section of `byte_count` bytes and set a blob node
    /// referring to it at `path`
    pub fn new_blob(&mut self, path_name: &str, byte_count: u64) -> Result<Node> {
        self.check_writer()?;
        let (parent_path, _) = self.insertion_point(path_name)?;
        check_tree_depth(parent_path.fields.len() + 1, &Node::blob(0, 0), path_name)?;

        let section_length = byte_count
            .checked_add(BLOB_SECTION_HEADER_SIZE)
            .ok_or_else(|| E57Error::BadApiArgument(format!("byteCount={}", byte_count)))?;
        let logical_start = self.allocate_space(section_length, true)?;

        let mut section_header = [0u8; BLOB_SECTION_HEADER_SIZE as usize];
        section_header[0] = BLOB_SECTION_ID;
        section_header[8..16].copy_from_slice(&section_length.to_le_bytes());

        let file = self.file_mut()?;
        file.seek(logical_start, OffsetMode::Logical);
        let physical_start = file.position(OffsetMode::Physical);
        file.write(&section_header)?;
        debug!(
            "New blob {} of {} bytes at physical offset {}",
            path_name, byte_count, physical_start
        );

        self.set(path_name, Node::blob(physical_start, byte_count))?;
        self.get(path_name)
    }

    /// Logical offset of `start` within the payload of the blob at `path`
    fn blob_payload_offset(&self, path_name: &str, start: u64, count: usize) -> Result<u64> {
        let node = self.get(path_name)?;
        let (file_offset, length) = match node.kind() {
            NodeKind::Blob {
                file_offset,
                length,
            } => (*file_offset, *length),
            _ => {
                return Err(E57Error::BadApiArgument(format!(
                    "{} is a {}, not a Blob",
                    path_name,
                    node.node_type()
                )))
            }
        };

        let end = start.checked_add(count as u64);
        if end.map_or(true, |end| end > length) {
            return Err(E57Error::BadApiArgument(format!(
                "pathName={} start={} count={} blobLength={}",
                path_name, start, count, length
            )));
        }

        // The section must lie inside the file, whatever the XML claims
        let section_start = crate::io::physical_to_logical(file_offset);
        let payload_start = section_start.checked_add(BLOB_SECTION_HEADER_SIZE);
        let section_end = payload_start.and_then(|p| p.checked_add(length));
        let logical_length = self
            .file
            .as_ref()
            .map_or(0, |file| file.length(OffsetMode::Logical));
        match (payload_start, section_end) {
            (Some(payload_start), Some(section_end)) if section_end <= logical_length => {
                Ok(payload_start + start)
            }
            _ => Err(E57Error::BadFileLength(format!(
                "pathName={} fileOffset={} blobLength={} runs past logicalLength={}",
                path_name, file_offset, length, logical_length
            ))),
        }
    }

    pub fn blob_write(&mut self, path_name: &str, bytes: &[u8], start: u64) -> Result<()> {
        self.check_writer()?;
        let offset = self.blob_payload_offset(path_name, start, bytes.len())?;
        let file = self.file_mut()?;
        file.seek(offset, OffsetMode::Logical);
        file.write(bytes)
    }

    pub fn blob_read(&mut self, path_name: &str, buf: &mut [u8], start: u64) -> Result<()> {
        self.check_open()?;
        let offset = self.blob_payload_offset(path_name, start, buf.len())?;
        let file = self.file_mut()?;
        file.seek(offset, OffsetMode::Logical);
        file.read(buf)
    }
}

impl Drop for ImageFileImpl {
    fn drop(&mut self) {
        if self.file.is_none() {
            return;
        }
        if self.is_writer() {
            warn!(
                "Image file {} dropped without close, abandoning it",
                self.file_name
            );
        }
        if let Err(e) = self.cancel() {
            warn!("Implicit cancel of {} failed: {}", self.file_name, e);
        }
    }
}

/// A node placed under a parent at `parent_depth` must keep the tree
/// within [`MAX_TREE_DEPTH`]
fn check_tree_depth(parent_depth: usize, node: &Node, path_name: &str) -> Result<()> {
    let depth = parent_depth + node.depth();
    if depth > MAX_TREE_DEPTH {
        return Err(E57Error::BadApiArgument(format!(
            "pathName={} would nest {} levels, more than {}",
            path_name, depth, MAX_TREE_DEPTH
        )));
    }
    Ok(())
}

/// The encoded header must be exactly as long as the on-disk record
fn check_header_size() -> Result<()> {
    let header = FileHeader::new(0, 0, 0);
    let field_bytes = size_of_val(&header.signature)
        + size_of_val(&header.major_version)
        + size_of_val(&header.minor_version)
        + size_of_val(&header.file_physical_length)
        + size_of_val(&header.xml_physical_offset)
        + size_of_val(&header.xml_logical_length)
        + size_of_val(&header.page_size);
    if field_bytes != FILE_HEADER_SIZE {
        return Err(E57Error::Internal(format!(
            "header fields take {} bytes, record is {}",
            field_bytes, FILE_HEADER_SIZE
        )));
    }
    Ok(())
}

fn read_file_header(file: &mut CheckedFile, config: &ImageFileConfig) -> Result<FileHeader> {
    if config.validate_invariants {
        check_header_size()?;
    }

    if file.length(OffsetMode::Logical) < FILE_HEADER_SIZE as u64 {
        return Err(E57Error::BadFileLength(format!(
            "fileName={} logicalLength={} is shorter than the header",
            file.file_name(),
            file.length(OffsetMode::Logical)
        )));
    }

    let mut bytes = [0u8; FILE_HEADER_SIZE];
    file.seek(0, OffsetMode::Logical);
    file.read(&mut bytes)?;

    let header = FileHeader::decode(&bytes, file.length(OffsetMode::Physical), file.file_name())?;
    debug!(
        "Decoded header of {}: version {}.{} xmlPhysicalOffset={} xmlLogicalLength={}",
        file.file_name(),
        header.major_version,
        header.minor_version,
        header.xml_physical_offset,
        header.xml_logical_length
    );
    Ok(header)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn writer(dir: &TempDir, validate: bool) -> Rc<RefCell<ImageFileImpl>> {
        let config = ImageFileConfig::default().with_invariant_validation(validate);
        ImageFileImpl::open(dir.path().join("t.e57"), OpenMode::Writer, config).unwrap()
    }

    #[test]
    fn test_counter_underflow_checked() {
        let dir = TempDir::new().unwrap();
        let imf = writer(&dir, true);
        let mut imf = imf.borrow_mut();

        imf.incr_reader_count();
        imf.decr_reader_count().unwrap();
        assert!(matches!(
            imf.decr_reader_count(),
            Err(E57Error::Internal(_))
        ));
        assert!(matches!(
            imf.decr_writer_count(),
            Err(E57Error::Internal(_))
        ));
        imf.cancel().unwrap();
    }

    #[test]
    fn test_counter_underflow_saturates() {
        let dir = TempDir::new().unwrap();
        let imf = writer(&dir, false);
        let mut imf = imf.borrow_mut();

        imf.decr_writer_count().unwrap();
        assert_eq!(imf.writer_count(), 0);
        imf.incr_writer_count();
        assert_eq!(imf.writer_count(), 1);
        imf.cancel().unwrap();
    }

    #[test]
    fn test_allocation_starts_after_header() {
        let dir = TempDir::new().unwrap();
        let imf = writer(&dir, true);
        let mut imf = imf.borrow_mut();

        assert_eq!(imf.allocate_space(10, false).unwrap(), 48);
        assert_eq!(imf.allocate_space(20, false).unwrap(), 58);
        assert_eq!(imf.allocate_space(5, false).unwrap(), 78);
        assert_eq!(imf.unused_logical_start(), 83);
        imf.cancel().unwrap();
    }

    #[test]
    fn test_root_is_attached() {
        let dir = TempDir::new().unwrap();
        let imf = writer(&dir, true);
        let imf_ref = imf.borrow();
        let root = imf_ref.root().unwrap();
        assert!(root.is_attached());
        assert!(root.destination().unwrap().ptr_eq(&Rc::downgrade(&imf)));
    }

    #[test]
    fn test_open_guard_drop_keeps_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("guard.e57");
        std::fs::write(&path, b"").unwrap();

        let file = CheckedFile::open(
            &path,
            FileMode::ReadOnly,
            crate::config::ReadChecksumPolicy::ALL,
        )
        .unwrap();
        let guard = OpenGuard::new(file);
        drop(guard);
        assert!(path.exists());
    }

    #[test]
    fn test_header_size_check() {
        assert!(check_header_size().is_ok());
    }
}
