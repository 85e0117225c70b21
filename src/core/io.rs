//! Checksummed paged file I/O
//!
//! The file is a sequence of 1024-byte physical pages. Each page carries
//! 1020 bytes of content followed by a big-endian CRC-32C of that content.
//! Callers address content through *logical* offsets, which skip the
//! checksum trailers; *physical* offsets are raw byte positions on disk.

use crate::config::ReadChecksumPolicy;
use crate::error::{E57Error, Result};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::trace;

pub const PHYSICAL_PAGE_SIZE: usize = 1024;
pub const CHECKSUM_SIZE: usize = 4;
pub const LOGICAL_PAGE_SIZE: usize = PHYSICAL_PAGE_SIZE - CHECKSUM_SIZE;

const ZERO_FILL_CHUNK: usize = 64 * 1024;

/// How the underlying file is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMode {
    ReadOnly,
    /// Create, truncating any existing file
    WriteCreate,
}

/// Address space for offsets passed to `seek`, `position` and `length`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetMode {
    Logical,
    Physical,
}

/// Convert a physical offset to the logical offset it holds
pub fn physical_to_logical(physical: u64) -> u64 {
    let page = physical / PHYSICAL_PAGE_SIZE as u64;
    let remainder = physical % PHYSICAL_PAGE_SIZE as u64;
    page * LOGICAL_PAGE_SIZE as u64 + remainder
}

/// Convert a logical offset to its physical position on disk
pub fn logical_to_physical(logical: u64) -> u64 {
    let page = logical / LOGICAL_PAGE_SIZE as u64;
    let remainder = logical % LOGICAL_PAGE_SIZE as u64;
    // Saturates for logical offsets beyond any representable file
    page.saturating_mul(PHYSICAL_PAGE_SIZE as u64).saturating_add(remainder)
}

/// Disk-backed checksummed file
pub struct CheckedFile {
    file: File,
    path: PathBuf,
    file_name: String,
    mode: FileMode,
    checksum_policy: ReadChecksumPolicy,
    logical_length: u64,
    logical_position: u64,
}

impl CheckedFile {
    /// Open a checksummed file in the given mode
    pub fn open<P: AsRef<Path>>(
        path: P,
        mode: FileMode,
        checksum_policy: ReadChecksumPolicy,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file_name = path.display().to_string();

        let (file, logical_length) = match mode {
            FileMode::ReadOnly => {
                let file = OpenOptions::new().read(true).open(&path)?;
                let physical_length = file.metadata()?.len();
                if physical_length % PHYSICAL_PAGE_SIZE as u64 != 0 {
                    return Err(E57Error::BadFileLength(format!(
                        "fileName={} physicalLength={} is not a multiple of pageSize={}",
                        file_name, physical_length, PHYSICAL_PAGE_SIZE
                    )));
                }
                (file, physical_to_logical(physical_length))
            }
            FileMode::WriteCreate => {
                let file = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(true)
                    .truncate(true)
                    .open(&path)?;
                (file, 0)
            }
        };

        Ok(CheckedFile {
            file,
            path,
            file_name,
            mode,
            checksum_policy,
            logical_length,
            logical_position: 0,
        })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> FileMode {
        self.mode
    }

    /// Move the current position; logical positions past the end are allowed
    /// and the gap is zero-filled by the next write.
    pub fn seek(&mut self, offset: u64, offset_mode: OffsetMode) {
        self.logical_position = match offset_mode {
            OffsetMode::Logical => offset,
            OffsetMode::Physical => physical_to_logical(offset),
        };
    }

    pub fn position(&self, offset_mode: OffsetMode) -> u64 {
        match offset_mode {
            OffsetMode::Logical => self.logical_position,
            OffsetMode::Physical => logical_to_physical(self.logical_position),
        }
    }

    pub fn length(&self, offset_mode: OffsetMode) -> u64 {
        match offset_mode {
            OffsetMode::Logical => self.logical_length,
            OffsetMode::Physical => self.page_count() * PHYSICAL_PAGE_SIZE as u64,
        }
    }

    pub fn physical_to_logical(&self, physical: u64) -> u64 {
        physical_to_logical(physical)
    }

    pub fn logical_to_physical(&self, logical: u64) -> u64 {
        logical_to_physical(logical)
    }

    fn page_count(&self) -> u64 {
        self.logical_length.div_ceil(LOGICAL_PAGE_SIZE as u64)
    }

    /// Read `buf.len()` logical bytes at the current position
    pub fn read(&mut self, buf: &mut [u8]) -> Result<()> {
        let end = self.logical_position.checked_add(buf.len() as u64);
        if end.map_or(true, |end| end > self.logical_length) {
            return Err(E57Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!(
                    "read past end: fileName={} position={} count={} logicalLength={}",
                    self.file_name,
                    self.logical_position,
                    buf.len(),
                    self.logical_length
                ),
            )));
        }

        let mut page_buf = [0u8; PHYSICAL_PAGE_SIZE];
        let mut done = 0;
        while done < buf.len() {
            let page = self.logical_position / LOGICAL_PAGE_SIZE as u64;
            let page_offset = (self.logical_position % LOGICAL_PAGE_SIZE as u64) as usize;
            let n = (LOGICAL_PAGE_SIZE - page_offset).min(buf.len() - done);

            let verify = self.checksum_policy.should_verify(page);
            self.read_physical_page(page, &mut page_buf, verify)?;
            buf[done..done + n].copy_from_slice(&page_buf[page_offset..page_offset + n]);

            done += n;
            self.logical_position += n as u64;
        }

        Ok(())
    }

    /// Write logical bytes at the current position
    pub fn write(&mut self, buf: &[u8]) -> Result<()> {
        if self.mode == FileMode::ReadOnly {
            return Err(E57Error::FileReadOnly {
                file_name: self.file_name.clone(),
            });
        }

        if self.logical_position > self.logical_length {
            self.extend(self.logical_position)?;
        }

        let mut page_buf = [0u8; PHYSICAL_PAGE_SIZE];
        let mut done = 0;
        while done < buf.len() {
            let page = self.logical_position / LOGICAL_PAGE_SIZE as u64;
            let page_offset = (self.logical_position % LOGICAL_PAGE_SIZE as u64) as usize;
            let n = (LOGICAL_PAGE_SIZE - page_offset).min(buf.len() - done);

            // Partial page update keeps the surrounding content
            if n != LOGICAL_PAGE_SIZE && page < self.page_count() {
                self.read_physical_page(page, &mut page_buf, false)?;
            } else {
                page_buf.fill(0);
            }

            page_buf[page_offset..page_offset + n].copy_from_slice(&buf[done..done + n]);
            self.write_physical_page(page, &mut page_buf)?;

            done += n;
            self.logical_position += n as u64;
            self.logical_length = self.logical_length.max(self.logical_position);
        }

        Ok(())
    }

    /// Write UTF-8 text at the current position
    pub fn write_str(&mut self, text: &str) -> Result<()> {
        self.write(text.as_bytes())
    }

    /// Zero-fill the file up to `new_logical_length`; the position is kept
    pub fn extend(&mut self, new_logical_length: u64) -> Result<()> {
        if new_logical_length <= self.logical_length {
            return Ok(());
        }

        let saved_position = self.logical_position;
        self.logical_position = self.logical_length;
        let result = self.fill_zeros(new_logical_length);
        self.logical_position = saved_position;
        result
    }

    fn fill_zeros(&mut self, new_logical_length: u64) -> Result<()> {
        let zeros = vec![0u8; ZERO_FILL_CHUNK];
        while self.logical_position < new_logical_length {
            let n = (new_logical_length - self.logical_position).min(ZERO_FILL_CHUNK as u64);
            self.write(&zeros[..n as usize])?;
        }
        Ok(())
    }

    fn read_physical_page(
        &mut self,
        page: u64,
        page_buf: &mut [u8; PHYSICAL_PAGE_SIZE],
        verify: bool,
    ) -> Result<()> {
        trace!("Reading physical page {} of {}", page, self.file_name);
        self.file.seek(SeekFrom::Start(page * PHYSICAL_PAGE_SIZE as u64))?;
        self.file.read_exact(page_buf)?;

        if verify {
            let stored = u32::from_be_bytes([
                page_buf[LOGICAL_PAGE_SIZE],
                page_buf[LOGICAL_PAGE_SIZE + 1],
                page_buf[LOGICAL_PAGE_SIZE + 2],
                page_buf[LOGICAL_PAGE_SIZE + 3],
            ]);
            if stored != crc32c::crc32c(&page_buf[..LOGICAL_PAGE_SIZE]) {
                return Err(E57Error::BadChecksum {
                    file_name: self.file_name.clone(),
                    page,
                });
            }
        }

        Ok(())
    }

    fn write_physical_page(
        &mut self,
        page: u64,
        page_buf: &mut [u8; PHYSICAL_PAGE_SIZE],
    ) -> Result<()> {
        trace!("Writing physical page {} of {}", page, self.file_name);
        let checksum = crc32c::crc32c(&page_buf[..LOGICAL_PAGE_SIZE]);
        page_buf[LOGICAL_PAGE_SIZE..].copy_from_slice(&checksum.to_be_bytes());

        self.file.seek(SeekFrom::Start(page * PHYSICAL_PAGE_SIZE as u64))?;
        self.file.write_all(page_buf)?;
        Ok(())
    }

    /// Flush and close the file
    pub fn close(mut self) -> Result<()> {
        if self.mode == FileMode::WriteCreate {
            self.file.flush()?;
            self.file.sync_all()?;
        }
        Ok(())
    }

    /// Close and delete the file
    pub fn unlink(self) -> Result<()> {
        let path = self.path.clone();
        drop(self.file);
        std::fs::remove_file(&path)?;
        Ok(())
    }
}
