//! Append-only space allocation within the logical content stream
//!
//! Binary sections are laid out one after another behind the file header.
//! The allocator only ever moves forward: space handed out is never reused,
//! and the XML section is written at the final cursor position on close.
//! It is not safe to advance from two logical callers at once; the owning
//! image file serializes access.

use crate::error::{E57Error, Result};
use crate::io::CheckedFile;
use tracing::debug;

/// Monotonic allocation cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpaceAllocator {
    /// Logical offset of the first unused byte
    cursor: u64,
}

impl SpaceAllocator {
    /// Create an allocator whose first allocation starts at `start`
    pub fn new(start: u64) -> Self {
        SpaceAllocator { cursor: start }
    }

    /// Logical offset of the first unused byte
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Reserve `byte_count` bytes and return the logical offset of the reservation
    ///
    /// With `extend_now` the file is grown with zeros to cover the reservation
    /// immediately; otherwise the caller must write the space before it makes
    /// any allocation that depends on it being backed.
    pub fn allocate(
        &mut self,
        file: &mut CheckedFile,
        byte_count: u64,
        extend_now: bool,
    ) -> Result<u64> {
        let start = self.reserve(byte_count)?;
        if extend_now {
            file.extend(self.cursor)?;
        }
        debug!(
            "Allocated {} bytes at logical offset {} (extend_now={})",
            byte_count, start, extend_now
        );
        Ok(start)
    }

    /// Advance the cursor without touching the file
    pub fn reserve(&mut self, byte_count: u64) -> Result<u64> {
        let start = self.cursor;
        self.cursor = start.checked_add(byte_count).ok_or_else(|| {
            E57Error::BadApiArgument(format!(
                "byteCount={} overflows allocation cursor {}",
                byte_count, start
            ))
        })?;
        Ok(start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReadChecksumPolicy;
    use crate::header::FILE_HEADER_SIZE;
    use crate::io::{FileMode, OffsetMode};
    use tempfile::TempDir;

    #[test]
    fn test_sequential_allocations() {
        let base = FILE_HEADER_SIZE as u64;
        let mut allocator = SpaceAllocator::new(base);

        assert_eq!(allocator.reserve(10).unwrap(), base);
        assert_eq!(allocator.reserve(20).unwrap(), base + 10);
        assert_eq!(allocator.reserve(5).unwrap(), base + 30);
        assert_eq!(allocator.cursor(), base + 35);
    }

    #[test]
    fn test_zero_byte_allocation() {
        let mut allocator = SpaceAllocator::new(48);
        assert_eq!(allocator.reserve(0).unwrap(), 48);
        assert_eq!(allocator.reserve(0).unwrap(), 48);
    }

    #[test]
    fn test_overflow_rejected() {
        let mut allocator = SpaceAllocator::new(u64::MAX - 1);
        assert!(matches!(
            allocator.reserve(2),
            Err(E57Error::BadApiArgument(_))
        ));
        assert_eq!(allocator.cursor(), u64::MAX - 1);
    }

    #[test]
    fn test_extend_now_grows_file() {
        let dir = TempDir::new().unwrap();
        let mut file = CheckedFile::open(
            dir.path().join("alloc.e57"),
            FileMode::WriteCreate,
            ReadChecksumPolicy::ALL,
        )
        .unwrap();

        let mut allocator = SpaceAllocator::new(48);
        assert_eq!(allocator.allocate(&mut file, 100, false).unwrap(), 48);
        assert_eq!(file.length(OffsetMode::Logical), 0);

        assert_eq!(allocator.allocate(&mut file, 2000, true).unwrap(), 148);
        assert_eq!(file.length(OffsetMode::Logical), 2148);
    }
}
