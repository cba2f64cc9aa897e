//! In-memory byte backend for testing.

use crate::backend::StorageBackend;
use crate::error::{SegmentError, SegmentResult};
use std::io;

/// An in-memory byte backend.
///
/// Lets segment parsing and recovery be exercised without touching the
/// filesystem, including starting from hand-crafted (torn or corrupt)
/// contents via [`InMemoryBackend::with_data`].
///
/// # Example
///
/// ```rust
/// use spoolq_segment::{InMemoryBackend, StorageBackend};
///
/// let mut backend = InMemoryBackend::new();
/// let offset = backend.append(b"test data").unwrap();
/// assert_eq!(offset, 0);
/// assert_eq!(backend.size().unwrap(), 9);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    data: Vec<u8>,
    syncs: usize,
}

impl InMemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend with pre-existing contents.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        Self { data, syncs: 0 }
    }

    /// Returns a copy of all data in the backend.
    #[must_use]
    pub fn data(&self) -> Vec<u8> {
        self.data.clone()
    }

    /// Number of `sync` calls seen so far.
    #[must_use]
    pub fn sync_count(&self) -> usize {
        self.syncs
    }
}

impl StorageBackend for InMemoryBackend {
    fn read_at(&self, offset: u64, len: usize) -> SegmentResult<Vec<u8>> {
        let size = self.data.len() as u64;
        let start = offset as usize;
        let end = start.saturating_add(len);

        if offset > size || end > self.data.len() {
            return Err(SegmentError::ReadPastEnd { offset, len, size });
        }

        Ok(self.data[start..end].to_vec())
    }

    fn append(&mut self, new_data: &[u8]) -> SegmentResult<u64> {
        let offset = self.data.len() as u64;
        self.data.extend_from_slice(new_data);
        Ok(offset)
    }

    fn size(&self) -> SegmentResult<u64> {
        Ok(self.data.len() as u64)
    }

    fn sync(&mut self) -> SegmentResult<()> {
        self.syncs += 1;
        Ok(())
    }

    fn truncate(&mut self, new_size: u64) -> SegmentResult<()> {
        let current_size = self.data.len() as u64;
        if new_size > current_size {
            return Err(SegmentError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "cannot truncate to size {new_size} which is greater than current size {current_size}"
                ),
            )));
        }

        self.data.truncate(new_size as usize);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_append_returns_offsets() {
        let mut backend = InMemoryBackend::new();
        assert_eq!(backend.append(b"hello").unwrap(), 0);
        assert_eq!(backend.append(b" world").unwrap(), 5);
        assert_eq!(backend.size().unwrap(), 11);
        assert_eq!(backend.read_at(6, 5).unwrap(), b"world");
    }

    #[test]
    fn memory_read_past_end_fails() {
        let backend = InMemoryBackend::with_data(b"hello".to_vec());
        let result = backend.read_at(3, 10);
        assert!(matches!(result, Err(SegmentError::ReadPastEnd { .. })));
    }

    #[test]
    fn memory_counts_syncs() {
        let mut backend = InMemoryBackend::new();
        backend.sync().unwrap();
        backend.sync().unwrap();
        assert_eq!(backend.sync_count(), 2);
    }

    #[test]
    fn memory_truncate() {
        let mut backend = InMemoryBackend::with_data(b"hello world".to_vec());
        backend.truncate(5).unwrap();
        assert_eq!(backend.data(), b"hello");
        assert!(backend.truncate(100).is_err());
    }
}
