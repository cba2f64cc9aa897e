//! Byte backend trait definition.

use crate::error::SegmentResult;

/// A low-level byte store that a single segment is written through.
///
/// Backends are **opaque byte stores**. They know nothing about records,
/// removal markers or segment numbering - [`crate::Segment`] owns all format
/// interpretation.
///
/// # Invariants
///
/// - `append` returns the offset where data was written
/// - `read_at` returns exactly the bytes previously written at that offset
/// - `sync` makes all appended data durable
/// - Backends must be `Send + Sync` so a queue can move between threads
///
/// # Implementors
///
/// - [`super::InMemoryBackend`] - For testing
/// - [`super::FileBackend`] - For segment files on disk
pub trait StorageBackend: Send + Sync {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the read would extend beyond the current size
    /// or an I/O error occurs.
    fn read_at(&self, offset: u64, len: usize) -> SegmentResult<Vec<u8>>;

    /// Appends data to the end of the storage.
    ///
    /// Returns the offset where the data was written.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn append(&mut self, data: &[u8]) -> SegmentResult<u64>;

    /// Returns the current size of the storage in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn size(&self) -> SegmentResult<u64>;

    /// Forces all appended data to stable storage.
    ///
    /// After this returns successfully, previously appended data survives
    /// process termination and power loss.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync operation fails.
    fn sync(&mut self) -> SegmentResult<()>;

    /// Truncates the storage to `new_size` bytes.
    ///
    /// Used by recovery to cut off a torn tail record.
    ///
    /// # Errors
    ///
    /// Returns an error if `new_size` is greater than the current size or
    /// the truncation fails.
    fn truncate(&mut self, new_size: u64) -> SegmentResult<()>;
}
