//! Error types for segment operations.

use std::io;
use thiserror::Error;

/// Result type for segment operations.
pub type SegmentResult<T> = Result<T, SegmentError>;

/// Errors that can occur while reading or writing segments.
#[derive(Debug, Error)]
pub enum SegmentError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Attempted to read beyond the end of a backend.
    #[error("read beyond end of storage: offset {offset}, len {len}, size {size}")]
    ReadPastEnd {
        /// The requested read offset.
        offset: u64,
        /// The requested read length.
        len: usize,
        /// The current storage size.
        size: u64,
    },

    /// A segment file is corrupted beyond tail recovery.
    #[error("segment corrupted: {0}")]
    Corrupted(String),

    /// The queue has been closed.
    #[error("queue is closed")]
    Closed,

    /// The queue holds no items.
    #[error("queue is empty")]
    Empty,

    /// `force_sync` was called outside deferred-sync mode.
    #[error("force_sync is only valid in deferred-sync mode")]
    NotDeferred,

    /// Another handle holds the queue directory lock.
    #[error("queue locked: another handle has exclusive access")]
    Locked,

    /// The queue name is not a single path component.
    #[error("invalid queue name: {0:?}")]
    InvalidName(String),
}

impl SegmentError {
    /// Create a corruption error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted(message.into())
    }
}
