//! Error types for spoolq core.

use spoolq_segment::SegmentError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for queue operations.
pub type QueueResult<T> = Result<T, QueueError>;

/// Errors returned by ordered queues and storages.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The storage was used before `open` or after `close`.
    #[error("queue is not opened")]
    NotOpen,

    /// `dequeue` found nothing to return.
    #[error("queue is empty")]
    EmptyQueue,

    /// The open path has no final component to use as the queue name.
    #[error("invalid queue path: {}", .0.display())]
    InvalidPath(PathBuf),

    /// An item could not be encoded or decoded.
    #[error("codec error: {message}")]
    Codec {
        /// Description of the failure.
        message: String,
    },

    /// An I/O error occurred outside the segment engine.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Error from the segment engine, passed through unchanged.
    #[error("segment error: {0}")]
    Segment(SegmentError),
}

impl QueueError {
    /// Creates a codec error.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /// Returns true for [`QueueError::EmptyQueue`].
    #[must_use]
    pub fn is_empty_queue(&self) -> bool {
        matches!(self, Self::EmptyQueue)
    }
}

impl From<SegmentError> for QueueError {
    fn from(err: SegmentError) -> Self {
        match err {
            SegmentError::Empty => Self::EmptyQueue,
            other => Self::Segment(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_empty_maps_to_empty_queue() {
        let err: QueueError = SegmentError::Empty.into();
        assert!(err.is_empty_queue());
    }

    #[test]
    fn other_engine_errors_pass_through() {
        let err: QueueError = SegmentError::Locked.into();
        assert!(matches!(err, QueueError::Segment(SegmentError::Locked)));
        assert_eq!(
            err.to_string(),
            "segment error: queue locked: another handle has exclusive access"
        );
    }

    #[test]
    fn io_errors_convert() {
        let err: QueueError = io::Error::new(io::ErrorKind::Other, "thread spawn refused").into();
        assert!(matches!(err, QueueError::Io(_)));
        assert!(!err.is_empty_queue());
        assert_eq!(err.to_string(), "I/O error: thread spawn refused");
    }
}
