//! # spoolq Segment
//!
//! Persistent segment engine for spoolq.
//!
//! This crate stores a FIFO queue of **opaque byte items** in a directory of
//! rotating segment files. It knows nothing about item types - the typed
//! facade in `spoolq_core` owns encoding.
//!
//! ## Layers
//!
//! - [`StorageBackend`] - byte store a segment is written through
//!   ([`FileBackend`] on disk, [`InMemoryBackend`] for tests)
//! - [`Record`] - length-prefixed, checksummed item and removal records
//! - [`Segment`] - one numbered file holding up to `items_per_segment` items
//! - [`QueueDir`] - directory layout and exclusive lock
//! - [`SegmentQueue`] - the queue: rotation, consumption, recovery and
//!   deferred-sync mode
//!
//! ## Example
//!
//! ```rust
//! use spoolq_segment::SegmentQueue;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let mut queue = SegmentQueue::create_or_open("events", dir.path(), 128).unwrap();
//! queue.enqueue(b"hello").unwrap();
//! assert_eq!(queue.size(), 1);
//! assert_eq!(queue.dequeue().unwrap(), b"hello");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod dir;
mod error;
mod file;
mod memory;
mod queue;
mod record;
mod segment;

pub use backend::StorageBackend;
pub use dir::QueueDir;
pub use error::{SegmentError, SegmentResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
pub use queue::SegmentQueue;
pub use record::{ReadOutcome, Record, RecordKind, CRC_SIZE, HEADER_SIZE};
pub use segment::Segment;
