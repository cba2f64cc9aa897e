//! # spoolq Core
//!
//! Persistent, strictly ordered FIFO queues of typed items.
//!
//! This crate provides:
//! - [`Ordered`], [`OrderedStorage`] and [`DeferredStorage`] - the contracts
//!   every queue satisfies
//! - [`MemoryQueue`] - non-persistent reference queue
//! - [`DiskOrderedStorage`] - every write synced before it returns
//! - [`FastDiskOrderedStorage`] - writes buffered and flushed by a
//!   background worker at a fixed interval
//!
//! Items are persisted as bytes by `spoolq_segment`; an [`ItemCodec`]
//! supplied at construction turns them back into `T`.
//!
//! ## Example
//!
//! ```rust
//! use spoolq_core::{CborCodec, Config, DiskOrderedStorage, FastDiskOrderedStorage};
//! use spoolq_core::{Ordered, OrderedStorage};
//! use std::time::Duration;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let config = Config::new()
//!     .ram_limit(32 * 1024)
//!     .flush_interval(Duration::from_millis(10));
//!
//! let disk = DiskOrderedStorage::with_config(CborCodec::<u32>::new(), &config).unwrap();
//! let queue = FastDiskOrderedStorage::with_config(disk, &config);
//!
//! queue.open(&dir.path().join("work")).unwrap();
//! queue.enqueue(1).unwrap();
//! queue.enqueue(2).unwrap();
//! assert_eq!(queue.dequeue().unwrap(), 1);
//! queue.close().unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod codec;
mod config;
mod disk;
mod error;
mod fast;
mod flush;
mod memory;
mod ordered;

pub use codec::{CborCodec, FnCodec, ItemCodec};
pub use config::{items_per_segment, Config, DEFAULT_FLUSH_INTERVAL};
pub use disk::DiskOrderedStorage;
pub use error::{QueueError, QueueResult};
pub use fast::FastDiskOrderedStorage;
pub use memory::MemoryQueue;
pub use ordered::{DeferredStorage, Ordered, OrderedStorage};
