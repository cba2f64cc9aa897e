//! Capability traits shared by every queue implementation.

use crate::error::QueueResult;
use std::path::Path;

/// A FIFO sequence of items.
///
/// Implemented by [`crate::MemoryQueue`], [`crate::DiskOrderedStorage`] and
/// [`crate::FastDiskOrderedStorage`], so tests and callers can use them
/// interchangeably.
///
/// All methods take `&self`; implementations synchronize internally and
/// must be `Send + Sync`.
pub trait Ordered<T>: Send + Sync {
    /// Appends an item at the tail.
    ///
    /// # Errors
    ///
    /// Returns an error if the item cannot be stored.
    fn enqueue(&self, item: T) -> QueueResult<()>;

    /// Removes and returns the item at the head.
    ///
    /// # Errors
    ///
    /// Returns [`crate::QueueError::EmptyQueue`] when nothing is queued.
    fn dequeue(&self) -> QueueResult<T>;

    /// Returns the number of queued items.
    fn len(&self) -> usize;

    /// Returns true if no items are queued.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An [`Ordered`] queue persisted at a filesystem path.
///
/// # Lifecycle
///
/// `unopened → open → closed`. `open` on an open storage is a no-op.
/// Every other operation on an unopened or closed storage fails with
/// [`crate::QueueError::NotOpen`].
pub trait OrderedStorage<T>: Ordered<T> {
    /// Opens (creating if needed) the queue stored at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be created or recovered.
    fn open(&self, path: &Path) -> QueueResult<()>;

    /// Makes all completed writes durable.
    ///
    /// # Errors
    ///
    /// Returns `NotOpen` or the engine's sync error.
    fn sync(&self) -> QueueResult<()>;

    /// Releases the underlying resources.
    ///
    /// # Errors
    ///
    /// Returns `NotOpen` if the storage is not open.
    fn close(&self) -> QueueResult<()>;

    /// Alias of [`OrderedStorage::sync`].
    ///
    /// # Errors
    ///
    /// Same as `sync`.
    fn flush(&self) -> QueueResult<()> {
        self.sync()
    }
}

/// An [`OrderedStorage`] whose per-write durability can be switched off.
///
/// In deferred-sync mode writes are buffered and only made durable by
/// [`OrderedStorage::sync`]. This is the seam
/// [`crate::FastDiskOrderedStorage`] composes over.
pub trait DeferredStorage<T>: OrderedStorage<T> {
    /// Turns deferred-sync mode on or off.
    ///
    /// # Errors
    ///
    /// Returns `NotOpen`, or the sync error when switching it off.
    fn set_deferred_sync(&self, deferred: bool) -> QueueResult<()>;
}
