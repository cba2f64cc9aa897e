//! Disk-backed ordered storage.

use crate::codec::ItemCodec;
use crate::config::{items_per_segment, Config};
use crate::error::{QueueError, QueueResult};
use crate::ordered::{DeferredStorage, Ordered, OrderedStorage};
use parking_lot::Mutex;
use spoolq_segment::SegmentQueue;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A persistent FIFO queue of typed items.
///
/// Items are encoded with the supplied [`ItemCodec`] and stored by a
/// [`SegmentQueue`] under `<parent>/<name>/`, where `<name>` is the final
/// component of the path passed to [`OrderedStorage::open`].
///
/// Every write is synced before it returns unless deferred-sync mode is
/// switched on, in which case [`OrderedStorage::sync`] makes buffered
/// writes durable.
///
/// # Example
///
/// ```rust
/// use spoolq_core::{CborCodec, DiskOrderedStorage, Ordered, OrderedStorage};
///
/// let dir = tempfile::tempdir().unwrap();
/// let storage = DiskOrderedStorage::new(CborCodec::<u64>::new(), Some(32 * 1024)).unwrap();
///
/// storage.open(&dir.path().join("jobs")).unwrap();
/// storage.enqueue(42).unwrap();
/// assert_eq!(storage.dequeue().unwrap(), 42);
/// storage.close().unwrap();
/// ```
pub struct DiskOrderedStorage<T> {
    codec: Box<dyn ItemCodec<T>>,
    items_per_segment: usize,
    queue: Mutex<Option<SegmentQueue>>,
}

impl<T> DiskOrderedStorage<T> {
    /// Creates an unopened storage.
    ///
    /// With a RAM budget each segment holds
    /// `max(1, ram_limit / size_of::<T>() / 2)` items; without one it
    /// holds a single item.
    ///
    /// # Errors
    ///
    /// Construction itself cannot fail today; the `Result` keeps the
    /// signature stable for validating configurations.
    pub fn new<C>(codec: C, ram_limit: Option<usize>) -> QueueResult<Self>
    where
        C: ItemCodec<T> + 'static,
    {
        Ok(Self::with_segment_size(codec, items_per_segment::<T>(ram_limit)))
    }

    /// Creates an unopened storage sized by `config`.
    ///
    /// # Errors
    ///
    /// Same as [`DiskOrderedStorage::new`].
    pub fn with_config<C>(codec: C, config: &Config) -> QueueResult<Self>
    where
        C: ItemCodec<T> + 'static,
    {
        Ok(Self::with_segment_size(codec, config.segment_size_for::<T>()))
    }

    fn with_segment_size<C>(codec: C, items_per_segment: usize) -> Self
    where
        C: ItemCodec<T> + 'static,
    {
        Self {
            codec: Box::new(codec),
            items_per_segment: items_per_segment.max(1),
            queue: Mutex::new(None),
        }
    }

    /// Returns the number of items stored per segment file.
    #[must_use]
    pub fn items_per_segment(&self) -> usize {
        self.items_per_segment
    }

    /// Returns true while the storage is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.queue.lock().is_some()
    }

    /// Returns the queue directory while open.
    #[must_use]
    pub fn location(&self) -> Option<PathBuf> {
        self.queue
            .lock()
            .as_ref()
            .and_then(|queue| queue.path().map(Path::to_path_buf))
    }

    /// Returns true if writes are buffered until the next sync.
    #[must_use]
    pub fn is_deferred_sync(&self) -> bool {
        self.queue
            .lock()
            .as_ref()
            .is_some_and(SegmentQueue::is_deferred_sync)
    }

    /// Returns a copy of the head item without removing it.
    ///
    /// # Errors
    ///
    /// Returns `NotOpen`, `EmptyQueue`, or a codec error.
    pub fn peek(&self) -> QueueResult<T> {
        let bytes = self.with_queue(|queue| Ok(queue.peek()?))?;
        self.codec.decode(&bytes)
    }

    fn with_queue<R>(
        &self,
        f: impl FnOnce(&mut SegmentQueue) -> QueueResult<R>,
    ) -> QueueResult<R> {
        let mut guard = self.queue.lock();
        let queue = guard.as_mut().ok_or(QueueError::NotOpen)?;
        f(queue)
    }
}

/// Splits `path` into the directory holding the queue and its name.
fn split_location(path: &Path) -> QueueResult<(PathBuf, String)> {
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| QueueError::InvalidPath(path.to_path_buf()))?;

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    Ok((parent, name.to_string()))
}

impl<T: Send> Ordered<T> for DiskOrderedStorage<T> {
    fn enqueue(&self, item: T) -> QueueResult<()> {
        let bytes = self.codec.encode(&item)?;
        self.with_queue(|queue| Ok(queue.enqueue(&bytes)?))
    }

    /// Removes the head item and decodes it.
    ///
    /// The item is consumed even if decoding fails, so one undecodable
    /// record cannot block the queue.
    fn dequeue(&self) -> QueueResult<T> {
        let bytes = self.with_queue(|queue| Ok(queue.dequeue()?))?;
        self.codec.decode(&bytes)
    }

    fn len(&self) -> usize {
        self.queue.lock().as_ref().map_or(0, SegmentQueue::size)
    }
}

impl<T: Send> OrderedStorage<T> for DiskOrderedStorage<T> {
    fn open(&self, path: &Path) -> QueueResult<()> {
        let mut guard = self.queue.lock();
        if guard.is_some() {
            return Ok(());
        }

        let (parent, name) = split_location(path)?;
        let queue = SegmentQueue::create_or_open(&name, &parent, self.items_per_segment)?;
        debug!(
            path = %path.display(),
            size = queue.size(),
            items_per_segment = self.items_per_segment,
            "opened disk storage"
        );
        *guard = Some(queue);
        Ok(())
    }

    fn sync(&self) -> QueueResult<()> {
        self.with_queue(|queue| {
            if queue.is_deferred_sync() {
                queue.force_sync()?;
            }
            Ok(())
        })
    }

    fn close(&self) -> QueueResult<()> {
        let mut queue = self.queue.lock().take().ok_or(QueueError::NotOpen)?;
        if let Err(err) = queue.close() {
            warn!(queue = queue.name(), error = %err, "sync on close failed");
        }
        debug!(queue = queue.name(), "closed disk storage");
        Ok(())
    }
}

impl<T: Send> DeferredStorage<T> for DiskOrderedStorage<T> {
    fn set_deferred_sync(&self, deferred: bool) -> QueueResult<()> {
        self.with_queue(|queue| Ok(queue.set_deferred_sync(deferred)?))
    }
}

impl<T> fmt::Debug for DiskOrderedStorage<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiskOrderedStorage")
            .field("items_per_segment", &self.items_per_segment)
            .field("queue", &*self.queue.lock())
            .finish_non_exhaustive()
    }
}
