//! Latency-optimized batching storage.

use crate::config::{Config, DEFAULT_FLUSH_INTERVAL};
use crate::disk::DiskOrderedStorage;
use crate::error::QueueResult;
use crate::flush::FlushWorker;
use crate::ordered::{DeferredStorage, Ordered, OrderedStorage};
use parking_lot::Mutex;
use std::fmt;
use std::marker::PhantomData;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// A storage that trades per-write durability for latency.
///
/// The inner storage runs in deferred-sync mode. Writes return as soon as
/// the inner storage has accepted them, and a background worker syncs at a
/// fixed interval whenever writes are pending. Items written since the last
/// successful flush may be lost if the process or machine dies.
///
/// If a background flush fails the worker stops for good and pending
/// writes stay marked; [`OrderedStorage::sync`] can still be called
/// explicitly.
///
/// # Example
///
/// ```rust
/// use spoolq_core::{CborCodec, DiskOrderedStorage, FastDiskOrderedStorage, Ordered, OrderedStorage};
/// use std::time::Duration;
///
/// let dir = tempfile::tempdir().unwrap();
/// let disk = DiskOrderedStorage::new(CborCodec::<String>::new(), Some(64 * 1024)).unwrap();
/// let storage = FastDiskOrderedStorage::new(disk, Some(Duration::from_millis(5)));
///
/// storage.open(&dir.path().join("events")).unwrap();
/// storage.enqueue("hello".to_string()).unwrap();
/// assert!(storage.has_pending_writes());
///
/// storage.sync().unwrap();
/// assert!(!storage.has_pending_writes());
/// storage.close().unwrap();
/// ```
pub struct FastDiskOrderedStorage<T, S = DiskOrderedStorage<T>> {
    shared: Arc<Shared<S>>,
    flush_interval: Duration,
    _marker: PhantomData<fn(T) -> T>,
}

struct Shared<S> {
    inner: S,
    pending: Mutex<Pending>,
    worker: FlushWorker,
}

/// Writes not yet covered by a successful sync.
#[derive(Debug, Default)]
struct Pending {
    dirty: bool,
    /// Counts writes so a sync only clears the ones it started after.
    writes: u64,
}

impl<S> Shared<S> {
    fn mark_pending(&self) {
        let mut pending = self.pending.lock();
        pending.dirty = true;
        pending.writes = pending.writes.wrapping_add(1);
    }

    fn sync<T>(&self) -> QueueResult<()>
    where
        S: OrderedStorage<T>,
    {
        let seen = self.pending.lock().writes;
        self.inner.sync()?;

        let mut pending = self.pending.lock();
        if pending.writes == seen {
            pending.dirty = false;
        }
        Ok(())
    }

    fn flush_if_pending<T>(&self) -> QueueResult<()>
    where
        S: OrderedStorage<T>,
    {
        if self.pending.lock().dirty {
            self.sync::<T>()?;
        }
        Ok(())
    }
}

impl<T, S> FastDiskOrderedStorage<T, S>
where
    S: DeferredStorage<T>,
{
    /// Wraps `inner`, flushing every `flush_interval` (10 ms by default).
    pub fn new(inner: S, flush_interval: Option<Duration>) -> Self {
        Self {
            shared: Arc::new(Shared {
                inner,
                pending: Mutex::new(Pending::default()),
                worker: FlushWorker::new(),
            }),
            flush_interval: flush_interval.unwrap_or(DEFAULT_FLUSH_INTERVAL),
            _marker: PhantomData,
        }
    }

    /// Wraps `inner` using the flush interval from `config`.
    pub fn with_config(inner: S, config: &Config) -> Self {
        Self::new(inner, Some(config.flush_interval))
    }

    /// Returns true if a write happened since the last successful sync.
    #[must_use]
    pub fn has_pending_writes(&self) -> bool {
        self.shared.pending.lock().dirty
    }

    /// Returns true while the background flush worker is running.
    #[must_use]
    pub fn is_flush_worker_active(&self) -> bool {
        self.shared.worker.is_active()
    }

    /// Returns the background flush interval.
    #[must_use]
    pub fn flush_interval(&self) -> Duration {
        self.flush_interval
    }

    /// Returns the wrapped storage.
    #[must_use]
    pub fn inner(&self) -> &S {
        &self.shared.inner
    }
}

impl<T, S> Ordered<T> for FastDiskOrderedStorage<T, S>
where
    S: DeferredStorage<T>,
{
    fn enqueue(&self, item: T) -> QueueResult<()> {
        self.shared.inner.enqueue(item)?;
        self.shared.mark_pending();
        Ok(())
    }

    fn dequeue(&self) -> QueueResult<T> {
        let item = self.shared.inner.dequeue()?;
        self.shared.mark_pending();
        Ok(item)
    }

    fn len(&self) -> usize {
        self.shared.inner.len()
    }
}

impl<T, S> OrderedStorage<T> for FastDiskOrderedStorage<T, S>
where
    T: 'static,
    S: DeferredStorage<T> + 'static,
{
    fn open(&self, path: &Path) -> QueueResult<()> {
        self.shared.inner.open(path)?;
        self.shared.inner.set_deferred_sync(true)?;

        let shared = Arc::clone(&self.shared);
        self.shared
            .worker
            .start(self.flush_interval, move || shared.flush_if_pending::<T>())?;
        debug!(path = %path.display(), "opened batching storage");
        Ok(())
    }

    fn sync(&self) -> QueueResult<()> {
        self.shared.sync::<T>()
    }

    fn close(&self) -> QueueResult<()> {
        self.shared.worker.shutdown();
        self.shared.inner.close()?;
        *self.shared.pending.lock() = Pending::default();
        debug!("closed batching storage");
        Ok(())
    }
}

impl<T, S> Drop for FastDiskOrderedStorage<T, S> {
    fn drop(&mut self) {
        self.shared.worker.shutdown();
    }
}

impl<T, S: fmt::Debug> fmt::Debug for FastDiskOrderedStorage<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FastDiskOrderedStorage")
            .field("inner", &self.shared.inner)
            .field("pending", &*self.shared.pending.lock())
            .field("worker", &self.shared.worker)
            .field("flush_interval", &self.flush_interval)
            .finish()
    }
}
