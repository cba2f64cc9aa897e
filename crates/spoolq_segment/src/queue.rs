//! Persistent FIFO queue over rotating segment files.

use crate::dir::QueueDir;
use crate::error::{SegmentError, SegmentResult};
use crate::segment::Segment;
use std::fmt;
use std::path::Path;
use tracing::{debug, info, warn};

/// A crash-durable FIFO queue of opaque byte items.
///
/// Items are appended to the newest (tail) segment and consumed from the
/// oldest (head) segment. Only those two segments are held in memory;
/// segments in between stay on disk until the head reaches them.
///
/// # Durability
///
/// By default every enqueue and dequeue is synced to disk before returning.
/// In deferred-sync mode writes are only handed to the OS, and
/// [`SegmentQueue::force_sync`] makes them durable.
///
/// # Example
///
/// ```no_run
/// use spoolq_segment::SegmentQueue;
/// use std::path::Path;
///
/// let mut queue = SegmentQueue::create_or_open("jobs", Path::new("/var/lib/app"), 1024)?;
/// queue.enqueue(b"first")?;
/// assert_eq!(queue.dequeue()?, b"first");
/// queue.close()?;
/// # Ok::<(), spoolq_segment::SegmentError>(())
/// ```
pub struct SegmentQueue {
    name: String,
    items_per_segment: usize,
    deferred: bool,
    state: Option<OpenState>,
}

struct OpenState {
    dir: QueueDir,
    head: Segment,
    /// `None` while the head is also the tail.
    tail: Option<Segment>,
    /// Items held by segments strictly between head and tail.
    middle_len: usize,
    /// Segment files were created or deleted since the last directory sync.
    dir_dirty: bool,
}

impl SegmentQueue {
    /// Creates the queue `name` under `dir`, or reopens it with its
    /// persisted contents.
    ///
    /// `items_per_segment` is clamped to at least one.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be locked or created, or
    /// if a segment file is corrupted.
    pub fn create_or_open(name: &str, dir: &Path, items_per_segment: usize) -> SegmentResult<Self> {
        let items_per_segment = items_per_segment.max(1);
        let qdir = QueueDir::open(dir, name)?;
        let numbers = qdir.segment_numbers()?;

        let state = match (numbers.first(), numbers.last()) {
            (Some(&first), Some(&last)) => {
                let head = Segment::load(first, Box::new(qdir.open_segment(first)?), items_per_segment)?;
                let tail = if last == first {
                    None
                } else {
                    Some(Segment::load(last, Box::new(qdir.open_segment(last)?), items_per_segment)?)
                };

                let mut middle_len = 0;
                for &number in &numbers[1..numbers.len().saturating_sub(1)] {
                    let segment =
                        Segment::load(number, Box::new(qdir.open_segment(number)?), items_per_segment)?;
                    middle_len += segment.len();
                }

                OpenState {
                    dir: qdir,
                    head,
                    tail,
                    middle_len,
                    dir_dirty: false,
                }
            }
            _ => {
                let head = Segment::new(1, Box::new(qdir.create_segment(1)?), items_per_segment);
                qdir.sync()?;
                OpenState {
                    dir: qdir,
                    head,
                    tail: None,
                    middle_len: 0,
                    dir_dirty: false,
                }
            }
        };

        let mut queue = Self {
            name: name.to_string(),
            items_per_segment,
            deferred: false,
            state: Some(state),
        };
        queue.advance_head()?;

        info!(
            queue = %queue.name,
            size = queue.size(),
            segments = numbers.len().max(1),
            items_per_segment,
            "opened segment queue"
        );

        Ok(queue)
    }

    /// Returns the queue name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of items each segment file holds.
    #[must_use]
    pub fn items_per_segment(&self) -> usize {
        self.items_per_segment
    }

    /// Returns the queue directory, or `None` once closed.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.state.as_ref().map(|s| s.dir.path())
    }

    /// Returns the number of items in the queue. A closed queue is empty.
    #[must_use]
    pub fn size(&self) -> usize {
        self.state.as_ref().map_or(0, |s| {
            s.head.len() + s.middle_len + s.tail.as_ref().map_or(0, Segment::len)
        })
    }

    /// Returns true if the queue holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Appends an item at the tail.
    ///
    /// # Errors
    ///
    /// Returns `Closed` after [`close`](Self::close), or an I/O error.
    pub fn enqueue(&mut self, item: &[u8]) -> SegmentResult<()> {
        let sync = !self.deferred;
        let state = self.state.as_mut().ok_or(SegmentError::Closed)?;

        let tail_full = state.tail.as_ref().unwrap_or(&state.head).is_full();
        if tail_full {
            state.rotate(self.items_per_segment, sync)?;
        }

        state.tail.as_mut().unwrap_or(&mut state.head).append(item, sync)
    }

    /// Removes and returns the item at the head.
    ///
    /// # Errors
    ///
    /// Returns `Empty` if there is nothing to dequeue, `Closed` after
    /// [`close`](Self::close), or an I/O error.
    pub fn dequeue(&mut self) -> SegmentResult<Vec<u8>> {
        if self.state.is_none() {
            return Err(SegmentError::Closed);
        }
        self.advance_head()?;

        let sync = !self.deferred;
        let state = self.state.as_mut().ok_or(SegmentError::Closed)?;
        let item = state.head.remove(sync)?.ok_or(SegmentError::Empty)?;

        // The item is already consumed; a failed cleanup is retried on the
        // next dequeue.
        if let Err(e) = self.advance_head() {
            warn!(queue = %self.name, error = %e, "failed to release consumed segment");
        }

        Ok(item)
    }

    /// Returns a copy of the item at the head without removing it.
    ///
    /// # Errors
    ///
    /// Returns `Empty` if there is nothing queued, or `Closed`.
    pub fn peek(&mut self) -> SegmentResult<Vec<u8>> {
        self.advance_head()?;
        let state = self.state.as_ref().ok_or(SegmentError::Closed)?;
        state
            .head
            .front()
            .map(<[u8]>::to_vec)
            .ok_or(SegmentError::Empty)
    }

    /// Switches deferred-sync mode on or off.
    ///
    /// Turning it off first forces pending writes to disk.
    ///
    /// # Errors
    ///
    /// Returns `Closed` after close, or the error of the final sync.
    pub fn set_deferred_sync(&mut self, deferred: bool) -> SegmentResult<()> {
        if self.state.is_none() {
            return Err(SegmentError::Closed);
        }
        if self.deferred && !deferred {
            self.force_sync()?;
        }
        if self.deferred != deferred {
            debug!(queue = %self.name, deferred, "changed sync mode");
        }
        self.deferred = deferred;
        Ok(())
    }

    /// Returns true if writes are buffered until [`force_sync`](Self::force_sync).
    #[must_use]
    pub fn is_deferred_sync(&self) -> bool {
        self.deferred
    }

    /// Forces all buffered writes and segment file changes to disk.
    ///
    /// # Errors
    ///
    /// Returns `NotDeferred` outside deferred-sync mode, `Closed` after
    /// close, or an I/O error.
    pub fn force_sync(&mut self) -> SegmentResult<()> {
        let state = self.state.as_mut().ok_or(SegmentError::Closed)?;
        if !self.deferred {
            return Err(SegmentError::NotDeferred);
        }
        state.sync_all()
    }

    /// Closes the queue and releases its directory lock.
    ///
    /// In deferred-sync mode pending writes are synced first. The lock is
    /// released even if that sync fails; the sync error is returned.
    ///
    /// # Errors
    ///
    /// Returns `Closed` if already closed, or the final sync error.
    pub fn close(&mut self) -> SegmentResult<()> {
        let mut state = self.state.take().ok_or(SegmentError::Closed)?;
        let result = if self.deferred {
            state.sync_all()
        } else {
            Ok(())
        };
        drop(state);
        debug!(queue = %self.name, "closed segment queue");
        result
    }

    /// Drops consumed head segments until the head holds an item or is
    /// the only segment left.
    fn advance_head(&mut self) -> SegmentResult<()> {
        let sync = !self.deferred;
        let items_per_segment = self.items_per_segment;
        let Some(state) = self.state.as_mut() else {
            return Ok(());
        };

        while state.head.is_empty() {
            let old = state.head.number();
            let next = old + 1;

            let new_head = match state.tail.take() {
                Some(tail) if tail.number() == next => tail,
                Some(tail) => {
                    state.tail = Some(tail);
                    let segment = Segment::load(
                        next,
                        Box::new(state.dir.open_segment(next)?),
                        items_per_segment,
                    )?;
                    state.middle_len = state.middle_len.saturating_sub(segment.len());
                    segment
                }
                None if state.head.is_exhausted() => {
                    Segment::new(next, Box::new(state.dir.create_segment(next)?), items_per_segment)
                }
                None => break,
            };

            state.head = new_head;
            state.dir.remove_segment(old)?;
            state.dir_changed(sync)?;
            debug!(queue = %self.name, removed = old, head = next, "released consumed segment");
        }

        Ok(())
    }
}

impl OpenState {
    /// Starts a new tail segment after the current one.
    fn rotate(&mut self, items_per_segment: usize, sync: bool) -> SegmentResult<()> {
        let current = self.tail.as_ref().unwrap_or(&self.head).number();
        let next = current + 1;
        let segment = Segment::new(next, Box::new(self.dir.create_segment(next)?), items_per_segment);

        if let Some(mut retired) = self.tail.replace(segment) {
            // Nothing else holds a retired tail, so its buffered records
            // must reach disk now.
            retired.sync()?;
            self.middle_len += retired.len();
        }
        self.dir_changed(sync)?;

        debug!(segment = next, "rotated to new tail segment");
        Ok(())
    }

    fn dir_changed(&mut self, sync: bool) -> SegmentResult<()> {
        if sync {
            self.dir.sync()
        } else {
            self.dir_dirty = true;
            Ok(())
        }
    }

    fn sync_all(&mut self) -> SegmentResult<()> {
        self.head.sync()?;
        if let Some(tail) = self.tail.as_mut() {
            tail.sync()?;
        }
        if self.dir_dirty {
            self.dir.sync()?;
            self.dir_dirty = false;
        }
        Ok(())
    }
}

impl Drop for SegmentQueue {
    fn drop(&mut self) {
        if self.deferred {
            if let Some(state) = self.state.as_mut() {
                if let Err(e) = state.sync_all() {
                    warn!(queue = %self.name, error = %e, "sync on drop failed");
                }
            }
        }
    }
}

impl fmt::Debug for SegmentQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SegmentQueue")
            .field("name", &self.name)
            .field("items_per_segment", &self.items_per_segment)
            .field("deferred", &self.deferred)
            .field("open", &self.state.is_some())
            .field("size", &self.size())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    fn segment_files(dir: &TempDir, name: &str) -> usize {
        fs::read_dir(dir.path().join(name))
            .unwrap()
            .filter(|e| {
                e.as_ref()
                    .unwrap()
                    .path()
                    .extension()
                    .is_some_and(|ext| ext == "seg")
            })
            .count()
    }

    #[test]
    fn fifo_order_across_segments() {
        let dir = tempdir().unwrap();
        let mut queue = SegmentQueue::create_or_open("q", dir.path(), 3).unwrap();

        for i in 0..10u8 {
            queue.enqueue(&[i]).unwrap();
        }
        assert_eq!(queue.size(), 10);
        assert_eq!(segment_files(&dir, "q"), 4);

        for i in 0..10u8 {
            assert_eq!(queue.dequeue().unwrap(), vec![i]);
        }
        assert!(queue.is_empty());
        assert!(matches!(queue.dequeue(), Err(SegmentError::Empty)));
    }

    #[test]
    fn consumed_segments_are_deleted() {
        let dir = tempdir().unwrap();
        let mut queue = SegmentQueue::create_or_open("q", dir.path(), 2).unwrap();

        for i in 0..6u8 {
            queue.enqueue(&[i]).unwrap();
        }
        assert_eq!(segment_files(&dir, "q"), 3);

        queue.dequeue().unwrap();
        queue.dequeue().unwrap();
        assert_eq!(segment_files(&dir, "q"), 2);

        for _ in 0..4 {
            queue.dequeue().unwrap();
        }
        assert_eq!(segment_files(&dir, "q"), 1);
    }

    #[test]
    fn reopen_restores_contents() {
        let dir = tempdir().unwrap();
        {
            let mut queue = SegmentQueue::create_or_open("q", dir.path(), 4).unwrap();
            for i in 0..11u8 {
                queue.enqueue(&[i]).unwrap();
            }
            for _ in 0..3 {
                queue.dequeue().unwrap();
            }
            queue.close().unwrap();
        }

        let mut queue = SegmentQueue::create_or_open("q", dir.path(), 4).unwrap();
        assert_eq!(queue.size(), 8);
        for i in 3..11u8 {
            assert_eq!(queue.dequeue().unwrap(), vec![i]);
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn reopen_with_different_segment_size_counts_exactly() {
        let dir = tempdir().unwrap();
        {
            let mut queue = SegmentQueue::create_or_open("q", dir.path(), 2).unwrap();
            for i in 0..7u8 {
                queue.enqueue(&[i]).unwrap();
            }
        }

        let mut queue = SegmentQueue::create_or_open("q", dir.path(), 5).unwrap();
        assert_eq!(queue.size(), 7);
        for i in 7..12u8 {
            queue.enqueue(&[i]).unwrap();
        }
        for i in 0..12u8 {
            assert_eq!(queue.dequeue().unwrap(), vec![i]);
        }
    }

    #[test]
    fn peek_does_not_consume() {
        let dir = tempdir().unwrap();
        let mut queue = SegmentQueue::create_or_open("q", dir.path(), 1).unwrap();
        assert!(matches!(queue.peek(), Err(SegmentError::Empty)));

        queue.enqueue(b"a").unwrap();
        queue.enqueue(b"b").unwrap();
        assert_eq!(queue.peek().unwrap(), b"a");
        assert_eq!(queue.size(), 2);
        assert_eq!(queue.dequeue().unwrap(), b"a");
        assert_eq!(queue.peek().unwrap(), b"b");
    }

    #[test]
    fn second_handle_is_locked_until_close() {
        let dir = tempdir().unwrap();
        let mut first = SegmentQueue::create_or_open("q", dir.path(), 4).unwrap();

        let second = SegmentQueue::create_or_open("q", dir.path(), 4);
        assert!(matches!(second, Err(SegmentError::Locked)));

        first.close().unwrap();
        assert!(SegmentQueue::create_or_open("q", dir.path(), 4).is_ok());
    }

    #[test]
    fn closed_queue_rejects_operations() {
        let dir = tempdir().unwrap();
        let mut queue = SegmentQueue::create_or_open("q", dir.path(), 4).unwrap();
        queue.enqueue(b"x").unwrap();
        queue.close().unwrap();

        assert_eq!(queue.size(), 0);
        assert!(queue.path().is_none());
        assert!(matches!(queue.enqueue(b"y"), Err(SegmentError::Closed)));
        assert!(matches!(queue.dequeue(), Err(SegmentError::Closed)));
        assert!(matches!(queue.close(), Err(SegmentError::Closed)));
        assert!(matches!(queue.set_deferred_sync(true), Err(SegmentError::Closed)));
    }

    #[test]
    fn force_sync_requires_deferred_mode() {
        let dir = tempdir().unwrap();
        let mut queue = SegmentQueue::create_or_open("q", dir.path(), 4).unwrap();
        assert!(!queue.is_deferred_sync());
        assert!(matches!(queue.force_sync(), Err(SegmentError::NotDeferred)));

        queue.set_deferred_sync(true).unwrap();
        assert!(queue.is_deferred_sync());
        queue.enqueue(b"buffered").unwrap();
        queue.force_sync().unwrap();

        queue.set_deferred_sync(false).unwrap();
        assert!(!queue.is_deferred_sync());
    }

    #[test]
    fn deferred_writes_survive_close_and_reopen() {
        let dir = tempdir().unwrap();
        {
            let mut queue = SegmentQueue::create_or_open("q", dir.path(), 3).unwrap();
            queue.set_deferred_sync(true).unwrap();
            for i in 0..8u8 {
                queue.enqueue(&[i]).unwrap();
            }
            queue.dequeue().unwrap();
            queue.close().unwrap();
        }

        let mut queue = SegmentQueue::create_or_open("q", dir.path(), 3).unwrap();
        assert!(!queue.is_deferred_sync());
        assert_eq!(queue.size(), 7);
        assert_eq!(queue.dequeue().unwrap(), vec![1]);
    }

    #[test]
    fn torn_tail_is_recovered() {
        let dir = tempdir().unwrap();
        {
            let mut queue = SegmentQueue::create_or_open("q", dir.path(), 10).unwrap();
            queue.enqueue(b"complete").unwrap();
            queue.close().unwrap();
        }

        let segment = dir.path().join("q").join("0000000000001.seg");
        let mut bytes = fs::read(&segment).unwrap();
        bytes.extend_from_slice(&[42, 0, 0, 0, 1, b'p']);
        fs::write(&segment, bytes).unwrap();

        let mut queue = SegmentQueue::create_or_open("q", dir.path(), 10).unwrap();
        assert_eq!(queue.size(), 1);
        queue.enqueue(b"after").unwrap();
        assert_eq!(queue.dequeue().unwrap(), b"complete");
        assert_eq!(queue.dequeue().unwrap(), b"after");
    }

    #[test]
    fn exhausted_single_segment_is_replaced() {
        let dir = tempdir().unwrap();
        let mut queue = SegmentQueue::create_or_open("q", dir.path(), 1).unwrap();

        queue.enqueue(b"only").unwrap();
        queue.dequeue().unwrap();

        assert_eq!(segment_files(&dir, "q"), 1);
        assert!(!dir.path().join("q").join("0000000000001.seg").exists());
        assert!(dir.path().join("q").join("0000000000002.seg").exists());
    }
}
