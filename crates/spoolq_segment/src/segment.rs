//! A single numbered segment of a queue.

use crate::backend::StorageBackend;
use crate::error::{SegmentError, SegmentResult};
use crate::record::{ReadOutcome, Record};
use std::collections::VecDeque;
use std::fmt;
use tracing::warn;

/// A bounded run of queue items stored in one backend.
///
/// The segment keeps its live items in memory and mirrors every change to
/// the backend as an appended record: item records on enqueue, removal
/// markers on dequeue. Replaying the records in order rebuilds the live
/// items after a restart.
///
/// A segment is *full* once `capacity` items have been appended to it, and
/// *exhausted* once it is full and every item has been removed. Exhausted
/// segments are deleted by the queue.
pub struct Segment {
    number: u64,
    backend: Box<dyn StorageBackend>,
    items: VecDeque<Vec<u8>>,
    written: usize,
    capacity: usize,
    dirty: bool,
    /// A failed write could not be rolled back; the backend no longer
    /// matches `items`.
    poisoned: bool,
}

impl Segment {
    /// Creates a segment over an empty backend.
    ///
    /// `capacity` is clamped to at least one item.
    pub fn new(number: u64, backend: Box<dyn StorageBackend>, capacity: usize) -> Self {
        Self {
            number,
            backend,
            items: VecDeque::new(),
            written: 0,
            capacity: capacity.max(1),
            dirty: false,
            poisoned: false,
        }
    }

    /// Rebuilds a segment by replaying the records in `backend`.
    ///
    /// A torn record at the tail (an interrupted append) is cut off.
    ///
    /// # Errors
    ///
    /// Returns `Corrupted` if a record in the middle is invalid or a removal
    /// marker has no item left to remove.
    pub fn load(
        number: u64,
        mut backend: Box<dyn StorageBackend>,
        capacity: usize,
    ) -> SegmentResult<Self> {
        let mut items = VecDeque::new();
        let mut written = 0;
        let mut offset = 0u64;

        loop {
            match Record::read_at(backend.as_ref(), offset)? {
                ReadOutcome::Record(Record::Item(payload), next) => {
                    items.push_back(payload);
                    written += 1;
                    offset = next;
                }
                ReadOutcome::Record(Record::Removal, next) => {
                    if items.pop_front().is_none() {
                        return Err(SegmentError::corrupted(format!(
                            "segment {number}: removal marker without item at offset {offset}"
                        )));
                    }
                    offset = next;
                }
                ReadOutcome::Torn => {
                    warn!(
                        segment = number,
                        offset,
                        size = backend.size()?,
                        "truncating torn segment tail"
                    );
                    backend.truncate(offset)?;
                    break;
                }
                ReadOutcome::End => break,
            }
        }

        Ok(Self {
            number,
            backend,
            items,
            written,
            capacity: capacity.max(1),
            dirty: false,
            poisoned: false,
        })
    }

    /// Returns the segment number.
    #[must_use]
    pub fn number(&self) -> u64 {
        self.number
    }

    /// Returns the number of live items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if the segment holds no live items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns true if no more items may be appended.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.written >= self.capacity
    }

    /// Returns true if the segment is full and fully consumed.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.is_full() && self.items.is_empty()
    }

    /// Returns the oldest live item without removing it.
    #[must_use]
    pub fn front(&self) -> Option<&[u8]> {
        self.items.front().map(Vec::as_slice)
    }

    /// Appends an item, syncing the backend when `sync` is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the segment is full or the write fails.
    pub fn append(&mut self, payload: &[u8], sync: bool) -> SegmentResult<()> {
        if self.is_full() {
            return Err(SegmentError::corrupted(format!(
                "segment {} is full ({} items)",
                self.number, self.capacity
            )));
        }

        let record = Record::Item(payload.to_vec()).encode()?;
        self.write(&record, sync)?;
        self.items.push_back(payload.to_vec());
        self.written += 1;
        Ok(())
    }

    /// Removes and returns the oldest live item.
    ///
    /// Returns `None` if the segment is empty. The removal marker is
    /// written before the item is dropped from memory, and a failed write
    /// is rolled back, so an error leaves the segment unchanged on disk and
    /// in memory.
    ///
    /// # Errors
    ///
    /// Returns an error if writing the removal marker fails.
    pub fn remove(&mut self, sync: bool) -> SegmentResult<Option<Vec<u8>>> {
        if self.items.is_empty() {
            return Ok(None);
        }

        let marker = Record::Removal.encode()?;
        self.write(&marker, sync)?;
        Ok(self.items.pop_front())
    }

    /// Forces buffered records to stable storage if any are pending.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend sync fails.
    pub fn sync(&mut self) -> SegmentResult<()> {
        if self.dirty {
            self.backend.sync()?;
            self.dirty = false;
        }
        Ok(())
    }

    /// Appends one record. On failure the backend is cut back to its
    /// previous size, so the record never replays on the next load.
    fn write(&mut self, bytes: &[u8], sync: bool) -> SegmentResult<()> {
        if self.poisoned {
            return Err(SegmentError::corrupted(format!(
                "segment {} is unusable after a failed rollback",
                self.number
            )));
        }

        let start = self.backend.size()?;
        let result = self.backend.append(bytes).and_then(|_| {
            if sync {
                self.backend.sync()
            } else {
                Ok(())
            }
        });

        match result {
            Ok(()) => {
                if !sync {
                    self.dirty = true;
                }
                Ok(())
            }
            Err(err) => {
                if let Err(rollback) = self.backend.truncate(start) {
                    warn!(
                        segment = self.number,
                        error = %err,
                        rollback_error = %rollback,
                        "failed to roll back segment write"
                    );
                    self.poisoned = true;
                    return Err(SegmentError::corrupted(format!(
                        "segment {}: write failed ({err}) and rollback failed ({rollback})",
                        self.number
                    )));
                }
                Err(err)
            }
        }
    }
}

impl fmt::Debug for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Segment")
            .field("number", &self.number)
            .field("len", &self.items.len())
            .field("written", &self.written)
            .field("capacity", &self.capacity)
            .field("dirty", &self.dirty)
            .field("poisoned", &self.poisoned)
            .finish_non_exhaustive()
    }
}
