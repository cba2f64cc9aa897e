//! In-memory reference queue.

use crate::error::{QueueError, QueueResult};
use crate::ordered::Ordered;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// A non-persistent FIFO queue.
///
/// Serves as the ground truth the disk-backed storages are checked
/// against. Ownership of an item moves to the caller on dequeue.
///
/// # Example
///
/// ```rust
/// use spoolq_core::{MemoryQueue, Ordered};
///
/// let queue = MemoryQueue::new();
/// queue.enqueue("a").unwrap();
/// queue.enqueue("b").unwrap();
/// assert_eq!(queue.dequeue().unwrap(), "a");
/// assert_eq!(queue.len(), 1);
/// ```
#[derive(Debug)]
pub struct MemoryQueue<T> {
    items: Mutex<VecDeque<T>>,
}

impl<T> MemoryQueue<T> {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
        }
    }

    /// Creates a queue holding `items`, first item at the head.
    pub fn from_items(items: impl IntoIterator<Item = T>) -> Self {
        items.into_iter().collect()
    }

    /// Removes every item.
    pub fn clear(&self) {
        self.items.lock().clear();
    }
}

impl<T> Default for MemoryQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<T> for MemoryQueue<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            items: Mutex::new(iter.into_iter().collect()),
        }
    }
}

impl<T: Send> Ordered<T> for MemoryQueue<T> {
    fn enqueue(&self, item: T) -> QueueResult<()> {
        self.items.lock().push_back(item);
        Ok(())
    }

    fn dequeue(&self) -> QueueResult<T> {
        self.items.lock().pop_front().ok_or(QueueError::EmptyQueue)
    }

    fn len(&self) -> usize {
        self.items.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn empty_dequeue_fails() {
        let queue: MemoryQueue<u32> = MemoryQueue::new();
        assert!(matches!(queue.dequeue(), Err(QueueError::EmptyQueue)));
        assert_eq!(queue.len(), 0);
        assert!(queue.is_empty());
    }

    #[test]
    fn from_iter_keeps_order() {
        let queue: MemoryQueue<_> = (1..=3).collect();
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.dequeue().unwrap(), 1);
        queue.clear();
        assert!(queue.is_empty());

        let queue = MemoryQueue::from_items(vec!["x", "y"]);
        assert_eq!(queue.dequeue().unwrap(), "x");
        assert_eq!(queue.dequeue().unwrap(), "y");
        assert!(queue.is_empty());
    }

    proptest! {
        #[test]
        fn returns_items_in_enqueue_order(items in prop::collection::vec(any::<i64>(), 0..200)) {
            let queue = MemoryQueue::new();
            for item in &items {
                queue.enqueue(*item).unwrap();
            }
            prop_assert_eq!(queue.len(), items.len());

            for item in &items {
                prop_assert_eq!(queue.dequeue().unwrap(), *item);
            }
            prop_assert!(queue.dequeue().unwrap_err().is_empty_queue());
        }
    }
}
