//! Storage configuration.

use std::mem;
use std::time::Duration;

/// Default interval between background flushes of a
/// [`crate::FastDiskOrderedStorage`].
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(10);

/// Configuration for disk-backed storages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// RAM budget in bytes used to size segments.
    pub ram_limit: Option<usize>,

    /// Explicit items per segment; takes precedence over `ram_limit`.
    pub items_per_segment: Option<usize>,

    /// Interval between background flushes in deferred-sync mode.
    pub flush_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ram_limit: None,
            items_per_segment: None,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the RAM budget in bytes.
    #[must_use]
    pub const fn ram_limit(mut self, bytes: usize) -> Self {
        self.ram_limit = Some(bytes);
        self
    }

    /// Sets the number of items per segment directly.
    #[must_use]
    pub const fn items_per_segment(mut self, items: usize) -> Self {
        self.items_per_segment = Some(items);
        self
    }

    /// Sets the background flush interval.
    #[must_use]
    pub const fn flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    /// Resolves the segment size for items of type `T`.
    #[must_use]
    pub fn segment_size_for<T>(&self) -> usize {
        match self.items_per_segment {
            Some(items) => items.max(1),
            None => items_per_segment::<T>(self.ram_limit),
        }
    }
}

/// Derives how many items of type `T` one segment may hold.
///
/// With a budget this is `max(1, ram_limit / size_of::<T>() / 2)`: the head
/// and tail segments are both resident, so each gets half the budget.
/// Without a budget it is 1. Zero-sized types count as one byte.
#[must_use]
pub fn items_per_segment<T>(ram_limit: Option<usize>) -> usize {
    let Some(limit) = ram_limit else {
        return 1;
    };
    let item_size = mem::size_of::<T>().max(1);
    (limit / item_size / 2).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(dead_code)]
    struct Sixteen([u8; 16]);

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.ram_limit, None);
        assert_eq!(config.items_per_segment, None);
        assert_eq!(config.flush_interval, Duration::from_millis(10));
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new()
            .ram_limit(4096)
            .flush_interval(Duration::from_millis(50));

        assert_eq!(config.ram_limit, Some(4096));
        assert_eq!(config.flush_interval, Duration::from_millis(50));
        assert_eq!(config.segment_size_for::<Sixteen>(), 128);
    }

    #[test]
    fn explicit_segment_size_wins() {
        let config = Config::new().ram_limit(4096).items_per_segment(7);
        assert_eq!(config.segment_size_for::<Sixteen>(), 7);
        assert_eq!(Config::new().items_per_segment(0).segment_size_for::<u8>(), 1);
    }

    #[test]
    fn ram_budget_formula() {
        assert_eq!(items_per_segment::<Sixteen>(Some(32 * 1024)), 1024);
        assert_eq!(items_per_segment::<u64>(Some(100)), 6);
        assert_eq!(items_per_segment::<String>(Some(32 * 1024)), 32 * 1024 / mem::size_of::<String>() / 2);
    }

    #[test]
    fn segment_size_never_zero() {
        assert_eq!(items_per_segment::<Sixteen>(None), 1);
        assert_eq!(items_per_segment::<Sixteen>(Some(0)), 1);
        assert_eq!(items_per_segment::<Sixteen>(Some(31)), 1);
        assert_eq!(items_per_segment::<()>(Some(10)), 5);
    }
}
