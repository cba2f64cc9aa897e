//! Benchmark utilities.

use spoolq_core::{CborCodec, DiskOrderedStorage};

/// RAM budget used by the benchmarks, matching the integration tests.
pub const RAM_LIMIT: usize = 32 * 1024;

/// Generate a deterministic payload of the specified size.
pub fn payload(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 256) as u8).collect()
}

/// Create an unopened disk storage for byte payloads.
pub fn disk_storage() -> DiskOrderedStorage<Vec<u8>> {
    DiskOrderedStorage::new(CborCodec::new(), Some(RAM_LIMIT))
        .unwrap_or_else(|e| panic!("failed to create storage: {e}"))
}
