//! Segment record format.
//!
//! ```text
//! ┌────────────┬──────────┬──────────────────┬─────────────┐
//! │ len: u32 LE│ kind: u8 │ payload (len B)  │ crc: u32 LE │
//! └────────────┴──────────┴──────────────────┴─────────────┘
//! ```
//!
//! The CRC covers `kind` and `payload`. Removal markers have an empty
//! payload.

use crate::backend::StorageBackend;
use crate::error::{SegmentError, SegmentResult};

/// Length prefix plus kind byte.
pub const HEADER_SIZE: usize = 5;

/// Trailing checksum size.
pub const CRC_SIZE: usize = 4;

/// Kind of a segment record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordKind {
    /// An enqueued item.
    Item = 1,
    /// The oldest remaining item of the segment was dequeued.
    Removal = 2,
}

impl RecordKind {
    /// Converts a byte to a record kind.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Item),
            2 => Some(Self::Removal),
            _ => None,
        }
    }

    /// Converts the record kind to a byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

/// A single record in a segment file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    /// An item payload.
    Item(Vec<u8>),
    /// Removal marker.
    Removal,
}

/// Result of reading one record from a backend.
#[derive(Debug, PartialEq, Eq)]
pub enum ReadOutcome {
    /// A valid record and the offset of the record after it.
    Record(Record, u64),
    /// The bytes from this offset to the end do not form a valid record.
    Torn,
    /// The offset is at the end of the backend.
    End,
}

impl Record {
    /// Returns the kind of this record.
    #[must_use]
    pub fn kind(&self) -> RecordKind {
        match self {
            Self::Item(_) => RecordKind::Item,
            Self::Removal => RecordKind::Removal,
        }
    }

    fn payload(&self) -> &[u8] {
        match self {
            Self::Item(payload) => payload,
            Self::Removal => &[],
        }
    }

    /// Encodes the record to bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload does not fit a `u32` length.
    pub fn encode(&self) -> SegmentResult<Vec<u8>> {
        let payload = self.payload();
        let len = u32::try_from(payload.len())
            .map_err(|_| SegmentError::corrupted("record payload too large"))?;
        let kind = self.kind().as_byte();

        let mut data = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
        data.extend_from_slice(&len.to_le_bytes());
        data.push(kind);
        data.extend_from_slice(payload);
        data.extend_from_slice(&checksum(kind, payload).to_le_bytes());
        Ok(data)
    }

    /// Reads the record starting at `offset`.
    ///
    /// A record that runs past the end of the backend, or whose checksum or
    /// kind is invalid while it ends exactly at the end of the backend, is
    /// reported as [`ReadOutcome::Torn`]. An invalid record followed by more
    /// data cannot be a torn append and is reported as corruption.
    ///
    /// # Errors
    ///
    /// Returns `Corrupted` for invalid records in the middle of a backend,
    /// or any backend read error.
    pub fn read_at(backend: &dyn StorageBackend, offset: u64) -> SegmentResult<ReadOutcome> {
        let size = backend.size()?;
        if offset == size {
            return Ok(ReadOutcome::End);
        }
        if offset + (HEADER_SIZE as u64) > size {
            return Ok(ReadOutcome::Torn);
        }

        let header = backend.read_at(offset, HEADER_SIZE)?;
        let len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as u64;
        let kind_byte = header[4];

        let payload_start = offset + HEADER_SIZE as u64;
        let end = payload_start + len + CRC_SIZE as u64;
        if end > size {
            return Ok(ReadOutcome::Torn);
        }

        let payload = backend.read_at(payload_start, len as usize)?;
        let crc_bytes = backend.read_at(payload_start + len, CRC_SIZE)?;
        let stored = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);

        let kind = RecordKind::from_byte(kind_byte);
        let valid = kind.is_some() && stored == checksum(kind_byte, &payload);
        if !valid {
            if end == size {
                return Ok(ReadOutcome::Torn);
            }
            return Err(SegmentError::corrupted(format!(
                "invalid record at offset {offset}"
            )));
        }

        let record = match kind {
            Some(RecordKind::Item) => Record::Item(payload),
            Some(RecordKind::Removal) if len == 0 => Record::Removal,
            _ => {
                return Err(SegmentError::corrupted(format!(
                    "removal marker with payload at offset {offset}"
                )))
            }
        };

        Ok(ReadOutcome::Record(record, end))
    }
}

fn checksum(kind: u8, payload: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&[kind]);
    hasher.update(payload);
    hasher.finalize()
}
