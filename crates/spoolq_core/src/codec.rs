//! Item codecs.
//!
//! The segment engine stores opaque bytes. A codec is the factory that
//! turns those bytes back into a concrete `T`, paired with the encoder that
//! produced them. It is supplied once, when the storage is constructed.

use crate::error::{QueueError, QueueResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::marker::PhantomData;

/// Encodes items to bytes and rebuilds them from bytes.
///
/// `decode` must accept everything `encode` produced, including bytes
/// written by earlier runs of the process.
pub trait ItemCodec<T>: Send + Sync {
    /// Encodes an item for storage.
    ///
    /// # Errors
    ///
    /// Returns a codec error if the item cannot be represented.
    fn encode(&self, item: &T) -> QueueResult<Vec<u8>>;

    /// Rebuilds an item from its stored bytes.
    ///
    /// # Errors
    ///
    /// Returns a codec error if the bytes are not a valid item.
    fn decode(&self, bytes: &[u8]) -> QueueResult<T>;
}

/// CBOR codec for any serde type.
///
/// # Example
///
/// ```rust
/// use serde::{Deserialize, Serialize};
/// use spoolq_core::{CborCodec, ItemCodec};
///
/// #[derive(Debug, PartialEq, Serialize, Deserialize)]
/// struct Job {
///     id: u64,
/// }
///
/// let codec = CborCodec::<Job>::new();
/// let bytes = codec.encode(&Job { id: 7 }).unwrap();
/// assert_eq!(codec.decode(&bytes).unwrap(), Job { id: 7 });
/// ```
pub struct CborCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> CborCodec<T> {
    /// Creates a CBOR codec.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for CborCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for CborCodec<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for CborCodec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CborCodec")
    }
}

impl<T> ItemCodec<T> for CborCodec<T>
where
    T: Serialize + DeserializeOwned,
{
    fn encode(&self, item: &T) -> QueueResult<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::ser::into_writer(item, &mut buf).map_err(|e| QueueError::codec(e.to_string()))?;
        Ok(buf)
    }

    fn decode(&self, bytes: &[u8]) -> QueueResult<T> {
        ciborium::de::from_reader(bytes).map_err(|e| QueueError::codec(e.to_string()))
    }
}

/// Codec built from a pair of functions.
///
/// Useful for payloads that already have their own byte format.
///
/// ```rust
/// use spoolq_core::{FnCodec, ItemCodec, QueueResult};
///
/// let codec = FnCodec::new(
///     |s: &String| -> QueueResult<Vec<u8>> { Ok(s.as_bytes().to_vec()) },
///     |b: &[u8]| -> QueueResult<String> { Ok(String::from_utf8_lossy(b).into_owned()) },
/// );
/// assert_eq!(codec.decode(&codec.encode(&"hi".to_string()).unwrap()).unwrap(), "hi");
/// ```
pub struct FnCodec<E, D> {
    encode: E,
    decode: D,
}

impl<E, D> FnCodec<E, D> {
    /// Creates a codec from an encoder and a decoder.
    pub const fn new(encode: E, decode: D) -> Self {
        Self { encode, decode }
    }
}

impl<E, D> fmt::Debug for FnCodec<E, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnCodec")
    }
}

impl<T, E, D> ItemCodec<T> for FnCodec<E, D>
where
    E: Fn(&T) -> QueueResult<Vec<u8>> + Send + Sync,
    D: Fn(&[u8]) -> QueueResult<T> + Send + Sync,
{
    fn encode(&self, item: &T) -> QueueResult<Vec<u8>> {
        (self.encode)(item)
    }

    fn decode(&self, bytes: &[u8]) -> QueueResult<T> {
        (self.decode)(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Event {
        id: String,
        attempts: u32,
    }

    #[test]
    fn cbor_round_trip() {
        let codec = CborCodec::<Event>::new();
        let event = Event {
            id: "abc".into(),
            attempts: 3,
        };

        let bytes = codec.encode(&event).unwrap();
        assert_eq!(codec.decode(&bytes).unwrap(), event);
    }

    #[test]
    fn cbor_rejects_garbage() {
        let codec = CborCodec::<Event>::new();
        let result = codec.decode(&[0xFF, 0x00, 0x13]);
        assert!(matches!(result, Err(QueueError::Codec { .. })));
    }

    #[test]
    fn fn_codec_propagates_errors() {
        let codec = FnCodec::new(
            |_: &u8| -> QueueResult<Vec<u8>> { Err(QueueError::codec("refused")) },
            |b: &[u8]| -> QueueResult<u8> { Ok(b[0]) },
        );
        assert!(matches!(codec.encode(&1u8), Err(QueueError::Codec { .. })));
        assert_eq!(codec.decode(&[9]).unwrap(), 9);
    }
}
