//! Record codecs.
//!
//! Codecs turn typed records into the opaque payloads a record format
//! stores. They are the building block for user structures: a structure
//! decides where a record goes, a codec decides what its bytes are.
//!
//! [`CborCodec`] covers any serde type, encoded as CBOR with `ciborium`.

use crate::error::{CoreError, CoreResult};
use crate::structure::RecordType;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::{self, Debug};
use std::marker::PhantomData;

/// Encodes and decodes one record type.
pub trait RecordCodec: Send + Sync + Debug + Default + 'static {
    /// The decoded record type.
    type Record;

    /// Short name used in structure identities.
    const NAME: &'static str;

    /// Returns the record type tag of encoded records.
    fn record_type(&self) -> RecordType;

    /// Encodes a record.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Serialization`] if the record cannot be encoded.
    fn encode(&self, record: &Self::Record) -> CoreResult<Vec<u8>>;

    /// Decodes a record.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Serialization`] if `bytes` is not a valid record.
    fn decode(&self, bytes: &[u8]) -> CoreResult<Self::Record>;
}

/// Passes byte records through unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct BytesCodec;

impl RecordCodec for BytesCodec {
    type Record = Vec<u8>;
    const NAME: &'static str = "bytes";

    fn record_type(&self) -> RecordType {
        RecordType::BYTES
    }

    fn encode(&self, record: &Vec<u8>) -> CoreResult<Vec<u8>> {
        Ok(record.clone())
    }

    fn decode(&self, bytes: &[u8]) -> CoreResult<Vec<u8>> {
        Ok(bytes.to_vec())
    }
}

/// Stores strings as UTF-8.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextCodec;

impl RecordCodec for TextCodec {
    type Record = String;
    const NAME: &'static str = "text";

    fn record_type(&self) -> RecordType {
        RecordType::TEXT
    }

    fn encode(&self, record: &String) -> CoreResult<Vec<u8>> {
        Ok(record.as_bytes().to_vec())
    }

    fn decode(&self, bytes: &[u8]) -> CoreResult<String> {
        String::from_utf8(bytes.to_vec())
            .map_err(|e| CoreError::serialization(format!("record is not UTF-8: {e}")))
    }
}

/// Stores serde records as CBOR.
///
/// The record type tag is the Rust type name of `T`, so two CBOR stores only
/// append into each other when they hold the same type.
pub struct CborCodec<T> {
    _record: PhantomData<fn() -> T>,
}

impl<T> CborCodec<T> {
    /// Creates a codec.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _record: PhantomData,
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

impl<T> Debug for CborCodec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CborCodec<{}>", std::any::type_name::<T>())
    }
}

impl<T> RecordCodec for CborCodec<T>
where
    T: Serialize + DeserializeOwned + 'static,
{
    type Record = T;
    const NAME: &'static str = "cbor";

    fn record_type(&self) -> RecordType {
        RecordType::new(std::any::type_name::<T>())
    }

    fn encode(&self, record: &T) -> CoreResult<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(record, &mut buf)
            .map_err(|e| CoreError::serialization(format!("CBOR encode failed: {e}")))?;
        Ok(buf)
    }

    fn decode(&self, bytes: &[u8]) -> CoreResult<T> {
        ciborium::from_reader(bytes)
            .map_err(|e| CoreError::serialization(format!("CBOR decode failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Event {
        key: String,
        at: i64,
    }

    #[test]
    fn text_codec_roundtrip() {
        let codec = TextCodec;
        let bytes = codec.encode(&"héllo".to_string()).unwrap();
        assert_eq!(codec.decode(&bytes).unwrap(), "héllo");
        assert!(codec.decode(&[0xC3]).is_err());
    }

    #[test]
    fn cbor_codec_roundtrip() {
        let codec = CborCodec::<Event>::new();
        let event = Event {
            key: "a".into(),
            at: -7,
        };
        let bytes = codec.encode(&event).unwrap();
        assert_eq!(codec.decode(&bytes).unwrap(), event);
    }

    #[test]
    fn cbor_codec_rejects_garbage() {
        let codec = CborCodec::<Event>::new();
        assert!(matches!(
            codec.decode(&[0xFF, 0x00]),
            Err(CoreError::Serialization { .. })
        ));
    }

    #[test]
    fn cbor_record_type_is_per_type() {
        assert_ne!(
            CborCodec::<Event>::new().record_type(),
            CborCodec::<String>::new().record_type()
        );
        assert!(BytesCodec.record_type().is_bytes());
    }
}
