//! KLV record and serializer

use bytes::{BufMut, Bytes, BytesMut};
use klv_ber::{decode_length, decode_oid, encode_length};
use klv_core::{is_universal_label, KlvError, KlvResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single Key-Length-Value triplet
///
/// The length is kept both as the encoded BER bytes seen on the wire and as
/// the decoded integer; the two always agree with `value.len()`.
///
/// Tree links live in [`KlvTree`](crate::KlvTree), not here.
///
/// Deserialization goes through [`KlvRecord::from_parts`], so a record whose
/// fields disagree is rejected instead of loaded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawRecord")]
pub struct KlvRecord {
    #[serde(with = "serde_bytes")]
    key: Vec<u8>,
    #[serde(with = "serde_bytes")]
    length_encoded: Vec<u8>,
    #[serde(with = "serde_bytes")]
    value: Vec<u8>,
    length: u64,
}

/// Wire form of a record before validation
#[derive(Deserialize)]
struct RawRecord {
    #[serde(with = "serde_bytes")]
    key: Vec<u8>,
    #[serde(with = "serde_bytes")]
    length_encoded: Vec<u8>,
    #[serde(with = "serde_bytes")]
    value: Vec<u8>,
    #[serde(default)]
    length: Option<u64>,
}

impl TryFrom<RawRecord> for KlvRecord {
    type Error = KlvError;

    fn try_from(raw: RawRecord) -> KlvResult<Self> {
        let record = KlvRecord::from_parts(raw.key, raw.length_encoded, raw.value)?;
        match raw.length {
            Some(length) if length != record.length => Err(KlvError::MalformedLength(format!(
                "Declared length {} does not match value size {}",
                length, record.length
            ))),
            _ => Ok(record),
        }
    }
}

impl KlvRecord {
    /// Create a record for encoding, computing the minimal BER length
    pub fn new(key: Vec<u8>, value: Vec<u8>) -> Self {
        let length = value.len() as u64;
        Self {
            key,
            length_encoded: encode_length(length),
            value,
            length,
        }
    }

    /// Create a record from its three wire fields
    ///
    /// Non-minimal long-form lengths are kept as given, so serializing the
    /// record reproduces the input bytes exactly.
    ///
    /// # Error Handling
    /// - `InvalidRecord` if the key is empty
    /// - `MalformedLength` if `length_encoded` is not exactly one BER length,
    ///   or if it does not match `value.len()`
    pub fn from_parts(key: Vec<u8>, length_encoded: Vec<u8>, value: Vec<u8>) -> KlvResult<Self> {
        if key.is_empty() {
            return Err(KlvError::InvalidRecord("Empty key".to_string()));
        }

        let (length, consumed) = decode_length(&length_encoded)?;
        if consumed != length_encoded.len() {
            return Err(KlvError::MalformedLength(format!(
                "Length field declares {} bytes but {} were supplied",
                consumed,
                length_encoded.len()
            )));
        }
        if length != value.len() as u64 {
            return Err(KlvError::MalformedLength(format!(
                "Encoded length {} does not match value size {}",
                length,
                value.len()
            )));
        }

        Ok(Self {
            key,
            length_encoded,
            value,
            length,
        })
    }

    /// Built by the parser, which has already checked the framing
    pub(crate) fn from_decoded(
        key: Vec<u8>,
        length_encoded: Vec<u8>,
        value: Vec<u8>,
    ) -> Self {
        let length = value.len() as u64;
        Self {
            key,
            length_encoded,
            value,
            length,
        }
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// BER-encoded length bytes
    pub fn length_encoded(&self) -> &[u8] {
        &self.length_encoded
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Decoded value length
    pub fn length(&self) -> u64 {
        self.length
    }

    /// Size of the BER length field in bytes
    pub fn length_field_len(&self) -> usize {
        self.length_encoded.len()
    }

    /// Size of the whole record on the wire
    pub fn encoded_len(&self) -> usize {
        self.key.len() + self.length_encoded.len() + self.value.len()
    }

    /// Whether the key is a 16-byte SMPTE Universal Label
    pub fn is_universal_label(&self) -> bool {
        is_universal_label(&self.key)
    }

    /// Interpret the key as a BER-OID tag number
    ///
    /// # Error Handling
    /// Returns `InvalidRecord` if the key is not exactly one BER-OID value.
    pub fn key_as_oid(&self) -> KlvResult<u64> {
        let (tag, consumed) = decode_oid(&self.key)?;
        if consumed != self.key.len() {
            return Err(KlvError::InvalidRecord(format!(
                "Key has {} bytes after BER-OID tag",
                self.key.len() - consumed
            )));
        }
        Ok(tag)
    }

    /// Consume the record, returning its value
    pub fn into_value(self) -> Vec<u8> {
        self.value
    }

    /// Serialize the record as `key ++ length ++ value`
    ///
    /// Returns an empty buffer if the key, length or value is empty.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode_into(&mut buf);
        buf.freeze()
    }

    /// Append the serialized record to `buf`
    ///
    /// Appends nothing if the key, length or value is empty.
    pub fn encode_into(&self, buf: &mut BytesMut) {
        if self.key.is_empty() || self.length_encoded.is_empty() || self.value.is_empty() {
            return;
        }
        self.put_fields(buf);
    }

    /// Append `key ++ length ++ value` with no empty guard
    ///
    /// Used for embedded records, where a zero-length value is still a
    /// record that occupies bytes in its parent.
    pub(crate) fn put_fields(&self, buf: &mut BytesMut) {
        buf.reserve(self.encoded_len());
        buf.put_slice(&self.key);
        buf.put_slice(&self.length_encoded);
        buf.put_slice(&self.value);
    }
}

impl fmt::Display for KlvRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KLV key=")?;
        for byte in &self.key {
            write!(f, "{:02X}", byte)?;
        }
        write!(f, " length={}", self.length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UL_KEY: [u8; 16] = [
        0x06, 0x0E, 0x2B, 0x34, 0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF, 0x00, 0x11, 0x22, 0x33, 0x44,
        0x55,
    ];

    #[test]
    fn test_new_computes_length() {
        let record = KlvRecord::new(UL_KEY.to_vec(), vec![0x01, 0x02]);
        assert_eq!(record.length(), 2);
        assert_eq!(record.length_encoded(), &[0x02]);
        assert!(record.is_universal_label());

        let record = KlvRecord::new(vec![0x41], vec![0u8; 128]);
        assert_eq!(record.length_encoded(), &[0x81, 0x80]);
        assert_eq!(record.length_field_len(), 2);
    }

    #[test]
    fn test_to_bytes() {
        let record = KlvRecord::new(UL_KEY.to_vec(), vec![0x01, 0x02]);
        let bytes = record.to_bytes();
        assert_eq!(bytes.len(), 19);
        assert_eq!(&bytes[..16], &UL_KEY);
        assert_eq!(&bytes[16..], &[0x02, 0x01, 0x02]);
    }

    #[test]
    fn test_to_bytes_empty_guard() {
        let record = KlvRecord::new(vec![0x01], Vec::new());
        assert!(record.to_bytes().is_empty());
        let record = KlvRecord::new(Vec::new(), vec![0x01]);
        assert!(record.to_bytes().is_empty());
    }

    #[test]
    fn test_from_parts_validates_length() {
        let record = KlvRecord::from_parts(vec![0x05], vec![0x82, 0x00, 0x02], vec![0xAA, 0xBB])
            .unwrap();
        assert_eq!(record.length(), 2);
        assert_eq!(&record.to_bytes()[..], &[0x05, 0x82, 0x00, 0x02, 0xAA, 0xBB]);

        assert!(matches!(
            KlvRecord::from_parts(vec![0x05], vec![0x03], vec![0xAA]),
            Err(KlvError::MalformedLength(_))
        ));
        assert!(matches!(
            KlvRecord::from_parts(vec![0x05], vec![0x01, 0x00], vec![0xAA]),
            Err(KlvError::MalformedLength(_))
        ));
        assert!(matches!(
            KlvRecord::from_parts(vec![0x05], vec![0x82, 0x00], vec![0xAA]),
            Err(KlvError::MalformedLength(_))
        ));
        assert!(matches!(
            KlvRecord::from_parts(Vec::new(), vec![0x01], vec![0xAA]),
            Err(KlvError::InvalidRecord(_))
        ));
    }

    #[test]
    fn test_key_as_oid() {
        assert_eq!(KlvRecord::new(vec![0x82, 0x2C], vec![0x01]).key_as_oid(), Ok(300));
        assert!(KlvRecord::new(vec![0x01, 0x02], vec![0x01]).key_as_oid().is_err());
    }

    #[test]
    fn test_display() {
        let record = KlvRecord::new(vec![0x0D, 0xA0], vec![0x01, 0x02, 0x03]);
        assert_eq!(record.to_string(), "KLV key=0DA0 length=3");
    }

    #[test]
    fn test_serde_round_trip() {
        let record = KlvRecord::new(vec![0x02], vec![0x10, 0x20]);
        let json = serde_json::to_string(&record).unwrap();
        let back: KlvRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_deserialize_rejects_inconsistent_fields() {
        let mismatched = r#"{"key":[1],"length_encoded":[5],"value":[1],"length":1}"#;
        assert!(serde_json::from_str::<KlvRecord>(mismatched).is_err());

        let wrong_length = r#"{"key":[1],"length_encoded":[1],"value":[1],"length":99}"#;
        assert!(serde_json::from_str::<KlvRecord>(wrong_length).is_err());

        let empty_key = r#"{"key":[],"length_encoded":[1],"value":[1]}"#;
        assert!(serde_json::from_str::<KlvRecord>(empty_key).is_err());

        let without_length = r#"{"key":[1],"length_encoded":[130,0,1],"value":[7]}"#;
        let record: KlvRecord = serde_json::from_str(without_length).unwrap();
        assert_eq!(record.length(), 1);
        assert_eq!(record.length_encoded(), &[0x82, 0x00, 0x01]);
    }
}
