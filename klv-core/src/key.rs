//! Key encoding strategies
//!
//! A KLV key is recognised differently depending on how it was encoded:
//!
//! - **Fixed** keys of 1, 2 or 4 bytes end as soon as that many bytes are read.
//! - **Universal Label** keys are 16 bytes and always begin with the SMPTE
//!   header `06 0E 2B 34`. They are found with a sliding window, so the
//!   parser can lock onto a key anywhere in the stream.
//! - **BER-OID** keys are variable length; every byte except the last has its
//!   high bit set.
//!
//! Different nesting depths usually use different encodings: a MISB ST 0601
//! packet has a 16-byte UL at the root and BER-OID tags inside the local set.
//! [`KeyEncodings`] holds one entry per depth.

use crate::error::{KlvError, KlvResult};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// SMPTE Universal Label header, the first 4 bytes of every 16-byte UL key
pub const UL_HEADER: [u8; 4] = [0x06, 0x0E, 0x2B, 0x34];

/// Length of [`UL_HEADER`]
pub const UL_HEADER_LEN: usize = 4;

/// Length of a Universal Label key
pub const UL_KEY_LEN: usize = 16;

/// Check whether `key` is a 16-byte Universal Label
pub fn is_universal_label(key: &[u8]) -> bool {
    key.len() == UL_KEY_LEN && key[..UL_HEADER_LEN] == UL_HEADER
}

/// How a key is encoded at one nesting depth
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyEncoding {
    /// 1-byte key
    Fixed1,
    /// 2-byte key
    Fixed2,
    /// 4-byte key
    Fixed4,
    /// 16-byte SMPTE Universal Label
    UniversalLabel16,
    /// Variable length key terminated by a byte with the high bit clear
    BerOid,
}

impl KeyEncoding {
    /// Fixed-length encoding for `len` bytes, if one exists
    pub fn fixed(len: usize) -> Option<Self> {
        match len {
            1 => Some(KeyEncoding::Fixed1),
            2 => Some(KeyEncoding::Fixed2),
            4 => Some(KeyEncoding::Fixed4),
            16 => Some(KeyEncoding::UniversalLabel16),
            _ => None,
        }
    }

    /// Key length in bytes, `None` for BER-OID
    pub fn key_len(&self) -> Option<usize> {
        match self {
            KeyEncoding::Fixed1 => Some(1),
            KeyEncoding::Fixed2 => Some(2),
            KeyEncoding::Fixed4 => Some(4),
            KeyEncoding::UniversalLabel16 => Some(UL_KEY_LEN),
            KeyEncoding::BerOid => None,
        }
    }

    /// Check whether `key` is a complete, well-formed key for this encoding
    pub fn accepts(&self, key: &[u8]) -> bool {
        match self {
            KeyEncoding::UniversalLabel16 => is_universal_label(key),
            KeyEncoding::BerOid => match key.split_last() {
                Some((last, rest)) => last & 0x80 == 0 && rest.iter().all(|b| b & 0x80 != 0),
                None => false,
            },
            fixed => fixed.key_len() == Some(key.len()),
        }
    }

    /// Get human-readable encoding name
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyEncoding::Fixed1 => "fixed-1",
            KeyEncoding::Fixed2 => "fixed-2",
            KeyEncoding::Fixed4 => "fixed-4",
            KeyEncoding::UniversalLabel16 => "ul-16",
            KeyEncoding::BerOid => "ber-oid",
        }
    }
}

impl fmt::Display for KeyEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do when nesting goes deeper than the configured encoding list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepthPolicy {
    /// Reuse the last entry for every deeper level
    #[default]
    ReuseLast,
    /// Report [`KlvError::KeyEncodingExhausted`]
    Stop,
}

/// Depth-indexed key encoding list
///
/// Entry 0 applies to root records, entry 1 to records embedded in a root
/// value, and so on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyEncodings(Vec<KeyEncoding>);

impl KeyEncodings {
    /// Create an encoding list
    pub fn new(levels: Vec<KeyEncoding>) -> Self {
        Self(levels)
    }

    /// Encoding to use at `depth`
    ///
    /// # Error Handling
    /// Returns `KeyEncodingExhausted` when the list is empty, or when `depth`
    /// is past the end of the list and `policy` is [`DepthPolicy::Stop`].
    pub fn at(&self, depth: usize, policy: DepthPolicy) -> KlvResult<KeyEncoding> {
        match (self.0.get(depth), policy) {
            (Some(encoding), _) => Ok(*encoding),
            (None, DepthPolicy::ReuseLast) => self
                .0
                .last()
                .copied()
                .ok_or(KlvError::KeyEncodingExhausted { depth }),
            (None, DepthPolicy::Stop) => Err(KlvError::KeyEncodingExhausted { depth }),
        }
    }

    /// Number of explicitly configured levels
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no level is configured; such a list cannot drive a parser
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Configured levels, root first
    pub fn as_slice(&self) -> &[KeyEncoding] {
        &self.0
    }
}

impl Default for KeyEncodings {
    /// Universal Label at the root, BER-OID local set tags below it
    fn default() -> Self {
        Self(vec![KeyEncoding::UniversalLabel16, KeyEncoding::BerOid])
    }
}

impl From<Vec<KeyEncoding>> for KeyEncodings {
    fn from(levels: Vec<KeyEncoding>) -> Self {
        Self(levels)
    }
}

impl From<&[KeyEncoding]> for KeyEncodings {
    fn from(levels: &[KeyEncoding]) -> Self {
        Self(levels.to_vec())
    }
}

/// Byte-at-a-time key boundary detector
///
/// Accumulates bytes for one encoding and reports the instant a complete key
/// has been seen. For Universal Labels the accumulator is a window capped at
/// 16 bytes; older bytes fall out of it and are counted as discarded.
#[derive(Debug, Clone)]
pub struct KeyDetector {
    encoding: KeyEncoding,
    window: VecDeque<u8>,
    max_key_bytes: usize,
    discarded: u64,
}

impl KeyDetector {
    /// Create a detector
    ///
    /// # Arguments
    /// * `encoding` - Key encoding to detect
    /// * `max_key_bytes` - Ceiling for BER-OID keys
    pub fn new(encoding: KeyEncoding, max_key_bytes: usize) -> Self {
        let capacity = encoding.key_len().unwrap_or(max_key_bytes).min(UL_KEY_LEN + 1);
        Self {
            encoding,
            window: VecDeque::with_capacity(capacity),
            max_key_bytes,
            discarded: 0,
        }
    }

    /// Get the encoding this detector recognises
    pub fn encoding(&self) -> KeyEncoding {
        self.encoding
    }

    /// Feed one byte
    ///
    /// # Returns
    /// `Ok(true)` once the accumulated bytes form a complete key.
    ///
    /// # Error Handling
    /// Returns `KeyTooLong` if a BER-OID key reaches `max_key_bytes` without
    /// a terminating byte.
    pub fn push(&mut self, byte: u8) -> KlvResult<bool> {
        self.window.push_back(byte);
        match self.encoding {
            KeyEncoding::UniversalLabel16 => {
                if self.window.len() > UL_KEY_LEN {
                    self.window.pop_front();
                    self.discarded += 1;
                }
                Ok(self.window.len() == UL_KEY_LEN
                    && self.window.iter().take(UL_HEADER_LEN).eq(UL_HEADER.iter()))
            }
            KeyEncoding::BerOid => {
                if byte & 0x80 == 0 {
                    Ok(true)
                } else if self.window.len() >= self.max_key_bytes {
                    Err(KlvError::KeyTooLong {
                        length: self.window.len(),
                        limit: self.max_key_bytes,
                    })
                } else {
                    Ok(false)
                }
            }
            fixed => Ok(Some(self.window.len()) == fixed.key_len()),
        }
    }

    /// Take the accumulated key bytes, leaving the detector empty
    pub fn take_key(&mut self) -> Vec<u8> {
        self.window.drain(..).collect()
    }

    /// Number of bytes currently held
    pub fn pending(&self) -> usize {
        self.window.len()
    }

    /// Bytes dropped from the UL window since the last call
    pub fn take_discarded(&mut self) -> u64 {
        std::mem::take(&mut self.discarded)
    }

    pub fn clear(&mut self) {
        self.window.clear();
        self.discarded = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(detector: &mut KeyDetector, bytes: &[u8]) -> Vec<bool> {
        bytes.iter().map(|&b| detector.push(b).unwrap()).collect()
    }

    #[test]
    fn test_fixed_key_boundaries() {
        let mut detector = KeyDetector::new(KeyEncoding::Fixed1, 16);
        assert_eq!(feed(&mut detector, &[0x41]), vec![true]);
        assert_eq!(detector.take_key(), vec![0x41]);

        let mut detector = KeyDetector::new(KeyEncoding::Fixed4, 16);
        assert_eq!(
            feed(&mut detector, &[1, 2, 3, 4]),
            vec![false, false, false, true]
        );
        assert_eq!(detector.take_key(), vec![1, 2, 3, 4]);
        assert_eq!(detector.pending(), 0);
    }

    #[test]
    fn test_ber_oid_key() {
        let mut detector = KeyDetector::new(KeyEncoding::BerOid, 16);
        assert_eq!(feed(&mut detector, &[0x81, 0x82, 0x03]), vec![false, false, true]);
        assert_eq!(detector.take_key(), vec![0x81, 0x82, 0x03]);
    }

    #[test]
    fn test_ber_oid_key_too_long() {
        let mut detector = KeyDetector::new(KeyEncoding::BerOid, 3);
        assert!(!detector.push(0x80).unwrap());
        assert!(!detector.push(0x80).unwrap());
        assert_eq!(
            detector.push(0x80),
            Err(KlvError::KeyTooLong { length: 3, limit: 3 })
        );
    }

    #[test]
    fn test_universal_label_resync() {
        let mut detector = KeyDetector::new(KeyEncoding::UniversalLabel16, 16);
        // garbage first
        assert_eq!(feed(&mut detector, &[0xFF, 0x00, 0x06]), vec![false; 3]);

        let mut key = UL_HEADER.to_vec();
        key.extend_from_slice(&[0xAA; 12]);
        let hits = feed(&mut detector, &key);
        assert_eq!(hits.iter().filter(|&&h| h).count(), 1);
        assert!(hits[15]);
        assert_eq!(detector.take_discarded(), 3);
        assert_eq!(detector.take_key(), key);
    }

    #[test]
    fn test_universal_label_needs_header() {
        let mut detector = KeyDetector::new(KeyEncoding::UniversalLabel16, 16);
        assert!(feed(&mut detector, &[0x01; 40]).iter().all(|&h| !h));
        assert_eq!(detector.pending(), UL_KEY_LEN);
    }

    #[test]
    fn test_encodings_at_depth() {
        let encodings = KeyEncodings::new(vec![KeyEncoding::UniversalLabel16, KeyEncoding::Fixed1]);
        assert_eq!(
            encodings.at(0, DepthPolicy::ReuseLast),
            Ok(KeyEncoding::UniversalLabel16)
        );
        assert_eq!(encodings.at(5, DepthPolicy::ReuseLast), Ok(KeyEncoding::Fixed1));
        assert_eq!(
            encodings.at(2, DepthPolicy::Stop),
            Err(KlvError::KeyEncodingExhausted { depth: 2 })
        );
        assert_eq!(
            KeyEncodings::new(Vec::new()).at(0, DepthPolicy::ReuseLast),
            Err(KlvError::KeyEncodingExhausted { depth: 0 })
        );
    }

    #[test]
    fn test_accepts() {
        let mut ul = UL_HEADER.to_vec();
        ul.extend_from_slice(&[0; 12]);
        assert!(KeyEncoding::UniversalLabel16.accepts(&ul));
        assert!(!KeyEncoding::UniversalLabel16.accepts(&[0; 16]));
        assert!(KeyEncoding::BerOid.accepts(&[0x81, 0x01]));
        assert!(!KeyEncoding::BerOid.accepts(&[0x01, 0x01]));
        assert!(KeyEncoding::Fixed2.accepts(&[0x01, 0x01]));
        assert_eq!(KeyEncoding::fixed(3), None);
    }

    #[test]
    fn test_encodings_serde() {
        let encodings = KeyEncodings::default();
        let json = serde_json::to_string(&encodings).unwrap();
        assert_eq!(json, r#"["universal_label16","ber_oid"]"#);
        let back: KeyEncodings = serde_json::from_str(&json).unwrap();
        assert_eq!(back, encodings);
    }
}
