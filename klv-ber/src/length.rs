//! BER length field encoding

use klv_core::{KlvError, KlvResult};

/// Largest number of long-form follow bytes accepted (64-bit lengths)
pub const MAX_LENGTH_FIELD_BYTES: u8 = 8;

/// BER Length encoding
///
/// # Encoding Format
///
/// Short form:
/// ```text
/// Byte: 0 L L L L L L L
/// ```
/// Where L = length value (0-127)
///
/// Long form:
/// ```text
/// First byte:  1 N N N N N N N  (N = number of length bytes)
/// Following bytes: L L L L L L L L  (big-endian length value)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BerLength {
    /// Short form: length 0-127
    Short(u8),
    /// Long form: length encoded with length-of-length
    Long(u64),
}

impl BerLength {
    /// Create a new BER length
    ///
    /// Automatically chooses short or long form based on the length value.
    pub fn new(length: u64) -> Self {
        if length < 128 {
            BerLength::Short(length as u8)
        } else {
            BerLength::Long(length)
        }
    }

    /// Get the length value
    pub fn value(&self) -> u64 {
        match self {
            BerLength::Short(l) => u64::from(*l),
            BerLength::Long(l) => *l,
        }
    }

    /// Number of bytes the minimal encoding of this length occupies
    pub fn encoded_len(&self) -> usize {
        let length = self.value();
        if length < 128 {
            1
        } else {
            1 + significant_bytes(length)
        }
    }

    /// Encode length to bytes
    ///
    /// # Returns
    /// 1 byte for short form, `0x80 | N` followed by N big-endian bytes for
    /// long form, N being the minimum that can hold the value.
    ///
    /// The form follows the value, so `Long(5)` still encodes as `05`.
    pub fn encode(&self) -> Vec<u8> {
        let length = self.value();
        if length < 128 {
            return vec![length as u8];
        }
        let num_bytes = significant_bytes(length);
        let mut result = Vec::with_capacity(1 + num_bytes);
        result.push(0x80 | num_bytes as u8);
        result.extend_from_slice(&length.to_be_bytes()[8 - num_bytes..]);
        result
    }

    /// Decode length from bytes
    ///
    /// # Returns
    /// Returns `Ok((BerLength, bytes_consumed))` if successful. A non-minimal
    /// long form such as `82 00 05` decodes to `Short(5)`.
    ///
    /// # Error Handling
    /// Returns `MalformedLength` if:
    /// - Buffer is empty
    /// - The long form declares more than [`MAX_LENGTH_FIELD_BYTES`] follow bytes
    /// - Fewer follow bytes are available than declared
    pub fn decode(data: &[u8]) -> KlvResult<(Self, usize)> {
        let Some(&first_byte) = data.first() else {
            return Err(KlvError::MalformedLength(
                "Empty buffer for length decoding".to_string(),
            ));
        };

        if first_byte & 0x80 == 0 {
            return Ok((BerLength::Short(first_byte), 1));
        }

        let num_bytes = first_byte & 0x7F;
        if num_bytes > MAX_LENGTH_FIELD_BYTES {
            return Err(KlvError::MalformedLength(format!(
                "Length encoding too large: {} bytes (max {})",
                num_bytes, MAX_LENGTH_FIELD_BYTES
            )));
        }

        let num_bytes = num_bytes as usize;
        if data.len() < 1 + num_bytes {
            return Err(KlvError::MalformedLength(format!(
                "Buffer too short for long form length: need {} bytes, got {}",
                1 + num_bytes,
                data.len()
            )));
        }

        let length = data[1..=num_bytes]
            .iter()
            .fold(0u64, |acc, &b| (acc << 8) | u64::from(b));

        Ok((BerLength::new(length), 1 + num_bytes))
    }
}

impl From<u64> for BerLength {
    fn from(length: u64) -> Self {
        Self::new(length)
    }
}

/// Minimum number of bytes holding `value`, at least 1
fn significant_bytes(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    bits.div_ceil(8).max(1)
}

/// Encode `length` in minimal BER form
pub fn encode_length(length: u64) -> Vec<u8> {
    BerLength::new(length).encode()
}

/// Decode a BER length
///
/// # Returns
/// `(length, consumed)` where `consumed` counts the header byte and all
/// follow bytes.
pub fn decode_length(data: &[u8]) -> KlvResult<(u64, usize)> {
    BerLength::decode(data).map(|(length, consumed)| (length.value(), consumed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_form() {
        assert_eq!(encode_length(0), vec![0x00]);
        assert_eq!(encode_length(2), vec![0x02]);
        assert_eq!(encode_length(127), vec![0x7F]);
        assert_eq!(decode_length(&[0x7F]).unwrap(), (127, 1));
    }

    #[test]
    fn test_long_form_boundary() {
        assert_eq!(encode_length(128), vec![0x81, 0x80]);
        assert_eq!(encode_length(255), vec![0x81, 0xFF]);
        assert_eq!(encode_length(256), vec![0x82, 0x01, 0x00]);
        assert_eq!(encode_length(65536), vec![0x83, 0x01, 0x00, 0x00]);
        assert_eq!(decode_length(&[0x81, 0x80]).unwrap(), (128, 2));
    }

    #[test]
    fn test_non_minimal_accepted() {
        assert_eq!(decode_length(&[0x82, 0x00, 0x05]).unwrap(), (5, 3));
        assert_eq!(decode_length(&[0x80]).unwrap(), (0, 1));
        assert_eq!(encode_length(5), vec![0x05]);
    }

    #[test]
    fn test_non_minimal_reencodes_minimal() {
        let (length, consumed) = BerLength::decode(&[0x82, 0x00, 0x05]).unwrap();
        assert_eq!((length, consumed), (BerLength::Short(5), 3));
        assert_eq!(length.encode(), vec![0x05]);

        let (length, _) = BerLength::decode(&[0x80]).unwrap();
        assert_eq!(length.encode(), vec![0x00]);

        let (length, _) = BerLength::decode(&[0x83, 0x00, 0x00, 0x80]).unwrap();
        assert_eq!(length, BerLength::Long(128));
        assert_eq!(length.encode(), vec![0x81, 0x80]);

        assert_eq!(BerLength::Long(5).encode(), vec![0x05]);
        assert_eq!(BerLength::Long(5).encoded_len(), 1);
    }

    #[test]
    fn test_decode_ignores_trailing_bytes() {
        assert_eq!(decode_length(&[0x81, 0x90, 0xAA, 0xBB]).unwrap(), (0x90, 2));
    }

    #[test]
    fn test_truncated_long_form() {
        assert!(matches!(
            decode_length(&[0x83, 0x01]),
            Err(KlvError::MalformedLength(_))
        ));
        assert!(matches!(decode_length(&[]), Err(KlvError::MalformedLength(_))));
    }

    #[test]
    fn test_too_many_follow_bytes() {
        let mut data = vec![0x89];
        data.extend_from_slice(&[0; 9]);
        assert!(matches!(
            decode_length(&data),
            Err(KlvError::MalformedLength(_))
        ));
    }

    #[test]
    fn test_round_trip_across_widths() {
        for shift in 0..56 {
            for x in [1u64 << shift, (1u64 << shift) - 1, (1u64 << shift) + 1] {
                let encoded = encode_length(x);
                assert_eq!(decode_length(&encoded).unwrap(), (x, encoded.len()));
                assert_eq!(BerLength::new(x).encoded_len(), encoded.len());
            }
        }
        assert_eq!(decode_length(&encode_length(u64::MAX)).unwrap().0, u64::MAX);
        assert_eq!(encode_length(u64::MAX).len(), 9);
    }
}
