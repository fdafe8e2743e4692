//! BER-OID key encoding
//!
//! Each byte carries 7 bits of the tag number, most significant group first.
//! Bit 7 is set on every byte except the last.

use klv_core::{KlvError, KlvResult};

/// Encode a tag number as a BER-OID key
pub fn encode_oid(tag: u64) -> Vec<u8> {
    let mut groups = Vec::with_capacity(10);
    let mut remaining = tag;
    loop {
        groups.push((remaining & 0x7F) as u8);
        remaining >>= 7;
        if remaining == 0 {
            break;
        }
    }

    let last = groups.len() - 1;
    groups
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &group)| if i < last { group | 0x80 } else { group })
        .collect()
}

/// Decode a BER-OID key from the start of `data`
///
/// # Returns
/// `(tag, consumed)`
///
/// # Error Handling
/// Returns `InvalidRecord` if the key is unterminated or does not fit in 64 bits.
pub fn decode_oid(data: &[u8]) -> KlvResult<(u64, usize)> {
    let mut tag = 0u64;
    for (i, &byte) in data.iter().enumerate() {
        tag = tag
            .checked_mul(128)
            .map(|t| t | u64::from(byte & 0x7F))
            .ok_or_else(|| KlvError::InvalidRecord("BER-OID key overflows 64 bits".to_string()))?;
        if byte & 0x80 == 0 {
            return Ok((tag, i + 1));
        }
    }
    Err(KlvError::InvalidRecord(
        "Incomplete BER-OID key encoding".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_byte_tags() {
        assert_eq!(encode_oid(0), vec![0x00]);
        assert_eq!(encode_oid(65), vec![0x41]);
        assert_eq!(encode_oid(127), vec![0x7F]);
        assert_eq!(decode_oid(&[0x41, 0x99]).unwrap(), (65, 1));
    }

    #[test]
    fn test_multi_byte_tags() {
        assert_eq!(encode_oid(128), vec![0x81, 0x00]);
        assert_eq!(encode_oid(300), vec![0x82, 0x2C]);
        assert_eq!(decode_oid(&[0x82, 0x2C]).unwrap(), (300, 2));
        let big = encode_oid(u64::MAX);
        assert_eq!(big.len(), 10);
        assert_eq!(decode_oid(&big).unwrap(), (u64::MAX, 10));
    }

    #[test]
    fn test_unterminated() {
        assert!(decode_oid(&[0x81, 0x82]).is_err());
        assert!(decode_oid(&[]).is_err());
    }

    #[test]
    fn test_overflow() {
        let mut data = vec![0xFF; 11];
        data.push(0x01);
        assert!(decode_oid(&data).is_err());
    }
}
