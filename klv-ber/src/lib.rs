//! BER (Basic Encoding Rules) codecs for KLV
//!
//! KLV borrows two encodings from ASN.1 BER:
//!
//! ```text
//! [Key] [Length] [Value]
//! ```
//!
//! ## Length Encoding
//!
//! - **Short form** (1 byte): for lengths 0-127
//!   - Bit 7 = 0
//!   - Bits 6-0 = length value
//! - **Long form** (1 + N bytes): for lengths >= 128
//!   - First byte: Bit 7 = 1, Bits 6-0 = N, the number of length bytes
//!   - Following N bytes: big-endian length value
//!
//! Decoding accepts non-minimal long forms (`82 00 05` decodes to 5), but
//! encoding always produces the minimal form.
//!
//! ## BER-OID Key Encoding
//!
//! Local Data Set tags are often BER-OID encoded: base-128 digits, most
//! significant first, with bit 7 set on every byte except the last.

pub mod length;
pub mod oid;

pub use length::{decode_length, encode_length, BerLength, MAX_LENGTH_FIELD_BYTES};
pub use oid::{decode_oid, encode_oid};
