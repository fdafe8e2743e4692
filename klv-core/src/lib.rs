//! Core types and utilities for SMPTE 336 KLV
//!
//! This crate provides the error taxonomy and the key encoding strategies
//! shared by the BER codec and the incremental parser.

pub mod error;
pub mod key;

pub use error::{KlvError, KlvResult};
pub use key::{
    is_universal_label, DepthPolicy, KeyDetector, KeyEncoding, KeyEncodings, UL_HEADER,
    UL_HEADER_LEN, UL_KEY_LEN,
};
