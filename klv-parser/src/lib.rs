//! Incremental KLV parsing and serialization
//!
//! This crate turns a byte stream into trees of KLV records and back.
//!
//! - [`KlvParser`] is a resumable state machine fed one byte (or one chunk)
//!   at a time. Every completed root record is returned as a [`KlvTree`]
//!   whose embedded records are already linked.
//! - [`KlvRecord`] holds a single Key/Length/Value triplet.
//! - [`KlvTree`] is an arena of records addressed by [`NodeId`] handles.
//!
//! # Usage Example
//!
//! ```rust
//! use klv_parser::{KlvParser, ParserConfig};
//!
//! let mut parser = KlvParser::new(ParserConfig::default()).unwrap();
//! let bytes = [
//!     0x06, 0x0E, 0x2B, 0x34, 0xAA, 0xBB, 0xCC, 0xDD,
//!     0xEE, 0xFF, 0x00, 0x11, 0x22, 0x33, 0x44, 0x55,
//!     0x02, 0x01, 0x02,
//! ];
//! let trees = parser.feed_slice(&bytes).unwrap();
//! assert_eq!(trees[0].root_record().value(), &[0x01, 0x02]);
//! ```

pub mod config;
pub mod parser;
pub mod record;
pub mod state;
pub mod statistics;
pub mod tree;

pub use config::{EmbeddedPolicy, ParserConfig};
pub use parser::{parse_all, KlvParser};
pub use record::KlvRecord;
pub use state::ParserState;
pub use statistics::ParserStatistics;
pub use tree::{Children, Descendants, KlvTree, NodeId};
