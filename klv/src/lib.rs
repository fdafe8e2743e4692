//! klv - Rust implementation of SMPTE 336 KLV
//!
//! This library parses and serializes Key-Length-Value records as used by
//! motion imagery metadata streams, including records embedded in the value
//! of other records.
//!
//! # Architecture
//!
//! This library is organized as a workspace with multiple crates:
//!
//! - `klv-core`: Error handling and key encodings
//! - `klv-ber`: BER length and BER-OID codecs
//! - `klv-parser`: Incremental parser, record tree and serializer
//!
//! # Usage
//!
//! ```rust
//! use klv::{parse_all, KeyEncoding, ParserConfig};
//!
//! let config = ParserConfig::new().key_encodings(vec![KeyEncoding::Fixed1]);
//! let trees = parse_all(config, &[0x01, 0x03, 0x02, 0x01, 0x7F]).unwrap();
//! let tree = &trees[0];
//! let child = tree.first_child(tree.root()).unwrap();
//! assert_eq!(tree[child].value(), &[0x7F]);
//! ```

// Re-export core types
pub use klv_core::{
    is_universal_label, DepthPolicy, KeyEncoding, KeyEncodings, KlvError, KlvResult, UL_HEADER,
    UL_KEY_LEN,
};

// Re-export parser API
pub use klv_parser::{
    parse_all, EmbeddedPolicy, KlvParser, KlvRecord, KlvTree, NodeId, ParserConfig, ParserState,
    ParserStatistics,
};

// Re-export BER codecs
pub mod ber {
    pub use klv_ber::*;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_parse_serialize() {
        let mut tree = KlvTree::new(KlvRecord::new(vec![0x10], vec![0x00]));
        let root = tree.root();
        tree.append_child(root, KlvRecord::new(vec![0x01], vec![0xAA]));
        tree.append_child(root, KlvRecord::new(vec![0x02], ber::encode_oid(300)));
        let bytes = tree.to_bytes(root);

        let config = ParserConfig::new()
            .key_encodings(vec![KeyEncoding::Fixed1])
            .embedded(EmbeddedPolicy::Always);
        let parsed = parse_all(config, &bytes).unwrap();
        assert_eq!(parsed.len(), 1);

        let parsed = &parsed[0];
        let values: Vec<&[u8]> = parsed
            .children(parsed.root())
            .map(|id| parsed[id].value())
            .collect();
        assert_eq!(values, vec![&[0xAA][..], &[0x82, 0x2C][..]]);
        assert_eq!(parsed.to_bytes(parsed.root()), bytes);
    }

    #[test]
    fn test_tree_to_json() {
        let trees = parse_all(ParserConfig::default(), &[0x00; 3]).unwrap();
        assert!(trees.is_empty());

        let tree = KlvTree::new(KlvRecord::new(vec![0x05], vec![0x01]));
        let json = serde_json::to_string(&tree).unwrap();
        assert_eq!(
            json,
            r#"{"record":{"key":[5],"length_encoded":[1],"value":[1],"length":1},"children":[]}"#
        );
    }
}
