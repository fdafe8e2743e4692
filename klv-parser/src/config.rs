//! Parser configuration
//!
//! # Usage Example
//!
//! ```rust
//! use klv_core::KeyEncoding;
//! use klv_parser::{EmbeddedPolicy, ParserConfig};
//!
//! let config = ParserConfig::new()
//!     .key_encodings(vec![KeyEncoding::UniversalLabel16, KeyEncoding::Fixed1])
//!     .embedded(EmbeddedPolicy::WhenUniversalLabelPresent)
//!     .max_value_length(64 * 1024);
//! assert!(config.validate().is_ok());
//! ```

use klv_ber::MAX_LENGTH_FIELD_BYTES;
use klv_core::{DepthPolicy, KeyEncoding, KeyEncodings, KlvError, KlvResult, UL_HEADER};
use serde::{Deserialize, Serialize};

/// When to look for embedded records inside a completed value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddedPolicy {
    /// Always try to parse the value as a sequence of records
    #[default]
    Always,
    /// Only try when the UL header occurs somewhere in the value
    WhenUniversalLabelPresent,
    /// Never recurse; every record is a leaf
    Never,
}

impl EmbeddedPolicy {
    /// Whether an embedded parse should be attempted on `value`
    pub fn should_attempt(&self, value: &[u8]) -> bool {
        match self {
            EmbeddedPolicy::Always => !value.is_empty(),
            EmbeddedPolicy::WhenUniversalLabelPresent => {
                value.windows(UL_HEADER.len()).any(|w| w == UL_HEADER)
            }
            EmbeddedPolicy::Never => false,
        }
    }
}

/// Incremental parser configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Key encoding per nesting depth, root first
    pub key_encodings: KeyEncodings,
    /// Behaviour past the end of `key_encodings`
    pub depth_policy: DepthPolicy,
    /// When embedded records are searched for
    pub embedded: EmbeddedPolicy,
    /// Largest declared value length accepted
    pub max_value_length: u64,
    /// Largest number of long-form length follow bytes accepted
    pub max_length_field_bytes: u8,
    /// Largest BER-OID key accepted
    pub max_key_bytes: usize,
    /// Records at this depth are never searched for embedded records
    pub max_nesting_depth: usize,
}

impl ParserConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key_encodings(mut self, encodings: impl Into<KeyEncodings>) -> Self {
        self.key_encodings = encodings.into();
        self
    }

    pub fn depth_policy(mut self, policy: DepthPolicy) -> Self {
        self.depth_policy = policy;
        self
    }

    pub fn embedded(mut self, policy: EmbeddedPolicy) -> Self {
        self.embedded = policy;
        self
    }

    pub fn max_value_length(mut self, limit: u64) -> Self {
        self.max_value_length = limit;
        self
    }

    /// Set the follow byte ceiling, clamped to [`MAX_LENGTH_FIELD_BYTES`]
    pub fn max_length_field_bytes(mut self, limit: u8) -> Self {
        self.max_length_field_bytes = limit.min(MAX_LENGTH_FIELD_BYTES);
        self
    }

    pub fn max_key_bytes(mut self, limit: usize) -> Self {
        self.max_key_bytes = limit;
        self
    }

    pub fn max_nesting_depth(mut self, limit: usize) -> Self {
        self.max_nesting_depth = limit;
        self
    }

    /// Key encoding in force at `depth`
    pub fn encoding_at(&self, depth: usize) -> KlvResult<KeyEncoding> {
        self.key_encodings.at(depth, self.depth_policy)
    }

    /// Check the configuration before a parser is built from it
    ///
    /// # Error Handling
    /// - `KeyEncodingExhausted { depth: 0 }` if no key encoding is configured
    /// - `InvalidConfig` if a limit is out of range
    pub fn validate(&self) -> KlvResult<()> {
        if self.key_encodings.is_empty() {
            return Err(KlvError::KeyEncodingExhausted { depth: 0 });
        }
        if self.max_length_field_bytes > MAX_LENGTH_FIELD_BYTES {
            return Err(KlvError::InvalidConfig(format!(
                "max_length_field_bytes {} exceeds {}",
                self.max_length_field_bytes, MAX_LENGTH_FIELD_BYTES
            )));
        }
        if self.max_key_bytes == 0 {
            return Err(KlvError::InvalidConfig(
                "max_key_bytes must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            key_encodings: KeyEncodings::default(),
            depth_policy: DepthPolicy::ReuseLast,
            embedded: EmbeddedPolicy::Always,
            max_value_length: u64::from(u32::MAX),
            max_length_field_bytes: MAX_LENGTH_FIELD_BYTES,
            max_key_bytes: 16,
            max_nesting_depth: 32,
        }
    }
}
