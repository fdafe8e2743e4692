use thiserror::Error;

/// Main error type for KLV decoding and encoding
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KlvError {
    #[error("Malformed length: {0}")]
    MalformedLength(String),

    #[error("Value too large: declared {declared} bytes, limit {limit}")]
    ValueTooLarge { declared: u64, limit: u64 },

    #[error("No key encoding configured for depth {depth}")]
    KeyEncodingExhausted { depth: usize },

    #[error("Key too long: {length} bytes without terminator (limit {limit})")]
    KeyTooLong { length: usize, limit: usize },

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Parser is faulted; reset required")]
    Faulted,
}

impl KlvError {
    /// Whether the parser must be reset after this error
    pub fn requires_reset(&self) -> bool {
        matches!(
            self,
            KlvError::MalformedLength(_)
                | KlvError::ValueTooLarge { .. }
                | KlvError::KeyTooLong { .. }
                | KlvError::Faulted
        )
    }
}

/// Result type alias for KLV operations
pub type KlvResult<T> = Result<T, KlvError>;
