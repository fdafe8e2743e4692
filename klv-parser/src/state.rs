//! KLV parser state machine
//!
//! The state is the only thing that decides what the next byte means, which
//! is what lets a parser stop after any byte and continue later. Transitions
//! are checked with [`ParserState::can_transition_to`] in debug builds.

use std::fmt;

/// Incremental parser state
///
/// # State Transitions
/// ```text
/// SeekingKey -> ReadingLengthHeader (on complete key)
/// ReadingLengthHeader -> ReadingValue (short form, or long form with 0 follow bytes)
/// ReadingLengthHeader -> ReadingLengthBody (long form)
/// ReadingLengthBody -> ReadingValue (all follow bytes read)
/// ReadingValue -> SeekingKey (record emitted)
/// any -> Faulted (malformed input)
/// Faulted -> SeekingKey (on reset())
/// ```
///
/// A zero-length value is emitted straight from the length states, so
/// `ReadingLengthHeader -> SeekingKey` and `ReadingLengthBody -> SeekingKey`
/// are legal too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParserState {
    /// Accumulating key bytes for the active key encoding (initial state)
    #[default]
    SeekingKey,
    /// Next byte is the first byte of the BER length
    ReadingLengthHeader,
    /// Accumulating long-form follow bytes
    ReadingLengthBody,
    /// Accumulating value bytes
    ReadingValue,
    /// Malformed input was seen; no bytes are accepted until reset
    Faulted,
}

impl ParserState {
    /// Whether the parser sits between records
    pub fn is_idle(&self) -> bool {
        matches!(self, ParserState::SeekingKey)
    }

    /// Whether the parser refuses input until reset
    pub fn is_faulted(&self) -> bool {
        matches!(self, ParserState::Faulted)
    }

    /// Check whether moving to `next` is a legal transition
    pub fn can_transition_to(&self, next: ParserState) -> bool {
        use ParserState::*;
        match (*self, next) {
            (SeekingKey, ReadingLengthHeader) => true,
            (ReadingLengthHeader, ReadingLengthBody | ReadingValue | SeekingKey) => true,
            (ReadingLengthBody, ReadingValue | SeekingKey) => true,
            (ReadingValue, SeekingKey) => true,
            (Faulted, SeekingKey) => true,
            (Faulted, Faulted) => false,
            (_, Faulted) => true,
            _ => false,
        }
    }

    /// Get human-readable state name
    pub fn as_str(&self) -> &'static str {
        match self {
            ParserState::SeekingKey => "SeekingKey",
            ParserState::ReadingLengthHeader => "ReadingLengthHeader",
            ParserState::ReadingLengthBody => "ReadingLengthBody",
            ParserState::ReadingValue => "ReadingValue",
            ParserState::Faulted => "Faulted",
        }
    }
}

impl fmt::Display for ParserState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
