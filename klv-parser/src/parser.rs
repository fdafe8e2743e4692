//! Incremental KLV parser
//!
//! The parser is a state machine fed one byte at a time. All progress lives
//! in the parser instance, so it can be suspended after any byte and resumed
//! later with identical results, and any number of instances can run side by
//! side on different threads.
//!
//! # Decoding Process
//! 1. Accumulate key bytes until the key encoding for this depth reports a
//!    complete key
//! 2. Read the BER length header and, for the long form, its follow bytes
//! 3. Accumulate exactly `length` value bytes
//! 4. Run a fresh parser one level deeper over the value to find embedded
//!    records, and link whatever it finds under the new record
//! 5. Return the tree and start again at step 1
//!
//! An embedded parse that faults, skips bytes while looking for a key, leaves
//! bytes over, or finds nothing does not affect the outer record: it is
//! simply returned as a leaf. A nested parser never accepts a declared
//! length larger than the value it is reading.
//!
//! # Usage Example
//!
//! ```rust
//! use klv_core::KeyEncoding;
//! use klv_parser::{KlvParser, ParserConfig};
//!
//! let config = ParserConfig::new().key_encodings(vec![KeyEncoding::Fixed1]);
//! let mut parser = KlvParser::new(config).unwrap();
//! assert!(parser.feed(0x05).unwrap().is_none());
//! assert!(parser.feed(0x01).unwrap().is_none());
//! let tree = parser.feed(0xAA).unwrap().unwrap();
//! assert_eq!(tree.root_record().value(), &[0xAA]);
//! ```

use crate::config::ParserConfig;
use crate::record::KlvRecord;
use crate::state::ParserState;
use crate::statistics::ParserStatistics;
use crate::tree::KlvTree;
use klv_core::{KeyDetector, KeyEncoding, KlvError, KlvResult};

/// Incremental KLV parser
#[derive(Debug, Clone)]
pub struct KlvParser {
    config: ParserConfig,
    depth: usize,
    state: ParserState,
    detector: KeyDetector,
    key: Vec<u8>,
    length_encoded: Vec<u8>,
    follow_remaining: u8,
    value_length: u64,
    value: Vec<u8>,
    statistics: ParserStatistics,
}

impl KlvParser {
    /// Create a parser for root-level records
    ///
    /// # Error Handling
    /// Returns an error if `config` does not validate, in particular
    /// `KeyEncodingExhausted { depth: 0 }` for an empty encoding list.
    pub fn new(config: ParserConfig) -> KlvResult<Self> {
        Self::at_depth(config, 0)
    }

    fn at_depth(config: ParserConfig, depth: usize) -> KlvResult<Self> {
        config.validate()?;
        let encoding = config.encoding_at(depth)?;
        let detector = KeyDetector::new(encoding, config.max_key_bytes);
        Ok(Self {
            config,
            depth,
            state: ParserState::SeekingKey,
            detector,
            key: Vec::new(),
            length_encoded: Vec::new(),
            follow_remaining: 0,
            value_length: 0,
            value: Vec::new(),
            statistics: ParserStatistics::new(),
        })
    }

    /// Current state machine position
    pub fn state(&self) -> ParserState {
        self.state
    }

    /// Nesting depth this parser decodes keys for (0 for root records)
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Key encoding in force at this parser's depth
    pub fn encoding(&self) -> KeyEncoding {
        self.detector.encoding()
    }

    /// Get configuration
    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Counters accumulated since creation or the last
    /// [`clear_statistics()`](Self::clear_statistics)
    ///
    /// Embedded parses report into the parser that started them, and only
    /// when their records were actually linked.
    pub fn statistics(&self) -> &ParserStatistics {
        &self.statistics
    }

    /// Reset all counters to zero without touching parse progress
    pub fn clear_statistics(&mut self) {
        self.statistics.clear();
    }

    /// Whether the parser is between records with nothing buffered
    pub fn is_idle(&self) -> bool {
        self.state.is_idle() && self.detector.pending() == 0
    }

    /// Bytes held for the record currently being decoded
    pub fn pending_bytes(&self) -> usize {
        self.detector.pending() + self.key.len() + self.length_encoded.len() + self.value.len()
    }

    /// Feed one byte
    ///
    /// # Returns
    /// - `Ok(Some(tree))` when this byte completes a root record
    /// - `Ok(None)` when more bytes are needed
    /// - `Err(_)` when the input is malformed; the parser is then faulted
    ///   and rejects every byte with [`KlvError::Faulted`] until
    ///   [`reset()`](Self::reset) is called
    pub fn feed(&mut self, byte: u8) -> KlvResult<Option<KlvTree>> {
        if self.state.is_faulted() {
            return Err(KlvError::Faulted);
        }
        self.statistics.increment_bytes_consumed();

        match self.step(byte) {
            Ok(tree) => Ok(tree),
            Err(err) => {
                self.fault(&err);
                Err(err)
            }
        }
    }

    /// Feed a chunk of bytes, pushing every completed tree onto `out`
    ///
    /// Equivalent to calling [`feed()`](Self::feed) for each byte in order.
    /// Trees completed before an error are kept in `out`.
    pub fn feed_into(&mut self, data: &[u8], out: &mut Vec<KlvTree>) -> KlvResult<()> {
        for &byte in data {
            if let Some(tree) = self.feed(byte)? {
                out.push(tree);
            }
        }
        Ok(())
    }

    /// Feed a chunk of bytes and collect the completed trees
    pub fn feed_slice(&mut self, data: &[u8]) -> KlvResult<Vec<KlvTree>> {
        let mut out = Vec::new();
        self.feed_into(data, &mut out)?;
        Ok(out)
    }

    /// Drop any partial record and leave the faulted state
    ///
    /// Statistics are kept.
    pub fn reset(&mut self) {
        self.reset_fields();
        self.detector.clear();
        self.state = ParserState::SeekingKey;
    }

    fn step(&mut self, byte: u8) -> KlvResult<Option<KlvTree>> {
        match self.state {
            ParserState::SeekingKey => {
                let complete = self.detector.push(byte)?;
                self.statistics
                    .add_bytes_discarded(self.detector.take_discarded());
                if complete {
                    self.key = self.detector.take_key();
                    self.transition(ParserState::ReadingLengthHeader);
                }
                Ok(None)
            }
            ParserState::ReadingLengthHeader => {
                self.length_encoded.push(byte);
                if byte & 0x80 == 0 {
                    return self.begin_value(u64::from(byte));
                }

                let follow = byte & 0x7F;
                if follow > self.config.max_length_field_bytes {
                    return Err(KlvError::MalformedLength(format!(
                        "Length field declares {} follow bytes (max {})",
                        follow, self.config.max_length_field_bytes
                    )));
                }
                if follow == 0 {
                    return self.begin_value(0);
                }

                self.follow_remaining = follow;
                self.value_length = 0;
                self.transition(ParserState::ReadingLengthBody);
                Ok(None)
            }
            ParserState::ReadingLengthBody => {
                self.length_encoded.push(byte);
                // at most 8 follow bytes, so this never overflows
                self.value_length = (self.value_length << 8) | u64::from(byte);
                self.follow_remaining -= 1;
                if self.follow_remaining == 0 {
                    self.begin_value(self.value_length)
                } else {
                    Ok(None)
                }
            }
            ParserState::ReadingValue => {
                self.value.push(byte);
                if self.value.len() as u64 == self.value_length {
                    Ok(Some(self.complete()))
                } else {
                    Ok(None)
                }
            }
            ParserState::Faulted => Err(KlvError::Faulted),
        }
    }

    fn begin_value(&mut self, length: u64) -> KlvResult<Option<KlvTree>> {
        let too_large = KlvError::ValueTooLarge {
            declared: length,
            limit: self.config.max_value_length,
        };
        if length > self.config.max_value_length {
            return Err(too_large);
        }
        let capacity = usize::try_from(length).map_err(|_| too_large.clone())?;
        self.value
            .try_reserve_exact(capacity)
            .map_err(|_| too_large)?;

        self.value_length = length;
        if length == 0 {
            return Ok(Some(self.complete()));
        }
        self.transition(ParserState::ReadingValue);
        Ok(None)
    }

    fn complete(&mut self) -> KlvTree {
        let record = KlvRecord::from_decoded(
            std::mem::take(&mut self.key),
            std::mem::take(&mut self.length_encoded),
            std::mem::take(&mut self.value),
        );
        let mut tree = KlvTree::new(record);
        self.attach_embedded(&mut tree);

        self.reset_fields();
        self.transition(ParserState::SeekingKey);
        self.statistics.increment_records_emitted();

        log::debug!(
            "Depth {}: emitted {} with {} embedded records",
            self.depth,
            tree.root_record(),
            tree.node_count() - 1
        );
        tree
    }

    /// Search the root value of `tree` for embedded records and link them
    fn attach_embedded(&mut self, tree: &mut KlvTree) {
        if self.depth >= self.config.max_nesting_depth {
            return;
        }
        if !self.config.embedded.should_attempt(tree.root_record().value()) {
            return;
        }

        match self.parse_embedded(tree.root_record().value()) {
            Ok(children) => {
                let root = tree.root();
                self.statistics.add_embedded_records(children.len());
                for child in children {
                    tree.graft(root, child);
                }
            }
            Err(err) => {
                self.statistics.increment_embedded_degraded();
                log::debug!(
                    "Depth {}: {} kept as leaf: {}",
                    self.depth,
                    tree.root_record(),
                    err
                );
            }
        }
    }

    /// Parse `value` with a fresh parser one level deeper
    ///
    /// Succeeds only if at least one record was found and the value was
    /// consumed exactly, with no bytes skipped while looking for a key.
    /// Nested lengths are capped at the size of `value`, which bounds every
    /// nested allocation by the outer record.
    fn parse_embedded(&mut self, value: &[u8]) -> KlvResult<Vec<KlvTree>> {
        let mut config = self.config.clone();
        config.max_value_length = config.max_value_length.min(value.len() as u64);

        let mut nested = KlvParser::at_depth(config, self.depth + 1)?;
        let mut found = Vec::new();
        nested.feed_into(value, &mut found)?;

        if nested.statistics.bytes_discarded > 0 {
            return Err(KlvError::InvalidRecord(format!(
                "{} bytes skipped before an embedded key",
                nested.statistics.bytes_discarded
            )));
        }
        if !nested.is_idle() {
            return Err(KlvError::InvalidRecord(format!(
                "{} bytes left over after embedded records",
                nested.pending_bytes()
            )));
        }
        if found.is_empty() {
            return Err(KlvError::InvalidRecord(
                "No embedded records found".to_string(),
            ));
        }

        self.statistics.embedded_records += nested.statistics.embedded_records;
        self.statistics.embedded_degraded += nested.statistics.embedded_degraded;
        Ok(found)
    }

    fn fault(&mut self, err: &KlvError) {
        self.statistics.increment_faults();
        if self.depth == 0 {
            log::warn!("KLV parser faulted in state {}: {}", self.state, err);
        } else {
            log::debug!("Depth {}: parser faulted in state {}: {}", self.depth, self.state, err);
        }
        self.transition(ParserState::Faulted);
    }

    fn transition(&mut self, next: ParserState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid transition {} -> {}",
            self.state,
            next
        );
        log::trace!("Depth {}: {} -> {}", self.depth, self.state, next);
        self.state = next;
    }

    fn reset_fields(&mut self) {
        self.key.clear();
        self.length_encoded.clear();
        self.value.clear();
        self.follow_remaining = 0;
        self.value_length = 0;
    }
}

/// Parse every complete root record in `data` with a fresh parser
///
/// A trailing partial record is ignored.
pub fn parse_all(config: ParserConfig, data: &[u8]) -> KlvResult<Vec<KlvTree>> {
    KlvParser::new(config)?.feed_slice(data)
}
