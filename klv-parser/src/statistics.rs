//! Parser statistics collection
//!
//! Counters for monitoring stream health. A rising `bytes_discarded` means
//! the parser keeps losing Universal Label alignment, which usually points at
//! a lossy transport or a wrong root key encoding. A rising
//! `embedded_degraded` is expected with [`EmbeddedPolicy::Always`], because
//! most leaf values are not themselves KLV.
//!
//! [`EmbeddedPolicy::Always`]: crate::EmbeddedPolicy::Always

/// KLV parser statistics
///
/// Counters are updated by [`KlvParser`](crate::KlvParser) as bytes are fed.
/// They survive [`reset()`](crate::KlvParser::reset) so that faults can be
/// counted across recoveries, and are only zeroed by
/// [`clear()`](ParserStatistics::clear).
///
/// Nested parsers keep their own counters. Their `embedded_records` and
/// `embedded_degraded` are folded into the outer parser only when the
/// embedded parse is accepted; faults and skipped bytes inside a nested
/// parse never reach the outer counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParserStatistics {
    /// Total number of bytes fed to the parser
    pub bytes_consumed: u64,
    /// Number of root records returned to the caller
    pub records_emitted: u64,
    /// Number of embedded records linked under a parent
    pub embedded_records: u64,
    /// Bytes dropped while searching for a Universal Label key
    pub bytes_discarded: u64,
    /// Number of faults raised to the caller
    pub faults: u64,
    /// Number of embedded parses that fell back to a leaf record
    pub embedded_degraded: u64,
}

impl ParserStatistics {
    /// Create new statistics with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all statistics counters
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Increment bytes consumed counter
    pub fn increment_bytes_consumed(&mut self) {
        self.bytes_consumed += 1;
    }

    pub fn increment_records_emitted(&mut self) {
        self.records_emitted += 1;
    }

    pub fn add_embedded_records(&mut self, count: usize) {
        self.embedded_records += count as u64;
    }

    pub fn add_bytes_discarded(&mut self, count: u64) {
        self.bytes_discarded += count;
    }

    /// Increment faults counter
    pub fn increment_faults(&mut self) {
        self.faults += 1;
    }

    pub fn increment_embedded_degraded(&mut self) {
        self.embedded_degraded += 1;
    }

    /// Share of consumed bytes that were discarded during resynchronisation,
    /// as a percentage
    ///
    /// Returns 0.0 if no bytes have been consumed.
    pub fn discard_rate(&self) -> f64 {
        if self.bytes_consumed == 0 {
            0.0
        } else {
            (self.bytes_discarded as f64 / self.bytes_consumed as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_and_clear() {
        let mut stats = ParserStatistics::new();
        for _ in 0..4 {
            stats.increment_bytes_consumed();
        }
        stats.add_bytes_discarded(1);
        stats.increment_records_emitted();
        assert_eq!(stats.discard_rate(), 25.0);

        stats.clear();
        assert_eq!(stats, ParserStatistics::default());
        assert_eq!(stats.discard_rate(), 0.0);
    }
}
