//! Counters for a container read.
//!
//! A checksum mismatch never stops the reader, so these counters are how a
//! caller finds out how much of an image was damaged.
//!
//! # Thread Safety
//!
//! `ReadStats` is owned by one reader. Merge copies with
//! [`ReadStats::merge`] when tallying several images.

use std::fmt;

/// How a container stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// Physical end of the source at a segment boundary
    EndOfFile,
    /// Length prefix `0x1A1A`
    Sentinel,
    /// CP/M EOF byte `0x1A` where a length or body was expected
    CpmEof,
    /// A fatal format error
    Error,
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            EndReason::EndOfFile => "end of file",
            EndReason::Sentinel => "0x1A1A sentinel",
            EndReason::CpmEof => "CP/M EOF",
            EndReason::Error => "format error",
        };
        f.write_str(text)
    }
}

/// Statistics gathered while reading a container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadStats {
    /// Segments yielded
    pub segments: u64,
    /// Segments whose trailer matched
    pub valid: u64,
    /// Segments whose trailer did not match
    pub invalid: u64,
    /// Segment bytes read, excluding length prefixes
    pub segment_bytes: u64,
    /// Data bytes, excluding headers and trailers
    pub data_bytes: u64,
    /// Set once the stream is finished
    pub end: Option<EndReason>,
}

impl ReadStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one segment.
    pub fn record(&mut self, segment_len: usize, data_len: usize, checksum_ok: bool) {
        self.segments += 1;
        self.segment_bytes += segment_len as u64;
        self.data_bytes += data_len as u64;
        if checksum_ok {
            self.valid += 1;
        } else {
            self.invalid += 1;
        }
    }

    /// Fraction of segments that failed validation.
    ///
    /// Returns 0.0 if nothing was read.
    pub fn corruption_rate(&self) -> f64 {
        if self.segments == 0 {
            0.0
        } else {
            self.invalid as f64 / self.segments as f64
        }
    }

    /// Add another read's counters to this one. The end reason is kept.
    pub fn merge(&mut self, other: &ReadStats) {
        self.segments += other.segments;
        self.valid += other.valid;
        self.invalid += other.invalid;
        self.segment_bytes += other.segment_bytes;
        self.data_bytes += other.data_bytes;
    }

    /// Export as `key=value` lines (for parsing/testing).
    pub fn export_text(&self) -> String {
        format!(
            "segments={}\n\
             valid={}\n\
             invalid={}\n\
             segment_bytes={}\n\
             data_bytes={}\n\
             corruption_rate={:.4}\n",
            self.segments,
            self.valid,
            self.invalid,
            self.segment_bytes,
            self.data_bytes,
            self.corruption_rate(),
        )
    }
}

impl fmt::Display for ReadStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Container Summary ===")?;
        writeln!(f, "Segments: {}", self.segments)?;
        writeln!(f, "Checksum OK: {}", self.valid)?;
        writeln!(
            f,
            "Checksum bad: {} ({:.2}%)",
            self.invalid,
            self.corruption_rate() * 100.0
        )?;
        writeln!(f, "Segment bytes: {}", self.segment_bytes)?;
        writeln!(f, "Data bytes: {}", self.data_bytes)?;
        match self.end {
            Some(reason) => writeln!(f, "Ended at: {reason}"),
            None => writeln!(f, "Ended at: (still reading)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record() {
        let mut stats = ReadStats::new();
        stats.record(1009, 991, true);
        stats.record(1009, 991, false);
        stats.record(100, 82, true);

        assert_eq!(stats.segments, 3);
        assert_eq!(stats.valid, 2);
        assert_eq!(stats.invalid, 1);
        assert_eq!(stats.segment_bytes, 2118);
        assert_eq!(stats.data_bytes, 2064);
    }

    #[test]
    fn test_corruption_rate() {
        let mut stats = ReadStats::new();
        assert_eq!(stats.corruption_rate(), 0.0);

        stats.segments = 20;
        stats.invalid = 5;
        assert_eq!(stats.corruption_rate(), 0.25);
    }

    #[test]
    fn test_merge() {
        let mut total = ReadStats::new();
        let mut one = ReadStats::new();
        one.record(1009, 991, true);
        one.end = Some(EndReason::Sentinel);

        total.merge(&one);
        total.merge(&one);
        assert_eq!(total.segments, 2);
        assert_eq!(total.valid, 2);
        assert_eq!(total.end, None);
    }

    #[test]
    fn test_export_text() {
        let mut stats = ReadStats::new();
        stats.record(1009, 991, false);

        let text = stats.export_text();
        assert!(text.contains("segments=1"));
        assert!(text.contains("invalid=1"));
        assert!(text.contains("corruption_rate=1.0000"));
    }

    #[test]
    fn test_display() {
        let mut stats = ReadStats::new();
        stats.end = Some(EndReason::CpmEof);
        let text = stats.to_string();
        assert!(text.contains("Segments: 0"));
        assert!(text.contains("CP/M EOF"));
    }
}
