//! `.pak` container reading and writing.
//!
//! # Container Format
//!
//! ```text
//! +-------------------+
//! | length (2)        |  u16 little-endian, not part of the segment
//! +-------------------+
//! | segment           |  `length` bytes: header, data, trailer
//! +-------------------+
//! | ...               |  repeated
//! +-------------------+
//! | 0x1A 0x1A         |  optional sentinel, anything after it is ignored
//! +-------------------+
//! ```
//!
//! Images were moved around on CP/M systems, which pad files to a record
//! boundary with `0x1A`. The reader therefore treats `0x1A` where a length
//! prefix or a short segment body was expected as a clean end of file.
//!
//! # Errors
//!
//! A length above [`MAX_SEGMENT_LEN`], a length too small to hold a segment,
//! and a short body that is not CP/M padding all end the stream with a
//! [`FormatError`]. The reader never skips ahead to resynchronize.
//!
//! A single byte left where a length prefix belongs is end of file only if
//! it is `0x1A`; any other lone byte is reported as
//! `FormatError::Truncated { declared: 2, available: 1 }`. Tools that stop
//! quietly on any short length read would accept such a cut-off image as
//! complete.

use std::io::{ErrorKind, Read, Write};

use tracing::{debug, warn};

use crate::checksum::ChecksumConvention;
use crate::error::{FormatError, Result};
use crate::metrics::{EndReason, ReadStats};
use crate::segment::{Segment, MAX_SEGMENT_LEN, MIN_SEGMENT_LEN};

/// Length prefix that marks the logical end of a container.
pub const SENTINEL: u16 = 0x1A1A;

/// CP/M end-of-file padding byte.
pub const CPM_EOF: u8 = 0x1A;

/// A segment as read from a container, with its validation result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadSegment {
    pub segment: Segment,
    /// Whether the stored trailer matched the computed checksum
    pub checksum_ok: bool,
}

/// Forward-only reader over a container.
///
/// Wrap unbuffered sources (files, sockets) in a `BufReader`; the reader
/// issues two reads per segment.
#[derive(Debug)]
pub struct ContainerReader<R> {
    source: R,
    convention: ChecksumConvention,
    stats: ReadStats,
    done: bool,
}

impl<R: Read> ContainerReader<R> {
    /// Create a reader that checks trailers with the finished convention.
    pub fn new(source: R) -> Self {
        Self::with_convention(source, ChecksumConvention::Finished)
    }

    /// Create a reader that checks trailers with an explicit convention.
    pub fn with_convention(source: R, convention: ChecksumConvention) -> Self {
        Self {
            source,
            convention,
            stats: ReadStats::new(),
            done: false,
        }
    }

    /// Counters for everything read so far.
    pub fn stats(&self) -> &ReadStats {
        &self.stats
    }

    /// Give back the underlying source.
    pub fn into_inner(self) -> R {
        self.source
    }

    /// Read the next segment.
    ///
    /// Returns `Ok(None)` at the end of the container. Once the end has been
    /// reached or an error returned, every later call returns `Ok(None)`.
    ///
    /// # Errors
    /// - `FormatError::PayloadTooLarge` for a length prefix above 1024
    /// - `FormatError::SegmentTooShort` for a length prefix below 18
    /// - `FormatError::Truncated` if the source ends inside a segment
    /// - `Error::Io` if the source fails
    pub fn next_segment(&mut self) -> Result<Option<ReadSegment>> {
        if self.done {
            return Ok(None);
        }

        let result = self.read_segment();
        if result.is_err() {
            self.finish(EndReason::Error);
        }
        result
    }

    fn read_segment(&mut self) -> Result<Option<ReadSegment>> {
        let mut prefix = [0u8; 2];
        match read_up_to(&mut self.source, &mut prefix)? {
            0 => return Ok(self.finish(EndReason::EndOfFile)),
            1 if prefix[0] == CPM_EOF => {
                debug!("CP/M EOF byte in place of a length prefix");
                return Ok(self.finish(EndReason::CpmEof));
            }
            1 => {
                return Err(FormatError::Truncated {
                    declared: prefix.len(),
                    available: 1,
                }
                .into())
            }
            _ => {}
        }

        let length = u16::from_le_bytes(prefix);
        if length == SENTINEL {
            debug!("0x1A1A sentinel length prefix");
            return Ok(self.finish(EndReason::Sentinel));
        }

        let length = length as usize;
        if length > MAX_SEGMENT_LEN {
            return Err(FormatError::PayloadTooLarge {
                length,
                max: MAX_SEGMENT_LEN,
            }
            .into());
        }
        if length < MIN_SEGMENT_LEN {
            return Err(FormatError::SegmentTooShort {
                length,
                min: MIN_SEGMENT_LEN,
            }
            .into());
        }

        let mut body = vec![0u8; length];
        let available = read_up_to(&mut self.source, &mut body)?;
        if available < length {
            if available > 0 && body[0] == CPM_EOF {
                debug!(available, "CP/M EOF byte in place of segment data");
                return Ok(self.finish(EndReason::CpmEof));
            }
            return Err(FormatError::Truncated {
                declared: length,
                available,
            }
            .into());
        }

        let segment = Segment::parse(&body)?;
        let checksum_ok = segment.checksum_ok(self.convention);
        self.stats.record(length, segment.data.len(), checksum_ok);

        let header = &segment.header;
        debug!(
            image = %format!("{:06X}", header.image_number),
            segment_lsb = header.segment_lsb,
            length,
            owner = header.owner,
            tiers = %format!("{:08X}", header.tier_bits),
            flags = %format!("{:02X}", header.flags),
            segment_number = header.segment_number,
            offset = header.offset,
            checksum_ok,
            "segment"
        );
        if !checksum_ok {
            warn!(
                index = self.stats.segments - 1,
                stored = %format!("{:04X}", segment.trailer),
                computed = %format!("{:04X}", segment.computed_checksum(self.convention)),
                "segment checksum mismatch"
            );
        }

        Ok(Some(ReadSegment {
            segment,
            checksum_ok,
        }))
    }

    fn finish(&mut self, reason: EndReason) -> Option<ReadSegment> {
        self.done = true;
        self.stats.end = Some(reason);
        None
    }
}

impl<R: Read> Iterator for ContainerReader<R> {
    type Item = Result<ReadSegment>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_segment().transpose()
    }
}

/// Fill `buf` from `source`, stopping early only at end of input.
fn read_up_to<R: Read>(source: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

/// Writes segments in container format.
#[derive(Debug)]
pub struct ContainerWriter<W: Write> {
    sink: W,
    segments: u64,
}

impl<W: Write> ContainerWriter<W> {
    pub fn new(sink: W) -> Self {
        Self { sink, segments: 0 }
    }

    /// Write one segment with its length prefix.
    ///
    /// # Errors
    /// `FormatError::PayloadTooLarge` if the segment exceeds 1024 bytes.
    pub fn write_segment(&mut self, segment: &Segment) -> Result<()> {
        let length = segment.len();
        if length > MAX_SEGMENT_LEN {
            return Err(FormatError::PayloadTooLarge {
                length,
                max: MAX_SEGMENT_LEN,
            }
            .into());
        }

        self.sink.write_all(&(length as u16).to_le_bytes())?;
        self.sink.write_all(&segment.to_bytes())?;
        self.segments += 1;
        Ok(())
    }

    /// Number of segments written so far.
    pub fn segments(&self) -> u64 {
        self.segments
    }

    /// Write the `0x1A1A` sentinel and return the sink.
    pub fn finish(mut self) -> Result<W> {
        self.sink.write_all(&SENTINEL.to_le_bytes())?;
        self.sink.flush()?;
        Ok(self.sink)
    }

    /// Return the sink without a sentinel; the container ends at end of file.
    pub fn into_inner(mut self) -> Result<W> {
        self.sink.flush()?;
        Ok(self.sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::segment::{SegmentHeader, TYPICAL_SEGMENT_LEN};
    use std::io::Cursor;

    fn segment(n: u16) -> Segment {
        let header = SegmentHeader {
            image_number: 1,
            segment_lsb: n as u8,
            tier_bits: 0x7FFF_FFFF,
            segment_number: n,
            offset: n.wrapping_mul(991),
            ..Default::default()
        };
        let data = (0..TYPICAL_SEGMENT_LEN - MIN_SEGMENT_LEN)
            .map(|i| (i as u16 ^ n) as u8)
            .collect();
        Segment::new(header, data).unwrap()
    }

    fn container(count: u16) -> Vec<u8> {
        let mut writer = ContainerWriter::new(Vec::new());
        for n in 0..count {
            writer.write_segment(&segment(n)).unwrap();
        }
        writer.into_inner().unwrap()
    }

    #[test]
    fn test_reads_all_segments() {
        let bytes = container(3);
        let mut reader = ContainerReader::new(Cursor::new(bytes));

        for n in 0..3 {
            let read = reader.next_segment().unwrap().unwrap();
            assert!(read.checksum_ok);
            assert_eq!(read.segment, segment(n));
        }
        assert!(reader.next_segment().unwrap().is_none());
        assert_eq!(reader.stats().segments, 3);
        assert_eq!(reader.stats().end, Some(EndReason::EndOfFile));
    }

    #[test]
    fn test_empty_source() {
        let mut reader = ContainerReader::new(Cursor::new(Vec::new()));
        assert!(reader.next_segment().unwrap().is_none());
        assert_eq!(reader.stats().end, Some(EndReason::EndOfFile));
    }

    #[test]
    fn test_sentinel_ends_stream() {
        let mut bytes = vec![0x1A, 0x1A];
        bytes.extend_from_slice(&container(2));

        let reader = ContainerReader::new(Cursor::new(bytes));
        let segments: Vec<_> = reader.collect();
        assert!(segments.is_empty());
    }

    #[test]
    fn test_sentinel_after_segments() {
        let mut writer = ContainerWriter::new(Vec::new());
        writer.write_segment(&segment(0)).unwrap();
        let mut bytes = writer.finish().unwrap();
        bytes.extend_from_slice(&[0xFF; 40]);

        let mut reader = ContainerReader::new(Cursor::new(bytes));
        assert!(reader.next_segment().unwrap().is_some());
        assert!(reader.next_segment().unwrap().is_none());
        assert_eq!(reader.stats().end, Some(EndReason::Sentinel));
    }

    #[test]
    fn test_payload_too_large() {
        let mut bytes = 1025u16.to_le_bytes().to_vec();
        bytes.extend_from_slice(&container(1));

        let mut reader = ContainerReader::new(Cursor::new(bytes));
        let result = reader.next_segment();
        assert!(matches!(
            result,
            Err(Error::Format(FormatError::PayloadTooLarge { length: 1025, max: 1024 }))
        ));

        // Fused after a fatal error
        assert!(reader.next_segment().unwrap().is_none());
        assert_eq!(reader.stats().segments, 0);
        assert_eq!(reader.stats().end, Some(EndReason::Error));
    }

    #[test]
    fn test_maximum_length_accepted() {
        let data = vec![0x55; MAX_SEGMENT_LEN - MIN_SEGMENT_LEN];
        let big = Segment::new(SegmentHeader::default(), data).unwrap();

        let mut writer = ContainerWriter::new(Vec::new());
        writer.write_segment(&big).unwrap();
        let bytes = writer.into_inner().unwrap();

        let read: Vec<_> = ContainerReader::new(Cursor::new(bytes))
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(read.len(), 1);
        assert_eq!(read[0].segment.len(), MAX_SEGMENT_LEN);
    }

    #[test]
    fn test_segment_too_short() {
        let mut bytes = 17u16.to_le_bytes().to_vec();
        bytes.extend_from_slice(&[0u8; 17]);

        let mut reader = ContainerReader::new(Cursor::new(bytes));
        assert!(matches!(
            reader.next_segment(),
            Err(Error::Format(FormatError::SegmentTooShort { length: 17, .. }))
        ));
    }

    #[test]
    fn test_truncated_body() {
        let mut bytes = container(1);
        bytes.truncate(500);

        let mut reader = ContainerReader::new(Cursor::new(bytes));
        assert!(matches!(
            reader.next_segment(),
            Err(Error::Format(FormatError::Truncated { declared: 1009, available: 498 }))
        ));
    }

    #[test]
    fn test_length_without_body() {
        let bytes = 1009u16.to_le_bytes().to_vec();
        let mut reader = ContainerReader::new(Cursor::new(bytes));
        assert!(matches!(
            reader.next_segment(),
            Err(Error::Format(FormatError::Truncated { available: 0, .. }))
        ));
    }

    #[test]
    fn test_cpm_eof_in_body() {
        let mut bytes = container(1);
        bytes.extend_from_slice(&1009u16.to_le_bytes());
        bytes.extend_from_slice(&[CPM_EOF; 100]);

        let mut reader = ContainerReader::new(Cursor::new(bytes));
        assert!(reader.next_segment().unwrap().unwrap().checksum_ok);
        assert!(reader.next_segment().unwrap().is_none());
        assert_eq!(reader.stats().end, Some(EndReason::CpmEof));
    }

    #[test]
    fn test_lone_trailing_byte() {
        let mut bytes = container(1);
        bytes.push(CPM_EOF);
        let mut reader = ContainerReader::new(Cursor::new(bytes));
        assert!(reader.next_segment().unwrap().is_some());
        assert!(reader.next_segment().unwrap().is_none());
        assert_eq!(reader.stats().end, Some(EndReason::CpmEof));

        let mut bytes = container(1);
        bytes.push(0x00);
        let mut reader = ContainerReader::new(Cursor::new(bytes));
        assert!(reader.next_segment().unwrap().is_some());
        assert!(matches!(
            reader.next_segment(),
            Err(Error::Format(FormatError::Truncated { declared: 2, available: 1 }))
        ));
    }

    #[test]
    fn test_bad_checksum_still_yielded() {
        let mut bytes = container(3);
        // Second segment starts after one prefix + body + its own prefix
        let data_byte = 2 + TYPICAL_SEGMENT_LEN + 2 + 20;
        bytes[data_byte] ^= 0x80;

        let reader = ContainerReader::new(Cursor::new(bytes));
        let flags: Vec<bool> = reader.map(|r| r.unwrap().checksum_ok).collect();
        assert_eq!(flags, vec![true, false, true]);
    }

    #[test]
    fn test_stats_count_corruption() {
        let mut bytes = container(2);
        bytes[2 + 30] ^= 0x01;

        let mut reader = ContainerReader::new(Cursor::new(bytes));
        while reader.next_segment().unwrap().is_some() {}

        let stats = reader.stats();
        assert_eq!(stats.segments, 2);
        assert_eq!(stats.valid, 1);
        assert_eq!(stats.invalid, 1);
        assert_eq!(stats.segment_bytes, 2 * TYPICAL_SEGMENT_LEN as u64);
    }

    #[test]
    fn test_unfinished_convention() {
        let reader = ContainerReader::with_convention(
            Cursor::new(container(1)),
            ChecksumConvention::Unfinished,
        );
        let read: Vec<_> = reader.collect::<Result<_>>().unwrap();
        assert!(!read[0].checksum_ok);
    }

    #[test]
    fn test_writer_rejects_oversized_segment() {
        let mut oversized = segment(0);
        oversized.data.resize(MAX_SEGMENT_LEN, 0);

        let mut writer = ContainerWriter::new(Vec::new());
        assert!(matches!(
            writer.write_segment(&oversized),
            Err(Error::Format(FormatError::PayloadTooLarge { .. }))
        ));
        assert_eq!(writer.segments(), 0);
    }
}
