//! Error types for the HCCA codec.
//!
//! Format and truncation errors are fatal for a container stream. A checksum
//! mismatch is not an error from the reader's point of view: the segment is
//! still yielded and flagged, so callers can count corruption and move on.

use thiserror::Error;

/// Top-level error type for all operations in the codec.
///
/// Each variant corresponds to a specific failure domain:
/// - Format: container/segment layout violations
/// - Control: control-packet construction preconditions
/// - Wire: wire-frame parsing
/// - Bit I/O: reading/writing bits from/to byte buffers
/// - Checksum: explicit verification of a segment trailer
/// - I/O: the underlying byte source or sink
#[derive(Debug, Error)]
pub enum Error {
    /// Container or segment layout violation
    #[error("format error: {0}")]
    Format(#[from] FormatError),

    /// Control packet could not be built
    #[error("control packet error: {0}")]
    Control(#[from] ControlError),

    /// Wire frame could not be parsed
    #[error("wire frame error: {0}")]
    Wire(#[from] WireError),

    /// Bit I/O operation failed (e.g., reading past end of buffer)
    #[error("bit I/O error: {0}")]
    BitIo(#[from] BitIoError),

    /// Stored trailer does not match the computed checksum
    #[error("checksum mismatch: trailer {expected:#06x}, computed {actual:#06x}")]
    ChecksumMismatch { expected: u16, actual: u16 },

    /// Reading from the source or writing to the sink failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Container and segment layout errors. All of them end the stream.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    /// Length prefix above the segment size cap
    #[error("segment length {length} exceeds maximum {max}")]
    PayloadTooLarge { length: usize, max: usize },

    /// Fewer bytes available than the length prefix declared
    #[error("truncated segment: declared {declared} bytes, only {available} available")]
    Truncated { declared: usize, available: usize },

    /// Length prefix too small to hold a header and trailer
    #[error("segment length {length} is below the minimum {min}")]
    SegmentTooShort { length: usize, min: usize },
}

/// Control-packet construction errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ControlError {
    /// Box address without the unicast identity bit
    #[error("box address {address:#010x} does not have the identity bit set")]
    MissingIdentityBit { address: u32 },
}

/// Wire-frame parsing errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    /// Flag byte with bit 7 set, which an address byte could continue
    #[error("flag byte {flag:#04x} has its top bit set")]
    InvalidFlag { flag: u8 },

    /// Frame did not start with at least one flag byte
    #[error("frame does not start with flag byte {flag:#04x}")]
    MissingFlag { flag: u8 },

    /// Not enough bytes after the flags for address and tier
    #[error("frame too short: need at least {required} bytes after flags, got {actual}")]
    FrameTooShort { required: usize, actual: usize },
}

/// Bit-level I/O errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BitIoError {
    /// Attempted to read past the end of the buffer
    #[error("unexpected end of bit stream")]
    UnexpectedEof,
}

/// Type alias for Result with our Error type
pub type Result<T> = std::result::Result<T, Error>;
