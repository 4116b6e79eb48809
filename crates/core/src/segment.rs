//! Segment layout: the unit of transfer in a `.pak` image and on the wire.
//!
//! # Segment Format
//!
//! ```text
//! +----------------------+
//! | image_number (3)     |  big-endian
//! | segment_lsb (1)      |  low byte of the segment index
//! | owner (1)            |  opaque
//! | tier_bits (4)        |  big-endian
//! | reserved (2)         |  uninterpreted
//! | flags (1)            |  packet type and flags, opaque
//! | segment_number (2)   |  little-endian
//! | offset (2)           |  big-endian
//! +----------------------+
//! | data                 |  length - 18 bytes
//! | (variable)           |
//! +----------------------+
//! | trailer (2)          |  big-endian checksum of header ++ data
//! +----------------------+
//! ```
//!
//! Total length is at most [`MAX_SEGMENT_LEN`]; images normally use
//! [`TYPICAL_SEGMENT_LEN`].

use crate::addressing::Tier;
use crate::checksum::{self, ChecksumConvention};
use crate::error::{Error, FormatError, Result};

/// Size of the segment header in bytes
pub const HEADER_SIZE: usize = 16;

/// Size of the checksum trailer in bytes
pub const TRAILER_SIZE: usize = 2;

/// Smallest possible segment: header and trailer, no data
pub const MIN_SEGMENT_LEN: usize = HEADER_SIZE + TRAILER_SIZE;

/// Largest segment a container may hold
pub const MAX_SEGMENT_LEN: usize = 1024;

/// Segment length used by stored images
pub const TYPICAL_SEGMENT_LEN: usize = 1009;

/// Parsed 16-byte segment header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SegmentHeader {
    /// Source program image (24 bits)
    pub image_number: u32,
    /// Low byte of the segment index
    pub segment_lsb: u8,
    pub owner: u8,
    /// Access-control mask
    pub tier_bits: u32,
    /// Two bytes nobody has assigned a meaning to
    pub reserved: [u8; 2],
    /// Packet type and flag bits
    pub flags: u8,
    pub segment_number: u16,
    /// Byte offset of this segment's data within the image
    pub offset: u16,
}

impl SegmentHeader {
    /// Decode a header. Every byte pattern is a valid header.
    pub fn parse(bytes: &[u8; HEADER_SIZE]) -> Self {
        Self {
            image_number: u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]]),
            segment_lsb: bytes[3],
            owner: bytes[4],
            tier_bits: u32::from_be_bytes([bytes[5], bytes[6], bytes[7], bytes[8]]),
            reserved: [bytes[9], bytes[10]],
            flags: bytes[11],
            segment_number: u16::from_le_bytes([bytes[12], bytes[13]]),
            offset: u16::from_be_bytes([bytes[14], bytes[15]]),
        }
    }

    /// Encode the header. Only the low 24 bits of `image_number` are kept.
    #[rustfmt::skip]
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let image = self.image_number.to_be_bytes();
        let tier = self.tier_bits.to_be_bytes();
        let segment = self.segment_number.to_le_bytes();
        let offset = self.offset.to_be_bytes();

        [
            image[1], image[2], image[3],
            self.segment_lsb,
            self.owner,
            tier[0], tier[1], tier[2], tier[3],
            self.reserved[0], self.reserved[1],
            self.flags,
            segment[0], segment[1],
            offset[0], offset[1],
        ]
    }

    /// Tier bits as a [`Tier`].
    pub fn tier(&self) -> Tier {
        Tier::from_raw(self.tier_bits)
    }
}

/// A complete segment: header, data and stored trailer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub header: SegmentHeader,
    pub data: Vec<u8>,
    /// Checksum as stored, which may not match the contents
    pub trailer: u16,
}

impl Segment {
    /// Build and sign a new segment with a finished-convention trailer.
    ///
    /// # Errors
    /// `FormatError::PayloadTooLarge` if the segment would exceed
    /// [`MAX_SEGMENT_LEN`].
    pub fn new(header: SegmentHeader, data: Vec<u8>) -> Result<Self> {
        let length = MIN_SEGMENT_LEN + data.len();
        if length > MAX_SEGMENT_LEN {
            return Err(FormatError::PayloadTooLarge {
                length,
                max: MAX_SEGMENT_LEN,
            }
            .into());
        }

        let mut segment = Self {
            header,
            data,
            trailer: 0,
        };
        segment.trailer = segment.computed_checksum(ChecksumConvention::Finished);
        Ok(segment)
    }

    /// Split a segment body (without its length prefix) into its parts.
    ///
    /// The trailer is stored as found; checking it is up to the caller.
    ///
    /// # Errors
    /// - `FormatError::SegmentTooShort` below [`MIN_SEGMENT_LEN`]
    /// - `FormatError::PayloadTooLarge` above [`MAX_SEGMENT_LEN`]
    pub fn parse(body: &[u8]) -> Result<Self> {
        if body.len() < MIN_SEGMENT_LEN {
            return Err(FormatError::SegmentTooShort {
                length: body.len(),
                min: MIN_SEGMENT_LEN,
            }
            .into());
        }
        if body.len() > MAX_SEGMENT_LEN {
            return Err(FormatError::PayloadTooLarge {
                length: body.len(),
                max: MAX_SEGMENT_LEN,
            }
            .into());
        }

        let (header, rest) = body.split_at(HEADER_SIZE);
        let (data, trailer) = rest.split_at(rest.len() - TRAILER_SIZE);

        let mut header_bytes = [0u8; HEADER_SIZE];
        header_bytes.copy_from_slice(header);

        Ok(Self {
            header: SegmentHeader::parse(&header_bytes),
            data: data.to_vec(),
            trailer: u16::from_be_bytes([trailer[0], trailer[1]]),
        })
    }

    /// Serialize header ++ data ++ trailer.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.len());
        bytes.extend_from_slice(&self.header.to_bytes());
        bytes.extend_from_slice(&self.data);
        bytes.extend_from_slice(&self.trailer.to_be_bytes());
        bytes
    }

    /// Total length on disk, excluding the container length prefix.
    pub fn len(&self) -> usize {
        MIN_SEGMENT_LEN + self.data.len()
    }

    /// Checksum over header ++ data, never including the trailer.
    pub fn computed_checksum(&self, convention: ChecksumConvention) -> u16 {
        let state = checksum::update(checksum::init(), &self.header.to_bytes());
        convention.apply(checksum::update(state, &self.data))
    }

    /// Whether the stored trailer matches the contents.
    pub fn checksum_ok(&self, convention: ChecksumConvention) -> bool {
        self.computed_checksum(convention) == self.trailer
    }

    /// Like [`Segment::checksum_ok`], as an error.
    ///
    /// # Errors
    /// `Error::ChecksumMismatch` with the stored and computed values.
    pub fn verify(&self, convention: ChecksumConvention) -> Result<()> {
        let actual = self.computed_checksum(convention);
        if actual != self.trailer {
            return Err(Error::ChecksumMismatch {
                expected: self.trailer,
                actual,
            });
        }
        Ok(())
    }
}
