//! Wire frames as sent to an adaptor.
//!
//! # Frame Format
//!
//! ```text
//! +-------------------+
//! | flag (1+)         |  0x7E, repeated; four lets a descrambler resync
//! +-------------------+
//! | box address (4)   |  big-endian
//! +-------------------+
//! | tier bits (4)     |  big-endian
//! +-------------------+
//! | payload           |
//! | (variable)        |
//! +-------------------+
//! ```
//!
//! Every bit of the frame, flags included, goes through the scrambler in
//! transmission bit order. The first address byte always has its top bit set,
//! so a flag must have it clear: otherwise a broadcast address (`FF FF FF FF`)
//! would run on from a `0xFF` flag and the frame boundary would be lost.
//! Flags with bit 7 set are rejected with [`WireError::InvalidFlag`].

use crate::addressing::{BoxAddress, Tier, BOXADDR_IDENT_BIT};
use crate::bitio::BitOrder;
use crate::error::{Result, WireError};
use crate::scrambler::{Descrambler, Scrambler};
use crate::segment::Segment;

/// Default synchronization flag byte.
pub const FLAG: u8 = 0x7E;

/// Flags sent ahead of each frame by default.
pub const DEFAULT_FLAG_COUNT: usize = 4;

/// Address and tier bytes following the flags.
pub const ADDRESSING_SIZE: usize = 8;

/// Check that `flag` can never be confused with a first address byte.
///
/// # Errors
/// `WireError::InvalidFlag` if bit 7 is set.
pub fn validate_flag(flag: u8) -> Result<u8> {
    let ident_bit = (BOXADDR_IDENT_BIT >> 24) as u8;
    if flag & ident_bit != 0 {
        return Err(WireError::InvalidFlag { flag }.into());
    }
    Ok(flag)
}

/// One addressed frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireFrame {
    pub address: BoxAddress,
    pub tier: Tier,
    pub payload: Vec<u8>,
}

impl WireFrame {
    pub fn new(address: BoxAddress, tier: Tier, payload: Vec<u8>) -> Self {
        Self {
            address,
            tier,
            payload,
        }
    }

    /// Carry a stored segment, addressed with the segment's own tier bits.
    pub fn from_segment(address: BoxAddress, segment: &Segment) -> Self {
        Self::new(address, segment.header.tier(), segment.to_bytes())
    }

    /// Serialize with `flag_count` copies of `flag` in front (at least one).
    ///
    /// # Errors
    /// `WireError::InvalidFlag` if `flag` has bit 7 set.
    pub fn to_bytes(&self, flag: u8, flag_count: usize) -> Result<Vec<u8>> {
        Ok(self.serialize(validate_flag(flag)?, flag_count))
    }

    fn serialize(&self, flag: u8, flag_count: usize) -> Vec<u8> {
        let flag_count = flag_count.max(1);
        let mut bytes = Vec::with_capacity(flag_count + ADDRESSING_SIZE + self.payload.len());

        bytes.resize(flag_count, flag);
        bytes.extend_from_slice(&self.address.to_be_bytes());
        bytes.extend_from_slice(&self.tier.to_be_bytes());
        bytes.extend_from_slice(&self.payload);

        bytes
    }

    /// Parse a descrambled frame, skipping any number of leading flags.
    ///
    /// # Errors
    /// - `WireError::InvalidFlag` if `flag` has bit 7 set
    /// - `WireError::MissingFlag` if the first byte is not `flag`
    /// - `WireError::FrameTooShort` if address and tier are incomplete
    /// - `ControlError::MissingIdentityBit` for an invalid address
    pub fn parse(bytes: &[u8], flag: u8) -> Result<Self> {
        let flag = validate_flag(flag)?;
        let flags = bytes.iter().take_while(|&&b| b == flag).count();
        if flags == 0 {
            return Err(WireError::MissingFlag { flag }.into());
        }

        let rest = &bytes[flags..];
        if rest.len() < ADDRESSING_SIZE {
            return Err(WireError::FrameTooShort {
                required: ADDRESSING_SIZE,
                actual: rest.len(),
            }
            .into());
        }

        let address = u32::from_be_bytes([rest[0], rest[1], rest[2], rest[3]]);
        let tier = u32::from_be_bytes([rest[4], rest[5], rest[6], rest[7]]);

        Ok(Self {
            address: BoxAddress::new(address)?,
            tier: Tier::from_raw(tier),
            payload: rest[ADDRESSING_SIZE..].to_vec(),
        })
    }
}

/// Transmit side of one stream: frames in, scrambled bytes out.
#[derive(Debug, Clone)]
pub struct WireEncoder {
    scrambler: Scrambler,
    order: BitOrder,
    flag: u8,
    flag_count: usize,
}

impl WireEncoder {
    pub fn new(scrambler: Scrambler, order: BitOrder) -> Self {
        Self {
            scrambler,
            order,
            flag: FLAG,
            flag_count: DEFAULT_FLAG_COUNT,
        }
    }

    /// Use a different flag byte and count.
    ///
    /// # Errors
    /// `WireError::InvalidFlag` if `flag` has bit 7 set.
    pub fn with_flags(mut self, flag: u8, flag_count: usize) -> Result<Self> {
        self.flag = validate_flag(flag)?;
        self.flag_count = flag_count.max(1);
        Ok(self)
    }

    /// Scramble a frame. The register carries over to the next frame.
    pub fn encode(&mut self, frame: &WireFrame) -> Vec<u8> {
        let bytes = frame.serialize(self.flag, self.flag_count);
        self.scrambler.scramble_bytes(&bytes, self.order)
    }

    pub fn scrambler(&self) -> &Scrambler {
        &self.scrambler
    }
}

/// Receive side of one stream: scrambled bytes in, frames out.
#[derive(Debug, Clone)]
pub struct WireDecoder {
    descrambler: Descrambler,
    order: BitOrder,
    flag: u8,
}

impl WireDecoder {
    pub fn new(descrambler: Descrambler, order: BitOrder) -> Self {
        Self {
            descrambler,
            order,
            flag: FLAG,
        }
    }

    /// Expect a different flag byte.
    ///
    /// # Errors
    /// `WireError::InvalidFlag` if `flag` has bit 7 set.
    pub fn with_flag(mut self, flag: u8) -> Result<Self> {
        self.flag = validate_flag(flag)?;
        Ok(self)
    }

    /// Descramble received bytes without interpreting them.
    pub fn descramble(&mut self, bytes: &[u8]) -> Vec<u8> {
        self.descrambler.descramble_bytes(bytes, self.order)
    }

    /// Descramble and parse one frame.
    ///
    /// The register always advances over `bytes`, even if parsing fails.
    ///
    /// # Errors
    /// As for [`WireFrame::parse`].
    pub fn decode(&mut self, bytes: &[u8]) -> Result<WireFrame> {
        let plain = self.descramble(bytes);
        WireFrame::parse(&plain, self.flag)
    }

    pub fn descrambler(&self) -> &Descrambler {
        &self.descrambler
    }
}
