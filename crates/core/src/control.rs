//! Control packets addressed to adaptors.
//!
//! # Set Tiers Packet
//!
//! ```text
//! +-------------------+
//! | box address (4)   |  big-endian, identity bit set
//! +-------------------+
//! | command (1)       |  0x81 = set tiers
//! +-------------------+
//! | tier bits (4)     |  big-endian
//! +-------------------+
//! | zero (7)          |
//! +-------------------+
//! | nonce (2)         |  chosen so the packet checksum hits the target
//! +-------------------+
//! ```
//!
//! The adaptor accepts the packet when the checksum register, run over all
//! 18 bytes, lands on a fixed target. The nonce is found by trying every
//! value: the nonce space is small enough to search exhaustively, and any
//! hit is as good as any other.

use crate::addressing::{BoxAddress, Tier};
use crate::checksum;
use crate::error::Result;
use crate::segment::HEADER_SIZE;

/// Command byte: set tiers.
pub const CMD_SET_TIERS: u8 = 0x81;

/// Width of the searched nonce field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonceWidth {
    /// One byte, 256 candidates
    Byte,
    /// Two bytes big-endian, 65536 candidates
    Word,
}

impl NonceWidth {
    /// Encoded length of a nonce in bytes.
    pub fn bytes(self) -> usize {
        match self {
            NonceWidth::Byte => 1,
            NonceWidth::Word => 2,
        }
    }

    /// Number of candidate values.
    pub fn candidates(self) -> u32 {
        1 << (8 * self.bytes())
    }

    /// Encode a nonce; only the low `bytes()` bytes are kept.
    pub fn encode(self, nonce: u16) -> Vec<u8> {
        match self {
            NonceWidth::Byte => vec![nonce as u8],
            NonceWidth::Word => nonce.to_be_bytes().to_vec(),
        }
    }
}

/// Brute-force search for trailing bytes that steer the checksum to a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollisionSearch {
    /// Register value the completed packet must produce
    pub target: u16,
    pub nonce_width: NonceWidth,
}

impl Default for CollisionSearch {
    /// Adaptor acceptance: a two-byte nonce landing on [`checksum::RESIDUE`].
    fn default() -> Self {
        Self {
            target: checksum::RESIDUE,
            nonce_width: NonceWidth::Word,
        }
    }
}

impl CollisionSearch {
    pub fn new(target: u16, nonce_width: NonceWidth) -> Self {
        Self {
            target,
            nonce_width,
        }
    }

    /// Every nonce, in ascending order, for which
    /// `update(state, nonce) == target`.
    pub fn search(&self, state: u16) -> Vec<u16> {
        (0..self.nonce_width.candidates())
            .map(|candidate| candidate as u16)
            .filter(|&nonce| self.matches(state, nonce))
            .collect()
    }

    /// Search from the running checksum of `prefix`.
    pub fn search_after(&self, prefix: &[u8]) -> Vec<u16> {
        self.search(checksum::update(checksum::init(), prefix))
    }

    fn matches(&self, state: u16, nonce: u16) -> bool {
        checksum::update(state, &self.nonce_width.encode(nonce)) == self.target
    }
}

/// A "set tiers" control packet and the nonces that complete it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetTiersPacket {
    pub header: [u8; HEADER_SIZE],
    /// Every nonce that makes the packet checksum hit the target
    pub nonces: Vec<u16>,
    pub nonce_width: NonceWidth,
}

impl SetTiersPacket {
    /// Complete packet bytes for one of the nonces.
    pub fn to_bytes(&self, nonce: u16) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_SIZE + self.nonce_width.bytes());
        bytes.extend_from_slice(&self.header);
        bytes.extend_from_slice(&self.nonce_width.encode(nonce));
        bytes
    }

    /// The first nonce found, if any.
    pub fn nonce(&self) -> Option<u16> {
        self.nonces.first().copied()
    }
}

/// Header of a set-tiers packet.
pub fn set_tiers_header(address: BoxAddress, tier: Tier) -> [u8; HEADER_SIZE] {
    let mut header = [0u8; HEADER_SIZE];
    header[0..4].copy_from_slice(&address.to_be_bytes());
    header[4] = CMD_SET_TIERS;
    header[5..9].copy_from_slice(&tier.to_be_bytes());
    header
}

/// Build a set-tiers packet with the adaptor acceptance search.
///
/// # Errors
/// `ControlError::MissingIdentityBit` if `box_address` is neither unicast nor
/// broadcast.
pub fn build_set_tiers_packet(box_address: u32, tier_value: u32) -> Result<SetTiersPacket> {
    build_set_tiers_packet_with(box_address, tier_value, &CollisionSearch::default())
}

/// Build a set-tiers packet with an explicit collision search.
///
/// # Errors
/// `ControlError::MissingIdentityBit` as for [`build_set_tiers_packet`].
pub fn build_set_tiers_packet_with(
    box_address: u32,
    tier_value: u32,
    search: &CollisionSearch,
) -> Result<SetTiersPacket> {
    let address = BoxAddress::new(box_address)?;
    let header = set_tiers_header(address, Tier::from_raw(tier_value));
    let nonces = search.search_after(&header);

    tracing::debug!(
        address = %format!("{:08X}", box_address),
        tiers = %format!("{:08X}", tier_value),
        collisions = nonces.len(),
        "set tiers packet"
    );

    Ok(SetTiersPacket {
        header,
        nonces,
        nonce_width: search.nonce_width,
    })
}
