//! Table-driven 16-bit checksum used by HCCA segments and control packets.
//!
//! The register is a CRC over generator polynomial `0x1021`, processed
//! MSB-first, starting from `0xFFFF`. It is updated a byte at a time through
//! two nibble tables, each stored as separate high-byte and low-byte halves:
//!
//! ```text
//! index 0..16   contribution of the low nibble of the index byte
//! index 16..32  contribution of the high nibble (nibble | 16)
//! ```
//!
//! Because the CRC is linear, the contribution of a full index byte is the XOR
//! of its two nibble contributions, so 32 entries replace a 256-entry table.
//! The tables are generated from the polynomial at compile time.
//!
//! # Finishing convention
//!
//! Stored `.pak` trailers hold the *finished* value (`state ^ 0xFFFF`, the
//! CRC-16/GENIBUS convention). Some call sites compare the unfinished running
//! value instead, so the convention is a caller-visible choice via
//! [`ChecksumConvention`].
//!
//! # Example
//! ```
//! use nabu_hcca_core::checksum;
//!
//! let state = checksum::update(checksum::init(), b"123456789");
//! assert_eq!(state, 0x29B1);
//! assert_eq!(checksum::finalize(state), 0xD64E);
//! ```

/// Generator polynomial of the checksum register.
pub const POLYNOMIAL: u16 = 0x1021;

/// Initial register value.
pub const INIT: u16 = 0xFFFF;

/// XOR applied by [`finalize`].
pub const FINAL_XOR: u16 = 0xFFFF;

/// Register value left after running the engine over any message followed by
/// its finished checksum (big-endian).
///
/// The HCCA control-packet receivers accept a packet when its checksum lands
/// on this value. The protocol never states where the number comes from; it
/// is exactly the residue of this polynomial under the finished convention,
/// which the tests check.
pub const RESIDUE: u16 = 0x1D0F;

/// Which finishing transform a stored checksum uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChecksumConvention {
    /// Raw running register value.
    Unfinished,
    /// Register value XORed with [`FINAL_XOR`]. Used by `.pak` trailers.
    #[default]
    Finished,
}

impl ChecksumConvention {
    /// Apply this convention to a running state.
    pub fn apply(self, state: u16) -> u16 {
        match self {
            ChecksumConvention::Unfinished => state,
            ChecksumConvention::Finished => finalize(state),
        }
    }
}

/// Nibble lookup tables, split into high and low byte halves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NibbleTables {
    /// High byte of each nibble contribution
    pub hi: [u8; 32],
    /// Low byte of each nibble contribution
    pub lo: [u8; 32],
}

impl NibbleTables {
    /// Build the tables for a generator polynomial.
    ///
    /// Entry `n` (0..16) is the register contribution of index byte `n`;
    /// entry `n | 16` is the contribution of index byte `n << 4`.
    pub const fn generate(polynomial: u16) -> Self {
        let mut hi = [0u8; 32];
        let mut lo = [0u8; 32];

        let mut n = 0;
        while n < 16 {
            let low = byte_contribution(n as u8, polynomial);
            let high = byte_contribution((n as u8) << 4, polynomial);

            hi[n] = (low >> 8) as u8;
            lo[n] = low as u8;
            hi[n | 16] = (high >> 8) as u8;
            lo[n | 16] = high as u8;

            n += 1;
        }

        Self { hi, lo }
    }
}

/// Shift a single byte through the register MSB-first.
const fn byte_contribution(byte: u8, polynomial: u16) -> u16 {
    let mut reg = (byte as u16) << 8;
    let mut bit = 0;
    while bit < 8 {
        reg = if reg & 0x8000 != 0 {
            (reg << 1) ^ polynomial
        } else {
            reg << 1
        };
        bit += 1;
    }
    reg
}

/// Tables for [`POLYNOMIAL`], built at compile time.
pub const TABLES: NibbleTables = NibbleTables::generate(POLYNOMIAL);

/// Initial checksum state.
pub fn init() -> u16 {
    INIT
}

/// Run the register over `bytes`, starting from `state`.
///
/// Streaming is exact: `update(update(s, a), b) == update(s, a ++ b)`.
pub fn update(state: u16, bytes: &[u8]) -> u16 {
    let mut acc_hi = (state >> 8) as u8;
    let mut acc_lo = state as u8;

    for &byte in bytes {
        let index = (acc_hi ^ byte) as usize;
        let low = index & 15;
        let high = (index >> 4) | 16;

        acc_hi = acc_lo ^ TABLES.hi[low] ^ TABLES.hi[high];
        acc_lo = TABLES.lo[low] ^ TABLES.lo[high];
    }

    ((acc_hi as u16) << 8) | acc_lo as u16
}

/// Apply the finishing transform.
pub fn finalize(state: u16) -> u16 {
    state ^ FINAL_XOR
}

/// Checksum of a whole buffer under the given convention.
pub fn checksum(bytes: &[u8], convention: ChecksumConvention) -> u16 {
    convention.apply(update(init(), bytes))
}
