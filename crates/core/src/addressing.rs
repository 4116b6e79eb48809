//! Box addresses and tier bits.
//!
//! Both are 32-bit big-endian values on the wire whose most significant bit
//! selects an interpretation:
//!
//! ```text
//! box address  MSB set   unicast, low 31 bits are the adaptor identity
//!              all ones  broadcast to every adaptor
//! tier bits    MSB clear AND mode: any common set bit grants access
//!              MSB set   XOR mode: value must match the adaptor exactly
//! ```

use crate::error::{ControlError, Result};

/// Tier bits: AND-mode selector.
pub const TIER_AND: u32 = 0x0000_0000;

/// Tier bits: XOR-mode selector.
pub const TIER_XOR: u32 = 0x8000_0000;

/// Tier bits: full-access AND mask.
pub const TIER_AND_MAX: u32 = 0x7FFF_FFFF;

/// Box address: every adaptor.
pub const BOXADDR_BROADCAST: u32 = 0xFFFF_FFFF;

/// Box address: bit that must be set on every valid address.
pub const BOXADDR_IDENT_BIT: u32 = 0x8000_0000;

/// Address of one adaptor, or of all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoxAddress(u32);

impl BoxAddress {
    /// Broadcast address.
    pub const BROADCAST: BoxAddress = BoxAddress(BOXADDR_BROADCAST);

    /// Validate a raw address.
    ///
    /// # Errors
    /// `ControlError::MissingIdentityBit` if the identity bit is clear. The
    /// bit is never set on the caller's behalf.
    pub fn new(address: u32) -> Result<Self> {
        if address & BOXADDR_IDENT_BIT == 0 {
            return Err(ControlError::MissingIdentityBit { address }.into());
        }
        Ok(Self(address))
    }

    /// Unicast address for an adaptor identity (low 31 bits).
    pub fn unicast(identity: u32) -> Self {
        Self(BOXADDR_IDENT_BIT | (identity & !BOXADDR_IDENT_BIT))
    }

    /// Raw 32-bit value.
    pub fn value(self) -> u32 {
        self.0
    }

    pub fn is_broadcast(self) -> bool {
        self.0 == BOXADDR_BROADCAST
    }

    /// Adaptor identity (low 31 bits).
    pub fn identity(self) -> u32 {
        self.0 & !BOXADDR_IDENT_BIT
    }

    /// Whether a frame with this address is for the adaptor `identity`.
    pub fn accepts(self, identity: u32) -> bool {
        self.is_broadcast() || self.identity() == identity & !BOXADDR_IDENT_BIT
    }

    pub fn to_be_bytes(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }
}

/// How a [`Tier`] value is matched against an adaptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TierMode {
    And,
    Xor,
}

/// 32-bit access-control value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tier(u32);

impl Tier {
    /// Full access in AND mode.
    pub const ALL: Tier = Tier(TIER_AND | TIER_AND_MAX);

    /// Wrap a raw value as found in a header or on the wire.
    pub fn from_raw(value: u32) -> Self {
        Self(value)
    }

    /// AND-mode tier over the low 31 bits of `mask`.
    pub fn and(mask: u32) -> Self {
        Self(TIER_AND | (mask & TIER_AND_MAX))
    }

    /// XOR-mode tier over the low 31 bits of `value`.
    pub fn xor(value: u32) -> Self {
        Self(TIER_XOR | (value & TIER_AND_MAX))
    }

    /// Raw 32-bit value.
    pub fn value(self) -> u32 {
        self.0
    }

    pub fn mode(self) -> TierMode {
        if self.0 & TIER_XOR == 0 {
            TierMode::And
        } else {
            TierMode::Xor
        }
    }

    /// The low 31 bits, without the mode selector.
    pub fn mask(self) -> u32 {
        self.0 & TIER_AND_MAX
    }

    /// Whether an adaptor holding `receiver_tiers` may use this segment.
    ///
    /// Only the low 31 bits of `receiver_tiers` take part.
    pub fn grants(self, receiver_tiers: u32) -> bool {
        let receiver = receiver_tiers & TIER_AND_MAX;
        match self.mode() {
            TierMode::And => self.mask() & receiver != 0,
            TierMode::Xor => self.mask() == receiver,
        }
    }

    pub fn to_be_bytes(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_box_address_requires_ident_bit() {
        assert!(BoxAddress::new(0x8001_1887).is_ok());
        assert!(BoxAddress::new(BOXADDR_BROADCAST).is_ok());

        let result = BoxAddress::new(0x0001_1887);
        assert!(matches!(
            result,
            Err(Error::Control(ControlError::MissingIdentityBit { address: 0x0001_1887 }))
        ));
    }

    #[test]
    fn test_box_address_fields() {
        let addr = BoxAddress::new(0x8001_1887).unwrap();
        assert_eq!(addr.identity(), 0x0001_1887);
        assert!(!addr.is_broadcast());
        assert!(addr.accepts(0x0001_1887));
        assert!(!addr.accepts(0x0001_1888));
        assert_eq!(addr.to_be_bytes(), [0x80, 0x01, 0x18, 0x87]);

        assert_eq!(BoxAddress::unicast(0x0001_1887), addr);
        assert!(BoxAddress::BROADCAST.is_broadcast());
        assert!(BoxAddress::BROADCAST.accepts(0x1234));
    }

    #[test]
    fn test_tier_and_mode() {
        let tier = Tier::and(0b0110);
        assert_eq!(tier.mode(), TierMode::And);
        assert!(tier.grants(0b0010));
        assert!(tier.grants(0b1100));
        assert!(!tier.grants(0b1001));
        assert!(!tier.grants(0));

        assert!(Tier::ALL.grants(1));
        assert_eq!(Tier::ALL.value(), TIER_AND_MAX);
        // The selector bit never counts as a tier
        assert!(!Tier::and(0).grants(TIER_XOR));
    }

    #[test]
    fn test_tier_xor_mode() {
        let tier = Tier::xor(0x1234);
        assert_eq!(tier.mode(), TierMode::Xor);
        assert_eq!(tier.value(), 0x8000_1234);
        assert!(tier.grants(0x1234));
        assert!(!tier.grants(0x1235));
        assert!(!tier.grants(0x1234 | 0x10000));
    }

    #[test]
    fn test_tier_from_raw() {
        assert_eq!(Tier::from_raw(0x7FFF_FFFF).mode(), TierMode::And);
        assert_eq!(Tier::from_raw(0x8000_0001).mode(), TierMode::Xor);
        assert_eq!(Tier::from_raw(0x8000_0001).mask(), 1);
    }
}
