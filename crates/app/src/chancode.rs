//! Adaptor channel codes.
//!
//! The user enters a five-digit hex code on the NABU PC: four digits of PLL
//! tuning word plus one check nibble. The tuning word is also the local
//! oscillator frequency in MHz.

use anyhow::{bail, Context, Result};

/// Offset from the local oscillator to the channel centre, in MHz
/// (57 MHz IF with the 12.5 kHz FCC offset).
pub const LO_OFFSET_MHZ: f64 = 56.9875;

/// Half-width of the received channel, in MHz.
pub const HALF_BANDWIDTH_MHZ: f64 = 3.0;

/// Input filter passband, in MHz.
pub const FILTER_LOW_MHZ: f64 = 260.0;
pub const FILTER_HIGH_MHZ: f64 = 280.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelCode {
    pub tuning_word: u16,
}

impl ChannelCode {
    /// Parse the first four digits of a channel code.
    pub fn parse(digits: &str) -> Result<Self> {
        if digits.len() != 4 {
            bail!("Please provide the first four digits of the channel code, in hex");
        }
        let tuning_word = u16::from_str_radix(digits, 16)
            .with_context(|| format!("'{digits}' is not a hex channel code"))?;
        Ok(ChannelCode { tuning_word })
    }

    /// Check nibble: the sum of the four digits, with every second digit
    /// doubled and its carry wrapped back into bit 0.
    pub fn check_nibble(&self) -> u8 {
        let mut sum = 0u8;
        for b in 0..4 {
            let mut a = ((self.tuning_word >> (12 - 4 * b)) & 0x0F) as u8;
            if b & 1 == 1 {
                a <<= 1;
                if a & 0x10 != 0 {
                    a = (a & 0x0F) + 1;
                }
            }
            sum = sum.wrapping_add(a);
        }
        sum & 0x0F
    }

    /// The five-digit code as entered on the PC.
    pub fn full_code(&self) -> String {
        format!("{:04X}{:X}", self.tuning_word, self.check_nibble())
    }

    pub fn local_oscillator_mhz(&self) -> u16 {
        self.tuning_word
    }

    pub fn centre_mhz(&self) -> f64 {
        f64::from(self.tuning_word) - LO_OFFSET_MHZ
    }

    /// Whether the whole channel lies inside the input filter.
    pub fn within_filter(&self) -> bool {
        let centre = self.centre_mhz();
        centre - HALF_BANDWIDTH_MHZ >= FILTER_LOW_MHZ && centre + HALF_BANDWIDTH_MHZ <= FILTER_HIGH_MHZ
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(digits: &str) -> ChannelCode {
        ChannelCode::parse(digits).unwrap()
    }

    #[test]
    fn test_check_nibble() {
        assert_eq!(code("0145").check_nibble(), 0x0);
        assert_eq!(code("0112").check_nibble(), 0x7);
        assert_eq!(code("FFFF").check_nibble(), 0xC);
        assert_eq!(code("0112").full_code(), "01127");
    }

    #[test]
    fn test_frequencies() {
        let c = code("0145");
        assert_eq!(c.local_oscillator_mhz(), 0x145);
        assert!((c.centre_mhz() - 268.0125).abs() < 1e-9);
        assert!(c.within_filter());
    }

    #[test]
    fn test_out_of_band() {
        assert!(!code("0112").within_filter());
        assert!(!code("FFFF").within_filter());
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(ChannelCode::parse("145").is_err());
        assert!(ChannelCode::parse("01450").is_err());
        assert!(ChannelCode::parse("01G5").is_err());
    }
}
