//! Bit-level I/O for serializing bytes in transmission bit order.
//!
//! The scrambler works on one bit at a time, so whole frames are serialized
//! through a [`BitReader`], transformed bit by bit, and collected again by a
//! [`BitWriter`]. Both sides agree on a [`BitOrder`] that decides which end of
//! each byte goes on the wire first.
//!
//! # Padding Rules
//! - BitWriter: pads an incomplete final byte with zeros
//! - BitReader: ignores nothing; the caller tracks how many bits are valid
//!
//! # Example
//! ```
//! use nabu_hcca_core::bitio::{BitOrder, BitReader, BitWriter};
//!
//! let mut writer = BitWriter::new(BitOrder::LsbFirst);
//! for bit in [true, false, true, true, true] {
//!     writer.write_bit(bit);
//! }
//!
//! let bytes = writer.finish();
//! assert_eq!(bytes, vec![0b0001_1101]);
//!
//! let bits: Vec<bool> = BitReader::new(&bytes, BitOrder::LsbFirst).take(5).collect();
//! assert_eq!(bits, vec![true, false, true, true, true]);
//! ```

use crate::error::{BitIoError, Result};

/// Order in which the bits of each byte are transmitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BitOrder {
    /// Bit 7 first.
    MsbFirst,
    /// Bit 0 first, as a UART shifts a byte out.
    #[default]
    LsbFirst,
}

impl BitOrder {
    /// Mask of the `index`-th transmitted bit (0-7) within a byte.
    fn mask(self, index: u8) -> u8 {
        match self {
            BitOrder::MsbFirst => 0x80 >> index,
            BitOrder::LsbFirst => 0x01 << index,
        }
    }
}

/// Writes bits into a byte buffer in a fixed [`BitOrder`].
///
/// # Invariants
/// - `bit_count` is always < 8
#[derive(Debug, Clone)]
pub struct BitWriter {
    /// Completed bytes
    bytes: Vec<u8>,
    /// Accumulator for the current partial byte
    bit_buffer: u8,
    /// Number of bits in bit_buffer (0-7)
    bit_count: u8,
    order: BitOrder,
}

impl BitWriter {
    /// Create a new BitWriter with empty output.
    pub fn new(order: BitOrder) -> Self {
        Self {
            bytes: Vec::new(),
            bit_buffer: 0,
            bit_count: 0,
            order,
        }
    }

    /// Create a writer with room for `bytes` output bytes.
    pub fn with_capacity(order: BitOrder, bytes: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(bytes),
            ..Self::new(order)
        }
    }

    /// Append one bit.
    pub fn write_bit(&mut self, bit: bool) {
        if bit {
            self.bit_buffer |= self.order.mask(self.bit_count);
        }
        self.bit_count += 1;

        if self.bit_count == 8 {
            self.bytes.push(self.bit_buffer);
            self.bit_buffer = 0;
            self.bit_count = 0;
        }
    }

    /// Finish writing and return the output bytes.
    ///
    /// A partial final byte is padded with zeros.
    pub fn finish(mut self) -> Vec<u8> {
        if self.bit_count > 0 {
            self.bytes.push(self.bit_buffer);
        }
        self.bytes
    }
}

/// Reads bits from a byte buffer in a fixed [`BitOrder`].
///
/// # Invariants
/// - `bit_position` never exceeds `data.len() * 8`
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    /// Current bit position (0 = first transmitted bit of the first byte)
    bit_position: usize,
    order: BitOrder,
}

impl<'a> BitReader<'a> {
    /// Create a new BitReader for the given data.
    pub fn new(data: &'a [u8], order: BitOrder) -> Self {
        Self {
            data,
            bit_position: 0,
            order,
        }
    }

    /// Read a single bit.
    ///
    /// # Errors
    /// `BitIoError::UnexpectedEof` once every bit has been read.
    pub fn read_bit(&mut self) -> Result<bool> {
        if self.is_empty() {
            return Err(BitIoError::UnexpectedEof.into());
        }

        let byte = self.data[self.bit_position / 8];
        let mask = self.order.mask((self.bit_position % 8) as u8);
        self.bit_position += 1;

        Ok(byte & mask != 0)
    }

    /// Return the number of bits remaining in the buffer.
    pub fn bits_remaining(&self) -> usize {
        self.data.len() * 8 - self.bit_position
    }

    /// Check if we're at the end of the buffer.
    pub fn is_empty(&self) -> bool {
        self.bit_position >= self.data.len() * 8
    }
}

impl Iterator for BitReader<'_> {
    type Item = bool;

    fn next(&mut self) -> Option<bool> {
        self.read_bit().ok()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.bits_remaining();
        (remaining, Some(remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_all(order: BitOrder, bits: &[bool]) -> Vec<u8> {
        let mut writer = BitWriter::new(order);
        for &bit in bits {
            writer.write_bit(bit);
        }
        writer.finish()
    }

    #[test]
    fn test_msb_first_byte() {
        let bits = [true, false, true, true, false, false, true, true];
        let bytes = write_all(BitOrder::MsbFirst, &bits);
        assert_eq!(bytes, vec![0b10110011]);

        let read: Vec<bool> = BitReader::new(&bytes, BitOrder::MsbFirst).collect();
        assert_eq!(read, bits);
    }

    #[test]
    fn test_lsb_first_byte() {
        let bits = [true, false, false, false, false, false, false, false];
        assert_eq!(write_all(BitOrder::LsbFirst, &bits), vec![0b0000_0001]);

        let data = [0x7E];
        let read: Vec<bool> = BitReader::new(&data, BitOrder::LsbFirst).collect();
        assert_eq!(read, vec![false, true, true, true, true, true, true, false]);
    }

    #[test]
    fn test_padding() {
        assert_eq!(write_all(BitOrder::MsbFirst, &[true]), vec![0b10000000]);
        assert_eq!(write_all(BitOrder::LsbFirst, &[true]), vec![0b00000001]);
        assert!(write_all(BitOrder::LsbFirst, &[]).is_empty());
    }

    #[test]
    fn test_multi_byte() {
        let data = [0b1010_1011, 0b1111_0000];
        for order in [BitOrder::MsbFirst, BitOrder::LsbFirst] {
            let bits: Vec<bool> = BitReader::new(&data, order).collect();
            assert_eq!(bits.len(), 16);
            assert_eq!(write_all(order, &bits), data);
        }
    }

    #[test]
    fn test_read_past_end() {
        let data = vec![0b10101010];
        let mut reader = BitReader::new(&data, BitOrder::MsbFirst);

        for _ in 0..8 {
            reader.read_bit().unwrap();
        }
        assert!(matches!(
            reader.read_bit(),
            Err(crate::error::Error::BitIo(BitIoError::UnexpectedEof))
        ));
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_orders_reverse_bits() {
        let data = [0b1100_1010];
        let msb: Vec<bool> = BitReader::new(&data, BitOrder::MsbFirst).collect();
        let mut lsb: Vec<bool> = BitReader::new(&data, BitOrder::LsbFirst).collect();
        lsb.reverse();
        assert_eq!(msb, lsb);
    }

    #[test]
    fn test_bits_remaining() {
        let data = vec![0xFF, 0xFF];
        let mut reader = BitReader::new(&data, BitOrder::LsbFirst);

        assert_eq!(reader.bits_remaining(), 16);
        assert_eq!(reader.size_hint(), (16, Some(16)));
        reader.by_ref().take(5).for_each(drop);
        assert_eq!(reader.bits_remaining(), 11);
        reader.by_ref().take(11).for_each(drop);
        assert_eq!(reader.bits_remaining(), 0);
        assert!(reader.is_empty());
    }
}
