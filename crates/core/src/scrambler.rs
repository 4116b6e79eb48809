//! Self-synchronizing scrambler and descrambler for the HCCA bitstream.
//!
//! Both directions keep a 23-bit shift register. The scrambler feeds its own
//! output back into the register; the descrambler feeds back the raw received
//! bit. With the same taps on both sides, a descrambler that has seen 23 bits
//! of scrambler output holds the same register contents as the scrambler and
//! reproduces the original bits from then on, whatever either side started
//! from.
//!
//! ```text
//! scramble:   out = in ^ 1 ^ s[2] ^ s[19]      s = (s << 1) | out
//! descramble: d = (d << 1) | in                out = in ^ 1 ^ d[3] ^ d[20]
//! ```
//!
//! The descrambler reads its taps after clocking the received bit in, so its
//! bits 3 and 20 are the scrambler's bits 2 and 19.
//!
//! Register state is per stream. Each direction of each stream owns its own
//! [`Scrambler`] or [`Descrambler`]; sharing one between streams corrupts both.

use crate::bitio::{BitOrder, BitReader, BitWriter};

/// Width of the shift register in bits.
pub const REGISTER_BITS: u32 = 23;

/// Mask applied after every clock.
pub const REGISTER_MASK: u32 = (1 << REGISTER_BITS) - 1;

/// Register contents at power-on.
pub const POWER_ON_STATE: u32 = REGISTER_MASK;

/// Zero bits clocked before a register state is treated as reachable.
pub const WARM_UP_BITS: usize = 32;

const SCRAMBLE_TAPS: (u32, u32) = (2, 19);
const DESCRAMBLE_TAPS: (u32, u32) = (3, 20);

fn tap(state: u32, bit: u32) -> bool {
    (state >> bit) & 1 == 1
}

/// Scramble one bit. Returns the new register state and the output bit.
pub fn scramble(state: u32, bit: bool) -> (u32, bool) {
    let out = bit ^ true ^ tap(state, SCRAMBLE_TAPS.0) ^ tap(state, SCRAMBLE_TAPS.1);
    let state = ((state << 1) | out as u32) & REGISTER_MASK;
    (state, out)
}

/// Descramble one bit. Returns the new register state and the output bit.
pub fn descramble(state: u32, bit: bool) -> (u32, bool) {
    let state = ((state << 1) | bit as u32) & REGISTER_MASK;
    let out = bit ^ true ^ tap(state, DESCRAMBLE_TAPS.0) ^ tap(state, DESCRAMBLE_TAPS.1);
    (state, out)
}

/// Number of zero-input scrambler steps until the register returns to `state`.
///
/// Returns `None` if `state` is not on a cycle, i.e. it is never revisited
/// within the 2^23 possible register values. Under zero input the high bits
/// of the register only hold history, so states that were not produced by
/// clocking (see [`WARM_UP_BITS`]) can fall off the cycle.
pub fn cycle_length(state: u32) -> Option<u64> {
    let start = state & REGISTER_MASK;
    let mut current = start;

    for step in 1..=(1u64 << REGISTER_BITS) {
        current = scramble(current, false).0;
        if current == start {
            return Some(step);
        }
    }

    None
}

/// Transmit-side register for one stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scrambler {
    state: u32,
}

impl Scrambler {
    /// Create a scrambler in the power-on state.
    pub fn new() -> Self {
        Self::with_state(POWER_ON_STATE)
    }

    /// Create a scrambler from an explicit register value (masked to 23 bits).
    pub fn with_state(state: u32) -> Self {
        Self {
            state: state & REGISTER_MASK,
        }
    }

    /// Current register contents.
    pub fn state(&self) -> u32 {
        self.state
    }

    /// Scramble one bit.
    pub fn scramble_bit(&mut self, bit: bool) -> bool {
        let (state, out) = scramble(self.state, bit);
        self.state = state;
        out
    }

    /// Clock `bits` zero bits through the register, returning what was sent.
    pub fn warm_up(&mut self, bits: usize) -> Vec<bool> {
        (0..bits).map(|_| self.scramble_bit(false)).collect()
    }

    /// Scramble a byte buffer bit by bit in `order`.
    pub fn scramble_bytes(&mut self, bytes: &[u8], order: BitOrder) -> Vec<u8> {
        let mut writer = BitWriter::with_capacity(order, bytes.len());
        for bit in BitReader::new(bytes, order) {
            writer.write_bit(self.scramble_bit(bit));
        }
        writer.finish()
    }
}

impl Default for Scrambler {
    fn default() -> Self {
        Self::new()
    }
}

/// Receive-side register for one stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descrambler {
    state: u32,
}

impl Descrambler {
    /// Create a descrambler in the power-on state.
    pub fn new() -> Self {
        Self::with_state(POWER_ON_STATE)
    }

    /// Create a descrambler from an explicit register value (masked to 23 bits).
    pub fn with_state(state: u32) -> Self {
        Self {
            state: state & REGISTER_MASK,
        }
    }

    /// Current register contents.
    pub fn state(&self) -> u32 {
        self.state
    }

    /// Descramble one received bit.
    pub fn descramble_bit(&mut self, bit: bool) -> bool {
        let (state, out) = descramble(self.state, bit);
        self.state = state;
        out
    }

    /// Descramble a byte buffer bit by bit in `order`.
    pub fn descramble_bytes(&mut self, bytes: &[u8], order: BitOrder) -> Vec<u8> {
        let mut writer = BitWriter::with_capacity(order, bytes.len());
        for bit in BitReader::new(bytes, order) {
            writer.write_bit(self.descramble_bit(bit));
        }
        writer.finish()
    }
}

impl Default for Descrambler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn random_bits(seed: u64, len: usize) -> Vec<bool> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        (0..len).map(|_| rng.gen()).collect()
    }

    #[test]
    fn test_scramble_step() {
        // Empty register, zero input: only the constant 1 reaches the output
        assert_eq!(scramble(0, false), (1, true));
        // Tap at bit 2 cancels the constant
        assert_eq!(scramble(0b100, false), (0b1000, false));
        // Tap at bit 19 as well
        assert_eq!(scramble(1 << 19, false), (1 << 20, false));
        // Output is fed back, not the input
        assert_eq!(scramble(0, true), (0, false));
    }

    #[test]
    fn test_descramble_step() {
        // Raw input is fed back, taps read after the clock
        assert_eq!(descramble(0, true), (1, false));
        assert_eq!(descramble(0, false), (0, true));
        assert_eq!(descramble(0b100, false), (0b1000, false));
        assert_eq!(descramble(1 << 19, false), (1 << 20, false));
    }

    #[test]
    fn test_register_masked_to_23_bits() {
        let (state, _) = scramble(REGISTER_MASK, true);
        assert_eq!(state & !REGISTER_MASK, 0);

        let (state, _) = descramble(REGISTER_MASK, true);
        assert_eq!(state & !REGISTER_MASK, 0);

        assert_eq!(Scrambler::with_state(u32::MAX).state(), REGISTER_MASK);
        assert_eq!(Descrambler::with_state(u32::MAX).state(), REGISTER_MASK);
    }

    #[test]
    fn test_round_trip_after_warm_up() {
        let mut scrambler = Scrambler::with_state(0);
        let mut descrambler = Descrambler::with_state(0);

        // Warm-up: the descrambler listens to the scrambler's zero run
        for bit in scrambler.warm_up(WARM_UP_BITS) {
            descrambler.descramble_bit(bit);
        }
        assert_eq!(scrambler.state(), descrambler.state());

        for (i, bit) in random_bits(3, 4096).into_iter().enumerate() {
            let sent = scrambler.scramble_bit(bit);
            assert_eq!(descrambler.descramble_bit(sent), bit, "bit {i}");
        }
    }

    #[test]
    fn test_self_synchronizes_from_any_state() {
        let mut rng = ChaCha8Rng::seed_from_u64(99);

        for _ in 0..16 {
            let mut scrambler = Scrambler::with_state(rng.gen());
            let mut descrambler = Descrambler::with_state(rng.gen());

            let bits = random_bits(rng.gen(), 512);
            let received: Vec<bool> = bits
                .iter()
                .map(|&bit| descrambler.descramble_bit(scrambler.scramble_bit(bit)))
                .collect();

            assert_eq!(scrambler.state(), descrambler.state());
            assert_eq!(&received[REGISTER_BITS as usize..], &bits[REGISTER_BITS as usize..]);
        }
    }

    #[test]
    fn test_byte_round_trip() {
        let mut scrambler = Scrambler::with_state(0);
        let mut descrambler = Descrambler::with_state(0);
        for bit in scrambler.warm_up(WARM_UP_BITS) {
            descrambler.descramble_bit(bit);
        }

        let data: Vec<u8> = (0..=255).collect();
        for order in [BitOrder::MsbFirst, BitOrder::LsbFirst] {
            let sent = scrambler.scramble_bytes(&data, order);
            assert_ne!(sent, data);
            assert_eq!(descrambler.descramble_bytes(&sent, order), data);
        }
    }

    #[test]
    fn test_whitens_constant_input() {
        let mut scrambler = Scrambler::with_state(0);
        scrambler.warm_up(WARM_UP_BITS);

        let sent = scrambler.scramble_bytes(&[0u8; 256], BitOrder::LsbFirst);
        let ones: u32 = sent.iter().map(|b| b.count_ones()).sum();
        let total = (sent.len() * 8) as u32;
        assert!(ones > total / 4 && ones < total * 3 / 4, "ones={ones}");
    }

    #[test]
    fn test_independent_streams() {
        let mut a = Scrambler::with_state(0);
        let mut b = Scrambler::with_state(0);
        a.warm_up(WARM_UP_BITS);

        let before = b.state();
        a.scramble_bytes(b"stream a", BitOrder::LsbFirst);
        assert_eq!(b.state(), before);
    }

    #[test]
    fn test_power_on_state_is_fixed_point() {
        assert_eq!(cycle_length(POWER_ON_STATE), Some(1));
        let mut scrambler = Scrambler::new();
        assert!(scrambler.warm_up(64).into_iter().all(|bit| bit));
    }

    #[test]
    fn test_cycle_length_from_zero_seed() {
        let mut scrambler = Scrambler::with_state(0);
        scrambler.warm_up(WARM_UP_BITS);

        let first = cycle_length(scrambler.state());
        assert_eq!(first, Some(1_048_575));

        // Any state on the same cycle reports the same length
        scrambler.warm_up(1000);
        assert_eq!(cycle_length(scrambler.state()), first);
    }
}
