//! Sample image generation for testing.
//!
//! Produces a container that looks like a real program image: consecutive
//! segments of one image, full-access tiers, and data with a mix of
//! compressible and random content so a scrambled stream of it has something
//! to whiten.
//!
//! Generated data has:
//! - Runs of a single byte (long zero/one runs on the line before scrambling)
//! - Text-like data over a limited alphabet
//! - Random bytes

use std::io::Write;

use anyhow::{Context, Result};
use nabu_hcca_core::addressing::TIER_AND_MAX;
use nabu_hcca_core::segment::{MIN_SEGMENT_LEN, TYPICAL_SEGMENT_LEN};
use nabu_hcca_core::{ContainerWriter, Segment, SegmentHeader};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Data bytes carried by a full segment.
pub const DATA_PER_SEGMENT: usize = TYPICAL_SEGMENT_LEN - MIN_SEGMENT_LEN;

/// Generate the segments of a sample image.
///
/// # Arguments
/// - `seed`: random seed for determinism
/// - `image_number`: 24-bit image identifier
/// - `segments`: number of segments; all but the last are full size
///
/// # Errors
/// Fails if a segment's data offset does not fit the 16-bit header field,
/// i.e. for more than 67 segments.
pub fn generate_sample_image(seed: u64, image_number: u32, segments: u16) -> Result<Vec<Segment>> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut image = Vec::with_capacity(segments as usize);

    for n in 0..segments {
        let last = n + 1 == segments;
        let len = if last {
            rng.gen_range(1..=DATA_PER_SEGMENT)
        } else {
            DATA_PER_SEGMENT
        };

        let offset = u16::try_from(n as usize * DATA_PER_SEGMENT)
            .with_context(|| format!("segment {n} starts beyond the 16-bit offset range"))?;

        let header = SegmentHeader {
            image_number,
            segment_lsb: n as u8,
            owner: 0x01,
            tier_bits: TIER_AND_MAX,
            segment_number: n,
            offset,
            ..Default::default()
        };

        image.push(Segment::new(header, generate_data(&mut rng, len))?);
    }

    Ok(image)
}

/// Write segments as a container terminated by the sentinel.
pub fn write_image<W: Write>(sink: W, segments: &[Segment]) -> Result<W> {
    let mut writer = ContainerWriter::new(sink);
    for segment in segments {
        writer.write_segment(segment)?;
    }
    Ok(writer.finish()?)
}

fn generate_data(rng: &mut ChaCha8Rng, len: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(len);

    while data.len() < len {
        let run = (len - data.len()).min(rng.gen_range(16..=256));

        match rng.gen_range(0..10u8) {
            // 30% runs of the same byte
            0..=2 => {
                let byte_value = if rng.gen_bool(0.5) { 0x00 } else { 0xFF };
                data.extend(std::iter::repeat(byte_value).take(run));
            }

            // 40% text-like
            3..=6 => {
                let alphabet = b"abcdefghijklmnopqrstuvwxyz .!,\n";
                for _ in 0..run {
                    data.push(alphabet[rng.gen_range(0..alphabet.len())]);
                }
            }

            // 30% random
            _ => {
                for _ in 0..run {
                    data.push(rng.gen());
                }
            }
        }
    }

    data
}
