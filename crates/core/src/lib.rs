//! nabu-hcca-core: link-layer codec for the NABU HCCA serial cable protocol
//!
//! This library reads stored program images, validates their segments, and
//! prepares them for transmission:
//! - Slices `.pak` containers into checksummed segments
//! - Computes the 16-bit segment checksum from generated nibble tables
//! - Builds "set tiers" control packets by brute-forcing a checksum nonce
//! - Whitens the bitstream with a self-synchronizing 23-bit scrambler
//!
//! # Architecture
//!
//! - `checksum`: table-driven 16-bit checksum engine
//! - `scrambler`: scrambler/descrambler registers
//! - `bitio`: bit reading/writing in transmission order
//! - `segment`: segment header/data/trailer layout
//! - `addressing`: box addresses and tier bits
//! - `container`: `.pak` container reader and writer
//! - `metrics`: read statistics
//! - `control`: control-packet builder and collision search
//! - `wire`: addressed wire frames and their scrambling
//!
//! # Design Principles
//!
//! - **No panics**: format problems are structured errors
//! - **Explicit state**: scrambler registers are per-stream values, never global
//! - **Corruption is data**: a bad checksum flags a segment, it does not stop a read

pub mod addressing;
pub mod bitio;
pub mod checksum;
pub mod container;
pub mod control;
pub mod error;
pub mod metrics;
pub mod scrambler;
pub mod segment;
pub mod wire;

// Re-export commonly used types
pub use addressing::{BoxAddress, Tier, TierMode};
pub use container::{ContainerReader, ContainerWriter, ReadSegment};
pub use control::{build_set_tiers_packet, CollisionSearch, NonceWidth, SetTiersPacket};
pub use error::{Error, Result};
pub use metrics::ReadStats;
pub use scrambler::{Descrambler, Scrambler};
pub use segment::{Segment, SegmentHeader};
pub use wire::{WireDecoder, WireEncoder, WireFrame};
