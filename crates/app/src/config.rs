//! Configuration for the nabu-hcca tool.
//!
//! Handles parsing command-line arguments and resolving defaults (including
//! randomized defaults that are reproducible with a seed).
//!
//! # Philosophy
//!
//! Every subcommand works with the fewest possible arguments. Resolved
//! settings can be printed with `--print-config` so runs are reproducible.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use nabu_hcca_core::bitio::BitOrder;
use nabu_hcca_core::checksum::ChecksumConvention;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Largest sample image: keeps every segment offset within 16 bits.
pub const MAX_SAMPLE_SEGMENTS: u16 = 64;

#[derive(Debug, Parser)]
#[command(name = "nabu-hcca")]
#[command(about = "Tools for NABU HCCA segment images", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Check trailers against the raw running checksum instead of the finished value
    #[arg(long, global = true)]
    pub unfinished: bool,

    /// Print resolved configuration before running
    #[arg(long, global = true)]
    pub print_config: bool,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// List the segments of a .pak container and validate their checksums
    Inspect {
        /// Container file
        pak: PathBuf,
    },

    /// Emit a .pak container as C arrays
    Emit {
        /// Container file
        pak: PathBuf,

        /// Array name stem (default: file stem)
        #[arg(short, long)]
        name: Option<String>,

        /// Mark arrays PROGMEM
        #[arg(long)]
        progmem: bool,
    },

    /// Build a set-tiers control packet
    SetTiers {
        /// Box address in hex, identity bit set (FFFFFFFF = broadcast)
        #[arg(short, long, value_parser = parse_hex_u32)]
        address: u32,

        /// Tier bits in hex
        #[arg(short, long, value_parser = parse_hex_u32, default_value = "7FFFFFFF")]
        tiers: u32,

        /// Checksum value the completed packet must produce
        #[arg(long, value_parser = parse_hex_u16)]
        target: Option<u16>,
    },

    /// Append the check digit to an adaptor channel code
    ChanCode {
        /// First four digits of the channel code, in hex
        code: String,
    },

    /// Measure the scrambler cycle length under zero input
    ScramblerPeriod {
        /// Initial register value in hex
        #[arg(long, value_parser = parse_hex_u32, default_value = "0")]
        seed: u32,

        /// Zero bits clocked before measuring
        #[arg(long, default_value_t = nabu_hcca_core::scrambler::WARM_UP_BITS)]
        warm_up: usize,
    },

    /// Write a sample .pak container with seeded random contents
    GenSample {
        /// Output file
        #[arg(short, long, default_value = "./sample.pak")]
        out: PathBuf,

        /// Random seed for determinism
        #[arg(long)]
        seed: Option<u64>,

        /// Number of segments (default: random 1-8)
        #[arg(long)]
        segments: Option<u16>,

        /// Image number in hex
        #[arg(long, value_parser = parse_hex_u32, default_value = "1")]
        image: u32,

        /// Also write the image as a scrambled broadcast bitstream
        #[arg(long)]
        wire: Option<PathBuf>,

        /// Transmission bit order of the wire stream
        #[arg(long, value_enum, default_value_t = WireOrder::Lsb)]
        order: WireOrder,
    },
}

/// Bit order on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum WireOrder {
    Lsb,
    Msb,
}

impl From<WireOrder> for BitOrder {
    fn from(order: WireOrder) -> Self {
        match order {
            WireOrder::Lsb => BitOrder::LsbFirst,
            WireOrder::Msb => BitOrder::MsbFirst,
        }
    }
}

/// Resolved settings for a sample image.
#[derive(Debug, Clone)]
pub struct SampleConfig {
    pub out: PathBuf,
    pub seed: u64,
    pub segments: u16,
    pub image_number: u32,
    pub wire: Option<PathBuf>,
    pub order: BitOrder,
}

/// Complete configuration for a run.
#[derive(Debug, Clone)]
pub struct Config {
    pub command: Command,

    /// Convention used to check stored trailers
    pub convention: ChecksumConvention,

    /// Only set for `gen-sample`
    pub sample: Option<SampleConfig>,

    pub print_config: bool,
}

impl Config {
    /// Parse configuration from command-line arguments (including argv[0]).
    pub fn from_args<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli = Cli::try_parse_from(args)?;
        Ok(Self::from_cli(cli))
    }

    /// Resolve defaults for parsed arguments.
    ///
    /// Without `--seed`, a time-based seed is used; it is part of the printed
    /// configuration so the run can be repeated.
    pub fn from_cli(cli: Cli) -> Self {
        let convention = if cli.unfinished {
            ChecksumConvention::Unfinished
        } else {
            ChecksumConvention::Finished
        };

        let sample = match &cli.command {
            Command::GenSample {
                out,
                seed,
                segments,
                image,
                wire,
                order,
            } => {
                let seed = seed.unwrap_or_else(time_seed);
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                Some(SampleConfig {
                    out: out.clone(),
                    seed,
                    segments: segments
                        .unwrap_or_else(|| rng.gen_range(1..=8))
                        .clamp(1, MAX_SAMPLE_SEGMENTS),
                    image_number: image & 0x00FF_FFFF,
                    wire: wire.clone(),
                    order: (*order).into(),
                })
            }
            _ => None,
        };

        Config {
            command: cli.command,
            convention,
            sample,
            print_config: cli.print_config,
        }
    }

    /// Print the configuration in human-readable form.
    pub fn print(&self) {
        println!("=== Configuration ===");
        println!("Command: {:?}", self.command);
        println!("Checksum convention: {:?}", self.convention);
        if let Some(sample) = &self.sample {
            println!();
            println!("=== Sample Image ===");
            println!("Output file: {}", sample.out.display());
            println!("Seed: {}", sample.seed);
            println!("Segments: {}", sample.segments);
            println!("Image number: {:06X}", sample.image_number);
            if let Some(wire) = &sample.wire {
                println!("Wire stream: {} ({:?})", wire.display(), sample.order);
            }
        }
        println!();
    }
}

fn time_seed() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn parse_hex_u32(s: &str) -> Result<u32, String> {
    let digits = s.trim_start_matches("0x").trim_start_matches("0X");
    u32::from_str_radix(digits, 16).map_err(|e| format!("invalid hex value '{s}': {e}"))
}

fn parse_hex_u16(s: &str) -> Result<u16, String> {
    let value = parse_hex_u32(s)?;
    u16::try_from(value).map_err(|_| format!("'{s}' does not fit in 16 bits"))
}
