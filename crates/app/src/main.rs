//! nabu-hcca: command-line tools for NABU HCCA segment images.
//!
//! Logging goes to stderr and is filtered by `NABU_HCCA_LOG`
//! (`info` when unset); results go to stdout.

mod chancode;
mod config;
mod emit;
mod input_gen;

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use nabu_hcca_core::bitio::BitWriter;
use nabu_hcca_core::checksum::{self, ChecksumConvention};
use nabu_hcca_core::control::build_set_tiers_packet_with;
use nabu_hcca_core::scrambler::{cycle_length, REGISTER_MASK, WARM_UP_BITS};
use nabu_hcca_core::{
    BoxAddress, CollisionSearch, ContainerReader, NonceWidth, ReadStats, Scrambler, Segment,
    WireEncoder, WireFrame,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use chancode::ChannelCode;
use config::{Command, Config, SampleConfig};

const LOG_ENV: &str = "NABU_HCCA_LOG";

fn main() -> Result<()> {
    init_logging();

    let config = match Config::from_args(std::env::args_os()) {
        Ok(config) => config,
        Err(e) => e.exit(),
    };
    if config.print_config {
        config.print();
    }

    match &config.command {
        Command::Inspect { pak } => inspect(pak, config.convention),
        Command::Emit { pak, name, progmem } => {
            let name = match name {
                Some(name) => name.clone(),
                None => pak
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "image".to_string()),
            };
            emit(pak, &name, *progmem, config.convention)
        }
        Command::SetTiers {
            address,
            tiers,
            target,
        } => set_tiers(*address, *tiers, *target),
        Command::ChanCode { code } => chan_code(code),
        Command::ScramblerPeriod { seed, warm_up } => scrambler_period(*seed, *warm_up),
        Command::GenSample { .. } => match &config.sample {
            Some(sample) => gen_sample(sample),
            None => anyhow::bail!("sample configuration was not resolved"),
        },
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn open_container(
    path: &Path,
    convention: ChecksumConvention,
) -> Result<ContainerReader<BufReader<File>>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    Ok(ContainerReader::with_convention(BufReader::new(file), convention))
}

fn inspect(path: &Path, convention: ChecksumConvention) -> Result<()> {
    let mut reader = open_container(path, convention)?;

    println!(
        "{:>4}  {:<6}  {:>4}  {:<5}  {:<8}  {:<4}  {:<4}  {:>5}  {:<6}  CHECKSUM",
        "SEG", "IMAGE", "LEN", "OWNER", "TIERS", "RSVD", "TYPE", "NUM", "OFFSET"
    );

    let mut index = 0u64;
    while let Some(read) = reader
        .next_segment()
        .with_context(|| format!("reading {}", path.display()))?
    {
        let h = &read.segment.header;
        println!(
            "{:>4}  {:06X}  {:>4}  {:02X}     {:08X}  {:02X}{:02X}  {:02X}    {:>5}  {:04X}    {} ({:04X})",
            index,
            h.image_number,
            read.segment.len(),
            h.owner,
            h.tier_bits,
            h.reserved[0],
            h.reserved[1],
            h.flags,
            h.segment_number,
            h.offset,
            if read.checksum_ok { "ok" } else { "BAD" },
            read.segment.trailer,
        );
        index += 1;
    }

    print_stats(reader.stats());
    Ok(())
}

fn print_stats(stats: &ReadStats) {
    println!();
    println!("{stats}");
}

fn emit(path: &Path, name: &str, progmem: bool, convention: ChecksumConvention) -> Result<()> {
    let reader = open_container(path, convention)?;

    let mut bodies = Vec::new();
    for read in reader {
        let read = read.with_context(|| format!("reading {}", path.display()))?;
        bodies.push(read.segment.to_bytes());
    }
    info!(segments = bodies.len(), name, "emitting C arrays");

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    emit::emit_c_arrays(&mut out, name, &bodies, progmem)?;
    out.flush()?;
    Ok(())
}

fn set_tiers(address: u32, tiers: u32, target: Option<u16>) -> Result<()> {
    let search = match target {
        Some(target) => CollisionSearch::new(target, NonceWidth::Word),
        None => CollisionSearch::default(),
    };
    let packet = build_set_tiers_packet_with(address, tiers, &search)
        .with_context(|| format!("building set-tiers packet for {address:08X}"))?;

    if packet.nonces.is_empty() {
        warn!(wanted = %format!("{:04X}", search.target), "no collision found");
        return Ok(());
    }

    for &nonce in &packet.nonces {
        let bytes = packet.to_bytes(nonce);
        println!("Collision found, FCS=0x{nonce:04X}");
        println!("Packet: {}", hex(&bytes));
        println!("Check:  {:04X}", checksum::update(checksum::init(), &bytes));
    }
    Ok(())
}

fn chan_code(digits: &str) -> Result<()> {
    let code = ChannelCode::parse(digits)?;

    println!("Channel Code:        {}", code.full_code());
    println!("Local osc frequency: {} MHz", code.local_oscillator_mhz());
    println!("Centre frequency:    {:.4} MHz", code.centre_mhz());

    if !code.within_filter() {
        warn!(
            "frequency is outside the range of the input filter ({} MHz to {} MHz)",
            chancode::FILTER_LOW_MHZ,
            chancode::FILTER_HIGH_MHZ
        );
    }
    Ok(())
}

fn scrambler_period(seed: u32, warm_up: usize) -> Result<()> {
    let mut scrambler = Scrambler::with_state(seed & REGISTER_MASK);
    scrambler.warm_up(warm_up);
    let state = scrambler.state();

    if warm_up < WARM_UP_BITS {
        warn!(warm_up, "register may not be on its cycle yet");
    }

    match cycle_length(state) {
        Some(period) => println!("State {state:06X}: period {period}"),
        None => println!("State {state:06X}: not on a cycle"),
    }
    Ok(())
}

fn gen_sample(sample: &SampleConfig) -> Result<()> {
    let image =
        input_gen::generate_sample_image(sample.seed, sample.image_number, sample.segments)?;

    let file = File::create(&sample.out)
        .with_context(|| format!("creating {}", sample.out.display()))?;
    let mut sink = input_gen::write_image(BufWriter::new(file), &image)?;
    sink.flush()?;

    let bytes: usize = image.iter().map(|s| s.len() + 2).sum::<usize>() + 2;
    info!(
        path = %sample.out.display(),
        segments = image.len(),
        bytes,
        "wrote sample image"
    );

    if let Some(wire) = &sample.wire {
        write_wire(wire, &image, sample)?;
    }
    Ok(())
}

/// Scramble every segment as a broadcast frame, preceded by the warm-up bits.
fn write_wire(path: &Path, image: &[Segment], sample: &SampleConfig) -> Result<()> {
    let mut scrambler = Scrambler::new();
    let warm_up = scrambler.warm_up(WARM_UP_BITS);
    let mut encoder = WireEncoder::new(scrambler, sample.order);

    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut out = BufWriter::new(file);

    // Warm-up is whole bytes of line idle.
    let mut lead_in = BitWriter::new(sample.order);
    for bit in warm_up {
        lead_in.write_bit(bit);
    }
    out.write_all(&lead_in.finish())?;

    for segment in image {
        let frame = WireFrame::from_segment(BoxAddress::BROADCAST, segment);
        out.write_all(&encoder.encode(&frame))?;
    }
    out.flush()?;

    info!(
        path = %path.display(),
        frames = image.len(),
        state = %format!("{:06X}", encoder.scrambler().state()),
        "wrote wire stream"
    );
    Ok(())
}

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}
