//! C source output for embedding an image in adaptor firmware.
//!
//! Each segment becomes one byte array; three tables tie them together:
//!
//! ```text
//! const uint8_t DATA_<name>_blk<n>[] = { ... };     one per segment
//! const uint32_t DATA_<name>_NSEGS = <count>;
//! const uint8_t* const DATA_<name>_SEGS[<count>] = { ... };
//! const uint16_t DATA_<name>_SEGLENS[<count>] = { ... };
//! ```
//!
//! Arrays hold the complete segment (header, data, trailer) without the
//! container length prefix.

use std::io::{self, Write};

/// Write the C arrays for `segments` (each a complete segment body).
pub fn emit_c_arrays<W: Write>(
    out: &mut W,
    name: &str,
    segments: &[Vec<u8>],
    progmem: bool,
) -> io::Result<()> {
    let attribute = if progmem { " PROGMEM" } else { "" };

    writeln!(out, "// Packet data for {name}")?;

    for (n, segment) in segments.iter().enumerate() {
        write!(out, "\nconst uint8_t DATA_{name}_blk{n}[]{attribute} = {{")?;
        for (i, byte) in segment.iter().enumerate() {
            if i % 8 == 0 {
                write!(out, "\n\t")?;
            }
            write!(out, "0x{byte:02X}, ")?;
        }
        writeln!(out, "}};")?;
    }

    let count = segments.len();
    writeln!(out, "const uint32_t DATA_{name}_NSEGS = {count};")?;

    writeln!(out, "const uint8_t* const DATA_{name}_SEGS[{count}] = {{")?;
    for n in 0..count {
        writeln!(out, "\tDATA_{name}_blk{n},")?;
    }
    writeln!(out, "}};")?;

    write!(out, "const uint16_t DATA_{name}_SEGLENS[{count}] = {{")?;
    for (n, segment) in segments.iter().enumerate() {
        if n % 8 == 0 {
            write!(out, "\n\t")?;
        }
        write!(out, "{:4},", segment.len())?;
    }
    writeln!(out, "}};")?;

    Ok(())
}
