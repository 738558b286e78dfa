use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use serde::Serialize;
use tracing::info;

use gw2pf::fourcc::{fourcc_str, parse_fourcc};
use gw2pf::pf_parser::{self, ChunkEntry, PfHeader};

/// Number of hex dump lines printed for a chunk unless `--all` is given.
const HEX_DUMP_LINES: usize = 16;

#[derive(Parser)]
#[command(name = "gw2pf")]
#[command(version, about = "Inspect Guild Wars 2 pack files")]
struct Cli {
    /// Path to the pack file
    file: PathBuf,

    /// Expected content type, as four characters or a 0x-prefixed hex value
    #[arg(short = 't', long = "type", default_value = "MODL")]
    content_type: String,

    /// Hex dump the payload of this chunk
    #[arg(short, long)]
    chunk: Option<String>,

    /// Dump the whole payload instead of the first lines
    #[arg(long, default_value = "false")]
    all: bool,

    /// Print the header and chunk listing as JSON
    #[arg(long, default_value = "false")]
    json: bool,
}

#[derive(Serialize)]
struct Report<'a> {
    header: &'a PfHeader,
    chunks: Vec<ChunkReport<'a>>,
}

#[derive(Serialize)]
struct ChunkReport<'a> {
    name: String,
    #[serde(flatten)]
    entry: &'a ChunkEntry,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("gw2pf=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let expected = parse_fourcc(&cli.content_type)
        .ok_or_else(|| anyhow!("invalid content type {:?}", cli.content_type))?;

    let data = std::fs::read(&cli.file)
        .with_context(|| format!("failed to read {}", cli.file.display()))?;
    info!(path = %cli.file.display(), len = data.len(), "loaded pack file");

    let header = pf_parser::validate_header(&data, expected)
        .with_context(|| format!("{} is not a {} pack file", cli.file.display(), cli.content_type))?;
    let entries = pf_parser::chunk_headers(&data).context("failed to walk chunks")?;

    if cli.json {
        let report = Report {
            header: &header,
            chunks: entries
                .iter()
                .map(|entry| ChunkReport {
                    name: fourcc_str(entry.header.magic),
                    entry,
                })
                .collect(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_listing(&header, &entries);
    }

    if let Some(name) = &cli.chunk {
        let id = parse_fourcc(name).ok_or_else(|| anyhow!("invalid chunk id {:?}", name))?;
        let range = pf_parser::locate_chunk(&data, id)?;
        println!();
        println!("{} payload: {} bytes at {:#010X}", fourcc_str(id), range.len, range.offset);
        let limit = if cli.all { usize::MAX } else { HEX_DUMP_LINES };
        hex_dump(&data[range.offset..range.end()], limit);
    }

    Ok(())
}

fn print_listing(header: &PfHeader, entries: &[ChunkEntry]) {
    println!(
        "PF {} (descriptor type {}, header size {})",
        fourcc_str(header.content_type),
        header.descriptor_type,
        header.header_size
    );
    println!("{:<10} {:>10} {:>10} {:>8} {:>7}", "chunk", "offset", "payload", "version", "header");
    for entry in entries {
        println!(
            "{:<10} {:>#10X} {:>10} {:>8} {:>7}",
            fourcc_str(entry.header.magic),
            entry.offset,
            entry.payload.len,
            entry.header.version,
            entry.header.header_size
        );
    }
}

/// Print a hex dump of the given buffer, at most `max_lines` lines.
fn hex_dump(buffer: &[u8], max_lines: usize) {
    const BYTES_PER_LINE: usize = 16;

    for (i, chunk) in buffer.chunks(BYTES_PER_LINE).enumerate() {
        if i == max_lines {
            println!("...");
            break;
        }
        // Print the offset
        print!("{:08X}: ", i * BYTES_PER_LINE);

        for byte in chunk {
            print!("{:02X} ", byte);
        }

        // Pad the last line with spaces if necessary
        for _ in 0..(BYTES_PER_LINE - chunk.len()) {
            print!("   ");
        }

        print!("|");
        for byte in chunk {
            if byte.is_ascii_graphic() || *byte == b' ' {
                print!("{}", *byte as char);
            } else {
                print!(".");
            }
        }
        println!("|");
    }
}
