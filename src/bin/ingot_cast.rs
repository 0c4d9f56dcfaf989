//! ingot-cast: Convert newline-delimited JSON into an ingot columnar file
//!
//! Usage:
//!   # Infer the schema from the data
//!   ingot-cast events.jsonl -o events.ingot
//!
//!   # Read from stdin, compress with zstd
//!   cat events.jsonl | ingot-cast -o events.ingot --compression zstd --zstd-level 9
//!
//!   # Use an explicit BigQuery-style schema instead of inference
//!   ingot-cast events.jsonl -o events.ingot --schema schema.json
//!
//! The output is written to a temporary file next to the destination and
//! only moved into place once the conversion has fully succeeded.

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use ingot::{convert, convert_with_schema, read_ndjson, Codec, ConvertConfig, Schema};
use std::fs::{self, File};
use std::io::{stdin, BufRead, BufReader, BufWriter};
use std::path::Path;
use tempfile::NamedTempFile;

#[derive(Parser, Debug)]
#[command(name = "ingot-cast")]
#[command(about = "Convert newline-delimited JSON into a columnar file", long_about = None)]
struct Args {
    /// Input file (use stdin if omitted or "-")
    #[arg(value_name = "FILE")]
    input: Option<String>,

    /// Output file
    #[arg(long, short = 'o')]
    output: String,

    /// Maximum rows per row group
    #[arg(long, default_value_t = 10_000)]
    row_group_size: usize,

    /// Chunk compression: none, lz4 or zstd
    #[arg(long, default_value = "lz4")]
    compression: String,

    /// Compression level for zstd
    #[arg(long, default_value_t = 3)]
    zstd_level: i32,

    /// BigQuery-style JSON schema file; skips inference
    #[arg(long)]
    schema: Option<String>,

    /// Fail on lossy values instead of widening their column to string
    #[arg(long)]
    no_widen: bool,

    /// Store chunks uncompressed when compression fails
    #[arg(long)]
    fallback_uncompressed: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let codec: Codec = args.compression.parse().map_err(|e: String| anyhow!(e))?;
    let config = ConvertConfig::default()
        .with_row_group_size(args.row_group_size)
        .with_codec(codec)
        .with_zstd_level(args.zstd_level)
        .with_widening(!args.no_widen)
        .with_fallback_uncompressed(args.fallback_uncompressed);

    let schema = match &args.schema {
        Some(path) => {
            let text = fs::read_to_string(path).with_context(|| format!("Failed to read schema file: {}", path))?;
            Some(Schema::from_bigquery_json(&text).with_context(|| format!("Invalid schema file: {}", path))?)
        }
        None => None,
    };

    let reader: Box<dyn BufRead> = match args.input.as_deref() {
        None | Some("-") => Box::new(BufReader::new(stdin())),
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Failed to open input: {}", path))?,
        )),
    };
    let records = read_ndjson(reader)?;

    let output = Path::new(&args.output);
    let dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;

    let sink = BufWriter::new(&mut tmp);
    let summary = match &schema {
        Some(schema) => convert_with_schema(&records, schema, sink, &config),
        None => convert(&records, sink, &config),
    }
    .context("Conversion failed")?;

    tmp.persist(output)
        .with_context(|| format!("Failed to write output: {}", output.display()))?;

    eprintln!(
        "Wrote {} rows, {} columns, {} row groups ({} bytes) to {}",
        summary.rows,
        summary.columns,
        summary.row_groups,
        summary.bytes_written,
        output.display()
    );

    Ok(())
}
