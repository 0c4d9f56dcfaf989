//! ingot-infer: Print the schema inferred from newline-delimited JSON
//!
//! Usage:
//!   # Read from file, output to stdout
//!   ingot-infer events.jsonl
//!
//!   # Read from stdin with compact output
//!   cat events.jsonl | ingot-infer --compact

use anyhow::{Context, Result};
use clap::Parser;
use ingot::{infer_schema, read_ndjson, ConvertConfig};
use std::fs::File;
use std::io::{stdin, BufRead, BufReader};

#[derive(Parser, Debug)]
#[command(name = "ingot-infer")]
#[command(about = "Infer a columnar schema from newline-delimited JSON", long_about = None)]
struct Args {
    /// Input file (use stdin if omitted)
    #[arg(value_name = "FILE")]
    input: Option<String>,

    /// Compact output (no pretty-printing)
    #[arg(long)]
    compact: bool,

    /// Skip string format detection
    #[arg(long)]
    no_formats: bool,

    /// Keep numeric types where a value would lose precision, as ingot-cast --no-widen does
    #[arg(long)]
    no_widen: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let reader: Box<dyn BufRead> = if let Some(file_path) = &args.input {
        Box::new(BufReader::new(File::open(file_path)?))
    } else {
        Box::new(BufReader::new(stdin()))
    };

    // Buffered: widening needs every record, and must match what ingot-cast writes
    let records = read_ndjson(reader)?;
    if records.is_empty() {
        eprintln!("Warning: No JSON records found in input");
    }

    let config = ConvertConfig::default()
        .with_format_detection(!args.no_formats)
        .with_widening(!args.no_widen);
    let schema = infer_schema(&records, &config)
        .context("Failed to infer schema")?
        .to_json();
    let output = if args.compact {
        serde_json::to_string(&schema)?
    } else {
        serde_json::to_string_pretty(&schema)?
    };

    println!("{}", output);

    Ok(())
}
