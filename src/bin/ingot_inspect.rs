//! ingot-inspect: Print the footer metadata of an ingot file
//!
//! Usage:
//!   ingot-inspect events.ingot
//!   ingot-inspect events.ingot --compact

use anyhow::{Context, Result};
use clap::Parser;
use ingot::FileReader;
use serde_json::json;
use std::fs;

#[derive(Parser, Debug)]
#[command(name = "ingot-inspect")]
#[command(about = "Show schema, statistics and chunk offsets of a columnar file", long_about = None)]
struct Args {
    /// File to inspect
    #[arg(value_name = "FILE")]
    input: String,

    /// Compact output (no pretty-printing)
    #[arg(long)]
    compact: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let bytes = fs::read(&args.input).with_context(|| format!("Failed to read {}", args.input))?;
    let reader = FileReader::new(&bytes).with_context(|| format!("{} is not a valid ingot file", args.input))?;

    let report = json!({
        "file_size": bytes.len(),
        "row_count": reader.row_count(),
        "schema": reader.schema().to_json(),
        "row_groups": reader.row_groups(),
        "chunks": reader.locations(),
    });

    let output = if args.compact {
        serde_json::to_string(&report)?
    } else {
        serde_json::to_string_pretty(&report)?
    };

    println!("{}", output);

    Ok(())
}
