//! # Ingot - JSON to Columnar Conversion
//!
//! Converts newline-delimited JSON records into a self-describing columnar
//! file: the schema is inferred from the data, every column is materialized
//! with a validity bitmap, and row groups are written as compressed column
//! chunks followed by a footer holding the schema, per-chunk statistics and
//! chunk offsets.
//!
//! ## Modules
//!
//! - **schema**: Type lattice, schema inference and explicit schema definitions
//! - **column**: Column arrays, materialization and chunk statistics
//! - **format**: File encoder, decoder and compression codecs
//!
//! ## Quick Start
//!
//! ```rust
//! use ingot::{convert, ConvertConfig, FileReader, JsonValue};
//! use serde_json::json;
//!
//! # fn main() -> anyhow::Result<()> {
//! let records: Vec<JsonValue> = vec![
//!     json!({"id": 1, "score": 0.5}),
//!     json!({"id": 2, "score": 3}),
//! ]
//! .into_iter()
//! .map(JsonValue::from)
//! .collect();
//!
//! let mut file = Vec::new();
//! let summary = convert(&records, &mut file, &ConvertConfig::default())?;
//! assert_eq!(summary.rows, 2);
//!
//! let reader = FileReader::new(&file)?;
//! assert_eq!(reader.schema().len(), 2);
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use log::info;
use serde::Serialize;
use std::io::{BufRead, Write};

pub mod column;
pub mod config;
pub mod error;
pub mod format;
pub mod schema;
pub mod value;

// Re-export commonly used types for convenience
pub use column::{materialize, ChunkStats, ColumnArray, ScalarValue};
pub use config::ConvertConfig;
pub use error::{CoercionError, ConvertError, DecodeError, EncodeError, SchemaError};
pub use format::{encode, Codec, FileReader, FileWriter};
pub use schema::{infer_schema, unify, Field, InferredType, Schema, SchemaBuilder};
pub use value::JsonValue;

/// Outcome of a successful conversion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConvertSummary {
    pub rows: usize,
    pub columns: usize,
    pub row_groups: usize,
    pub bytes_written: u64,
}

/// Infer a schema from `records` and write them to `sink` as a columnar file.
///
/// Schema errors and coercion errors surface before any byte is written.
/// If encoding fails part way the sink holds a file without its trailer.
pub fn convert<W: Write>(
    records: &[JsonValue],
    sink: W,
    config: &ConvertConfig,
) -> std::result::Result<ConvertSummary, ConvertError> {
    let schema = infer_schema(records, config)?;
    write_file(records, &schema, sink, config)
}

/// Like [`convert`], with an explicit schema instead of inference.
pub fn convert_with_schema<W: Write>(
    records: &[JsonValue],
    schema: &Schema,
    sink: W,
    config: &ConvertConfig,
) -> std::result::Result<ConvertSummary, ConvertError> {
    schema::check_records(records)?;
    write_file(records, schema, sink, config)
}

fn write_file<W: Write>(
    records: &[JsonValue],
    schema: &Schema,
    sink: W,
    config: &ConvertConfig,
) -> std::result::Result<ConvertSummary, ConvertError> {
    let columns = materialize(records, schema)?;

    let mut writer = FileWriter::try_new(sink, schema.clone(), config)?;
    writer.write_columns(records.len(), &columns)?;
    let bytes_written = writer.finish()?;

    let summary = ConvertSummary {
        rows: records.len(),
        columns: schema.len(),
        row_groups: writer.row_group_count(),
        bytes_written,
    };
    info!(
        "Converted {} rows x {} columns into {} row groups ({} bytes, {})",
        summary.rows, summary.columns, summary.row_groups, summary.bytes_written, config.codec
    );
    Ok(summary)
}

/// Parse newline-delimited JSON, skipping blank lines.
pub fn read_ndjson<R: BufRead>(reader: R) -> Result<Vec<JsonValue>> {
    let mut records = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line.context("Failed to read line")?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let value = JsonValue::parse(line).with_context(|| format!("Failed to parse JSON on line {}", index + 1))?;
        records.push(value);
    }
    Ok(records)
}

/// Main entry point: convert an NDJSON stream into a columnar file
pub fn convert_ndjson<R: BufRead, W: Write>(reader: R, sink: W, config: &ConvertConfig) -> Result<ConvertSummary> {
    let records = read_ndjson(reader)?;
    let summary = convert(&records, sink, config).context("Conversion failed")?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_basic_conversion() {
        let input = "{\"id\": 1, \"tags\": [\"a\"]}\n\n{\"id\": 2, \"tags\": \"b\"}\n";
        let mut out = Vec::new();
        let summary = convert_ndjson(input.as_bytes(), &mut out, &ConvertConfig::default()).unwrap();
        assert_eq!(summary.rows, 2);
        assert_eq!(summary.columns, 2);
        assert_eq!(summary.row_groups, 1);
        assert_eq!(summary.bytes_written, out.len() as u64);

        let reader = FileReader::new(&out).unwrap();
        assert_eq!(
            reader.read_records().unwrap(),
            vec![
                JsonValue::from(json!({"id": 1, "tags": ["a"]})),
                JsonValue::from(json!({"id": 2, "tags": ["b"]})),
            ]
        );
    }

    #[test]
    fn test_parse_error_names_line() {
        let input = "{\"id\": 1}\n{\"id\": \n";
        let err = read_ndjson(input.as_bytes()).unwrap_err();
        assert!(format!("{:#}", err).contains("line 2"));
    }

    #[test]
    fn test_non_object_record_writes_nothing() {
        let records = vec![JsonValue::from(json!({"a": 1})), JsonValue::from(json!([1, 2]))];
        let mut out = Vec::new();
        let err = convert(&records, &mut out, &ConvertConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            ConvertError::Schema(SchemaError::RootNotObject { index: 1, .. })
        ));
        assert!(out.is_empty());
    }

    #[test]
    fn test_explicit_schema_mismatch_writes_nothing() {
        let schema = Schema::from_bigquery_json(r#"[{"name": "n", "type": "INTEGER", "mode": "REQUIRED"}]"#).unwrap();
        let records = vec![JsonValue::from(json!({"n": 1})), JsonValue::from(json!({"n": "two"}))];
        let mut out = Vec::new();
        let err = convert_with_schema(&records, &schema, &mut out, &ConvertConfig::default()).unwrap_err();
        assert!(matches!(err, ConvertError::Coercion(_)));
        assert!(out.is_empty());
    }

    #[test]
    fn test_records_without_fields_keep_row_count() {
        let records = vec![JsonValue::from(json!({})), JsonValue::from(json!({}))];
        let mut out = Vec::new();
        let summary = convert(&records, &mut out, &ConvertConfig::default()).unwrap();
        assert_eq!(summary.columns, 0);
        let reader = FileReader::new(&out).unwrap();
        assert_eq!(reader.row_count(), 2);
        assert_eq!(reader.read_records().unwrap(), records);
    }
}
