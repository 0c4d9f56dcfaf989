//! Error types
//!
//! Inference errors abort before any byte is written. Encode errors poison
//! the writer, which then never writes a trailer, so a failed file is
//! always rejected by readers.

use std::fmt;
use std::io;
use thiserror::Error;

use crate::format::compression::Codec;
use crate::format::writer::WriterState;
use crate::schema::ColumnPath;

/// Malformed input shape or schema definition.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("record {index} is not an object (found {found})")]
    RootNotObject { index: usize, found: &'static str },

    #[error("unknown column type: {0}")]
    UnknownType(String),

    #[error("unknown column mode: {0}")]
    UnknownMode(String),

    #[error("invalid schema definition: {0}")]
    InvalidDefinition(#[from] serde_json::Error),
}

/// Why a value could not be placed in its column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoercionReason {
    /// The conversion would change the value
    Lossy,
    /// The value's kind has no conversion to the column type
    Mismatch,
    /// Null or missing value in a non-nullable column
    Required,
}

impl fmt::Display for CoercionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoercionReason::Lossy => write!(f, "value is not exactly representable"),
            CoercionReason::Mismatch => write!(f, "incompatible kind"),
            CoercionReason::Required => write!(f, "column is not nullable"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("cannot store {found} at `{path}` as {expected}: {reason}")]
pub struct CoercionError {
    pub path: ColumnPath,
    pub expected: String,
    pub found: &'static str,
    pub reason: CoercionReason,
}

/// Failure of the compression primitive.
#[derive(Debug, Error)]
pub enum CompressionError {
    #[error("zstd: {0}")]
    Zstd(#[source] io::Error),

    #[error("lz4: {0}")]
    Lz4(#[from] lz4_flex::block::DecompressError),

    #[error("zstd level {0} is outside the supported range")]
    Level(i32),

    #[error("chunk expands to {size} bytes, more than the {limit} it can hold")]
    TooLarge { size: usize, limit: usize },

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("compressing row group {row_group}, column {column} with {codec} failed: {source}")]
    CompressionFailure {
        row_group: usize,
        column: usize,
        codec: Codec,
        #[source]
        source: CompressionError,
    },

    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),

    #[error("writer is closed")]
    Closed,

    #[error("cannot {operation} while writer is {state:?}")]
    InvalidState {
        operation: &'static str,
        state: WriterState,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("expected {expected} columns, got {found}")]
    ColumnCountMismatch { expected: usize, found: usize },

    #[error("column {column} has {found} rows, expected {expected}")]
    RowCountMismatch {
        column: usize,
        expected: usize,
        found: usize,
    },

    #[error("{what} is too large for the file format ({size} bytes)")]
    TooLarge { what: &'static str, size: usize },
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("input is too short to be an ingot file ({0} bytes)")]
    TooShort(usize),

    #[error("bad magic in {0}")]
    BadMagic(&'static str),

    #[error("unsupported format version {0}")]
    UnsupportedVersion(u32),

    #[error("unexpected end of data: need {needed} bytes at offset {offset}")]
    Truncated { needed: usize, offset: usize },

    #[error("corrupt {what}: {detail}")]
    Corrupt { what: &'static str, detail: String },

    #[error("no chunk for row group {row_group}, column {column}")]
    MissingChunk { row_group: usize, column: usize },

    #[error(transparent)]
    Compression(#[from] CompressionError),
}

impl DecodeError {
    pub(crate) fn corrupt(what: &'static str, detail: impl Into<String>) -> Self {
        DecodeError::Corrupt {
            what,
            detail: detail.into(),
        }
    }
}

/// Any failure of a whole conversion.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Coercion(#[from] CoercionError),

    #[error(transparent)]
    Encode(#[from] EncodeError),
}
