//! Schema inference
//!
//! Types form a lattice with a total join ([`unify`]); the streaming
//! [`SchemaBuilder`] folds every record into one ordered, unified schema.

pub mod bigquery;
pub mod builder;
pub mod field;
pub mod format;
pub mod types;

pub use builder::{check_records, infer_schema, widen_lossy_columns, SchemaBuilder};
pub use field::{ColumnPath, Field, Fields, PathSegment, Schema};
pub use format::{detect_format, StringFormat};
pub use types::{infer, infer_value, unify, InferredType};
