//! Columnar materialization
//!
//! Records are turned into one [`ColumnArray`] per top-level field, values
//! coerced to the field's final type. Statistics are computed per chunk.

pub mod array;
pub mod bitmap;
pub mod builder;
pub mod coerce;
pub mod stats;

pub use array::{ColumnArray, ColumnData};
pub use bitmap::Bitmap;
pub use builder::{materialize, ColumnBuilder};
pub use stats::{ChunkStats, ScalarValue};
