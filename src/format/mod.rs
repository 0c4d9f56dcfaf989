//! The ingot columnar file format
//!
//! ```text
//! [magic "INGT"] [version u32]
//! [row group 0: column 0 chunk, column 1 chunk, ...]
//! [row group 1: ...]
//! [footer: schema descriptor | stats table | offset table]
//! [footer length u32] [magic "INGT"]
//! ```
//!
//! All integers are little-endian. Each chunk is one compressed column body
//! (see [`chunk`]); its codec and byte range are recorded in the offset table.
//! A file without its trailing magic is incomplete and must be rejected.

pub mod chunk;
pub mod compression;
pub(crate) mod cursor;
pub mod footer;
pub mod reader;
pub mod writer;

pub use compression::{Codec, Compressor, StandardCompressor};
pub use footer::{ChunkLocation, Footer, RowGroupMeta};
pub use reader::FileReader;
pub use writer::{encode, FileWriter, WriterState};

pub const MAGIC: &[u8; 4] = b"INGT";
pub const VERSION: u32 = 1;

/// Magic plus version
pub const HEADER_LEN: usize = 8;
/// Footer length plus magic
pub const TRAILER_LEN: usize = 8;
