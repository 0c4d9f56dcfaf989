//! Chunk compression primitive
//!
//! Byte-in, byte-out. The codec id stored next to each chunk is all a
//! reader needs to undo it.

use std::fmt;
use std::io::Read;
use std::str::FromStr;

use crate::error::CompressionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    None,
    #[default]
    Lz4,
    Zstd,
}

impl Codec {
    /// Stable wire id
    pub fn id(self) -> u8 {
        match self {
            Codec::None => 0,
            Codec::Lz4 => 1,
            Codec::Zstd => 2,
        }
    }

    pub fn from_id(id: u8) -> Option<Codec> {
        match id {
            0 => Some(Codec::None),
            1 => Some(Codec::Lz4),
            2 => Some(Codec::Zstd),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Codec::None => "none",
            Codec::Lz4 => "lz4",
            Codec::Zstd => "zstd",
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Codec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "uncompressed" => Ok(Codec::None),
            "lz4" => Ok(Codec::Lz4),
            "zstd" | "zstandard" => Ok(Codec::Zstd),
            other => Err(format!("unknown compression codec '{}' (expected none, lz4 or zstd)", other)),
        }
    }
}

/// Byte-in, byte-out compression used by the writer for every chunk.
///
/// Implementations run on the rayon pool, one call per column.
pub trait Compressor: Send + Sync {
    fn compress(&self, input: &[u8], codec: Codec) -> Result<Vec<u8>, CompressionError>;
}

/// The built-in codecs: lz4_flex block format and zstd frames.
#[derive(Debug, Clone, Copy)]
pub struct StandardCompressor {
    pub zstd_level: i32,
}

impl Compressor for StandardCompressor {
    fn compress(&self, input: &[u8], codec: Codec) -> Result<Vec<u8>, CompressionError> {
        compress(input, codec, self.zstd_level)
    }
}

/// Whether `level` is accepted by the linked zstd library.
pub fn valid_zstd_level(level: i32) -> bool {
    zstd::compression_level_range().contains(&level)
}

pub fn compress(input: &[u8], codec: Codec, zstd_level: i32) -> Result<Vec<u8>, CompressionError> {
    match codec {
        Codec::None => Ok(input.to_vec()),
        Codec::Lz4 => Ok(lz4_flex::compress_prepend_size(input)),
        Codec::Zstd => {
            if !valid_zstd_level(zstd_level) {
                return Err(CompressionError::Level(zstd_level));
            }
            zstd::stream::encode_all(input, zstd_level).map_err(CompressionError::Zstd)
        }
    }
}

// An lz4 block cannot expand its input by more than this factor
const LZ4_MAX_RATIO: usize = 255;

/// Undo [`compress`]. Fails rather than produce more than `limit` bytes.
pub fn decompress(input: &[u8], codec: Codec, limit: usize) -> Result<Vec<u8>, CompressionError> {
    match codec {
        Codec::None => {
            if input.len() > limit {
                return Err(CompressionError::TooLarge {
                    size: input.len(),
                    limit,
                });
            }
            Ok(input.to_vec())
        }
        Codec::Lz4 => {
            if let Some(prefix) = input.get(..4) {
                let claimed = u32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
                let limit = limit.min((input.len() - 4).saturating_mul(LZ4_MAX_RATIO).saturating_add(16));
                if claimed > limit {
                    return Err(CompressionError::TooLarge { size: claimed, limit });
                }
            }
            Ok(lz4_flex::decompress_size_prepended(input)?)
        }
        Codec::Zstd => {
            let decoder = zstd::stream::Decoder::new(input).map_err(CompressionError::Zstd)?;
            let mut out = Vec::new();
            decoder
                .take((limit as u64).saturating_add(1))
                .read_to_end(&mut out)
                .map_err(CompressionError::Zstd)?;
            if out.len() > limit {
                return Err(CompressionError::TooLarge { size: out.len(), limit });
            }
            Ok(out)
        }
    }
}
