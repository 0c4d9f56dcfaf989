use crate::format::compression::Codec;

/// Configuration for a JSON-to-columnar conversion
#[derive(Debug, Clone)]
pub struct ConvertConfig {
    /// Maximum rows per row group (the last group may be smaller)
    pub row_group_size: usize,

    /// Codec applied to every column chunk
    pub codec: Codec,

    /// Compression level when `codec` is zstd
    pub zstd_level: i32,

    /// Store a chunk uncompressed instead of failing when compression fails
    pub fallback_uncompressed: bool,

    /// Widen columns to String when a value would lose precision.
    /// When false such values fail materialization with a `CoercionError`.
    pub widen_on_coercion_error: bool,

    /// Annotate String columns with a detected format (date, email, ...)
    pub detect_formats: bool,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        ConvertConfig {
            row_group_size: 10_000,
            codec: Codec::Lz4,
            zstd_level: 3,
            fallback_uncompressed: false,
            widen_on_coercion_error: true,
            detect_formats: true,
        }
    }
}

impl ConvertConfig {
    pub fn with_row_group_size(mut self, rows: usize) -> Self {
        self.row_group_size = rows;
        self
    }

    pub fn with_codec(mut self, codec: Codec) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_zstd_level(mut self, level: i32) -> Self {
        self.zstd_level = level;
        self
    }

    pub fn with_fallback_uncompressed(mut self, fallback: bool) -> Self {
        self.fallback_uncompressed = fallback;
        self
    }

    pub fn with_widening(mut self, widen: bool) -> Self {
        self.widen_on_coercion_error = widen;
        self
    }

    pub fn with_format_detection(mut self, detect: bool) -> Self {
        self.detect_formats = detect;
        self
    }
}
