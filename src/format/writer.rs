//! Encoder state machine
//!
//! Every row group moves through `Buffering → Stats → Compressing → Flushed`.
//! Statistics and compression run on the rayon pool, one task per column;
//! this writer alone appends the compressed chunks, in column order, and
//! keeps the offset bookkeeping. Any error moves the writer to `Failed`,
//! after which it refuses all work and never writes a trailer.

use log::{debug, trace, warn};
use rayon::prelude::*;
use std::io::Write;

use super::chunk::write_column;
use super::compression::{valid_zstd_level, Codec, Compressor, StandardCompressor};
use super::footer::{ChunkLocation, Footer, RowGroupMeta};
use super::{HEADER_LEN, MAGIC, VERSION};
use crate::column::{stats, ChunkStats, ColumnArray};
use crate::config::ConvertConfig;
use crate::error::EncodeError;
use crate::schema::Schema;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    /// Header written, no row groups yet
    Init,
    Buffering,
    Stats,
    Compressing,
    /// Last row group fully appended
    Flushed,
    FooterWritten,
    /// Trailer written; terminal
    Closed,
    /// A write failed; terminal, no trailer
    Failed,
}

pub struct FileWriter<W: Write> {
    sink: W,
    schema: Schema,
    row_group_size: usize,
    codec: Codec,
    compressor: Box<dyn Compressor>,
    fallback_uncompressed: bool,
    state: WriterState,
    offset: u64,
    row_count: u64,
    row_groups: Vec<RowGroupMeta>,
    locations: Vec<ChunkLocation>,
}

impl<W: Write> FileWriter<W> {
    /// Validate the configuration and write the file header.
    pub fn try_new(mut sink: W, schema: Schema, config: &ConvertConfig) -> Result<Self, EncodeError> {
        if config.row_group_size == 0 {
            return Err(EncodeError::InvalidConfig("row_group_size must be at least 1".to_string()));
        }
        if config.codec == Codec::Zstd && !valid_zstd_level(config.zstd_level) {
            return Err(EncodeError::InvalidConfig(format!(
                "zstd level {} is outside the supported range",
                config.zstd_level
            )));
        }

        sink.write_all(MAGIC)?;
        sink.write_all(&VERSION.to_le_bytes())?;
        trace!("writer: header written, state {:?}", WriterState::Init);

        Ok(FileWriter {
            sink,
            schema,
            row_group_size: config.row_group_size,
            codec: config.codec,
            compressor: Box::new(StandardCompressor {
                zstd_level: config.zstd_level,
            }),
            fallback_uncompressed: config.fallback_uncompressed,
            state: WriterState::Init,
            offset: HEADER_LEN as u64,
            row_count: 0,
            row_groups: Vec::new(),
            locations: Vec::new(),
        })
    }

    /// Replace the built-in codecs with `compressor`.
    pub fn with_compressor(mut self, compressor: impl Compressor + 'static) -> Self {
        self.compressor = Box::new(compressor);
        self
    }

    pub fn state(&self) -> WriterState {
        self.state
    }

    pub fn bytes_written(&self) -> u64 {
        self.offset
    }

    pub fn row_count(&self) -> u64 {
        self.row_count
    }

    pub fn row_group_count(&self) -> usize {
        self.row_groups.len()
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn into_inner(self) -> W {
        self.sink
    }

    fn transition(&mut self, next: WriterState) {
        trace!("writer: {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn fail<T>(&mut self, err: EncodeError) -> Result<T, EncodeError> {
        self.transition(WriterState::Failed);
        Err(err)
    }

    fn check_writable(&self, operation: &'static str) -> Result<(), EncodeError> {
        match self.state {
            WriterState::Init | WriterState::Flushed => Ok(()),
            WriterState::Closed => Err(EncodeError::Closed),
            state => Err(EncodeError::InvalidState { operation, state }),
        }
    }

    /// Split whole columns of `row_count` rows into row groups and write them all.
    pub fn write_columns(&mut self, row_count: usize, columns: &[ColumnArray]) -> Result<(), EncodeError> {
        self.check_writable("write columns")?;
        self.check_shape(row_count, columns)?;

        let mut start = 0;
        while start < row_count {
            let end = (start + self.row_group_size).min(row_count);
            let group: Vec<ColumnArray> = columns.iter().map(|c| c.slice(start..end)).collect();
            self.write_row_group(end - start, &group)?;
            start = end;
        }
        Ok(())
    }

    /// Write one row group. Every column must hold exactly `row_count` rows.
    pub fn write_row_group(&mut self, row_count: usize, columns: &[ColumnArray]) -> Result<(), EncodeError> {
        self.check_writable("write a row group")?;
        self.check_shape(row_count, columns)?;
        if row_count > self.row_group_size {
            return Err(EncodeError::InvalidConfig(format!(
                "row group of {} rows exceeds row_group_size {}",
                row_count, self.row_group_size
            )));
        }

        let row_group = self.row_groups.len();
        self.transition(WriterState::Buffering);

        self.transition(WriterState::Stats);
        let stats: Vec<ChunkStats> = columns
            .par_iter()
            .map(|column| stats::collect(column, 0..row_count))
            .collect();

        self.transition(WriterState::Compressing);
        let chunks = match self.compress_columns(row_group, columns) {
            Ok(chunks) => chunks,
            Err(err) => return self.fail(err),
        };

        for (column, (bytes, codec)) in chunks.into_iter().enumerate() {
            if let Err(err) = self.sink.write_all(&bytes) {
                return self.fail(err.into());
            }
            trace!(
                "row group {} column {}: {} bytes at offset {} ({})",
                row_group,
                column,
                bytes.len(),
                self.offset,
                codec
            );
            self.locations.push(ChunkLocation {
                row_group: row_group as u32,
                column: column as u32,
                offset: self.offset,
                length: bytes.len() as u64,
                codec,
            });
            self.offset += bytes.len() as u64;
        }

        self.row_groups.push(RowGroupMeta {
            row_count: row_count as u64,
            columns: stats,
        });
        self.row_count += row_count as u64;
        self.transition(WriterState::Flushed);
        debug!("Wrote row group {} ({} rows)", row_group, row_count);
        Ok(())
    }

    fn check_shape(&self, row_count: usize, columns: &[ColumnArray]) -> Result<(), EncodeError> {
        if columns.len() != self.schema.len() {
            return Err(EncodeError::ColumnCountMismatch {
                expected: self.schema.len(),
                found: columns.len(),
            });
        }
        if let Some((column, array)) = columns.iter().enumerate().find(|(_, c)| c.len() != row_count) {
            return Err(EncodeError::RowCountMismatch {
                column,
                expected: row_count,
                found: array.len(),
            });
        }
        Ok(())
    }

    fn compress_columns(
        &self,
        row_group: usize,
        columns: &[ColumnArray],
    ) -> Result<Vec<(Vec<u8>, Codec)>, EncodeError> {
        let (codec, fallback) = (self.codec, self.fallback_uncompressed);
        let compressor = self.compressor.as_ref();
        columns
            .par_iter()
            .enumerate()
            .map(|(column, array)| {
                let mut body = Vec::new();
                write_column(&mut body, array)?;
                match compressor.compress(&body, codec) {
                    Ok(packed) => Ok((packed, codec)),
                    Err(source) if fallback => {
                        warn!(
                            "{} failed for row group {} column {} ({}); storing uncompressed",
                            codec, row_group, column, source
                        );
                        Ok((body, Codec::None))
                    }
                    Err(source) => Err(EncodeError::CompressionFailure {
                        row_group,
                        column,
                        codec,
                        source,
                    }),
                }
            })
            .collect()
    }

    /// Write the footer and trailer. The file is complete only after this returns `Ok`.
    pub fn finish(&mut self) -> Result<u64, EncodeError> {
        self.check_writable("finish")?;

        let footer = Footer {
            schema: self.schema.clone(),
            row_count: self.row_count,
            row_groups: std::mem::take(&mut self.row_groups),
            locations: std::mem::take(&mut self.locations),
        };
        let bytes = match footer.to_bytes() {
            Ok(bytes) => bytes,
            Err(err) => return self.fail(err),
        };
        let footer_len = match u32::try_from(bytes.len()) {
            Ok(len) => len,
            Err(_) => {
                return self.fail(EncodeError::TooLarge {
                    what: "footer",
                    size: bytes.len(),
                })
            }
        };
        self.row_groups = footer.row_groups;
        self.locations = footer.locations;

        if let Err(err) = self.sink.write_all(&bytes) {
            return self.fail(err.into());
        }
        self.offset += bytes.len() as u64;
        self.transition(WriterState::FooterWritten);

        let trailer = self
            .sink
            .write_all(&footer_len.to_le_bytes())
            .and_then(|_| self.sink.write_all(MAGIC))
            .and_then(|_| self.sink.flush());
        if let Err(err) = trailer {
            return self.fail(err.into());
        }
        self.offset += 8;
        self.transition(WriterState::Closed);

        debug!(
            "Closed file: {} rows in {} row groups, {} bytes",
            self.row_count,
            self.row_groups.len(),
            self.offset
        );
        Ok(self.offset)
    }
}

/// Encode whole columns into a complete file held in memory.
pub fn encode(schema: &Schema, columns: &[ColumnArray], config: &ConvertConfig) -> Result<Vec<u8>, EncodeError> {
    let row_count = columns.first().map_or(0, ColumnArray::len);
    let mut writer = FileWriter::try_new(Vec::new(), schema.clone(), config)?;
    writer.write_columns(row_count, columns)?;
    writer.finish()?;
    Ok(writer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::materialize;
    use crate::error::CompressionError;
    use crate::format::{FileReader, TRAILER_LEN};
    use crate::schema::infer_schema;
    use crate::value::JsonValue;
    use serde_json::json;
    use std::io;

    fn sample(n: usize) -> (Schema, Vec<ColumnArray>) {
        let records: Vec<JsonValue> = (0..n)
            .map(|i| JsonValue::from(json!({"id": i, "name": format!("user{}", i % 3)})))
            .collect();
        let schema = infer_schema(&records, &ConvertConfig::default()).unwrap();
        let columns = materialize(&records, &schema).unwrap();
        (schema, columns)
    }

    /// Sink that fails after accepting `limit` bytes.
    struct FailingSink {
        written: Vec<u8>,
        limit: usize,
    }

    impl Write for FailingSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.written.len() + buf.len() > self.limit {
                return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
            }
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_row_groups_split_by_size() {
        let (schema, columns) = sample(25);
        let config = ConvertConfig::default().with_row_group_size(10);
        let bytes = encode(&schema, &columns, &config).unwrap();
        let reader = FileReader::new(&bytes).unwrap();
        let sizes: Vec<u64> = reader.row_groups().iter().map(|g| g.row_count).collect();
        assert_eq!(sizes, vec![10, 10, 5]);
        assert_eq!(reader.locations().len(), 6);
    }

    #[test]
    fn test_chunks_are_row_group_major() {
        let (schema, columns) = sample(5);
        let config = ConvertConfig::default().with_row_group_size(2);
        let bytes = encode(&schema, &columns, &config).unwrap();
        let reader = FileReader::new(&bytes).unwrap();
        let order: Vec<(u32, u32)> = reader.locations().iter().map(|l| (l.row_group, l.column)).collect();
        assert_eq!(order, vec![(0, 0), (0, 1), (1, 0), (1, 1), (2, 0), (2, 1)]);
        let offsets: Vec<u64> = reader.locations().iter().map(|l| l.offset).collect();
        assert!(offsets.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(offsets[0], HEADER_LEN as u64);
    }

    #[test]
    fn test_state_transitions() {
        let (schema, columns) = sample(3);
        let mut writer = FileWriter::try_new(Vec::new(), schema, &ConvertConfig::default()).unwrap();
        assert_eq!(writer.state(), WriterState::Init);
        writer.write_row_group(3, &columns).unwrap();
        assert_eq!(writer.state(), WriterState::Flushed);
        writer.finish().unwrap();
        assert_eq!(writer.state(), WriterState::Closed);

        assert!(matches!(writer.write_row_group(3, &columns), Err(EncodeError::Closed)));
        assert!(matches!(writer.finish(), Err(EncodeError::Closed)));
    }

    #[test]
    fn test_zero_row_group_size_is_rejected() {
        let config = ConvertConfig::default().with_row_group_size(0);
        let result = FileWriter::try_new(Vec::new(), Schema::empty(), &config);
        assert!(matches!(result, Err(EncodeError::InvalidConfig(_))));
    }

    #[test]
    fn test_shape_is_checked() {
        let (schema, columns) = sample(3);
        let mut writer = FileWriter::try_new(Vec::new(), schema, &ConvertConfig::default()).unwrap();
        assert!(matches!(
            writer.write_row_group(3, &columns[..1]),
            Err(EncodeError::ColumnCountMismatch { expected: 2, found: 1 })
        ));
        assert!(matches!(
            writer.write_row_group(4, &columns),
            Err(EncodeError::RowCountMismatch { column: 0, .. })
        ));
        // Shape errors are caught before any byte is written
        assert_eq!(writer.state(), WriterState::Init);
    }

    #[test]
    fn test_failed_sink_poisons_writer_without_trailer() {
        let (schema, columns) = sample(50);
        let sink = FailingSink {
            written: Vec::new(),
            limit: 20,
        };
        let mut writer = FileWriter::try_new(sink, schema, &ConvertConfig::default()).unwrap();
        assert!(matches!(writer.write_columns(50, &columns), Err(EncodeError::Io(_))));
        assert_eq!(writer.state(), WriterState::Failed);
        assert!(matches!(
            writer.finish(),
            Err(EncodeError::InvalidState {
                state: WriterState::Failed,
                ..
            })
        ));

        let written = writer.into_inner().written;
        assert_eq!(written.len(), HEADER_LEN);
        assert!(FileReader::new(&written).is_err());
    }

    /// Compressor that always fails.
    struct Refusing;

    impl Compressor for Refusing {
        fn compress(&self, _input: &[u8], _codec: Codec) -> Result<Vec<u8>, CompressionError> {
            Err(CompressionError::Other("refused".to_string()))
        }
    }

    #[test]
    fn test_compression_failure_poisons_writer() {
        let (schema, columns) = sample(10);
        let mut writer = FileWriter::try_new(Vec::new(), schema, &ConvertConfig::default())
            .unwrap()
            .with_compressor(Refusing);
        assert!(matches!(
            writer.write_columns(10, &columns),
            Err(EncodeError::CompressionFailure {
                row_group: 0,
                codec: Codec::Lz4,
                ..
            })
        ));
        assert_eq!(writer.state(), WriterState::Failed);
        assert!(writer.finish().is_err());

        let written = writer.into_inner();
        assert_eq!(written.len(), HEADER_LEN);
        assert!(FileReader::new(&written).is_err());
    }

    #[test]
    fn test_compression_failure_falls_back_to_uncompressed() {
        let (schema, columns) = sample(10);
        let config = ConvertConfig::default()
            .with_row_group_size(4)
            .with_fallback_uncompressed(true);
        let mut writer = FileWriter::try_new(Vec::new(), schema, &config)
            .unwrap()
            .with_compressor(Refusing);
        writer.write_columns(10, &columns).unwrap();
        writer.finish().unwrap();

        let bytes = writer.into_inner();
        let reader = FileReader::new(&bytes).unwrap();
        assert!(reader.locations().iter().all(|l| l.codec == Codec::None));
        let records = reader.read_records().unwrap();
        assert_eq!(records.len(), 10);
        assert_eq!(records[9].get("name"), Some(&JsonValue::Str("user0".into())));
    }

    #[test]
    fn test_invalid_zstd_level_is_rejected() {
        for level in [1000, i32::MAX, -1_000_000] {
            let config = ConvertConfig::default().with_codec(Codec::Zstd).with_zstd_level(level);
            let result = FileWriter::try_new(Vec::new(), Schema::empty(), &config);
            assert!(matches!(result, Err(EncodeError::InvalidConfig(_))), "level {}", level);
        }
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let (schema, columns) = sample(40);
        for codec in [Codec::None, Codec::Lz4, Codec::Zstd] {
            let config = ConvertConfig::default().with_row_group_size(7).with_codec(codec);
            let first = encode(&schema, &columns, &config).unwrap();
            let second = encode(&schema, &columns, &config).unwrap();
            assert_eq!(first, second, "{}", codec);
        }
    }

    #[test]
    fn test_empty_file_layout() {
        let bytes = encode(&Schema::empty(), &[], &ConvertConfig::default()).unwrap();
        assert_eq!(&bytes[..4], MAGIC);
        assert_eq!(&bytes[bytes.len() - 4..], MAGIC);
        assert_eq!(bytes.len(), HEADER_LEN + 20 + TRAILER_LEN);
    }
}
