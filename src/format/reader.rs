//! Footer-first decoder
//!
//! Reads the trailer, jumps to the footer and decodes chunks on demand.
//! Used to validate round trips and to inspect files; there is no query engine.

use log::debug;

use super::chunk;
use super::compression::decompress;
use super::cursor::ByteReader;
use super::footer::{ChunkLocation, Footer, RowGroupMeta};
use super::{HEADER_LEN, MAGIC, TRAILER_LEN, VERSION};
use crate::column::ColumnArray;
use crate::error::DecodeError;
use crate::schema::Schema;
use crate::value::JsonValue;

pub struct FileReader<'a> {
    bytes: &'a [u8],
    footer: Footer,
}

impl<'a> FileReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Result<Self, DecodeError> {
        if bytes.len() < HEADER_LEN + TRAILER_LEN {
            return Err(DecodeError::TooShort(bytes.len()));
        }
        if &bytes[..4] != MAGIC {
            return Err(DecodeError::BadMagic("header"));
        }
        if &bytes[bytes.len() - 4..] != MAGIC {
            return Err(DecodeError::BadMagic("trailer"));
        }

        let mut header = ByteReader::new(&bytes[4..HEADER_LEN]);
        let version = header.u32()?;
        if version != VERSION {
            return Err(DecodeError::UnsupportedVersion(version));
        }

        let trailer_start = bytes.len() - TRAILER_LEN;
        let footer_len = ByteReader::new(&bytes[trailer_start..]).u32()? as usize;
        let footer_start = trailer_start
            .checked_sub(footer_len)
            .filter(|&start| start >= HEADER_LEN)
            .ok_or_else(|| {
                DecodeError::corrupt("trailer", format!("footer length {} exceeds file", footer_len))
            })?;

        let footer = Footer::from_bytes(&bytes[footer_start..trailer_start])?;
        validate_locations(&footer, footer_start)?;
        debug!(
            "Opened file: {} columns, {} rows, {} row groups",
            footer.schema.len(),
            footer.row_count,
            footer.row_groups.len()
        );

        Ok(FileReader { bytes, footer })
    }

    pub fn schema(&self) -> &Schema {
        &self.footer.schema
    }

    pub fn row_count(&self) -> u64 {
        self.footer.row_count
    }

    pub fn row_groups(&self) -> &[RowGroupMeta] {
        &self.footer.row_groups
    }

    pub fn locations(&self) -> &[ChunkLocation] {
        &self.footer.locations
    }

    pub fn footer(&self) -> &Footer {
        &self.footer
    }

    /// Decode the chunk of column `column` in row group `row_group`.
    pub fn read_column(&self, row_group: usize, column: usize) -> Result<ColumnArray, DecodeError> {
        let missing = DecodeError::MissingChunk { row_group, column };
        let (Some(field), Some(group)) = (self.schema().field(column), self.row_groups().get(row_group)) else {
            return Err(missing);
        };
        let loc = self.footer.location(row_group, column).ok_or(missing)?;

        // Ranges were checked against the file in `new`
        let start = loc.offset as usize;
        let raw = &self.bytes[start..start + loc.length as usize];
        let rows = usize::try_from(group.row_count)
            .map_err(|_| DecodeError::corrupt("stats table", "row count out of range"))?;
        let limit = chunk::max_body_len(&field.data_type, rows).unwrap_or(usize::MAX);
        let body = decompress(raw, loc.codec, limit)?;

        let mut reader = ByteReader::new(&body);
        let array = chunk::read_column(&mut reader, &field.data_type)?;
        if reader.remaining() != 0 {
            return Err(DecodeError::corrupt(
                "column chunk",
                format!("{} trailing bytes", reader.remaining()),
            ));
        }
        if array.len() as u64 != group.row_count {
            return Err(DecodeError::corrupt(
                "column chunk",
                format!("{} rows, row group has {}", array.len(), group.row_count),
            ));
        }
        Ok(array)
    }

    /// Every column with all row groups concatenated.
    pub fn read_columns(&self) -> Result<Vec<ColumnArray>, DecodeError> {
        let rows = usize::try_from(self.row_count())
            .map_err(|_| DecodeError::corrupt("stats table", "row count out of range"))?;
        self.schema()
            .fields()
            .iter()
            .enumerate()
            .map(|(column, field)| -> Result<ColumnArray, DecodeError> {
                let mut out = ColumnArray::new_empty(&field.data_type, rows.min(1 << 20));
                for row_group in 0..self.row_groups().len() {
                    out.extend_from(&self.read_column(row_group, column)?);
                }
                Ok(out)
            })
            .collect()
    }

    /// Rebuild records. Absent fields come back as explicit nulls.
    pub fn read_records(&self) -> Result<Vec<JsonValue>, DecodeError> {
        let columns = self.read_columns()?;
        let fields = self.schema().fields().as_slice();
        let rows = self.row_count() as usize;
        Ok((0..rows)
            .map(|row| {
                JsonValue::Object(
                    fields
                        .iter()
                        .zip(&columns)
                        .map(|(field, column)| (field.name.clone(), column.value_at(row, &field.data_type)))
                        .collect(),
                )
            })
            .collect())
    }
}

fn validate_locations(footer: &Footer, footer_start: usize) -> Result<(), DecodeError> {
    let columns = footer.schema.len();
    let groups = footer.row_groups.len();
    for loc in &footer.locations {
        if loc.row_group as usize >= groups || loc.column as usize >= columns {
            return Err(DecodeError::corrupt(
                "offset table",
                format!("entry for row group {} column {} is out of range", loc.row_group, loc.column),
            ));
        }
        let end = loc.offset.checked_add(loc.length);
        if loc.offset < HEADER_LEN as u64 || end.map_or(true, |end| end > footer_start as u64) {
            return Err(DecodeError::corrupt(
                "offset table",
                format!("chunk at {}+{} lies outside the data region", loc.offset, loc.length),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::materialize;
    use crate::config::ConvertConfig;
    use crate::error::CompressionError;
    use crate::format::{encode, Codec};
    use crate::schema::infer_schema;
    use serde_json::json;

    fn file(items: Vec<serde_json::Value>, config: &ConvertConfig) -> Vec<u8> {
        let records: Vec<JsonValue> = items.into_iter().map(JsonValue::from).collect();
        let schema = infer_schema(&records, config).unwrap();
        let columns = materialize(&records, &schema).unwrap();
        encode(&schema, &columns, config).unwrap()
    }

    #[test]
    fn test_records_come_back() {
        let config = ConvertConfig::default().with_row_group_size(2);
        let bytes = file(
            vec![
                json!({"a": 1, "b": {"c": "x"}}),
                json!({"a": 2.5, "b": null}),
                json!({"b": {"c": "y"}}),
            ],
            &config,
        );
        let reader = FileReader::new(&bytes).unwrap();
        assert_eq!(reader.row_count(), 3);
        assert_eq!(
            reader.read_records().unwrap(),
            vec![
                JsonValue::from(json!({"a": 1.0, "b": {"c": "x"}})),
                JsonValue::from(json!({"a": 2.5, "b": null})),
                JsonValue::from(json!({"a": null, "b": {"c": "y"}})),
            ]
        );
    }

    #[test]
    fn test_every_codec_reads_back() {
        let items: Vec<_> = (0..30).map(|i| json!({"n": i, "s": format!("v{}", i)})).collect();
        for codec in [Codec::None, Codec::Lz4, Codec::Zstd] {
            let config = ConvertConfig::default().with_codec(codec).with_row_group_size(8);
            let bytes = file(items.clone(), &config);
            let reader = FileReader::new(&bytes).unwrap();
            assert!(reader.locations().iter().all(|l| l.codec == codec));
            assert_eq!(reader.read_records().unwrap().len(), 30);
        }
    }

    #[test]
    fn test_rejects_bad_magic_and_version() {
        let bytes = file(vec![json!({"a": 1})], &ConvertConfig::default());

        let mut head = bytes.clone();
        head[0] = b'X';
        assert!(matches!(FileReader::new(&head), Err(DecodeError::BadMagic("header"))));

        let mut tail = bytes.clone();
        let last = tail.len() - 1;
        tail[last] = b'X';
        assert!(matches!(FileReader::new(&tail), Err(DecodeError::BadMagic("trailer"))));

        let mut version = bytes.clone();
        version[4] = 9;
        assert!(matches!(FileReader::new(&version), Err(DecodeError::UnsupportedVersion(9))));

        assert!(matches!(FileReader::new(&bytes[..10]), Err(DecodeError::TooShort(10))));
    }

    #[test]
    fn test_truncated_file_is_rejected() {
        let bytes = file(vec![json!({"a": "hello"}), json!({"a": "world"})], &ConvertConfig::default());
        for cut in [1, 4, 9, bytes.len() / 2] {
            assert!(FileReader::new(&bytes[..bytes.len() - cut]).is_err(), "cut {}", cut);
        }
    }

    #[test]
    fn test_oversized_footer_length() {
        let mut bytes = file(vec![json!({"a": 1})], &ConvertConfig::default());
        let at = bytes.len() - TRAILER_LEN;
        bytes[at..at + 4].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(matches!(
            FileReader::new(&bytes),
            Err(DecodeError::Corrupt { what: "trailer", .. })
        ));
    }

    #[test]
    fn test_missing_chunk() {
        let bytes = file(vec![json!({"a": 1})], &ConvertConfig::default());
        let reader = FileReader::new(&bytes).unwrap();
        assert!(matches!(
            reader.read_column(1, 0),
            Err(DecodeError::MissingChunk { row_group: 1, column: 0 })
        ));
        assert!(matches!(
            reader.read_column(0, 5),
            Err(DecodeError::MissingChunk { .. })
        ));
    }

    #[test]
    fn test_inflated_size_prefix_is_rejected() {
        let config = ConvertConfig::default().with_codec(Codec::Lz4);
        let mut bytes = file(vec![json!({"a": 1}), json!({"a": 2})], &config);
        let start = FileReader::new(&bytes).unwrap().locations()[0].offset as usize;
        bytes[start..start + 4].copy_from_slice(&u32::MAX.to_le_bytes());

        let reader = FileReader::new(&bytes).unwrap();
        assert!(matches!(
            reader.read_column(0, 0),
            Err(DecodeError::Compression(CompressionError::TooLarge { .. }))
        ));
    }
}
