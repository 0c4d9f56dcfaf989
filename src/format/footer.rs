//! Footer codec: schema descriptor, stats table and offset table

use serde::Serialize;

use super::compression::Codec;
use super::cursor::ByteReader;
use crate::column::{ChunkStats, ScalarValue};
use crate::error::{DecodeError, EncodeError};
use crate::schema::{Field, Fields, InferredType, Schema, StringFormat};

/// Nesting deeper than this is treated as corruption.
const MAX_TYPE_DEPTH: usize = 128;

/// Where one column chunk lives in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChunkLocation {
    pub row_group: u32,
    pub column: u32,
    /// Absolute byte offset from the start of the file
    pub offset: u64,
    pub length: u64,
    pub codec: Codec,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowGroupMeta {
    pub row_count: u64,
    /// One entry per schema column, in schema order
    pub columns: Vec<ChunkStats>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Footer {
    pub schema: Schema,
    pub row_count: u64,
    pub row_groups: Vec<RowGroupMeta>,
    pub locations: Vec<ChunkLocation>,
}

impl Footer {
    pub fn location(&self, row_group: usize, column: usize) -> Option<&ChunkLocation> {
        self.locations
            .iter()
            .find(|loc| loc.row_group as usize == row_group && loc.column as usize == column)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, EncodeError> {
        let mut out = Vec::new();

        // Schema descriptor
        put_u32(&mut out, self.schema.len(), "schema")?;
        for field in self.schema.fields() {
            write_field(&mut out, field)?;
        }

        // Stats table
        out.extend_from_slice(&self.row_count.to_le_bytes());
        put_u32(&mut out, self.row_groups.len(), "row group count")?;
        for group in &self.row_groups {
            out.extend_from_slice(&group.row_count.to_le_bytes());
            for stats in &group.columns {
                write_stats(&mut out, stats)?;
            }
        }

        // Offset table
        put_u32(&mut out, self.locations.len(), "offset table")?;
        for loc in &self.locations {
            out.extend_from_slice(&loc.row_group.to_le_bytes());
            out.extend_from_slice(&loc.column.to_le_bytes());
            out.extend_from_slice(&loc.offset.to_le_bytes());
            out.extend_from_slice(&loc.length.to_le_bytes());
            out.push(loc.codec.id());
        }

        Ok(out)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Footer, DecodeError> {
        let mut reader = ByteReader::new(bytes);

        let field_count = reader.u32()? as usize;
        let mut fields = Vec::with_capacity(field_count.min(1024));
        for _ in 0..field_count {
            fields.push(read_field(&mut reader, 0)?);
        }
        let schema = Schema::new(fields);
        if schema.len() != field_count {
            return Err(DecodeError::corrupt("schema", "duplicate column names"));
        }

        let row_count = reader.u64()?;
        let group_count = reader.u32()? as usize;
        let mut row_groups = Vec::with_capacity(group_count.min(1024));
        for _ in 0..group_count {
            let rows = reader.u64()?;
            let mut columns = Vec::with_capacity(field_count);
            for _ in 0..field_count {
                columns.push(read_stats(&mut reader)?);
            }
            row_groups.push(RowGroupMeta {
                row_count: rows,
                columns,
            });
        }
        let total = row_groups
            .iter()
            .try_fold(0u64, |sum, group| sum.checked_add(group.row_count))
            .ok_or_else(|| DecodeError::corrupt("stats table", "row group sizes overflow"))?;
        if total != row_count {
            return Err(DecodeError::corrupt(
                "stats table",
                format!("row groups hold {} rows, file claims {}", total, row_count),
            ));
        }

        let entry_count = reader.u32()? as usize;
        let mut locations = Vec::with_capacity(entry_count.min(1 << 16));
        for _ in 0..entry_count {
            let row_group = reader.u32()?;
            let column = reader.u32()?;
            let offset = reader.u64()?;
            let length = reader.u64()?;
            let codec_id = reader.u8()?;
            let codec = Codec::from_id(codec_id)
                .ok_or_else(|| DecodeError::corrupt("offset table", format!("unknown codec id {}", codec_id)))?;
            locations.push(ChunkLocation {
                row_group,
                column,
                offset,
                length,
                codec,
            });
        }

        if reader.remaining() != 0 {
            return Err(DecodeError::corrupt(
                "footer",
                format!("{} trailing bytes", reader.remaining()),
            ));
        }

        Ok(Footer {
            schema,
            row_count,
            row_groups,
            locations,
        })
    }
}

fn put_u32(out: &mut Vec<u8>, n: usize, what: &'static str) -> Result<(), EncodeError> {
    let n = u32::try_from(n).map_err(|_| EncodeError::TooLarge { what, size: n })?;
    out.extend_from_slice(&n.to_le_bytes());
    Ok(())
}

fn write_field(out: &mut Vec<u8>, field: &Field) -> Result<(), EncodeError> {
    let name = field.name.as_bytes();
    let len = u16::try_from(name.len()).map_err(|_| EncodeError::TooLarge {
        what: "column name",
        size: name.len(),
    })?;
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(name);
    out.push(field.nullable as u8);
    out.push(field.format.map_or(0, StringFormat::id));
    write_type(out, &field.data_type)
}

fn write_type(out: &mut Vec<u8>, ty: &InferredType) -> Result<(), EncodeError> {
    match ty {
        InferredType::Unknown => out.push(0),
        InferredType::Null => out.push(1),
        InferredType::Bool => out.push(2),
        InferredType::Int64 => out.push(3),
        InferredType::Float64 => out.push(4),
        InferredType::String => out.push(5),
        InferredType::List(item) => {
            out.push(6);
            write_type(out, item)?;
        }
        InferredType::Struct(fields) => {
            out.push(7);
            put_u32(out, fields.len(), "struct")?;
            for field in fields {
                write_field(out, field)?;
            }
        }
    }
    Ok(())
}

fn read_field(reader: &mut ByteReader<'_>, depth: usize) -> Result<Field, DecodeError> {
    let len = reader.u16()? as usize;
    let name = std::str::from_utf8(reader.take(len)?)
        .map_err(|_| DecodeError::corrupt("schema", "column name is not UTF-8"))?
        .to_string();
    let nullable = match reader.u8()? {
        0 => false,
        1 => true,
        other => return Err(DecodeError::corrupt("schema", format!("nullable flag {}", other))),
    };
    let format = match reader.u8()? {
        0 => None,
        id => Some(
            StringFormat::from_id(id)
                .ok_or_else(|| DecodeError::corrupt("schema", format!("unknown format id {}", id)))?,
        ),
    };
    let data_type = read_type(reader, depth)?;
    Ok(Field::new(name, data_type, nullable).with_format(format))
}

fn read_type(reader: &mut ByteReader<'_>, depth: usize) -> Result<InferredType, DecodeError> {
    if depth > MAX_TYPE_DEPTH {
        return Err(DecodeError::corrupt("schema", "type nesting too deep"));
    }
    Ok(match reader.u8()? {
        0 => InferredType::Unknown,
        1 => InferredType::Null,
        2 => InferredType::Bool,
        3 => InferredType::Int64,
        4 => InferredType::Float64,
        5 => InferredType::String,
        6 => InferredType::List(Box::new(read_type(reader, depth + 1)?)),
        7 => {
            let n = reader.u32()? as usize;
            let mut fields = Fields::new();
            for _ in 0..n {
                let field = read_field(reader, depth + 1)?;
                if fields.get(&field.name).is_some() {
                    return Err(DecodeError::corrupt("schema", format!("duplicate member `{}`", field.name)));
                }
                fields.merge_field(field);
            }
            InferredType::Struct(fields)
        }
        tag => return Err(DecodeError::corrupt("schema", format!("unknown type tag {}", tag))),
    })
}

fn write_stats(out: &mut Vec<u8>, stats: &ChunkStats) -> Result<(), EncodeError> {
    out.extend_from_slice(&stats.row_count.to_le_bytes());
    out.extend_from_slice(&stats.null_count.to_le_bytes());
    match stats.distinct_count {
        Some(n) => {
            out.push(1);
            out.extend_from_slice(&n.to_le_bytes());
        }
        None => out.push(0),
    }
    write_scalar(out, stats.min.as_ref())?;
    write_scalar(out, stats.max.as_ref())
}

fn write_scalar(out: &mut Vec<u8>, value: Option<&ScalarValue>) -> Result<(), EncodeError> {
    match value {
        None => out.push(0),
        Some(ScalarValue::Bool(b)) => {
            out.push(1);
            out.push(*b as u8);
        }
        Some(ScalarValue::Int64(i)) => {
            out.push(2);
            out.extend_from_slice(&i.to_le_bytes());
        }
        Some(ScalarValue::Float64(f)) => {
            out.push(3);
            out.extend_from_slice(&f.to_le_bytes());
        }
        Some(ScalarValue::String(s)) => {
            out.push(4);
            put_u32(out, s.len(), "string statistic")?;
            out.extend_from_slice(s.as_bytes());
        }
    }
    Ok(())
}

fn read_stats(reader: &mut ByteReader<'_>) -> Result<ChunkStats, DecodeError> {
    let row_count = reader.u64()?;
    let null_count = reader.u64()?;
    if null_count > row_count {
        return Err(DecodeError::corrupt(
            "stats table",
            format!("{} nulls in {} rows", null_count, row_count),
        ));
    }
    let distinct_count = match reader.u8()? {
        0 => None,
        _ => Some(reader.u64()?),
    };
    let min = read_scalar(reader)?;
    let max = read_scalar(reader)?;
    Ok(ChunkStats {
        row_count,
        null_count,
        distinct_count,
        min,
        max,
    })
}

fn read_scalar(reader: &mut ByteReader<'_>) -> Result<Option<ScalarValue>, DecodeError> {
    Ok(match reader.u8()? {
        0 => None,
        1 => Some(ScalarValue::Bool(reader.u8()? != 0)),
        2 => Some(ScalarValue::Int64(reader.i64()?)),
        3 => Some(ScalarValue::Float64(reader.f64()?)),
        4 => {
            let len = reader.u32()? as usize;
            let text = std::str::from_utf8(reader.take(len)?)
                .map_err(|_| DecodeError::corrupt("stats table", "string bound is not UTF-8"))?;
            Some(ScalarValue::String(text.to_string()))
        }
        tag => return Err(DecodeError::corrupt("stats table", format!("unknown scalar tag {}", tag))),
    })
}
