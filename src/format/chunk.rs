//! Column chunk body codec
//!
//! A body is `u64 len`, the packed validity bitmap, then the values laid out
//! by the column type. Nested columns embed their children's bodies.

use super::cursor::ByteReader;
use crate::column::{Bitmap, ColumnArray, ColumnData};
use crate::error::{DecodeError, EncodeError};
use crate::schema::InferredType;

/// Serialize `array` (already sliced to one row group) onto `out`.
pub fn write_column(out: &mut Vec<u8>, array: &ColumnArray) -> Result<(), EncodeError> {
    out.extend_from_slice(&(array.len() as u64).to_le_bytes());
    out.extend_from_slice(array.validity().as_bytes());

    match array.data() {
        ColumnData::Null => {}
        ColumnData::Bool(values) => out.extend_from_slice(values.as_bytes()),
        ColumnData::Int64(values) => {
            out.reserve(values.len() * 8);
            for v in values {
                out.extend_from_slice(&v.to_le_bytes());
            }
        }
        ColumnData::Float64(values) => {
            out.reserve(values.len() * 8);
            for v in values {
                out.extend_from_slice(&v.to_le_bytes());
            }
        }
        ColumnData::Utf8 { offsets, values } => {
            write_offsets(out, offsets, "string data")?;
            out.extend_from_slice(values);
        }
        ColumnData::List { offsets, item } => {
            write_offsets(out, offsets, "list items")?;
            write_column(out, item)?;
        }
        ColumnData::Struct(children) => {
            for child in children {
                write_column(out, child)?;
            }
        }
    }
    Ok(())
}

fn write_offsets(out: &mut Vec<u8>, offsets: &[usize], what: &'static str) -> Result<(), EncodeError> {
    out.reserve(offsets.len() * 4);
    for &offset in offsets {
        let offset = u32::try_from(offset).map_err(|_| EncodeError::TooLarge { what, size: offset })?;
        out.extend_from_slice(&offset.to_le_bytes());
    }
    Ok(())
}

/// Largest body a column of type `ty` with `rows` rows can encode to.
///
/// `None` when the type holds variable-length data (strings or lists).
pub fn max_body_len(ty: &InferredType, rows: usize) -> Option<usize> {
    let bitmap = rows.div_ceil(8);
    let values = match ty {
        InferredType::Unknown | InferredType::Null => 0,
        InferredType::Bool => bitmap,
        InferredType::Int64 | InferredType::Float64 => rows.checked_mul(8)?,
        InferredType::String | InferredType::List(_) => return None,
        InferredType::Struct(fields) => fields
            .iter()
            .try_fold(0usize, |sum, field| sum.checked_add(max_body_len(&field.data_type, rows)?))?,
    };
    8usize.checked_add(bitmap)?.checked_add(values)
}

/// Decode one body of type `ty`, validating every length and offset.
pub fn read_column(reader: &mut ByteReader<'_>, ty: &InferredType) -> Result<ColumnArray, DecodeError> {
    let len = reader.len_u64("chunk length")?;
    let validity = read_bitmap(reader, len)?;

    let data = match ty {
        InferredType::Unknown | InferredType::Null => ColumnData::Null,
        InferredType::Bool => ColumnData::Bool(read_bitmap(reader, len)?),
        InferredType::Int64 => {
            let bytes = reader.take(byte_len(len, 8)?)?;
            ColumnData::Int64(
                bytes
                    .chunks_exact(8)
                    .map(|c| i64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
                    .collect(),
            )
        }
        InferredType::Float64 => {
            let bytes = reader.take(byte_len(len, 8)?)?;
            ColumnData::Float64(
                bytes
                    .chunks_exact(8)
                    .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
                    .collect(),
            )
        }
        InferredType::String => {
            let offsets = read_offsets(reader, len)?;
            let end = offsets.last().copied().unwrap_or(0);
            let values = reader.take(end)?.to_vec();
            for window in offsets.windows(2) {
                if std::str::from_utf8(&values[window[0]..window[1]]).is_err() {
                    return Err(DecodeError::corrupt("string data", "invalid UTF-8"));
                }
            }
            ColumnData::Utf8 { offsets, values }
        }
        InferredType::List(item_ty) => {
            let offsets = read_offsets(reader, len)?;
            let item = read_column(reader, item_ty)?;
            let expected = offsets.last().copied().unwrap_or(0);
            if item.len() != expected {
                return Err(DecodeError::corrupt(
                    "list items",
                    format!("offsets end at {} but {} items are stored", expected, item.len()),
                ));
            }
            ColumnData::List {
                offsets,
                item: Box::new(item),
            }
        }
        InferredType::Struct(fields) => {
            let mut children = Vec::with_capacity(fields.len());
            for field in fields {
                let child = read_column(reader, &field.data_type)?;
                if child.len() != len {
                    return Err(DecodeError::corrupt(
                        "struct member",
                        format!("`{}` has {} rows, expected {}", field.name, child.len(), len),
                    ));
                }
                children.push(child);
            }
            ColumnData::Struct(children)
        }
    };

    Ok(ColumnArray::from_parts(validity, data))
}

fn byte_len(len: usize, width: usize) -> Result<usize, DecodeError> {
    len.checked_mul(width)
        .ok_or_else(|| DecodeError::corrupt("chunk length", format!("{} rows overflow", len)))
}

fn read_bitmap(reader: &mut ByteReader<'_>, len: usize) -> Result<Bitmap, DecodeError> {
    let bytes = reader.take(len.div_ceil(8))?;
    Bitmap::from_packed(bytes, len).ok_or_else(|| DecodeError::corrupt("bitmap", "short bitmap"))
}

fn read_offsets(reader: &mut ByteReader<'_>, len: usize) -> Result<Vec<usize>, DecodeError> {
    let count = len
        .checked_add(1)
        .ok_or_else(|| DecodeError::corrupt("offsets", "row count overflow"))?;
    let bytes = reader.take(byte_len(count, 4)?)?;
    let offsets: Vec<usize> = bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]) as usize)
        .collect();

    if offsets.first() != Some(&0) {
        return Err(DecodeError::corrupt("offsets", "first offset is not zero"));
    }
    if offsets.windows(2).any(|w| w[0] > w[1]) {
        return Err(DecodeError::corrupt("offsets", "offsets decrease"));
    }
    Ok(offsets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::materialize;
    use crate::config::ConvertConfig;
    use crate::schema::infer_schema;
    use crate::value::JsonValue;
    use serde_json::json;

    fn body_round_trip(items: Vec<serde_json::Value>) {
        let records: Vec<JsonValue> = items.into_iter().map(JsonValue::from).collect();
        let schema = infer_schema(&records, &ConvertConfig::default()).unwrap();
        let columns = materialize(&records, &schema).unwrap();
        for (field, column) in schema.fields().iter().zip(&columns) {
            let mut out = Vec::new();
            write_column(&mut out, column).unwrap();
            let mut reader = ByteReader::new(&out);
            let decoded = read_column(&mut reader, &field.data_type).unwrap();
            assert_eq!(&decoded, column, "column {}", field.name);
            assert_eq!(reader.remaining(), 0);
        }
    }

    #[test]
    fn test_fixed_width_bodies_fill_their_bound() {
        let records: Vec<JsonValue> = (0..13)
            .map(|i| JsonValue::from(json!({"i": i, "b": i % 2 == 0, "p": {"x": 0.5, "n": null}})))
            .collect();
        let schema = infer_schema(&records, &ConvertConfig::default()).unwrap();
        let columns = materialize(&records, &schema).unwrap();
        for (field, column) in schema.fields().iter().zip(&columns) {
            let mut out = Vec::new();
            write_column(&mut out, column).unwrap();
            assert_eq!(max_body_len(&field.data_type, 13), Some(out.len()), "column {}", field.name);
        }
        assert_eq!(max_body_len(&InferredType::String, 13), None);
        assert_eq!(max_body_len(&InferredType::Int64, usize::MAX), None);
    }

    #[test]
    fn test_scalar_bodies() {
        body_round_trip(vec![
            json!({"i": 1, "f": 0.5, "s": "héllo", "b": true, "n": null}),
            json!({"i": null, "f": -2.25, "s": "", "b": false}),
            json!({"i": 3, "s": null}),
        ]);
    }

    #[test]
    fn test_nested_bodies() {
        body_round_trip(vec![
            json!({"l": [[1, 2], []], "o": {"x": "a", "y": [true]}}),
            json!({"l": null, "o": {"x": null}}),
            json!({"l": [[3]], "o": null}),
        ]);
    }

    #[test]
    fn test_layout_of_int_column() {
        let records = vec![JsonValue::from(json!({"a": 5})), JsonValue::from(json!({}))];
        let schema = infer_schema(&records, &ConvertConfig::default()).unwrap();
        let columns = materialize(&records, &schema).unwrap();
        let mut out = Vec::new();
        write_column(&mut out, &columns[0]).unwrap();

        let mut expected = 2u64.to_le_bytes().to_vec();
        expected.push(0b01);
        expected.extend_from_slice(&5i64.to_le_bytes());
        expected.extend_from_slice(&0i64.to_le_bytes());
        assert_eq!(out, expected);
    }

    #[test]
    fn test_truncated_body_is_rejected() {
        let records = vec![JsonValue::from(json!({"s": "abcdef"}))];
        let schema = infer_schema(&records, &ConvertConfig::default()).unwrap();
        let columns = materialize(&records, &schema).unwrap();
        let mut out = Vec::new();
        write_column(&mut out, &columns[0]).unwrap();
        out.truncate(out.len() - 2);
        let err = read_column(&mut ByteReader::new(&out), &InferredType::String).unwrap_err();
        assert!(matches!(err, DecodeError::Truncated { .. }));
    }

    #[test]
    fn test_decreasing_offsets_are_rejected() {
        let mut out = 1u64.to_le_bytes().to_vec();
        out.push(1);
        out.extend_from_slice(&4u32.to_le_bytes());
        out.extend_from_slice(&2u32.to_le_bytes());
        let err = read_column(&mut ByteReader::new(&out), &InferredType::String).unwrap_err();
        assert!(matches!(err, DecodeError::Corrupt { what: "offsets", .. }));
    }
}
