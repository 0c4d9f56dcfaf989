//! In-memory column arrays

use std::ops::Range;

use super::bitmap::Bitmap;
use crate::schema::InferredType;
use crate::value::JsonValue;

/// Value storage of a column, one variant per physical layout.
///
/// Offset vectors always hold `len + 1` entries and start at zero.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    /// Null and Unknown columns carry no values
    Null,
    Bool(Bitmap),
    Int64(Vec<i64>),
    Float64(Vec<f64>),
    Utf8 {
        offsets: Vec<usize>,
        values: Vec<u8>,
    },
    List {
        offsets: Vec<usize>,
        item: Box<ColumnArray>,
    },
    Struct(Vec<ColumnArray>),
}

/// A column: values plus a validity bitmap of the same length.
///
/// A row whose validity bit is 0 is null; its value slot holds a placeholder
/// (zero, empty string, empty list) that is never read.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnArray {
    pub(crate) validity: Bitmap,
    pub(crate) data: ColumnData,
}

impl ColumnArray {
    /// Empty array laid out for `ty`.
    pub fn new_empty(ty: &InferredType, capacity: usize) -> Self {
        let data = match ty {
            InferredType::Unknown | InferredType::Null => ColumnData::Null,
            InferredType::Bool => ColumnData::Bool(Bitmap::with_capacity(capacity)),
            InferredType::Int64 => ColumnData::Int64(Vec::with_capacity(capacity)),
            InferredType::Float64 => ColumnData::Float64(Vec::with_capacity(capacity)),
            InferredType::String => {
                let mut offsets = Vec::with_capacity(capacity + 1);
                offsets.push(0);
                ColumnData::Utf8 {
                    offsets,
                    values: Vec::with_capacity(capacity * 8),
                }
            }
            InferredType::List(item) => {
                let mut offsets = Vec::with_capacity(capacity + 1);
                offsets.push(0);
                ColumnData::List {
                    offsets,
                    item: Box::new(ColumnArray::new_empty(item, capacity)),
                }
            }
            InferredType::Struct(fields) => ColumnData::Struct(
                fields
                    .iter()
                    .map(|field| ColumnArray::new_empty(&field.data_type, capacity))
                    .collect(),
            ),
        };

        ColumnArray {
            validity: Bitmap::with_capacity(capacity),
            data,
        }
    }

    pub(crate) fn from_parts(validity: Bitmap, data: ColumnData) -> Self {
        ColumnArray { validity, data }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.validity.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.validity.is_empty()
    }

    #[inline]
    pub fn is_valid(&self, row: usize) -> bool {
        self.validity.get(row)
    }

    pub fn null_count(&self) -> usize {
        self.validity.count_unset()
    }

    pub fn validity(&self) -> &Bitmap {
        &self.validity
    }

    pub fn data(&self) -> &ColumnData {
        &self.data
    }

    /// Append a null row, writing placeholders all the way down.
    pub fn push_null(&mut self) {
        self.validity.push(false);
        match &mut self.data {
            ColumnData::Null => {}
            ColumnData::Bool(values) => values.push(false),
            ColumnData::Int64(values) => values.push(0),
            ColumnData::Float64(values) => values.push(0.0),
            ColumnData::Utf8 { offsets, values } => offsets.push(values.len()),
            ColumnData::List { offsets, .. } => {
                let end = offsets.last().copied().unwrap_or(0);
                offsets.push(end);
            }
            ColumnData::Struct(children) => {
                for child in children {
                    child.push_null();
                }
            }
        }
    }

    /// String value at `row` (placeholder rows read as empty).
    pub fn str_at(&self, row: usize) -> Option<&str> {
        match &self.data {
            ColumnData::Utf8 { offsets, values } => {
                std::str::from_utf8(&values[offsets[row]..offsets[row + 1]]).ok()
            }
            _ => None,
        }
    }

    /// Owned copy of `range` with offsets rebased to zero.
    pub fn slice(&self, range: Range<usize>) -> ColumnArray {
        let validity = self.validity.slice(range.clone());
        let data = match &self.data {
            ColumnData::Null => ColumnData::Null,
            ColumnData::Bool(values) => ColumnData::Bool(values.slice(range)),
            ColumnData::Int64(values) => ColumnData::Int64(values[range].to_vec()),
            ColumnData::Float64(values) => ColumnData::Float64(values[range].to_vec()),
            ColumnData::Utf8 { offsets, values } => {
                let (start, end) = (offsets[range.start], offsets[range.end]);
                ColumnData::Utf8 {
                    offsets: offsets[range.start..=range.end].iter().map(|o| o - start).collect(),
                    values: values[start..end].to_vec(),
                }
            }
            ColumnData::List { offsets, item } => {
                let (start, end) = (offsets[range.start], offsets[range.end]);
                ColumnData::List {
                    offsets: offsets[range.start..=range.end].iter().map(|o| o - start).collect(),
                    item: Box::new(item.slice(start..end)),
                }
            }
            ColumnData::Struct(children) => {
                ColumnData::Struct(children.iter().map(|c| c.slice(range.clone())).collect())
            }
        };

        ColumnArray { validity, data }
    }

    /// Append all rows of `other`, which must share this array's layout.
    pub fn extend_from(&mut self, other: &ColumnArray) {
        self.validity.extend_from(&other.validity);
        match (&mut self.data, &other.data) {
            (ColumnData::Null, ColumnData::Null) => {}
            (ColumnData::Bool(a), ColumnData::Bool(b)) => a.extend_from(b),
            (ColumnData::Int64(a), ColumnData::Int64(b)) => a.extend_from_slice(b),
            (ColumnData::Float64(a), ColumnData::Float64(b)) => a.extend_from_slice(b),
            (
                ColumnData::Utf8 { offsets, values },
                ColumnData::Utf8 {
                    offsets: other_offsets,
                    values: other_values,
                },
            ) => {
                let base = values.len();
                offsets.extend(other_offsets.iter().skip(1).map(|o| o + base));
                values.extend_from_slice(other_values);
            }
            (
                ColumnData::List { offsets, item },
                ColumnData::List {
                    offsets: other_offsets,
                    item: other_item,
                },
            ) => {
                let base = item.len();
                offsets.extend(other_offsets.iter().skip(1).map(|o| o + base));
                item.extend_from(other_item);
            }
            (ColumnData::Struct(children), ColumnData::Struct(other_children)) => {
                for (child, other_child) in children.iter_mut().zip(other_children) {
                    child.extend_from(other_child);
                }
            }
            _ => debug_assert!(false, "extend_from called with mismatched layouts"),
        }
    }

    /// Logical value at `row`, rebuilt as JSON. `ty` must be the column's type.
    pub fn value_at(&self, row: usize, ty: &InferredType) -> JsonValue {
        if !self.is_valid(row) {
            return JsonValue::Null;
        }
        match (&self.data, ty) {
            (ColumnData::Null, _) => JsonValue::Null,
            (ColumnData::Bool(values), _) => JsonValue::Bool(values.get(row)),
            (ColumnData::Int64(values), _) => JsonValue::Int(values[row]),
            (ColumnData::Float64(values), _) => JsonValue::Float(values[row]),
            (ColumnData::Utf8 { offsets, values }, _) => {
                let bytes = &values[offsets[row]..offsets[row + 1]];
                JsonValue::Str(String::from_utf8_lossy(bytes).into_owned())
            }
            (ColumnData::List { offsets, item }, InferredType::List(item_ty)) => JsonValue::Array(
                (offsets[row]..offsets[row + 1])
                    .map(|i| item.value_at(i, item_ty))
                    .collect(),
            ),
            (ColumnData::Struct(children), InferredType::Struct(fields)) => JsonValue::Object(
                fields
                    .iter()
                    .zip(children)
                    .map(|(field, child)| (field.name.clone(), child.value_at(row, &field.data_type)))
                    .collect(),
            ),
            _ => JsonValue::Null,
        }
    }
}
