//! Column materialization
//!
//! Once the schema is final, every record is scanned again and each field's
//! value is coerced into that field's column. Columns are independent, so
//! they are built in parallel, one worker per column.

use log::debug;
use rayon::prelude::*;

use super::array::{ColumnArray, ColumnData};
use super::coerce::{self, float_to_int, int_to_float};
use crate::error::{CoercionError, CoercionReason};
use crate::schema::{ColumnPath, Field, InferredType, PathSegment, Schema};
use crate::value::JsonValue;

/// Builds one column from the values of one top-level field.
pub struct ColumnBuilder<'a> {
    field: &'a Field,
    path: ColumnPath,
    array: ColumnArray,
}

impl<'a> ColumnBuilder<'a> {
    pub fn new(field: &'a Field, capacity: usize) -> Self {
        ColumnBuilder {
            field,
            path: ColumnPath::root(&field.name),
            array: ColumnArray::new_empty(&field.data_type, capacity),
        }
    }

    /// Append one row. `None` means the field was absent from the record.
    pub fn append(&mut self, value: Option<&JsonValue>) -> Result<(), CoercionError> {
        append_value(
            &mut self.array,
            &self.field.data_type,
            value,
            self.field.nullable,
            &mut self.path,
        )
    }

    pub fn finish(self) -> ColumnArray {
        self.array
    }
}

/// Materialize one column per schema field from the full record set.
pub fn materialize(records: &[JsonValue], schema: &Schema) -> Result<Vec<ColumnArray>, CoercionError> {
    let columns = schema
        .fields()
        .as_slice()
        .par_iter()
        .map(|field| -> Result<ColumnArray, CoercionError> {
            let mut builder = ColumnBuilder::new(field, records.len());
            for record in records {
                builder.append(record.get(&field.name))?;
            }
            Ok(builder.finish())
        })
        .collect::<Result<Vec<_>, _>>()?;

    debug!("Materialized {} columns x {} rows", columns.len(), records.len());
    Ok(columns)
}

fn append_value(
    array: &mut ColumnArray,
    ty: &InferredType,
    value: Option<&JsonValue>,
    nullable: bool,
    path: &mut ColumnPath,
) -> Result<(), CoercionError> {
    let value = match value {
        None | Some(JsonValue::Null) => {
            if !nullable {
                return Err(CoercionError {
                    path: path.clone(),
                    expected: ty.to_string(),
                    found: value.map_or("missing", JsonValue::kind),
                    reason: CoercionReason::Required,
                });
            }
            array.push_null();
            return Ok(());
        }
        Some(v) => v,
    };

    // Null and Unknown columns hold nothing but nulls
    if matches!(array.data, ColumnData::Null) {
        array.push_null();
        return Ok(());
    }

    let mismatch = |path: &ColumnPath| coerce::error(path, ty, value, CoercionReason::Mismatch);
    let lossy = |path: &ColumnPath| coerce::error(path, ty, value, CoercionReason::Lossy);

    match (&mut array.data, ty) {
        (ColumnData::Bool(values), _) => match value {
            JsonValue::Bool(b) => values.push(*b),
            _ => return Err(mismatch(path)),
        },
        (ColumnData::Int64(values), _) => match value {
            JsonValue::Int(i) => values.push(*i),
            JsonValue::Float(f) => values.push(float_to_int(*f).ok_or_else(|| lossy(path))?),
            JsonValue::BigNumber(_) => return Err(lossy(path)),
            _ => return Err(mismatch(path)),
        },
        (ColumnData::Float64(values), _) => match value {
            JsonValue::Float(f) => values.push(*f),
            JsonValue::Int(i) => values.push(int_to_float(*i).ok_or_else(|| lossy(path))?),
            JsonValue::BigNumber(_) => return Err(lossy(path)),
            _ => return Err(mismatch(path)),
        },
        (ColumnData::Utf8 { offsets, values }, _) => {
            match value {
                JsonValue::Str(s) => values.extend_from_slice(s.as_bytes()),
                other => values.extend_from_slice(other.to_canonical_string().as_bytes()),
            }
            offsets.push(values.len());
        }
        (ColumnData::List { offsets, item }, InferredType::List(item_ty)) => {
            path.push(PathSegment::Item);
            let result = match value {
                JsonValue::Array(elements) => elements
                    .iter()
                    .try_for_each(|element| append_value(item, item_ty, Some(element), true, path)),
                // A lone value becomes a one-element list
                single => append_value(item, item_ty, Some(single), true, path),
            };
            path.pop();
            result?;
            offsets.push(item.len());
        }
        (ColumnData::Struct(children), InferredType::Struct(fields)) => {
            if !matches!(value, JsonValue::Object(_)) {
                return Err(mismatch(path));
            }
            for (child, field) in children.iter_mut().zip(fields) {
                path.push(PathSegment::Field(field.name.clone()));
                let result = append_value(child, &field.data_type, value.get(&field.name), field.nullable, path);
                path.pop();
                result?;
            }
        }
        _ => return Err(mismatch(path)),
    }

    array.validity.push(true);
    Ok(())
}
