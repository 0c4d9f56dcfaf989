//! Value-to-column coercion rules
//!
//! - Int64 → Float64 only when the conversion is exact
//! - Float64 → Int64 only for integral values in range (explicit schemas)
//! - anything → String via the canonical textual form
//! - a lone value in a List column becomes a one-element list

use crate::error::{CoercionError, CoercionReason};
use crate::schema::{ColumnPath, InferredType, PathSegment};
use crate::value::JsonValue;

// 2^63, the first f64 past i64::MAX
const I64_UPPER_BOUND: f64 = 9_223_372_036_854_775_808.0;

/// Exact i64 → f64 conversion.
pub fn int_to_float(value: i64) -> Option<f64> {
    let f = value as f64;
    if f < I64_UPPER_BOUND && f as i64 == value {
        Some(f)
    } else {
        None
    }
}

/// Exact f64 → i64 conversion.
pub fn float_to_int(value: f64) -> Option<i64> {
    if value.fract() == 0.0 && value >= -I64_UPPER_BOUND && value < I64_UPPER_BOUND {
        Some(value as i64)
    } else {
        None
    }
}

pub(crate) fn error(
    path: &ColumnPath,
    expected: &InferredType,
    found: &JsonValue,
    reason: CoercionReason,
) -> CoercionError {
    CoercionError {
        path: path.clone(),
        expected: expected.to_string(),
        found: found.kind(),
        reason,
    }
}

/// Find the first place where `value` cannot be coerced into `ty` without loss.
///
/// Only numeric precision loss is reported; kind mismatches cannot occur for
/// a type inferred from the same values.
pub(crate) fn find_lossy(value: &JsonValue, ty: &InferredType, path: &mut ColumnPath) -> Option<ColumnPath> {
    match (ty, value) {
        (InferredType::Float64, JsonValue::Int(i)) if int_to_float(*i).is_none() => Some(path.clone()),
        (InferredType::Int64 | InferredType::Float64, JsonValue::BigNumber(_)) => Some(path.clone()),
        (InferredType::List(item), JsonValue::Array(items)) => {
            path.push(PathSegment::Item);
            let found = items.iter().find_map(|v| find_lossy(v, item, path));
            path.pop();
            found
        }
        (InferredType::List(item), single) if !single.is_null() => {
            path.push(PathSegment::Item);
            let found = find_lossy(single, item, path);
            path.pop();
            found
        }
        (InferredType::Struct(fields), JsonValue::Object(_)) => {
            for field in fields {
                if let Some(member) = value.get(&field.name) {
                    path.push(PathSegment::Field(field.name.clone()));
                    let found = find_lossy(member, &field.data_type, path);
                    path.pop();
                    if found.is_some() {
                        return found;
                    }
                }
            }
            None
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_int_to_float_exactness() {
        assert_eq!(int_to_float(1), Some(1.0));
        assert_eq!(int_to_float(1 << 53), Some(9_007_199_254_740_992.0));
        assert_eq!(int_to_float((1 << 53) + 1), None);
        assert_eq!(int_to_float(i64::MAX), None);
        assert_eq!(int_to_float(i64::MIN), Some(-I64_UPPER_BOUND));
    }

    #[test]
    fn test_float_to_int_exactness() {
        assert_eq!(float_to_int(3.0), Some(3));
        assert_eq!(float_to_int(3.5), None);
        assert_eq!(float_to_int(1e300), None);
    }

    #[test]
    fn test_find_lossy_nested() {
        let value = JsonValue::from(json!({"p": [1.5, 9007199254740993i64]}));
        let ty = crate::schema::infer_value(&value);
        let InferredType::Struct(fields) = &ty else {
            panic!("expected struct");
        };
        let member = value.get("p").unwrap();
        let mut path = ColumnPath::root("p");
        let found = find_lossy(member, &fields.get("p").unwrap().data_type, &mut path).unwrap();
        assert_eq!(found.to_string(), "p[]");
        assert_eq!(path, ColumnPath::root("p"));
    }
}
