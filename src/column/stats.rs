//! Per-chunk column statistics

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::ops::Range;

use super::array::{ColumnArray, ColumnData};

/// A comparable scalar in a column's final type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Bool(bool),
    Int64(i64),
    Float64(f64),
    String(String),
}

impl ScalarValue {
    /// Natural ordering within one type; `None` across types.
    pub fn compare(&self, other: &ScalarValue) -> Option<Ordering> {
        match (self, other) {
            (ScalarValue::Bool(a), ScalarValue::Bool(b)) => Some(a.cmp(b)),
            (ScalarValue::Int64(a), ScalarValue::Int64(b)) => Some(a.cmp(b)),
            (ScalarValue::Float64(a), ScalarValue::Float64(b)) => Some(a.total_cmp(b)),
            (ScalarValue::String(a), ScalarValue::String(b)) => Some(a.as_bytes().cmp(b.as_bytes())),
            _ => None,
        }
    }
}

/// Statistics for one column chunk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkStats {
    pub row_count: u64,
    pub null_count: u64,
    /// Exact number of distinct non-null values (scalar columns only)
    pub distinct_count: Option<u64>,
    /// Absent when the chunk has no non-null values or the type is nested
    pub min: Option<ScalarValue>,
    pub max: Option<ScalarValue>,
}

impl ChunkStats {
    pub fn non_null_count(&self) -> u64 {
        self.row_count - self.null_count
    }
}

/// Compute statistics over `rows` of `array` in a single pass.
pub fn collect(array: &ColumnArray, rows: Range<usize>) -> ChunkStats {
    let rows = rows.start.min(array.len())..rows.end.min(array.len());
    let row_count = rows.len() as u64;
    let valid: Vec<usize> = rows.clone().filter(|&row| array.is_valid(row)).collect();
    let null_count = row_count - valid.len() as u64;

    let (distinct_count, bounds) = match array.data() {
        ColumnData::Bool(values) => {
            let seen: HashSet<bool> = valid.iter().map(|&row| values.get(row)).collect();
            let bounds = min_max(valid.iter().map(|&row| values.get(row)), |a, b| a.cmp(b))
                .map(|(lo, hi)| (ScalarValue::Bool(lo), ScalarValue::Bool(hi)));
            (Some(seen.len() as u64), bounds)
        }
        ColumnData::Int64(values) => {
            let seen: HashSet<i64> = valid.iter().map(|&row| values[row]).collect();
            let bounds = min_max(valid.iter().map(|&row| values[row]), |a, b| a.cmp(b))
                .map(|(lo, hi)| (ScalarValue::Int64(lo), ScalarValue::Int64(hi)));
            (Some(seen.len() as u64), bounds)
        }
        ColumnData::Float64(values) => {
            // -0.0 and 0.0 count as one value
            let seen: HashSet<u64> = valid
                .iter()
                .map(|&row| if values[row] == 0.0 { 0 } else { values[row].to_bits() })
                .collect();
            let bounds = min_max(valid.iter().map(|&row| values[row]), |a, b| a.total_cmp(b))
                .map(|(lo, hi)| (ScalarValue::Float64(lo), ScalarValue::Float64(hi)));
            (Some(seen.len() as u64), bounds)
        }
        ColumnData::Utf8 { offsets, values } => {
            let slot = |row: usize| &values[offsets[row]..offsets[row + 1]];
            let seen: HashSet<&[u8]> = valid.iter().map(|&row| slot(row)).collect();
            let bounds = min_max(valid.iter().map(|&row| slot(row)), |a, b| a.cmp(b)).map(|(lo, hi)| {
                (
                    ScalarValue::String(String::from_utf8_lossy(lo).into_owned()),
                    ScalarValue::String(String::from_utf8_lossy(hi).into_owned()),
                )
            });
            (Some(seen.len() as u64), bounds)
        }
        ColumnData::Null | ColumnData::List { .. } | ColumnData::Struct(_) => (None, None),
    };

    let (min, max) = match bounds {
        Some((lo, hi)) => (Some(lo), Some(hi)),
        None => (None, None),
    };

    ChunkStats {
        row_count,
        null_count,
        distinct_count,
        min,
        max,
    }
}

fn min_max<T: Copy, F>(mut values: impl Iterator<Item = T>, cmp: F) -> Option<(T, T)>
where
    F: Fn(&T, &T) -> Ordering,
{
    let first = values.next()?;
    Some(values.fold((first, first), |(lo, hi), v| {
        let lo = if cmp(&v, &lo) == Ordering::Less { v } else { lo };
        let hi = if cmp(&v, &hi) == Ordering::Greater { v } else { hi };
        (lo, hi)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::materialize;
    use crate::config::ConvertConfig;
    use crate::schema::{infer_schema, Schema};
    use crate::value::JsonValue;
    use serde_json::json;

    fn columns(items: Vec<serde_json::Value>) -> (Schema, Vec<ColumnArray>) {
        let records: Vec<JsonValue> = items.into_iter().map(JsonValue::from).collect();
        let schema = infer_schema(&records, &ConvertConfig::default()).unwrap();
        let columns = materialize(&records, &schema).unwrap();
        (schema, columns)
    }

    #[test]
    fn test_float_stats_skip_nulls() {
        let (_, cols) = columns(vec![json!({"a": 1}), json!({"a": 2.5}), json!({"a": null})]);
        let stats = collect(&cols[0], 0..3);
        assert_eq!(stats.row_count, 3);
        assert_eq!(stats.null_count, 1);
        assert_eq!(stats.non_null_count(), 2);
        assert_eq!(stats.min, Some(ScalarValue::Float64(1.0)));
        assert_eq!(stats.max, Some(ScalarValue::Float64(2.5)));
        assert_eq!(stats.distinct_count, Some(2));
    }

    #[test]
    fn test_string_stats_use_byte_order() {
        let (_, cols) = columns(vec![json!({"s": "b"}), json!({"s": "B"}), json!({"s": "ab"})]);
        let stats = collect(&cols[0], 0..3);
        assert_eq!(stats.min, Some(ScalarValue::String("B".into())));
        assert_eq!(stats.max, Some(ScalarValue::String("b".into())));
    }

    #[test]
    fn test_sub_range() {
        let (_, cols) = columns(vec![json!({"n": 5}), json!({"n": 1}), json!({"n": 9}), json!({"n": 3})]);
        let stats = collect(&cols[0], 1..3);
        assert_eq!(stats.row_count, 2);
        assert_eq!(stats.min, Some(ScalarValue::Int64(1)));
        assert_eq!(stats.max, Some(ScalarValue::Int64(9)));
    }

    #[test]
    fn test_empty_range_has_no_bounds() {
        let (_, cols) = columns(vec![json!({"n": 5})]);
        let stats = collect(&cols[0], 1..1);
        assert_eq!(stats.row_count, 0);
        assert_eq!(stats.min, None);
        assert_eq!(stats.max, None);
    }

    #[test]
    fn test_all_null_chunk() {
        let (_, cols) = columns(vec![json!({"n": 1}), json!({"n": null}), json!({})]);
        let stats = collect(&cols[0], 1..3);
        assert_eq!(stats.null_count, 2);
        assert_eq!(stats.min, None);
        assert_eq!(stats.distinct_count, Some(0));
    }

    #[test]
    fn test_nested_columns_count_nulls_only() {
        let (_, cols) = columns(vec![json!({"l": [1]}), json!({"l": null})]);
        let stats = collect(&cols[0], 0..2);
        assert_eq!(stats.null_count, 1);
        assert_eq!(stats.min, None);
        assert_eq!(stats.distinct_count, None);
    }

    #[test]
    fn test_bool_bounds() {
        let (_, cols) = columns(vec![json!({"b": true}), json!({"b": false})]);
        let stats = collect(&cols[0], 0..2);
        assert_eq!(stats.min, Some(ScalarValue::Bool(false)));
        assert_eq!(stats.max, Some(ScalarValue::Bool(true)));
    }
}
