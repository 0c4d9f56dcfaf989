//! Streaming schema builder
//!
//! Records are folded in one at a time; the builder keeps one accumulator
//! per top-level field and only produces the final `Schema` once every
//! record has been seen, because a late record can still widen an early
//! column (Int64 → Float64, or anything → String).

use log::{debug, warn};
use std::collections::HashMap;

use super::field::{ColumnPath, Field, Schema};
use super::format::StringStats;
use super::types::{infer_value, unify, InferredType};
use crate::column::coerce::find_lossy;
use crate::config::ConvertConfig;
use crate::error::SchemaError;
use crate::value::JsonValue;

/// Accumulated observations for one top-level field
#[derive(Debug)]
struct FieldAccumulator {
    name: String,
    data_type: InferredType,
    // Records in which the field appeared
    present: usize,
    saw_null: bool,
    // Index of the last record counted in `present`
    last_record: usize,
    strings: StringStats,
}

impl FieldAccumulator {
    fn new(name: String) -> Self {
        FieldAccumulator {
            name,
            data_type: InferredType::Unknown,
            present: 0,
            saw_null: false,
            last_record: usize::MAX,
            strings: StringStats::default(),
        }
    }

    fn add_value(&mut self, record: usize, value: &JsonValue, detect_formats: bool) {
        if self.last_record != record {
            self.last_record = record;
            self.present += 1;
        }

        match value {
            JsonValue::Null => self.saw_null = true,
            JsonValue::Str(s) if detect_formats => self.strings.add_string(s),
            _ => self.strings.add_other(),
        }

        self.data_type = unify(std::mem::take(&mut self.data_type), infer_value(value));
    }

    fn build(self, record_count: usize) -> Field {
        let data_type = match self.data_type {
            InferredType::Unknown => InferredType::Null,
            other => other,
        };
        let format = if data_type == InferredType::String {
            self.strings.format()
        } else {
            None
        };
        let nullable = self.saw_null || self.present < record_count;

        Field::new(self.name, data_type, nullable).with_format(format)
    }
}

/// Builds a unified schema from a stream of object records.
#[derive(Debug)]
pub struct SchemaBuilder {
    fields: Vec<FieldAccumulator>,
    index: HashMap<String, usize>,
    record_count: usize,
    detect_formats: bool,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        SchemaBuilder {
            fields: Vec::new(),
            index: HashMap::new(),
            record_count: 0,
            detect_formats: true,
        }
    }

    pub fn with_format_detection(mut self, detect: bool) -> Self {
        self.detect_formats = detect;
        self
    }

    /// Number of records folded in so far.
    pub fn record_count(&self) -> usize {
        self.record_count
    }

    /// Fold one record into the schema. The record must be an object.
    pub fn add_record(&mut self, record: &JsonValue) -> Result<(), SchemaError> {
        let JsonValue::Object(members) = record else {
            return Err(SchemaError::RootNotObject {
                index: self.record_count,
                found: record.kind(),
            });
        };

        let record_index = self.record_count;
        for (name, value) in members {
            let slot = match self.index.get(name) {
                Some(&slot) => slot,
                None => {
                    let slot = self.fields.len();
                    self.fields.push(FieldAccumulator::new(name.clone()));
                    self.index.insert(name.clone(), slot);
                    slot
                }
            };
            self.fields[slot].add_value(record_index, value, self.detect_formats);
        }

        self.record_count += 1;
        Ok(())
    }

    /// Produce the final schema. Columns are in first-seen order.
    pub fn build(self) -> Schema {
        let record_count = self.record_count;
        let fields: Vec<Field> = self
            .fields
            .into_iter()
            .map(|acc| acc.build(record_count))
            .collect();

        debug!("Inferred {} columns from {} records", fields.len(), record_count);
        Schema::new(fields)
    }
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Infer the schema of a complete record set.
///
/// Runs the builder over every record, then (if enabled) widens to String any
/// leaf whose values cannot be stored losslessly in the inferred type.
pub fn infer_schema(records: &[JsonValue], config: &ConvertConfig) -> Result<Schema, SchemaError> {
    let mut builder = SchemaBuilder::new().with_format_detection(config.detect_formats);
    for record in records {
        builder.add_record(record)?;
    }
    let mut schema = builder.build();

    if config.widen_on_coercion_error {
        widen_lossy_columns(&mut schema, records);
    }

    Ok(schema)
}

/// Widen every leaf holding a value that would not survive coercion exactly.
pub fn widen_lossy_columns(schema: &mut Schema, records: &[JsonValue]) {
    for index in 0..schema.len() {
        let Some(name) = schema.field(index).map(|f| f.name.clone()) else {
            continue;
        };
        for record in records {
            let Some(value) = record.get(&name) else {
                continue;
            };
            // Each pass widens one leaf; repeat until the value fits.
            loop {
                let Some(field) = schema.field(index) else {
                    break;
                };
                let mut path = ColumnPath::root(&name);
                match find_lossy(value, &field.data_type, &mut path) {
                    Some(lossy) => {
                        warn!("Widening `{}` to string: value not exactly representable", lossy);
                        schema.widen_at(&lossy);
                    }
                    None => break,
                }
            }
        }
    }
}

/// Check that every record is an object, without inferring anything.
pub fn check_records(records: &[JsonValue]) -> Result<(), SchemaError> {
    match records
        .iter()
        .enumerate()
        .find(|(_, record)| !matches!(record, JsonValue::Object(_)))
    {
        Some((index, record)) => Err(SchemaError::RootNotObject {
            index,
            found: record.kind(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::StringFormat;
    use serde_json::json;

    fn records(items: Vec<serde_json::Value>) -> Vec<JsonValue> {
        items.into_iter().map(JsonValue::from).collect()
    }

    fn infer(items: Vec<serde_json::Value>) -> Schema {
        infer_schema(&records(items), &ConvertConfig::default()).unwrap()
    }

    #[test]
    fn test_empty_builder() {
        let schema = SchemaBuilder::new().build();
        assert!(schema.is_empty());
    }

    #[test]
    fn test_int_then_float_then_null() {
        let schema = infer(vec![json!({"a": 1}), json!({"a": 2.5}), json!({"a": null})]);
        let a = schema.field_by_name("a").unwrap();
        assert_eq!(a.data_type, InferredType::Float64);
        assert!(a.nullable);
    }

    #[test]
    fn test_missing_field_is_nullable() {
        let schema = infer(vec![json!({"name": "Alice", "age": 30}), json!({"name": "Bob"})]);
        assert!(!schema.field_by_name("name").unwrap().nullable);
        assert!(schema.field_by_name("age").unwrap().nullable);
    }

    #[test]
    fn test_first_seen_order() {
        let schema = infer(vec![json!({"b": 1, "a": 1}), json!({"c": 1, "a": 2})]);
        let names: Vec<&str> = schema.fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_later_record_widens_earlier_column() {
        let schema = infer(vec![json!({"a": 1}), json!({"a": 2}), json!({"a": "x"})]);
        assert_eq!(schema.field_by_name("a").unwrap().data_type, InferredType::String);
    }

    #[test]
    fn test_root_not_object() {
        let mut builder = SchemaBuilder::new();
        builder.add_record(&JsonValue::from(json!({"a": 1}))).unwrap();
        let err = builder.add_record(&JsonValue::from(json!([1]))).unwrap_err();
        assert!(matches!(err, SchemaError::RootNotObject { index: 1, found: "array" }));
    }

    #[test]
    fn test_all_null_column() {
        let schema = infer(vec![json!({"a": null}), json!({"a": null})]);
        let a = schema.field_by_name("a").unwrap();
        assert_eq!(a.data_type, InferredType::Null);
        assert!(a.nullable);
    }

    #[test]
    fn test_format_annotation() {
        let schema = infer(vec![
            json!({"email": "test@example.com", "day": "2021-01-01"}),
            json!({"email": "another@test.org", "day": null}),
        ]);
        assert_eq!(schema.field_by_name("email").unwrap().format, Some(StringFormat::Email));
        assert_eq!(schema.field_by_name("day").unwrap().format, Some(StringFormat::Date));
    }

    #[test]
    fn test_format_lost_on_mixed_kinds() {
        let schema = infer(vec![json!({"d": "2021-01-01"}), json!({"d": 5})]);
        let d = schema.field_by_name("d").unwrap();
        assert_eq!(d.data_type, InferredType::String);
        assert_eq!(d.format, None);
    }

    #[test]
    fn test_lossy_int_widens_to_string() {
        let recs = records(vec![json!({"n": 0.5}), json!({"n": 9007199254740993i64})]);
        let schema = infer_schema(&recs, &ConvertConfig::default()).unwrap();
        assert_eq!(schema.field_by_name("n").unwrap().data_type, InferredType::String);

        let config = ConvertConfig::default().with_widening(false);
        let schema = infer_schema(&recs, &config).unwrap();
        assert_eq!(schema.field_by_name("n").unwrap().data_type, InferredType::Float64);
    }

    #[test]
    fn test_struct_members_keep_first_seen_order_inside_list() {
        let schema = infer(vec![json!({"a": {"x": 1}}), json!({"a": [{"y": "s"}]})]);
        let a = schema.field_by_name("a").unwrap();
        assert_eq!(a.data_type.to_string(), "list<struct<x: int64?, y: string?>>");
    }

    #[test]
    fn test_out_of_range_integers_widen_to_string() {
        for digits in ["18446744073709551615", "18446744073709551617"] {
            let recs = vec![
                JsonValue::parse(r#"{"n": 1}"#).unwrap(),
                JsonValue::parse(&format!(r#"{{"n": {}}}"#, digits)).unwrap(),
            ];
            let schema = infer_schema(&recs, &ConvertConfig::default()).unwrap();
            assert_eq!(schema.field_by_name("n").unwrap().data_type, InferredType::String);

            let config = ConvertConfig::default().with_widening(false);
            let schema = infer_schema(&recs, &config).unwrap();
            assert_eq!(schema.field_by_name("n").unwrap().data_type, InferredType::Int64);
        }
    }

    #[test]
    fn test_duplicate_member_counts_once() {
        let record = JsonValue::Object(vec![
            ("a".to_string(), JsonValue::Int(1)),
            ("a".to_string(), JsonValue::Int(2)),
        ]);
        let recs = vec![record, JsonValue::from(json!({"b": 1}))];
        let schema = infer_schema(&recs, &ConvertConfig::default()).unwrap();
        assert!(schema.field_by_name("a").unwrap().nullable);
    }

    #[test]
    fn test_check_records() {
        assert!(check_records(&records(vec![json!({}), json!({"a": 1})])).is_ok());
        let err = check_records(&records(vec![json!({}), json!(3)])).unwrap_err();
        assert!(matches!(err, SchemaError::RootNotObject { index: 1, found: "integer" }));
    }
}
