//! Explicit schemas in BigQuery column-definition form
//!
//! ```json
//! [
//!   {"name": "id", "type": "INTEGER", "mode": "REQUIRED"},
//!   {"name": "tags", "type": "STRING", "mode": "REPEATED"},
//!   {"name": "owner", "type": "RECORD", "fields": [{"name": "login", "type": "STRING"}]}
//! ]
//! ```

use serde::Deserialize;

use super::field::{Field, Fields, Schema};
use super::types::InferredType;
use crate::error::SchemaError;

#[derive(Debug, Deserialize)]
struct ColumnDefinition {
    name: String,
    #[serde(rename = "type")]
    type_name: String,
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    fields: Vec<ColumnDefinition>,
}

impl ColumnDefinition {
    fn into_field(self) -> Result<Field, SchemaError> {
        let data_type = match self.type_name.to_ascii_uppercase().as_str() {
            "STRING" => InferredType::String,
            "INTEGER" | "INT64" => InferredType::Int64,
            "FLOAT" | "FLOAT64" => InferredType::Float64,
            "BOOLEAN" | "BOOL" => InferredType::Bool,
            "RECORD" | "STRUCT" => {
                let fields = self
                    .fields
                    .into_iter()
                    .map(ColumnDefinition::into_field)
                    .collect::<Result<Fields, SchemaError>>()?;
                InferredType::Struct(fields)
            }
            _ => return Err(SchemaError::UnknownType(self.type_name)),
        };

        let mode = self.mode.as_deref().map(str::to_ascii_uppercase);
        let (data_type, nullable) = match mode.as_deref() {
            None | Some("NULLABLE") => (data_type, true),
            Some("REQUIRED") => (data_type, false),
            Some("REPEATED") => (InferredType::List(Box::new(data_type)), true),
            Some(_) => return Err(SchemaError::UnknownMode(self.mode.unwrap_or_default())),
        };

        Ok(Field::new(self.name, data_type, nullable))
    }
}

impl Schema {
    /// Parse a BigQuery-style JSON array of column definitions.
    pub fn from_bigquery_json(text: &str) -> Result<Schema, SchemaError> {
        let definitions: Vec<ColumnDefinition> = serde_json::from_str(text)?;
        let fields = definitions
            .into_iter()
            .map(ColumnDefinition::into_field)
            .collect::<Result<Vec<Field>, SchemaError>>()?;
        Ok(Schema::new(fields))
    }
}
