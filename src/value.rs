//! Decoded JSON values
//!
//! `JsonValue` is the tagged union every later stage works on. It keeps
//! integers and floats apart (the type lattice needs that distinction)
//! and keeps object members in their textual order, which is what gives
//! columns their first-seen order.

use serde_json::{Map, Number, Value};

/// One decoded JSON value.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// A number neither `Int` nor `Float` can hold: an integer outside the
    /// i64 range, or a float that overflows f64. Kept as its source text.
    BigNumber(String),
    Str(String),
    Array(Vec<JsonValue>),
    /// Members in document order
    Object(Vec<(String, JsonValue)>),
}

impl JsonValue {
    /// Parse one JSON document.
    pub fn parse(text: &str) -> serde_json::Result<JsonValue> {
        serde_json::from_str::<Value>(text).map(JsonValue::from)
    }

    /// Short name of the value's kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            JsonValue::Null => "null",
            JsonValue::Bool(_) => "boolean",
            JsonValue::Int(_) => "integer",
            JsonValue::Float(_) => "float",
            JsonValue::BigNumber(text) if is_integer_literal(text) => "integer",
            JsonValue::BigNumber(_) => "float",
            JsonValue::Str(_) => "string",
            JsonValue::Array(_) => "array",
            JsonValue::Object(_) => "object",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, JsonValue::Null)
    }

    /// Look up an object member. Returns `None` for non-objects.
    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        match self {
            JsonValue::Object(members) => members
                .iter()
                .find(|(name, _)| name == key)
                .map(|(_, value)| value),
            _ => None,
        }
    }

    /// Canonical textual form, used whenever a value lands in a String column.
    ///
    /// Strings are taken verbatim, booleans become `true`/`false`, numbers use
    /// the shortest representation that round-trips, and containers are
    /// rendered as compact JSON with members in document order.
    pub fn to_canonical_string(&self) -> String {
        match self {
            JsonValue::Str(s) => s.clone(),
            JsonValue::Bool(b) => b.to_string(),
            JsonValue::Int(i) => i.to_string(),
            JsonValue::Float(f) => match Number::from_f64(*f) {
                Some(n) => n.to_string(),
                None => f.to_string(),
            },
            JsonValue::BigNumber(text) => text.clone(),
            JsonValue::Null => "null".to_string(),
            JsonValue::Array(_) | JsonValue::Object(_) => Value::from(self).to_string(),
        }
    }
}

impl From<Value> for JsonValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => JsonValue::Null,
            Value::Bool(b) => JsonValue::Bool(b),
            Value::Number(n) => match (n.as_i64(), n.as_f64()) {
                (Some(i), _) => JsonValue::Int(i),
                (None, Some(f)) if n.is_f64() => JsonValue::Float(f),
                _ => JsonValue::BigNumber(n.to_string()),
            },
            Value::String(s) => JsonValue::Str(s),
            Value::Array(items) => JsonValue::Array(items.into_iter().map(JsonValue::from).collect()),
            Value::Object(map) => JsonValue::Object(
                map.into_iter()
                    .map(|(key, value)| (key, JsonValue::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<&JsonValue> for Value {
    fn from(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(*b),
            JsonValue::Int(i) => Value::Number((*i).into()),
            JsonValue::Float(f) => Number::from_f64(*f).map_or(Value::Null, Value::Number),
            JsonValue::BigNumber(text) => text
                .parse::<Number>()
                .map_or_else(|_| Value::String(text.clone()), Value::Number),
            JsonValue::Str(s) => Value::String(s.clone()),
            JsonValue::Array(items) => Value::Array(items.iter().map(Value::from).collect()),
            JsonValue::Object(members) => {
                let mut map = Map::new();
                for (key, value) in members {
                    map.insert(key.clone(), Value::from(value));
                }
                Value::Object(map)
            }
        }
    }
}

/// True for an optional minus sign followed by digits only.
pub(crate) fn is_integer_literal(text: &str) -> bool {
    let digits = text.strip_prefix('-').unwrap_or(text);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}
