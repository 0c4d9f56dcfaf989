//! The column type lattice
//!
//! Every value maps to an `InferredType`, and any two types have a join
//! computed by [`unify`]:
//!
//! - `Unknown` (never observed) and `Null` are identities, `Unknown ⊑ Null`
//! - `Int64 ⊑ Float64`
//! - a list absorbs a non-list by unifying it with its element type, which
//!   matches how materialization wraps a lone value into a one-element list
//! - structs merge member-wise; a member missing on either side becomes nullable
//! - anything else falls back to `String`
//!
//! `unify` is commutative and associative over types and nullability. Struct
//! member *order* is first-seen order, so it follows the argument order.

use serde_json::{json, Value};
use std::fmt;

use super::field::{ColumnPath, Field, Fields, PathSegment};
use crate::value::{is_integer_literal, JsonValue};

/// Column type derived from observed values.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum InferredType {
    /// No value observed yet (e.g. elements of empty arrays)
    #[default]
    Unknown,
    Null,
    Bool,
    Int64,
    Float64,
    String,
    List(Box<InferredType>),
    Struct(Fields),
}

impl InferredType {
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            InferredType::Bool | InferredType::Int64 | InferredType::Float64 | InferredType::String
        )
    }

    /// JSON rendering used by `ingot-infer` and `ingot-inspect`.
    pub fn to_json(&self) -> Value {
        match self {
            InferredType::List(item) => json!({
                "type": "list",
                "items": item.to_json(),
            }),
            InferredType::Struct(fields) => json!({
                "type": "struct",
                "fields": fields.iter().map(Field::to_json).collect::<Vec<_>>(),
            }),
            scalar => Value::String(scalar.to_string()),
        }
    }

    /// Replace the type found at `path` with `String`.
    ///
    /// A path that runs off the end of the type widens the deepest type reached.
    pub(crate) fn widen_at(&mut self, path: &[PathSegment]) {
        match (path.split_first(), self) {
            (None, ty) => *ty = InferredType::String,
            (Some((PathSegment::Item, rest)), InferredType::List(item)) => item.widen_at(rest),
            (Some((PathSegment::Field(name), rest)), InferredType::Struct(fields)) => {
                if let Some(field) = fields.get_mut(name) {
                    field.data_type.widen_at(rest);
                }
            }
            (_, ty) => *ty = InferredType::String,
        }
    }

    /// Copy with struct members sorted by name at every level.
    ///
    /// Member order is first-seen order; this gives an order-insensitive
    /// form for comparing types inferred from differently ordered input.
    pub fn with_sorted_fields(&self) -> InferredType {
        match self {
            InferredType::List(item) => InferredType::List(Box::new(item.with_sorted_fields())),
            InferredType::Struct(fields) => InferredType::Struct(fields.with_sorted_names()),
            other => other.clone(),
        }
    }

    /// Type found at `path`, if the path exists.
    pub fn at_path(&self, path: &ColumnPath) -> Option<&InferredType> {
        let mut current = self;
        for segment in path.segments() {
            current = match (segment, current) {
                (PathSegment::Item, InferredType::List(item)) => item,
                (PathSegment::Field(name), InferredType::Struct(fields)) => &fields.get(name)?.data_type,
                _ => return None,
            };
        }
        Some(current)
    }
}

impl fmt::Display for InferredType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InferredType::Unknown => write!(f, "unknown"),
            InferredType::Null => write!(f, "null"),
            InferredType::Bool => write!(f, "bool"),
            InferredType::Int64 => write!(f, "int64"),
            InferredType::Float64 => write!(f, "float64"),
            InferredType::String => write!(f, "string"),
            InferredType::List(item) => write!(f, "list<{}>", item),
            InferredType::Struct(fields) => {
                write!(f, "struct<")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", field.name, field.data_type)?;
                    if field.nullable {
                        write!(f, "?")?;
                    }
                }
                write!(f, ">")
            }
        }
    }
}

/// Join of two types in the lattice. Total: never fails.
pub fn unify(a: InferredType, b: InferredType) -> InferredType {
    use InferredType::*;

    match (a, b) {
        (Unknown, t) | (t, Unknown) => t,
        (Null, t) | (t, Null) => t,
        (List(x), List(y)) => List(Box::new(unify(*x, *y))),
        (List(x), other) => List(Box::new(unify(*x, other))),
        (other, List(x)) => List(Box::new(unify(other, *x))),
        (Struct(x), Struct(y)) => Struct(x.merge(y)),
        (Int64, Float64) | (Float64, Int64) => Float64,
        (x, y) if x == y => x,
        _ => String,
    }
}

/// Type of a single value.
pub fn infer_value(value: &JsonValue) -> InferredType {
    match value {
        JsonValue::Null => InferredType::Null,
        JsonValue::Bool(_) => InferredType::Bool,
        JsonValue::Int(_) => InferredType::Int64,
        JsonValue::Float(_) => InferredType::Float64,
        JsonValue::BigNumber(text) if is_integer_literal(text) => InferredType::Int64,
        JsonValue::BigNumber(_) => InferredType::Float64,
        JsonValue::Str(_) => InferredType::String,
        JsonValue::Array(items) => {
            let item = items
                .iter()
                .fold(InferredType::Unknown, |acc, item| unify(acc, infer_value(item)));
            InferredType::List(Box::new(item))
        }
        JsonValue::Object(members) => {
            let mut fields = Fields::new();
            for (name, member) in members {
                fields.merge_field(Field::new(name.clone(), infer_value(member), member.is_null()));
            }
            InferredType::Struct(fields)
        }
    }
}

/// Fold a sequence of values into one type, left to right.
///
/// An empty sequence infers to `Null`.
pub fn infer<'a, I>(values: I) -> InferredType
where
    I: IntoIterator<Item = &'a JsonValue>,
{
    let ty = values
        .into_iter()
        .fold(InferredType::Unknown, |acc, value| unify(acc, infer_value(value)));

    if ty == InferredType::Unknown {
        InferredType::Null
    } else {
        ty
    }
}
