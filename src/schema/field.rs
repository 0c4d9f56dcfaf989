//! Fields, ordered field lists and the root schema

use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::fmt;

use super::format::StringFormat;
use super::types::{unify, InferredType};

/// A named column (or struct member) with its type and nullability.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub data_type: InferredType,
    /// True iff some record had this field null or missing
    pub nullable: bool,
    /// Logical string format shared by every value, if any
    pub format: Option<StringFormat>,
}

impl Field {
    pub fn new(name: impl Into<String>, data_type: InferredType, nullable: bool) -> Self {
        Field {
            name: name.into(),
            data_type,
            nullable,
            format: None,
        }
    }

    pub fn with_format(mut self, format: Option<StringFormat>) -> Self {
        self.format = format;
        self
    }

    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        out.insert("name".to_string(), Value::String(self.name.clone()));
        out.insert("type".to_string(), self.data_type.to_json());
        out.insert("nullable".to_string(), Value::Bool(self.nullable));
        if let Some(format) = self.format {
            out.insert("format".to_string(), Value::String(format.name().to_string()));
        }
        Value::Object(out)
    }
}

/// Ordered field list with name lookup.
///
/// Order is insertion (first-seen) order; the index map only accelerates lookups.
#[derive(Debug, Clone, Default)]
pub struct Fields {
    fields: Vec<Field>,
    index: HashMap<String, usize>,
}

impl Fields {
    pub fn new() -> Self {
        Fields::default()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Field> {
        self.fields.iter()
    }

    pub fn as_slice(&self) -> &[Field] {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.index.get(name).map(|&i| &self.fields[i])
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Field> {
        match self.index.get(name) {
            Some(&i) => Some(&mut self.fields[i]),
            None => None,
        }
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Append a field, or unify it into an existing one of the same name.
    pub fn merge_field(&mut self, field: Field) -> usize {
        if let Some(&i) = self.index.get(&field.name) {
            let existing = &mut self.fields[i];
            existing.data_type = unify(std::mem::take(&mut existing.data_type), field.data_type);
            existing.nullable |= field.nullable;
            return i;
        }
        let i = self.fields.len();
        self.index.insert(field.name.clone(), i);
        self.fields.push(field);
        i
    }

    /// Member-wise join of two struct member lists.
    ///
    /// Members of `self` keep their positions, new members of `other` are
    /// appended. A member present on only one side becomes nullable.
    pub fn merge(mut self, other: Fields) -> Fields {
        let mut matched = vec![false; self.fields.len()];
        for field in other.fields {
            match self.index.get(&field.name).copied() {
                Some(i) => {
                    matched[i] = true;
                    self.merge_field(field);
                }
                None => {
                    self.merge_field(Field {
                        nullable: true,
                        ..field
                    });
                }
            }
        }
        for (i, seen) in matched.into_iter().enumerate() {
            if !seen {
                self.fields[i].nullable = true;
            }
        }
        self
    }

    pub(crate) fn with_sorted_names(&self) -> Fields {
        let mut sorted: Vec<Field> = self
            .fields
            .iter()
            .map(|field| Field {
                data_type: field.data_type.with_sorted_fields(),
                ..field.clone()
            })
            .collect();
        sorted.sort_by(|a, b| a.name.cmp(&b.name));
        sorted.into_iter().collect()
    }
}

impl PartialEq for Fields {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields
    }
}

impl FromIterator<Field> for Fields {
    fn from_iter<T: IntoIterator<Item = Field>>(iter: T) -> Self {
        let mut fields = Fields::new();
        for field in iter {
            fields.merge_field(field);
        }
        fields
    }
}

impl<'a> IntoIterator for &'a Fields {
    type Item = &'a Field;
    type IntoIter = std::slice::Iter<'a, Field>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

/// Root-level schema: the ordered columns of a file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Schema {
    fields: Fields,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Self {
        Schema {
            fields: fields.into_iter().collect(),
        }
    }

    pub fn empty() -> Self {
        Schema::default()
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn field(&self, i: usize) -> Option<&Field> {
        self.fields.as_slice().get(i)
    }

    pub fn field_by_name(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.position(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Same schema with members sorted by name at every level.
    pub fn with_sorted_fields(&self) -> Schema {
        Schema {
            fields: self.fields.with_sorted_names(),
        }
    }

    /// Widen the type at a column path (first segment names the column) to String.
    pub(crate) fn widen_at(&mut self, path: &ColumnPath) {
        if let Some((PathSegment::Field(name), rest)) = path.segments().split_first() {
            if let Some(field) = self.fields.get_mut(name) {
                field.data_type.widen_at(rest);
            }
        }
    }

    pub fn to_json(&self) -> Value {
        json!({
            "fields": self.fields.iter().map(Field::to_json).collect::<Vec<_>>(),
        })
    }
}

/// One step into a nested column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Field(String),
    Item,
}

/// Location of a value inside a record, e.g. `a.b[]`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ColumnPath {
    segments: Vec<PathSegment>,
}

impl ColumnPath {
    pub fn root(name: &str) -> Self {
        ColumnPath {
            segments: vec![PathSegment::Field(name.to_string())],
        }
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub(crate) fn push(&mut self, segment: PathSegment) {
        self.segments.push(segment);
    }

    pub(crate) fn pop(&mut self) {
        self.segments.pop();
    }
}

impl fmt::Display for ColumnPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                PathSegment::Field(name) if i == 0 => write!(f, "{}", name)?,
                PathSegment::Field(name) => write!(f, ".{}", name)?,
                PathSegment::Item => write!(f, "[]")?,
            }
        }
        Ok(())
    }
}
