//! Record types: schema declarations, the ordered field container, and the
//! construction contract.
//!
//! A persistable record type implements [`Record`]: it declares an ordered
//! [`RecordSchema`], decomposes itself into [`Fields`], and rebuilds itself
//! from fields supplied by name, validating values as it goes. This is
//! explicit composition — a codec is constructed per record type and the
//! record stays a plain struct.

use arrow::record_batch::RecordBatch;
use chrono::{DateTime, FixedOffset};
use serde_json::{Map as JsonMap, Value as JsonValue};
use snafu::prelude::*;
use uuid::Uuid;

use crate::value::{FieldKind, FieldValue};

/// Declaration of a single record field: its name and kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDecl {
    /// Field name; doubles as the JSON document key or the tabular
    /// artifact stem.
    pub name: &'static str,
    /// Declared kind of the field's value.
    pub kind: FieldKind,
}

impl FieldDecl {
    /// Convenience constructor.
    pub fn new(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind }
    }
}

/// Ordered field declarations for a record type.
///
/// Declaration order is load-bearing: it fixes the key order of the
/// persisted metadata document. If a name is declared twice, the first
/// declaration wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSchema {
    fields: Vec<FieldDecl>,
}

impl RecordSchema {
    /// Build a schema from ordered field declarations.
    pub fn new(fields: Vec<FieldDecl>) -> Self {
        Self { fields }
    }

    /// The ordered declarations.
    pub fn fields(&self) -> &[FieldDecl] {
        &self.fields
    }

    /// Look up the declared kind of a field, if any.
    pub fn kind_of(&self, name: &str) -> Option<FieldKind> {
        self.fields
            .iter()
            .find(|decl| decl.name == name)
            .map(|decl| decl.kind)
    }

    /// Names of the fields declared tabular, in declaration order.
    pub fn table_fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields
            .iter()
            .filter(|decl| decl.kind == FieldKind::Table)
            .map(|decl| decl.name)
    }
}

/// Errors raised while assembling a record from named fields.
#[derive(Debug, Snafu)]
pub enum ConstructionError {
    /// A field the constructor requires was absent.
    #[snafu(display("required field {field} is missing"))]
    MissingField {
        /// Name of the absent field.
        field: String,
    },

    /// A field was supplied that the constructor does not accept.
    #[snafu(display("unexpected field {field} is not accepted by the record"))]
    UnexpectedField {
        /// Name of the surplus field.
        field: String,
    },

    /// A field was supplied with a value of the wrong kind.
    #[snafu(display("field {field} has kind {actual:?}, expected {expected:?}"))]
    WrongKind {
        /// Name of the mismatched field.
        field: String,
        /// Kind the constructor asked for.
        expected: FieldKind,
        /// Kind actually supplied.
        actual: FieldKind,
    },

    /// A field value failed record-level validation.
    #[snafu(display("field {field} is invalid: {message}"))]
    InvalidValue {
        /// Name of the rejected field.
        field: String,
        /// Why the value was rejected.
        message: String,
    },
}

impl ConstructionError {
    /// Build a [`ConstructionError::InvalidValue`] for a failed validation.
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        InvalidValueSnafu {
            field: field.into(),
            message: message.into(),
        }
        .build()
    }
}

/// An ordered collection of named field values.
///
/// Insertion order is preserved and becomes the metadata document's key
/// order. Names are expected to be unique; [`crate::partition::merge`] and
/// the codec enforce uniqueness for persisted sets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields {
    entries: Vec<(String, FieldValue)>,
}

impl Fields {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a named value.
    pub fn insert(&mut self, name: impl Into<String>, value: FieldValue) {
        self.entries.push((name.into(), value));
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a field with the given name is present.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    /// Iterate over `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Field names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    /// Remove and return the value for `name`, if present.
    pub fn take(&mut self, name: &str) -> Option<FieldValue> {
        let idx = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(idx).1)
    }

    /// Remove and return the value for `name`, failing when absent.
    pub fn take_value(&mut self, name: &str) -> Result<FieldValue, ConstructionError> {
        match self.take(name) {
            Some(value) => Ok(value),
            None => MissingFieldSnafu { field: name }.fail(),
        }
    }

    /// Remove an identifier field.
    pub fn take_id(&mut self, name: &str) -> Result<Uuid, ConstructionError> {
        match self.take_value(name)? {
            FieldValue::Id(id) => Ok(id),
            other => wrong_kind(name, FieldKind::Id, &other),
        }
    }

    /// Remove a text field.
    pub fn take_text(&mut self, name: &str) -> Result<String, ConstructionError> {
        match self.take_value(name)? {
            FieldValue::Text(text) => Ok(text),
            other => wrong_kind(name, FieldKind::Text, &other),
        }
    }

    /// Remove a float field.
    pub fn take_float(&mut self, name: &str) -> Result<f64, ConstructionError> {
        match self.take_value(name)? {
            FieldValue::Float(value) => Ok(value),
            other => wrong_kind(name, FieldKind::Float, &other),
        }
    }

    /// Remove a boolean field.
    pub fn take_bool(&mut self, name: &str) -> Result<bool, ConstructionError> {
        match self.take_value(name)? {
            FieldValue::Bool(value) => Ok(value),
            other => wrong_kind(name, FieldKind::Bool, &other),
        }
    }

    /// Remove a nested-mapping field.
    pub fn take_map(&mut self, name: &str) -> Result<JsonMap<String, JsonValue>, ConstructionError> {
        match self.take_value(name)? {
            FieldValue::Map(map) => Ok(map),
            other => wrong_kind(name, FieldKind::Map, &other),
        }
    }

    /// Remove a timestamp field.
    pub fn take_timestamp(&mut self, name: &str) -> Result<DateTime<FixedOffset>, ConstructionError> {
        match self.take_value(name)? {
            FieldValue::Timestamp(ts) => Ok(ts),
            other => wrong_kind(name, FieldKind::Timestamp, &other),
        }
    }

    /// Remove a sequence field.
    pub fn take_sequence(&mut self, name: &str) -> Result<Vec<FieldValue>, ConstructionError> {
        match self.take_value(name)? {
            FieldValue::Sequence(items) => Ok(items),
            other => wrong_kind(name, FieldKind::Sequence, &other),
        }
    }

    /// Remove a tabular field.
    pub fn take_table(&mut self, name: &str) -> Result<RecordBatch, ConstructionError> {
        match self.take_value(name)? {
            FieldValue::Table(batch) => Ok(batch),
            other => wrong_kind(name, FieldKind::Table, &other),
        }
    }

    /// Assert that every supplied field has been consumed.
    ///
    /// Constructors call this last so that surplus fields in a persisted
    /// set are rejected instead of silently dropped.
    pub fn expect_empty(self) -> Result<(), ConstructionError> {
        match self.entries.into_iter().next() {
            None => Ok(()),
            Some((name, _)) => UnexpectedFieldSnafu { field: name }.fail(),
        }
    }
}

impl IntoIterator for Fields {
    type Item = (String, FieldValue);
    type IntoIter = std::vec::IntoIter<(String, FieldValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

fn wrong_kind<T>(
    name: &str,
    expected: FieldKind,
    actual: &FieldValue,
) -> Result<T, ConstructionError> {
    WrongKindSnafu {
        field: name,
        expected,
        actual: actual.kind(),
    }
    .fail()
}

/// A structured record that can be persisted as a record pack.
///
/// Implementations stay plain structs; the codec drives persistence through
/// the three methods here.
pub trait Record: Sized {
    /// Ordered field declarations for this record type.
    fn schema() -> RecordSchema;

    /// Decompose into named field values, in declaration order.
    fn to_fields(&self) -> Fields;

    /// Construct from named fields, validating values.
    ///
    /// Implementations take each required field by name, apply any
    /// record-level validation, and finish with [`Fields::expect_empty`].
    fn from_fields(fields: Fields) -> Result<Self, ConstructionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_fields() -> Fields {
        let mut fields = Fields::new();
        fields.insert("name", FieldValue::Text("run-1".to_string()));
        fields.insert("score", FieldValue::Float(0.5));
        fields
    }

    #[test]
    fn take_preserves_remaining_order() {
        let mut fields = sample_fields();
        fields.insert("done", FieldValue::Bool(true));

        assert_eq!(fields.take_float("score").unwrap(), 0.5);
        let names: Vec<&str> = fields.names().collect();
        assert_eq!(names, ["name", "done"]);
    }

    #[test]
    fn take_missing_field_names_the_field() {
        let mut fields = sample_fields();
        let err = fields.take_text("absent").unwrap_err();
        assert!(matches!(err, ConstructionError::MissingField { field } if field == "absent"));
    }

    #[test]
    fn take_with_wrong_kind_reports_both_kinds() {
        let mut fields = sample_fields();
        let err = fields.take_bool("score").unwrap_err();
        assert!(matches!(
            err,
            ConstructionError::WrongKind {
                expected: FieldKind::Bool,
                actual: FieldKind::Float,
                ..
            }
        ));
    }

    #[test]
    fn expect_empty_rejects_leftovers() {
        let mut fields = sample_fields();
        fields.take_text("name").unwrap();

        let err = fields.expect_empty().unwrap_err();
        assert!(matches!(err, ConstructionError::UnexpectedField { field } if field == "score"));
    }

    #[test]
    fn schema_lookup_and_table_fields() {
        let schema = RecordSchema::new(vec![
            FieldDecl::new("id", FieldKind::Id),
            FieldDecl::new("features", FieldKind::Table),
            FieldDecl::new("residuals", FieldKind::Table),
        ]);

        assert_eq!(schema.kind_of("id"), Some(FieldKind::Id));
        assert_eq!(schema.kind_of("nope"), None);
        let tables: Vec<&str> = schema.table_fields().collect();
        assert_eq!(tables, ["features", "residuals"]);
    }
}
