//! Value model for record fields.
//!
//! A record field holds one of a closed set of value kinds. Everything that
//! is not a tabular dataset must round-trip through the JSON metadata
//! document; kinds without a native JSON representation use a canonical
//! string form:
//!
//! - identifiers are stored as their hyphenated UUID text,
//! - timestamps are stored as RFC 3339 strings carrying the exact UTC
//!   offset they were created with.
//!
//! Classification is a closed tagged-variant check: a value outside the
//! supported set cannot be constructed, and the few representable-but-
//! unencodable shapes (non-finite floats, tables nested in sequences) are
//! rejected with [`UnsupportedValue`].

use arrow::record_batch::RecordBatch;
use chrono::{DateTime, FixedOffset};
use serde_json::{Map as JsonMap, Number, Value as JsonValue};
use snafu::prelude::*;
use uuid::Uuid;

/// The kind of a record field, as declared by a record schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// The absent value.
    Null,
    /// A boolean flag.
    Bool,
    /// A floating-point number.
    Float,
    /// Free text.
    Text,
    /// A unique identifier (UUID).
    Id,
    /// A timestamp with an explicit UTC offset.
    Timestamp,
    /// A nested mapping of text keys to arbitrary JSON values.
    Map,
    /// A sequence of scalar values.
    Sequence,
    /// A two-dimensional named-column dataset.
    Table,
}

/// A single record field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// The absent value.
    Null,
    /// A boolean flag.
    Bool(bool),
    /// A floating-point number.
    Float(f64),
    /// Free text.
    Text(String),
    /// A unique identifier.
    Id(Uuid),
    /// A timestamp with an explicit UTC offset; the offset survives
    /// persistence untouched.
    Timestamp(DateTime<FixedOffset>),
    /// A nested mapping; key order is preserved.
    Map(JsonMap<String, JsonValue>),
    /// A sequence of scalar values.
    Sequence(Vec<FieldValue>),
    /// A tabular dataset, persisted through the columnar channel rather
    /// than the metadata document.
    Table(RecordBatch),
}

/// A value shape the metadata document cannot represent.
#[derive(Debug, Snafu, PartialEq)]
pub enum UnsupportedValue {
    /// JSON has no representation for NaN or infinities.
    #[snafu(display("non-finite number {value} has no document representation"))]
    NonFiniteNumber {
        /// The offending float.
        value: f64,
    },

    /// Tabular datasets belong in the columnar channel, never inside the
    /// metadata document.
    #[snafu(display("tabular values have no document representation"))]
    TabularValue,
}

impl FieldValue {
    /// Returns the kind of this value.
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::Null => FieldKind::Null,
            FieldValue::Bool(_) => FieldKind::Bool,
            FieldValue::Float(_) => FieldKind::Float,
            FieldValue::Text(_) => FieldKind::Text,
            FieldValue::Id(_) => FieldKind::Id,
            FieldValue::Timestamp(_) => FieldKind::Timestamp,
            FieldValue::Map(_) => FieldKind::Map,
            FieldValue::Sequence(_) => FieldKind::Sequence,
            FieldValue::Table(_) => FieldKind::Table,
        }
    }

    /// Check whether this value can be carried by the metadata document.
    ///
    /// This walks nested sequences without allocating; it is the validation
    /// used by field partitioning.
    pub fn document_representable(&self) -> Result<(), UnsupportedValue> {
        match self {
            FieldValue::Float(value) if !value.is_finite() => {
                NonFiniteNumberSnafu { value: *value }.fail()
            }
            FieldValue::Sequence(items) => items
                .iter()
                .try_for_each(FieldValue::document_representable),
            FieldValue::Table(_) => TabularValueSnafu.fail(),
            _ => Ok(()),
        }
    }

    /// Encode this value into its JSON document form.
    ///
    /// Identifiers and timestamps become their canonical strings; the
    /// conversion is exactly inverted on load by the codec.
    pub fn to_json(&self) -> Result<JsonValue, UnsupportedValue> {
        match self {
            FieldValue::Null => Ok(JsonValue::Null),
            FieldValue::Bool(value) => Ok(JsonValue::Bool(*value)),
            FieldValue::Float(value) => Number::from_f64(*value)
                .map(JsonValue::Number)
                .ok_or(UnsupportedValue::NonFiniteNumber { value: *value }),
            FieldValue::Text(text) => Ok(JsonValue::String(text.clone())),
            FieldValue::Id(id) => Ok(JsonValue::String(id.to_string())),
            FieldValue::Timestamp(ts) => Ok(JsonValue::String(ts.to_rfc3339())),
            FieldValue::Map(map) => Ok(JsonValue::Object(map.clone())),
            FieldValue::Sequence(items) => items
                .iter()
                .map(FieldValue::to_json)
                .collect::<Result<Vec<_>, _>>()
                .map(JsonValue::Array),
            FieldValue::Table(_) => TabularValueSnafu.fail(),
        }
    }

    /// Decode a JSON document value into its generic field form.
    ///
    /// Strings stay text here; reviving identifiers and timestamps needs
    /// the record schema and is done by the codec for the fields it types
    /// accordingly.
    pub fn from_json(value: JsonValue) -> FieldValue {
        match value {
            JsonValue::Null => FieldValue::Null,
            JsonValue::Bool(value) => FieldValue::Bool(value),
            JsonValue::Number(n) => FieldValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            JsonValue::String(text) => FieldValue::Text(text),
            JsonValue::Array(items) => {
                FieldValue::Sequence(items.into_iter().map(FieldValue::from_json).collect())
            }
            JsonValue::Object(map) => FieldValue::Map(map),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ts(raw: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(raw).expect("valid RFC 3339 timestamp")
    }

    #[test]
    fn id_encodes_as_hyphenated_string() {
        let id = Uuid::parse_str("3fae89a1-58cc-4372-a567-0e02b2c3d479").unwrap();
        let json = FieldValue::Id(id).to_json().unwrap();
        assert_eq!(json, json!("3fae89a1-58cc-4372-a567-0e02b2c3d479"));
    }

    #[test]
    fn timestamp_encoding_keeps_the_offset() {
        let value = FieldValue::Timestamp(ts("2024-01-01T09:30:00+05:30"));
        let json = value.to_json().unwrap();
        assert_eq!(json, json!("2024-01-01T09:30:00+05:30"));
    }

    #[test]
    fn utc_timestamp_encodes_with_explicit_zero_offset() {
        let value = FieldValue::Timestamp(ts("2024-01-01T00:00:00+00:00"));
        let json = value.to_json().unwrap();
        assert_eq!(json, json!("2024-01-01T00:00:00+00:00"));
    }

    #[test]
    fn scalars_roundtrip_through_json() {
        let values = vec![
            FieldValue::Null,
            FieldValue::Bool(true),
            FieldValue::Float(0.13),
            FieldValue::Text("docs".to_string()),
            FieldValue::Sequence(vec![FieldValue::Float(1.0), FieldValue::Text("x".into())]),
        ];
        for value in values {
            let json = value.to_json().unwrap();
            assert_eq!(FieldValue::from_json(json), value);
        }
    }

    #[test]
    fn map_roundtrips_with_key_order() {
        let mut map = JsonMap::new();
        map.insert("lr".to_string(), json!(0.01));
        map.insert("num_trees".to_string(), json!(100));
        let value = FieldValue::Map(map.clone());

        let json = value.to_json().unwrap();
        let keys: Vec<&String> = json.as_object().unwrap().keys().collect();
        assert_eq!(keys, ["lr", "num_trees"]);
        assert_eq!(FieldValue::from_json(json), FieldValue::Map(map));
    }

    #[test]
    fn non_finite_floats_are_rejected() {
        let err = FieldValue::Float(f64::NAN).to_json().unwrap_err();
        assert!(matches!(err, UnsupportedValue::NonFiniteNumber { .. }));

        let err = FieldValue::Sequence(vec![FieldValue::Float(f64::INFINITY)])
            .document_representable()
            .unwrap_err();
        assert!(matches!(err, UnsupportedValue::NonFiniteNumber { .. }));
    }

    #[test]
    fn nested_tables_are_rejected() {
        use arrow::array::Int64Array;
        use arrow::datatypes::{DataType, Field, Schema};
        use std::sync::Arc;

        let schema = Schema::new(vec![Field::new("a", DataType::Int64, false)]);
        let batch = RecordBatch::try_new(
            Arc::new(schema),
            vec![Arc::new(Int64Array::from(vec![1, 2]))],
        )
        .unwrap();

        let nested = FieldValue::Sequence(vec![FieldValue::Table(batch)]);
        assert!(matches!(
            nested.document_representable().unwrap_err(),
            UnsupportedValue::TabularValue
        ));
    }
}
