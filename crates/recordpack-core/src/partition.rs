//! Deterministic, reversible splitting of a record's fields by value kind.
//!
//! [`partition`] routes each field to the metadata or tabular channel based
//! purely on its runtime value: a field is tabular iff it holds a
//! [`FieldValue::Table`]. [`merge`] is the inverse, used on load before the
//! record constructor runs. Both are pure functions with no I/O.

use std::collections::HashSet;

use arrow::record_batch::RecordBatch;
use snafu::prelude::*;

use crate::record::Fields;
use crate::value::{FieldValue, UnsupportedValue};

/// Errors raised while splitting or reassembling a record's fields.
#[derive(Debug, Snafu)]
pub enum PartitionError {
    /// A metadata field holds a value the document encoding cannot carry.
    #[snafu(display("field {field} is unsupported: {source}"))]
    UnsupportedFieldType {
        /// Name of the offending field.
        field: String,
        /// What exactly cannot be represented.
        source: UnsupportedValue,
    },

    /// The same field name appeared in both the metadata and tabular sets,
    /// which indicates a malformed persisted pack.
    #[snafu(display("field {field} appears in both the metadata and tabular sets"))]
    FieldCollision {
        /// The duplicated field name.
        field: String,
    },
}

/// A record's fields, split into the two persistence channels.
///
/// Both sides preserve the relative order the fields had in the record.
#[derive(Debug, Clone)]
pub struct Partitioned {
    /// Fields destined for the metadata document.
    pub metadata: Vec<(String, FieldValue)>,
    /// Fields destined for one columnar artifact each.
    pub tabular: Vec<(String, RecordBatch)>,
}

/// Split `fields` into metadata and tabular channels.
///
/// Fails with [`PartitionError::UnsupportedFieldType`] when a non-tabular
/// field holds a value the metadata document cannot represent (a non-finite
/// float, or a table nested inside a sequence).
pub fn partition(fields: Fields) -> Result<Partitioned, PartitionError> {
    let mut metadata = Vec::new();
    let mut tabular = Vec::new();

    for (name, value) in fields {
        match value {
            FieldValue::Table(batch) => tabular.push((name, batch)),
            other => {
                other
                    .document_representable()
                    .context(UnsupportedFieldTypeSnafu { field: name.clone() })?;
                metadata.push((name, other));
            }
        }
    }

    Ok(Partitioned { metadata, tabular })
}

/// Reassemble fields from the two channels, metadata first.
///
/// Fails with [`PartitionError::FieldCollision`] when a name occurs twice —
/// within one channel or across the two.
pub fn merge(
    metadata: Vec<(String, FieldValue)>,
    tabular: Vec<(String, RecordBatch)>,
) -> Result<Fields, PartitionError> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut fields = Fields::new();

    for (name, value) in metadata {
        if !seen.insert(name.clone()) {
            return FieldCollisionSnafu { field: name }.fail();
        }
        fields.insert(name, value);
    }

    for (name, batch) in tabular {
        if !seen.insert(name.clone()) {
            return FieldCollisionSnafu { field: name }.fail();
        }
        fields.insert(name, FieldValue::Table(batch));
    }

    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Int64Array;
    use arrow::datatypes::{DataType, Field, Schema};
    use std::sync::Arc;

    fn small_batch() -> RecordBatch {
        let schema = Schema::new(vec![Field::new("a", DataType::Int64, false)]);
        RecordBatch::try_new(
            Arc::new(schema),
            vec![Arc::new(Int64Array::from(vec![1, 2, 3]))],
        )
        .expect("valid batch")
    }

    fn sample_fields() -> Fields {
        let mut fields = Fields::new();
        fields.insert("name", FieldValue::Text("run".to_string()));
        fields.insert("scores", FieldValue::Table(small_batch()));
        fields.insert("rmse", FieldValue::Float(0.13));
        fields.insert("residuals", FieldValue::Table(small_batch()));
        fields
    }

    #[test]
    fn partition_routes_tables_and_preserves_order() {
        let parts = partition(sample_fields()).unwrap();

        let meta_names: Vec<&str> = parts.metadata.iter().map(|(n, _)| n.as_str()).collect();
        let table_names: Vec<&str> = parts.tabular.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(meta_names, ["name", "rmse"]);
        assert_eq!(table_names, ["scores", "residuals"]);
    }

    #[test]
    fn partition_rejects_non_finite_floats() {
        let mut fields = Fields::new();
        fields.insert("rmse", FieldValue::Float(f64::NAN));

        let err = partition(fields).unwrap_err();
        assert!(matches!(
            err,
            PartitionError::UnsupportedFieldType { field, .. } if field == "rmse"
        ));
    }

    #[test]
    fn partition_rejects_tables_inside_sequences() {
        let mut fields = Fields::new();
        fields.insert(
            "folds",
            FieldValue::Sequence(vec![FieldValue::Table(small_batch())]),
        );

        let err = partition(fields).unwrap_err();
        assert!(matches!(
            err,
            PartitionError::UnsupportedFieldType { field, .. } if field == "folds"
        ));
    }

    #[test]
    fn merge_inverts_partition() {
        let original = sample_fields();
        let parts = partition(original.clone()).unwrap();
        let merged = merge(parts.metadata, parts.tabular).unwrap();

        let mut merged_names: Vec<&str> = merged.names().collect();
        let mut original_names: Vec<&str> = original.names().collect();
        merged_names.sort_unstable();
        original_names.sort_unstable();
        assert_eq!(merged_names, original_names);

        for (name, value) in original.iter() {
            let mut merged = merged.clone();
            assert_eq!(merged.take(name).as_ref(), Some(value));
        }
    }

    #[test]
    fn merge_rejects_cross_channel_collision() {
        let metadata = vec![("scores".to_string(), FieldValue::Float(1.0))];
        let tabular = vec![("scores".to_string(), small_batch())];

        let err = merge(metadata, tabular).unwrap_err();
        assert!(matches!(
            err,
            PartitionError::FieldCollision { field } if field == "scores"
        ));
    }
}
