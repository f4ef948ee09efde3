//! Persist a trained-model record to a directory and load it back.
//!
//! Run with: `cargo run --example model_roundtrip`

use std::sync::Arc;

use arrow::array::Int64Array;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, FixedOffset, Utc};
use serde_json::{json, Map as JsonMap, Value as JsonValue};
use uuid::Uuid;

use recordpack_core::{
    ConstructionError, FieldDecl, FieldKind, FieldValue, Fields, Record, RecordCodec,
    RecordLocation, RecordSchema,
};

#[derive(Debug, Clone, PartialEq)]
struct TrainedModel {
    id: Uuid,
    documentation: String,
    config: JsonMap<String, JsonValue>,
    rmse: f64,
    trained_at: DateTime<FixedOffset>,
    features: RecordBatch,
}

impl Record for TrainedModel {
    fn schema() -> RecordSchema {
        RecordSchema::new(vec![
            FieldDecl::new("id", FieldKind::Id),
            FieldDecl::new("documentation", FieldKind::Text),
            FieldDecl::new("config", FieldKind::Map),
            FieldDecl::new("rmse", FieldKind::Float),
            FieldDecl::new("trained_at", FieldKind::Timestamp),
            FieldDecl::new("features", FieldKind::Table),
        ])
    }

    fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("id", FieldValue::Id(self.id));
        fields.insert("documentation", FieldValue::Text(self.documentation.clone()));
        fields.insert("config", FieldValue::Map(self.config.clone()));
        fields.insert("rmse", FieldValue::Float(self.rmse));
        fields.insert("trained_at", FieldValue::Timestamp(self.trained_at));
        fields.insert("features", FieldValue::Table(self.features.clone()));
        fields
    }

    fn from_fields(mut fields: Fields) -> Result<Self, ConstructionError> {
        let id = fields.take_id("id")?;
        let documentation = fields.take_text("documentation")?;
        let config = fields.take_map("config")?;
        let rmse = fields.take_float("rmse")?;
        if rmse < 0.0 {
            return Err(ConstructionError::invalid("rmse", "must be non-negative"));
        }
        let trained_at = fields.take_timestamp("trained_at")?;
        let features = fields.take_table("features")?;
        fields.expect_empty()?;
        Ok(Self {
            id,
            documentation,
            config,
            rmse,
            trained_at,
            features,
        })
    }
}

fn feature_table() -> RecordBatch {
    let schema = Schema::new(vec![
        Field::new("a", DataType::Int64, false),
        Field::new("b", DataType::Int64, false),
    ]);
    RecordBatch::try_new(
        Arc::new(schema),
        vec![
            Arc::new(Int64Array::from(vec![1, 2, 3])),
            Arc::new(Int64Array::from(vec![2, 4, 7])),
        ],
    )
    .expect("valid feature table")
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let location = RecordLocation::local(dir.path().join("cool_model"));

    let mut config = JsonMap::new();
    config.insert("lr".to_string(), json!(0.01));
    config.insert("num_trees".to_string(), json!(100));

    let model = TrainedModel {
        id: Uuid::new_v4(),
        documentation: "Gradient-boosted regressor for nightly demand forecasts.".to_string(),
        config,
        rmse: 0.13,
        trained_at: Utc::now().fixed_offset(),
        features: feature_table(),
    };

    let codec = RecordCodec::<TrainedModel>::new();
    codec.save(&model, &location).await?;

    let document = recordpack_core::codec::read_metadata_document(&location).await?;
    println!("metadata document keys: {:?}", document.keys().collect::<Vec<_>>());

    let loaded = codec.load(&location).await?;
    assert_eq!(model, loaded);
    println!(
        "round-tripped model {} with {} feature rows",
        loaded.id,
        loaded.features.num_rows()
    );

    Ok(())
}
