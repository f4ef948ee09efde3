//! Integration tests driving the built `rpack` binary against real packs.

use std::path::Path;
use std::process::{Command, Output};
use std::sync::Arc;

use arrow::array::{Float64Array, Int64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use serde_json::{json, Map as JsonMap, Value as JsonValue};
use tempfile::TempDir;
use uuid::Uuid;

use recordpack_core::{
    ConstructionError, FieldDecl, FieldKind, FieldValue, Fields, Record, RecordCodec,
    RecordLocation, RecordSchema,
};

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn cli_bin() -> &'static str {
    env!("CARGO_BIN_EXE_rpack")
}

fn run_cli(args: &[&str]) -> std::io::Result<Output> {
    Command::new(cli_bin()).args(args).output()
}

fn assert_cli_success(output: &Output) {
    assert!(
        output.status.success(),
        "stdout:\n{}\nstderr:\n{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

#[derive(Debug, Clone, PartialEq)]
struct MetricsRun {
    id: Uuid,
    notes: String,
    params: JsonMap<String, JsonValue>,
    scores: RecordBatch,
}

impl Record for MetricsRun {
    fn schema() -> RecordSchema {
        RecordSchema::new(vec![
            FieldDecl::new("id", FieldKind::Id),
            FieldDecl::new("notes", FieldKind::Text),
            FieldDecl::new("params", FieldKind::Map),
            FieldDecl::new("scores", FieldKind::Table),
        ])
    }

    fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("id", FieldValue::Id(self.id));
        fields.insert("notes", FieldValue::Text(self.notes.clone()));
        fields.insert("params", FieldValue::Map(self.params.clone()));
        fields.insert("scores", FieldValue::Table(self.scores.clone()));
        fields
    }

    fn from_fields(mut fields: Fields) -> Result<Self, ConstructionError> {
        let id = fields.take_id("id")?;
        let notes = fields.take_text("notes")?;
        let params = fields.take_map("params")?;
        let scores = fields.take_table("scores")?;
        fields.expect_empty()?;
        Ok(Self {
            id,
            notes,
            params,
            scores,
        })
    }
}

fn score_table(rows: usize) -> RecordBatch {
    let schema = Schema::new(vec![
        Field::new("epoch", DataType::Int64, false),
        Field::new("loss", DataType::Float64, false),
    ]);
    let epochs: Vec<i64> = (0..rows as i64).collect();
    let losses: Vec<f64> = (0..rows).map(|i| 1.0 / (i + 1) as f64).collect();
    RecordBatch::try_new(
        Arc::new(schema),
        vec![
            Arc::new(Int64Array::from(epochs)),
            Arc::new(Float64Array::from(losses)),
        ],
    )
    .expect("valid score table")
}

fn write_pack_blocking(root: &Path, rows: usize) -> TestResult {
    let mut params = JsonMap::new();
    params.insert("lr".to_string(), json!(0.01));

    let run = MetricsRun {
        id: Uuid::new_v4(),
        notes: "smoke run".to_string(),
        params,
        scores: score_table(rows),
    };

    let rt = tokio::runtime::Runtime::new()?;
    let location = RecordLocation::local(root);
    let codec = RecordCodec::<MetricsRun>::new();
    rt.block_on(codec.save(&run, &location))?;
    Ok(())
}

#[test]
fn inspect_prints_document_and_artifact_summary() -> TestResult {
    let tmp = TempDir::new()?;
    let root = tmp.path().join("run");
    write_pack_blocking(&root, 3)?;

    let output = run_cli(&["inspect", "--location", root.to_str().unwrap()])?;
    assert_cli_success(&output);

    let stdout = String::from_utf8(output.stdout)?;
    assert!(stdout.contains("\"notes\": \"smoke run\""));
    assert!(stdout.contains("\"lr\": 0.01"));
    assert!(stdout.contains("scores: 3 rows"));
    assert!(stdout.contains("epoch: Int64"));
    assert!(stdout.contains("loss: Float64"));
    Ok(())
}

#[test]
fn table_prints_rows_and_honors_limit() -> TestResult {
    let tmp = TempDir::new()?;
    let root = tmp.path().join("run");
    write_pack_blocking(&root, 25)?;

    let output = run_cli(&[
        "table",
        "--location",
        root.to_str().unwrap(),
        "--field",
        "scores",
        "--limit",
        "5",
    ])?;
    assert_cli_success(&output);

    let stdout = String::from_utf8(output.stdout)?;
    assert!(stdout.contains("epoch"));
    assert!(stdout.contains("loss"));
    assert!(stdout.contains("(5 of 25 rows shown)"));
    Ok(())
}

#[test]
fn inspect_missing_location_fails_with_context() {
    let tmp = TempDir::new().expect("tempdir");
    let missing = tmp.path().join("never_saved");

    assert_cmd::Command::new(cli_bin())
        .args(["inspect", "--location", missing.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicates::str::contains("no record pack found"));
}

#[test]
fn table_unknown_field_fails_with_field_name() {
    let tmp = TempDir::new().expect("tempdir");
    let root = tmp.path().join("run");
    write_pack_blocking(&root, 2).expect("pack written");

    assert_cmd::Command::new(cli_bin())
        .args([
            "table",
            "--location",
            root.to_str().unwrap(),
            "--field",
            "nope",
        ])
        .assert()
        .failure()
        .stderr(predicates::str::contains("nope"));
}
