//! Bidirectional translation between a record and its persisted pack.
//!
//! A [`RecordCodec`] owns the persistence protocol for one record type:
//!
//! - `save` splits the record's fields, writes the metadata document
//!   (pretty-printed JSON, keys in field declaration order) and one Parquet
//!   artifact per tabular field under the target location. Every artifact is
//!   written atomically (write-then-rename), but there is no cross-artifact
//!   transaction: a failure partway through `save` can leave earlier
//!   artifacts behind. Callers needing whole-record atomicity stage into a
//!   temporary sibling directory and rename the container into place.
//! - `load` reads the document back, revives identifiers and timestamps
//!   from their canonical string forms using the record schema, discovers
//!   tabular artifacts by naming convention, merges both channels, and hands
//!   the result to the record constructor.
//!
//! The untyped halves ([`read_metadata_document`],
//! [`read_tabular_artifacts`], [`read_tabular_artifact`]) are public so thin
//! tools can inspect a pack without knowing its record type.
//!
//! The codec holds no state between calls; concurrent `save`/`load` against
//! the same location must be serialized externally.

use std::marker::PhantomData;

use arrow::compute::concat_batches;
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use chrono::DateTime;
use log::warn;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Map as JsonMap, Value as JsonValue};
use snafu::prelude::*;
use uuid::Uuid;

use crate::layout;
use crate::partition::{self, PartitionError};
use crate::record::{ConstructionError, Record, RecordSchema};
use crate::storage::{self, RecordLocation, StorageError};
use crate::value::{FieldKind, FieldValue};

/// Failure while encoding, decoding, or transferring one tabular artifact.
#[derive(Debug, Snafu)]
pub enum ArtifactError {
    /// Parquet encode or decode failure.
    #[snafu(transparent)]
    Parquet {
        /// Underlying parquet error.
        source: parquet::errors::ParquetError,
    },

    /// Arrow-level failure while materializing or concatenating batches.
    #[snafu(transparent)]
    Arrow {
        /// Underlying arrow error.
        source: arrow::error::ArrowError,
    },

    /// Storage-level failure while reading or writing the artifact bytes.
    #[snafu(transparent)]
    Storage {
        /// Underlying storage error.
        source: StorageError,
    },
}

/// Errors from saving or loading a record pack.
#[derive(Debug, Snafu)]
pub enum CodecError {
    /// The target location exists but cannot be used as a container, or
    /// could not be created.
    #[snafu(display("location {path} is unavailable as a record container: {source}"))]
    LocationUnavailable {
        /// The unusable location.
        path: String,
        /// Underlying storage error.
        source: StorageError,
    },

    /// The location does not exist or lacks the metadata document.
    #[snafu(display("no record pack found at {path}"))]
    LocationNotFound {
        /// The location that was probed.
        path: String,
    },

    /// The metadata document could not be serialized.
    #[snafu(display("failed to encode the metadata document: {source}"))]
    MetadataEncode {
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// The metadata document is not parseable JSON. Not recoverable here;
    /// surfaced to the caller.
    #[snafu(display("corrupt metadata document at {path}: {source}"))]
    CorruptMetadata {
        /// Relative path of the document.
        path: String,
        /// Underlying JSON parse error.
        source: serde_json::Error,
    },

    /// A stored string does not match the canonical form the record schema
    /// expects for the field.
    #[snafu(display("field {field} cannot be converted from its stored form: {detail}"))]
    TypeConversion {
        /// Name of the unconvertible field.
        field: String,
        /// What was found and why it failed.
        detail: String,
    },

    /// Writing a tabular artifact failed.
    #[snafu(display("failed to write tabular artifact {path} for field {field}: {source}"))]
    ColumnarWrite {
        /// The tabular field being written.
        field: String,
        /// Relative artifact path.
        path: String,
        /// Underlying cause.
        source: ArtifactError,
    },

    /// Reading a tabular artifact failed: missing, unreadable, or with a
    /// column layout the reader cannot interpret.
    #[snafu(display("failed to read tabular artifact {path} for field {field}: {source}"))]
    ColumnarRead {
        /// The tabular field being read.
        field: String,
        /// Relative artifact path.
        path: String,
        /// Underlying cause.
        source: ArtifactError,
    },

    /// Splitting or reassembling the record's fields failed.
    #[snafu(display("{source}"))]
    Partition {
        /// Underlying partition error.
        source: PartitionError,
    },

    /// The record constructor rejected the merged fields.
    #[snafu(display("record construction failed: {source}"))]
    RecordConstruction {
        /// Underlying validation error.
        source: ConstructionError,
    },

    /// A storage failure outside the tabular artifacts (container bootstrap
    /// or metadata document I/O).
    #[snafu(display("storage error: {source}"))]
    Storage {
        /// Underlying storage error.
        source: StorageError,
    },
}

/// Formatting options for the metadata document.
///
/// Explicit configuration, passed at codec construction; there is no
/// process-wide state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecOptions {
    /// Pretty-print the document instead of writing compact JSON.
    pub pretty_print: bool,
    /// Indent width, in spaces, used when pretty-printing.
    pub indent_width: usize,
    /// Terminate the document with a newline.
    pub trailing_newline: bool,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self {
            pretty_print: true,
            indent_width: 2,
            trailing_newline: true,
        }
    }
}

/// Persists records of type `R` as record packs and reads them back.
///
/// Constructed once per record type; both operations are stateless beyond
/// the formatting options.
#[derive(Debug, Clone)]
pub struct RecordCodec<R> {
    options: CodecOptions,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> RecordCodec<R> {
    /// Create a codec with default formatting options.
    pub fn new() -> Self {
        Self::with_options(CodecOptions::default())
    }

    /// Create a codec with explicit formatting options.
    pub fn with_options(options: CodecOptions) -> Self {
        Self {
            options,
            _record: PhantomData,
        }
    }

    /// The formatting options in effect.
    pub fn options(&self) -> &CodecOptions {
        &self.options
    }

    /// Persist `record` under `location`, creating the container directory
    /// if needed.
    ///
    /// On success every artifact exists and is individually valid. On
    /// failure partway through, artifacts written earlier in the same call
    /// may remain on disk; see the module documentation for the staging
    /// pattern that gives whole-record atomicity.
    pub async fn save(&self, record: &R, location: &RecordLocation) -> Result<(), CodecError> {
        storage::ensure_dir(location)
            .await
            .context(LocationUnavailableSnafu {
                path: location.to_string(),
            })?;

        let parts = partition::partition(record.to_fields()).context(PartitionSnafu)?;

        let mut doc = JsonMap::new();
        for (name, value) in &parts.metadata {
            let json = value
                .to_json()
                .map_err(|source| PartitionError::UnsupportedFieldType {
                    field: name.clone(),
                    source,
                })
                .context(PartitionSnafu)?;
            doc.insert(name.clone(), json);
        }

        let document = encode_document(&doc, &self.options).context(MetadataEncodeSnafu)?;
        storage::write_atomic(location, &layout::metadata_rel_path(), &document)
            .await
            .context(StorageSnafu)?;

        for (name, batch) in &parts.tabular {
            let rel = layout::tabular_rel_path(name);
            let payload = encode_parquet(batch).context(ColumnarWriteSnafu {
                field: name.clone(),
                path: rel.display().to_string(),
            })?;
            storage::write_atomic(location, &rel, &payload)
                .await
                .map_err(ArtifactError::from)
                .context(ColumnarWriteSnafu {
                    field: name.clone(),
                    path: rel.display().to_string(),
                })?;
        }

        Ok(())
    }

    /// Read the pack at `location` and construct a record from it.
    pub async fn load(&self, location: &RecordLocation) -> Result<R, CodecError> {
        let doc = read_metadata_document(location).await?;

        let schema = R::schema();
        let mut metadata = Vec::with_capacity(doc.len());
        for (name, json) in doc {
            let value = revive_metadata_value(&schema, &name, json)?;
            metadata.push((name, value));
        }

        let mut wanted = discovered_tabular_fields(location).await?;
        for expected in schema.table_fields() {
            if !wanted.iter().any(|name| name == expected) {
                wanted.push(expected.to_string());
            }
        }

        let mut tabular = Vec::with_capacity(wanted.len());
        for name in wanted {
            if schema.kind_of(&name) != Some(FieldKind::Table) {
                warn!(
                    "artifact {} does not match a tabular field declared by the record",
                    layout::tabular_rel_path(&name).display()
                );
            }
            let batch = read_tabular_artifact(location, &name).await?;
            tabular.push((name, batch));
        }

        let fields = partition::merge(metadata, tabular).context(PartitionSnafu)?;
        R::from_fields(fields).context(RecordConstructionSnafu)
    }
}

impl<R: Record> Default for RecordCodec<R> {
    fn default() -> Self {
        Self::new()
    }
}

/// Read and parse the metadata document of the pack at `location`.
///
/// Key order in the returned mapping is the document's key order.
pub async fn read_metadata_document(
    location: &RecordLocation,
) -> Result<JsonMap<String, JsonValue>, CodecError> {
    let rel = layout::metadata_rel_path();
    let text = match storage::read_to_string(location, &rel).await {
        Ok(text) => text,
        Err(StorageError::NotFound { .. }) => {
            return LocationNotFoundSnafu {
                path: location.to_string(),
            }
            .fail();
        }
        Err(source) => return Err(CodecError::Storage { source }),
    };

    serde_json::from_str(&text).context(CorruptMetadataSnafu {
        path: rel.display().to_string(),
    })
}

/// Read every tabular artifact under `location`, discovered by the
/// `<field>.parquet` naming convention, sorted by field name.
pub async fn read_tabular_artifacts(
    location: &RecordLocation,
) -> Result<Vec<(String, RecordBatch)>, CodecError> {
    let fields = discovered_tabular_fields(location).await?;
    let mut artifacts = Vec::with_capacity(fields.len());
    for field in fields {
        let batch = read_tabular_artifact(location, &field).await?;
        artifacts.push((field, batch));
    }
    Ok(artifacts)
}

/// Read the tabular artifact for one field of the pack at `location`.
pub async fn read_tabular_artifact(
    location: &RecordLocation,
    field: &str,
) -> Result<RecordBatch, CodecError> {
    let rel = layout::tabular_rel_path(field);
    let bytes = storage::read_all_bytes(location, &rel)
        .await
        .map_err(ArtifactError::from)
        .context(ColumnarReadSnafu {
            field,
            path: rel.display().to_string(),
        })?;

    decode_parquet(bytes).context(ColumnarReadSnafu {
        field,
        path: rel.display().to_string(),
    })
}

async fn discovered_tabular_fields(location: &RecordLocation) -> Result<Vec<String>, CodecError> {
    let names = match storage::list_file_names(location).await {
        Ok(names) => names,
        Err(StorageError::NotFound { .. }) => {
            return LocationNotFoundSnafu {
                path: location.to_string(),
            }
            .fail();
        }
        Err(source) => return Err(CodecError::Storage { source }),
    };

    Ok(names
        .iter()
        .filter_map(|name| layout::field_of_artifact(name))
        .map(str::to_string)
        .collect())
}

fn revive_metadata_value(
    schema: &RecordSchema,
    field: &str,
    json: JsonValue,
) -> Result<FieldValue, CodecError> {
    match schema.kind_of(field) {
        Some(FieldKind::Id) => {
            let raw = json
                .as_str()
                .ok_or_else(|| type_conversion(field, "expected a string-encoded identifier"))?;
            let id = Uuid::parse_str(raw)
                .map_err(|e| type_conversion(field, format!("invalid identifier {raw:?}: {e}")))?;
            Ok(FieldValue::Id(id))
        }
        Some(FieldKind::Timestamp) => {
            let raw = json
                .as_str()
                .ok_or_else(|| type_conversion(field, "expected a string-encoded timestamp"))?;
            let ts = DateTime::parse_from_rfc3339(raw).map_err(|e| {
                type_conversion(field, format!("invalid RFC 3339 timestamp {raw:?}: {e}"))
            })?;
            Ok(FieldValue::Timestamp(ts))
        }
        _ => Ok(FieldValue::from_json(json)),
    }
}

fn type_conversion(field: &str, detail: impl Into<String>) -> CodecError {
    TypeConversionSnafu {
        field,
        detail: detail.into(),
    }
    .build()
}

fn encode_document(
    doc: &JsonMap<String, JsonValue>,
    options: &CodecOptions,
) -> Result<Vec<u8>, serde_json::Error> {
    let mut buf = Vec::new();
    if options.pretty_print {
        let indent = " ".repeat(options.indent_width);
        let formatter = PrettyFormatter::with_indent(indent.as_bytes());
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        doc.serialize(&mut ser)?;
    } else {
        serde_json::to_writer(&mut buf, doc)?;
    }
    if options.trailing_newline {
        buf.push(b'\n');
    }
    Ok(buf)
}

fn encode_parquet(batch: &RecordBatch) -> Result<Vec<u8>, ArtifactError> {
    let mut buf = Vec::new();
    let props = WriterProperties::builder().build();
    let mut writer = ArrowWriter::try_new(&mut buf, batch.schema(), Some(props))?;
    writer.write(batch)?;
    writer.close()?;
    Ok(buf)
}

fn decode_parquet(bytes: Vec<u8>) -> Result<RecordBatch, ArtifactError> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(Bytes::from(bytes))?;
    let schema = builder.schema().clone();
    let reader = builder.build()?;

    let mut batches = Vec::new();
    for batch in reader {
        batches.push(batch?);
    }

    if batches.is_empty() {
        return Ok(RecordBatch::new_empty(schema));
    }
    Ok(concat_batches(&schema, &batches)?)
}
