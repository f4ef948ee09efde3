//! Core engine for the `recordpack` persisted-record format.
//!
//! A record pack is a directory that stores exactly one structured record,
//! split across two channels:
//!
//! - A human-readable `metadata.json` document holding every scalar field
//!   (identifiers, free text, nested configuration, numbers, timestamps),
//!   with keys in field declaration order.
//! - One Parquet artifact per tabular field, named `<field>.parquet`, holding
//!   a column-oriented dataset.
//!
//! The crate provides:
//!
//! - A closed value model for record fields (`value` module).
//! - The [`Record`] trait and its ordered field container (`record` module).
//! - Deterministic, reversible splitting of fields into the metadata and
//!   tabular channels (`partition` module).
//! - A [`RecordCodec`] that persists a record under a target location and
//!   reconstructs an equal record from the persisted form (`codec` module).
//! - Filesystem primitives with atomic write-then-rename semantics
//!   (`storage` module) and on-disk naming conventions (`layout` module).
//!
//! Higher-level tools (for example, a CLI) are expected to depend on this
//! core crate rather than re-implementing the persistence logic.
#![deny(missing_docs)]
pub mod codec;
pub mod layout;
pub mod partition;
pub mod record;
pub mod storage;
pub mod value;

pub use codec::{ArtifactError, CodecError, CodecOptions, RecordCodec};
pub use partition::{PartitionError, Partitioned};
pub use record::{ConstructionError, FieldDecl, Fields, Record, RecordSchema};
pub use storage::RecordLocation;
pub use value::{FieldKind, FieldValue, UnsupportedValue};
