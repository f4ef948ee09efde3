//! On-disk layout conventions under a record-pack root.
//!
//! This module centralizes the *relative* path conventions for a record
//! pack: the metadata document name and the per-field tabular artifact
//! naming. The functions here return relative [`std::path::PathBuf`] values;
//! callers join them with a [`crate::storage::RecordLocation`] before doing
//! I/O.

use std::path::PathBuf;

/// Name of the metadata document inside a record pack.
pub const METADATA_FILE_NAME: &str = "metadata.json";

/// File extension used for tabular artifacts.
pub const TABULAR_EXT: &str = "parquet";

/// Relative path: `metadata.json`
pub fn metadata_rel_path() -> PathBuf {
    PathBuf::from(METADATA_FILE_NAME)
}

/// Relative path: `<field>.parquet`
pub fn tabular_rel_path(field: &str) -> PathBuf {
    PathBuf::from(format!("{field}.{TABULAR_EXT}"))
}

/// Map an artifact file name back to the tabular field it stores.
///
/// Returns `None` for the metadata document, for files with other
/// extensions, and for a bare `.parquet` with an empty stem.
pub fn field_of_artifact(file_name: &str) -> Option<&str> {
    let suffix = format!(".{TABULAR_EXT}");
    file_name
        .strip_suffix(suffix.as_str())
        .filter(|stem| !stem.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tabular_rel_path_appends_extension() {
        assert_eq!(tabular_rel_path("features"), PathBuf::from("features.parquet"));
    }

    #[test]
    fn field_of_artifact_inverts_tabular_rel_path() {
        assert_eq!(field_of_artifact("features.parquet"), Some("features"));
        assert_eq!(field_of_artifact("a.b.parquet"), Some("a.b"));
    }

    #[test]
    fn field_of_artifact_ignores_other_files() {
        assert_eq!(field_of_artifact(METADATA_FILE_NAME), None);
        assert_eq!(field_of_artifact("notes.txt"), None);
        assert_eq!(field_of_artifact(".parquet"), None);
    }
}
