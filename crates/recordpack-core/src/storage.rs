//! Filesystem backend for record-pack containers.
//!
//! This module centralizes all filesystem access for `recordpack-core`. A
//! record pack is rooted at a [`RecordLocation`]; everything else in the
//! crate works with paths *relative* to that root and delegates the actual
//! I/O to the functions here:
//!
//! - [`ensure_dir`] bootstraps the container directory.
//! - [`write_atomic`] provides write-then-rename semantics so a reader never
//!   observes a partially written artifact under its final name.
//! - [`read_to_string`] / [`read_all_bytes`] read artifacts back, mapping
//!   the missing-file case to a dedicated error variant.
//! - [`list_file_names`] enumerates artifacts for discovery by naming
//!   convention.
//!
//! Only the local filesystem is supported; the [`RecordLocation`] enum
//! leaves room for future backends (for example, object storage) without
//! rewriting the codec.

use snafu::prelude::*;
use std::{
    error::Error,
    fmt, io,
    path::{Path, PathBuf},
};
use tokio::{fs, io::AsyncWriteExt};

/// General result type used by storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Root location of a persisted record pack.
///
/// This enum abstracts over storage backends, currently supporting local
/// filesystem paths only.
#[derive(Clone, Debug)]
pub enum RecordLocation {
    /// A record pack stored on the local filesystem at the given directory.
    Local(PathBuf),
    // Future:
    // S3 { bucket: String, prefix: String },
}

impl RecordLocation {
    /// Creates a new `RecordLocation` for a local filesystem directory.
    pub fn local(root: impl Into<PathBuf>) -> Self {
        RecordLocation::Local(root.into())
    }
}

impl fmt::Display for RecordLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordLocation::Local(root) => write!(f, "{}", root.display()),
        }
    }
}

/// Errors produced by the storage backend implementation.
///
/// Backend-specific I/O errors are wrapped in this enum so higher layers can
/// map them into [`StorageError`] variants with additional context.
#[derive(Debug)]
pub enum BackendError {
    /// A local filesystem I/O error.
    Local(io::Error),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Local(e) => write!(f, "local I/O error: {e}"),
        }
    }
}

impl Error for BackendError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            BackendError::Local(e) => Some(e),
        }
    }
}

/// Errors that can occur during storage operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StorageError {
    /// The specified path was not found.
    #[snafu(display("Path not found: {path}"))]
    NotFound {
        /// The path that was not found.
        path: String,
        /// Underlying backend error that caused the failure.
        source: BackendError,
    },

    /// An I/O error occurred on the local filesystem.
    #[snafu(display("Local I/O error at {path}: {source}"))]
    OtherIo {
        /// The path where the I/O error occurred.
        path: String,
        /// Underlying backend I/O error with platform-specific details.
        source: BackendError,
    },
}

/// Join a record location with a relative path into an absolute local path.
fn join_local(location: &RecordLocation, rel: &Path) -> PathBuf {
    match location {
        RecordLocation::Local(root) => root.join(rel),
    }
}

/// Guard that removes a temporary file on drop unless disarmed.
/// Used to ensure cleanup on error paths during atomic writes.
struct TempFileGuard {
    path: PathBuf,
    armed: bool,
}

impl TempFileGuard {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    /// Disarm the guard so the file is NOT removed on drop.
    /// Call this after a successful rename.
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if self.armed {
            // Best-effort cleanup; we are likely already handling another error.
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// Create the container directory for `location` if it does not exist yet.
///
/// Succeeds when the directory already exists. Fails with
/// [`StorageError::OtherIo`] when the path is occupied by a non-directory
/// entry or cannot be created (for example, due to permissions).
pub async fn ensure_dir(location: &RecordLocation) -> StorageResult<()> {
    match location {
        RecordLocation::Local(root) => fs::create_dir_all(root)
            .await
            .map_err(BackendError::Local)
            .context(OtherIoSnafu {
                path: root.display().to_string(),
            }),
    }
}

/// Write `contents` to `rel_path` inside `location` using an atomic write.
///
/// This performs a write-then-rename sequence on the local filesystem: it
/// writes the payload to a temporary file next to the target path, syncs the
/// file, and then renames it into place to provide an atomic replacement. A
/// crash mid-write leaves at most a `*.tmp` file behind, never a truncated
/// artifact under its final name.
///
/// # Errors
///
/// Returns [`StorageError::OtherIo`] when filesystem I/O fails at any step.
pub async fn write_atomic(
    location: &RecordLocation,
    rel_path: &Path,
    contents: &[u8],
) -> StorageResult<()> {
    match location {
        RecordLocation::Local(_) => {
            let abs = join_local(location, rel_path);

            let tmp_path = abs.with_extension("tmp");
            let mut guard = TempFileGuard::new(tmp_path.clone());

            {
                let mut file = fs::File::create(&tmp_path)
                    .await
                    .map_err(BackendError::Local)
                    .context(OtherIoSnafu {
                        path: tmp_path.display().to_string(),
                    })?;

                file.write_all(contents)
                    .await
                    .map_err(BackendError::Local)
                    .context(OtherIoSnafu {
                        path: tmp_path.display().to_string(),
                    })?;

                file.sync_all()
                    .await
                    .map_err(BackendError::Local)
                    .context(OtherIoSnafu {
                        path: tmp_path.display().to_string(),
                    })?;
            }

            fs::rename(&tmp_path, &abs)
                .await
                .map_err(BackendError::Local)
                .context(OtherIoSnafu {
                    path: abs.display().to_string(),
                })?;

            // The temp file has been renamed; nothing to clean up.
            guard.disarm();

            Ok(())
        }
    }
}

/// Read the file at `rel_path` within the given `location` and return its
/// contents as a `String`.
///
/// If the file cannot be found a [`StorageError::NotFound`] is returned,
/// while other filesystem problems produce [`StorageError::OtherIo`].
pub async fn read_to_string(location: &RecordLocation, rel_path: &Path) -> StorageResult<String> {
    match location {
        RecordLocation::Local(_) => {
            let abs = join_local(location, rel_path);

            match fs::read_to_string(&abs).await {
                Ok(s) => Ok(s),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Err(BackendError::Local(e))
                    .context(NotFoundSnafu {
                        path: abs.display().to_string(),
                    }),
                Err(e) => Err(BackendError::Local(e)).context(OtherIoSnafu {
                    path: abs.display().to_string(),
                }),
            }
        }
    }
}

/// Read the full contents of a file at `rel_path` within `location` and
/// return them as a `Vec<u8>`.
///
/// # Errors
///
/// - If the file does not exist this returns [`StorageError::NotFound`].
/// - On any other I/O error this returns [`StorageError::OtherIo`].
pub async fn read_all_bytes(location: &RecordLocation, rel_path: &Path) -> StorageResult<Vec<u8>> {
    match location {
        RecordLocation::Local(_) => {
            let abs = join_local(location, rel_path);
            let path_str = abs.display().to_string();

            match fs::read(&abs).await {
                Ok(bytes) => Ok(bytes),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    Err(BackendError::Local(e)).context(NotFoundSnafu { path: path_str })
                }
                Err(e) => Err(BackendError::Local(e)).context(OtherIoSnafu { path: path_str }),
            }
        }
    }
}

/// List the names of regular files directly under `location`, sorted.
///
/// Subdirectories and entries whose names are not valid UTF-8 are skipped;
/// artifact discovery works on names, and non-UTF-8 names cannot match any
/// artifact convention.
///
/// # Errors
///
/// - If the container directory does not exist this returns
///   [`StorageError::NotFound`].
/// - On any other I/O error this returns [`StorageError::OtherIo`].
pub async fn list_file_names(location: &RecordLocation) -> StorageResult<Vec<String>> {
    match location {
        RecordLocation::Local(root) => {
            let path_str = root.display().to_string();

            let mut entries = match fs::read_dir(root).await {
                Ok(rd) => rd,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    return Err(BackendError::Local(e)).context(NotFoundSnafu { path: path_str });
                }
                Err(e) => {
                    return Err(BackendError::Local(e)).context(OtherIoSnafu { path: path_str });
                }
            };

            let mut names = Vec::new();
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(BackendError::Local)
                .context(OtherIoSnafu {
                    path: path_str.clone(),
                })?
            {
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(BackendError::Local)
                    .context(OtherIoSnafu {
                        path: entry.path().display().to_string(),
                    })?;
                if !file_type.is_file() {
                    continue;
                }
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }

            names.sort();
            Ok(names)
        }
    }
}
