//! Storage error types.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur while preparing the staging area.
///
/// Releasing staged files never fails; see [`crate::StagingArea::release`].
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Staging root unusable: {path}: {source}")]
    RootUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    pub fn root_unavailable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::RootUnavailable {
            path: path.into(),
            source,
        }
    }
}
