//! Staging area for per-job artifacts.

use chrono::Utc;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

use maskclip_models::{JobId, SessionId, StagedFile, StagedPaths};

use crate::error::{StorageError, StorageResult};

/// Extension of every staged artifact.
const STAGED_EXTENSION: &str = "mp4";

/// Directory holding staged files for in-flight jobs.
///
/// Names are derived from `(session, job, creation millis, slot)`, so two jobs
/// never share a path even for the same session.
#[derive(Debug, Clone)]
pub struct StagingArea {
    root: PathBuf,
}

impl StagingArea {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the staging root if needed.
    pub async fn ensure_root(&self) -> StorageResult<()> {
        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| StorageError::root_unavailable(&self.root, e))
    }

    /// Path for a single staged slot of a job.
    pub fn allocate(&self, session_id: &SessionId, job_id: &JobId, file: StagedFile) -> PathBuf {
        self.path_for(session_id, job_id, Utc::now().timestamp_millis(), file)
    }

    /// Paths for every slot of a job, sharing one creation timestamp.
    pub fn allocate_job(&self, session_id: &SessionId, job_id: &JobId) -> StagedPaths {
        let millis = Utc::now().timestamp_millis();
        StagedPaths {
            input: self.path_for(session_id, job_id, millis, StagedFile::Input),
            preprocessed: self.path_for(session_id, job_id, millis, StagedFile::Preprocessed),
            output: self.path_for(session_id, job_id, millis, StagedFile::Output),
        }
    }

    fn path_for(
        &self,
        session_id: &SessionId,
        job_id: &JobId,
        millis: i64,
        file: StagedFile,
    ) -> PathBuf {
        self.root.join(format!(
            "{}-{}-{}-{}.{}",
            session_id.file_stem(),
            job_id,
            millis,
            file.as_str(),
            STAGED_EXTENSION
        ))
    }

    /// Remove a staged file. Missing files are a no-op; other failures are logged and dropped.
    pub async fn release(&self, path: &Path) {
        match fs::remove_file(path).await {
            Ok(()) => debug!(path = %path.display(), "Released staged file"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to release staged file"),
        }
    }

    /// Remove every staged file of a job.
    pub async fn release_all(&self, paths: &StagedPaths) {
        for path in paths.iter() {
            self.release(path).await;
        }
    }

    /// Blocking variant of [`release_all`](Self::release_all), usable from `Drop`.
    pub fn release_all_blocking(&self, paths: &StagedPaths) {
        for path in paths.iter() {
            match std::fs::remove_file(path) {
                Ok(()) => debug!(path = %path.display(), "Released staged file"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to release staged file"),
            }
        }
    }

    /// Remove staged files left behind by a previous process.
    ///
    /// Jobs live only in memory, so at startup every staged file is orphaned.
    /// Returns the number of files removed.
    pub async fn sweep_orphans(&self) -> StorageResult<usize> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(StorageError::root_unavailable(&self.root, e)),
        };

        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !entry.file_type().await?.is_file() || !is_staged_name(&path) {
                continue;
            }
            match fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove orphaned file"),
            }
        }

        if removed > 0 {
            info!(root = %self.root.display(), removed, "Removed orphaned staged files");
        }
        Ok(removed)
    }
}

fn is_staged_name(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    StagedFile::ALL
        .iter()
        .any(|file| name.ends_with(&format!("-{}.{}", file.as_str(), STAGED_EXTENSION)))
}
