//! Scoped release of a job's staged files and of its map entry.

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tokio::runtime::Handle;
use tracing::{debug, error};

use maskclip_models::{FailureKind, Job, JobId, JobOutcome, SessionId, StagedPaths};
use maskclip_storage::StagingArea;

use crate::error::{JobError, JobResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::session::JobMap;

/// Guard owning a job's staged paths.
///
/// Files are released by [`JobFiles::release`], or synchronously on drop if the
/// owning future was cancelled or unwound before reaching it.
#[derive(Debug)]
pub struct JobFiles {
    staging: StagingArea,
    paths: StagedPaths,
    armed: bool,
}

impl JobFiles {
    pub fn new(staging: StagingArea, paths: StagedPaths) -> Self {
        Self {
            staging,
            paths,
            armed: true,
        }
    }

    /// Release every staged file and disarm the guard.
    pub async fn release(mut self) {
        self.staging.release_all(&self.paths).await;
        self.armed = false;
    }
}

impl Drop for JobFiles {
    fn drop(&mut self) {
        if self.armed {
            debug!(input = %self.paths.input.display(), "Releasing staged files on drop");
            self.staging.release_all_blocking(&self.paths);
        }
    }
}

/// Guard over a job's entry in the active-job map.
///
/// If the task driving the job is dropped while the guard is armed, the entry is
/// removed as `Failed(Aborted)` and its files are released, so the session can
/// upload again.
pub(crate) struct ActiveJobGuard {
    jobs: JobMap,
    staging: StagingArea,
    session_id: SessionId,
    job_id: JobId,
    armed: bool,
}

impl ActiveJobGuard {
    pub(crate) fn new(jobs: JobMap, staging: StagingArea, job: &Job) -> Self {
        Self {
            jobs,
            staging,
            session_id: job.session_id.clone(),
            job_id: job.id.clone(),
            armed: true,
        }
    }

    /// The job reached a state someone else owns; leave the entry alone.
    pub(crate) fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for ActiveJobGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        if let Ok(mut jobs) = self.jobs.try_lock() {
            if let Some(job) = take_abandoned(&mut jobs, &self.session_id, &self.job_id) {
                self.staging.release_all_blocking(&job.files);
            }
            return;
        }

        // Map is busy; finish the removal on the runtime.
        let Ok(handle) = Handle::try_current() else {
            error!(
                session_id = %self.session_id,
                job_id = %self.job_id,
                "Abandoned job left in map, no runtime to clean it up"
            );
            return;
        };
        let jobs = self.jobs.clone();
        let staging = self.staging.clone();
        let session_id = self.session_id.clone();
        let job_id = self.job_id.clone();
        handle.spawn(async move {
            let abandoned = {
                let mut jobs = jobs.lock().await;
                take_abandoned(&mut jobs, &session_id, &job_id)
            };
            if let Some(job) = abandoned {
                staging.release_all(&job.files).await;
            }
        });
    }
}

/// Remove the session's entry if it still belongs to `job_id` and fail it as aborted.
fn take_abandoned(
    jobs: &mut HashMap<SessionId, Job>,
    session_id: &SessionId,
    job_id: &JobId,
) -> Option<Job> {
    if jobs.get(session_id).map(|j| &j.id) != Some(job_id) {
        return None;
    }
    let mut job = jobs.remove(session_id)?;
    metrics::set_active_jobs(jobs.len());

    let logger = JobLogger::new(&job, "abandon");
    if let Err(e) = job.finish(JobOutcome::Failed(FailureKind::Aborted)) {
        logger.log_warning(&e.to_string());
    }
    metrics::record_job_finished(&job);
    logger.log_warning("task dropped before the job finished");
    Some(job)
}

/// Run `body` and release `paths` afterwards, whatever the outcome.
///
/// A panic inside `body` becomes [`JobError::Aborted`].
pub async fn with_job_files<F, T>(
    staging: &StagingArea,
    paths: &StagedPaths,
    body: F,
) -> JobResult<T>
where
    F: Future<Output = JobResult<T>>,
{
    let guard = JobFiles::new(staging.clone(), paths.clone());
    let result = catch_abort(body).await;
    guard.release().await;
    result
}

/// Await `body`, mapping a panic to [`JobError::Aborted`].
pub(crate) async fn catch_abort<F, T>(body: F) -> JobResult<T>
where
    F: Future<Output = JobResult<T>>,
{
    match AssertUnwindSafe(body).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!(reason = %reason, "Pipeline body panicked");
            Err(JobError::Aborted)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maskclip_models::{JobId, SessionId};
    use tempfile::TempDir;

    async fn staged() -> (TempDir, StagingArea, StagedPaths) {
        let dir = TempDir::new().unwrap();
        let staging = StagingArea::new(dir.path());
        let paths = staging.allocate_job(&SessionId::new("9"), &JobId::new());
        for path in paths.iter() {
            tokio::fs::write(path, b"x").await.unwrap();
        }
        (dir, staging, paths)
    }

    fn all_gone(paths: &StagedPaths) -> bool {
        paths.iter().all(|p| !p.exists())
    }

    #[tokio::test]
    async fn test_release_on_success() {
        let (_dir, staging, paths) = staged().await;
        let value = with_job_files(&staging, &paths, async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
        assert!(all_gone(&paths));
    }

    #[tokio::test]
    async fn test_release_on_error() {
        let (_dir, staging, paths) = staged().await;
        let result: JobResult<()> =
            with_job_files(&staging, &paths, async { Err(JobError::Aborted) }).await;
        assert!(matches!(result, Err(JobError::Aborted)));
        assert!(all_gone(&paths));
    }

    #[tokio::test]
    async fn test_panic_becomes_aborted() {
        let (_dir, staging, paths) = staged().await;
        let result: JobResult<()> = with_job_files(&staging, &paths, async {
            panic!("engine exploded");
        })
        .await;
        assert!(matches!(result, Err(JobError::Aborted)));
        assert!(all_gone(&paths));
    }

    #[tokio::test]
    async fn test_release_on_cancellation() {
        let (_dir, staging, paths) = staged().await;
        let pending = with_job_files(&staging, &paths, async {
            std::future::pending::<JobResult<()>>().await
        });
        let timed_out =
            tokio::time::timeout(std::time::Duration::from_millis(10), pending).await;
        assert!(timed_out.is_err());
        assert!(all_gone(&paths));
    }

    #[tokio::test]
    async fn test_missing_files_are_fine() {
        let dir = TempDir::new().unwrap();
        let staging = StagingArea::new(dir.path());
        let paths = staging.allocate_job(&SessionId::new("9"), &JobId::new());
        let result = with_job_files(&staging, &paths, async { Ok(()) }).await;
        assert!(result.is_ok());
    }
}
