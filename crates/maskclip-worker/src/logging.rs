//! Structured job logging.
//!
//! Every lifecycle event carries the session, job and operation so a single
//! pipeline run can be followed across tasks.

use tracing::{error, info, warn, Span};

use maskclip_models::Job;

/// Logger bound to one job and the operation being performed on it.
#[derive(Debug, Clone)]
pub struct JobLogger {
    session_id: String,
    job_id: String,
    operation: String,
}

impl JobLogger {
    /// Create a logger for `job` performing `operation` (e.g. "upload", "transcode").
    pub fn new(job: &Job, operation: &str) -> Self {
        Self {
            session_id: job.session_id.to_string(),
            job_id: job.id.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            session_id = %self.session_id,
            job_id = %self.job_id,
            operation = %self.operation,
            "Job started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            session_id = %self.session_id,
            job_id = %self.job_id,
            operation = %self.operation,
            "Job progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            session_id = %self.session_id,
            job_id = %self.job_id,
            operation = %self.operation,
            "Job warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            session_id = %self.session_id,
            job_id = %self.job_id,
            operation = %self.operation,
            "Job error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            session_id = %self.session_id,
            job_id = %self.job_id,
            operation = %self.operation,
            "Job completed: {}", message
        );
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Span carrying the job's identity, for instrumenting futures.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "job",
            session_id = %self.session_id,
            job_id = %self.job_id,
            operation = %self.operation
        )
    }
}
