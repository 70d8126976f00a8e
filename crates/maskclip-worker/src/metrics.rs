//! Pipeline metrics.
//!
//! - Stage duration histogram and outcome counter
//! - Terminal job counter by state
//! - Active job gauge

use std::time::Duration;

use metrics::{counter, gauge, histogram};

use maskclip_models::{Job, TranscodeStage};

// =============================================================================
// Metric Names
// =============================================================================

pub mod names {
    /// Engine invocation latency in seconds by stage.
    pub const STAGE_DURATION_SECONDS: &str = "maskclip_stage_duration_seconds";

    /// Engine invocations by stage and status.
    pub const STAGE_TOTAL: &str = "maskclip_stage_total";

    /// Finished jobs by terminal state and failure kind.
    pub const JOBS_TOTAL: &str = "maskclip_jobs_total";

    /// Jobs currently held by the session manager.
    pub const ACTIVE_JOBS: &str = "maskclip_active_jobs";

    /// Uploads refused by the validator.
    pub const REJECTIONS_TOTAL: &str = "maskclip_rejections_total";
}

// =============================================================================
// Recording Functions
// =============================================================================

/// Record one engine invocation.
pub fn record_stage(stage: TranscodeStage, success: bool, elapsed: Duration) {
    let status = if success { "success" } else { "failure" };

    counter!(
        names::STAGE_TOTAL,
        "stage" => stage.as_str(),
        "status" => status
    )
    .increment(1);

    histogram!(
        names::STAGE_DURATION_SECONDS,
        "stage" => stage.as_str()
    )
    .record(elapsed.as_secs_f64());
}

/// Record a job reaching its terminal state.
pub fn record_job_finished(job: &Job) {
    let failure = job.failure.map(|kind| kind.as_str()).unwrap_or("none");

    counter!(
        names::JOBS_TOTAL,
        "state" => job.state.as_str(),
        "failure" => failure
    )
    .increment(1);
}

pub fn set_active_jobs(count: usize) {
    gauge!(names::ACTIVE_JOBS).set(count as f64);
}

pub fn record_rejection(reason: &'static str) {
    counter!(names::REJECTIONS_TOTAL, "reason" => reason).increment(1);
}

// =============================================================================
// Tests
// =============================================================================
