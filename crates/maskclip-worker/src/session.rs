//! Session/job manager.
//!
//! Owns the active-job map and drives each job through its lifecycle. The map
//! lock is held only to read or change job state, never across downloads,
//! engine runs or sends.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, warn, Instrument};

use maskclip_media::TranscodeEngine;
use maskclip_models::{
    FailureKind, Job, JobId, JobOutcome, JobState, JobStateError, MediaDescriptor, SessionId,
    VolumeOption,
};
use maskclip_storage::StagingArea;

use crate::cleanup::{catch_abort, with_job_files, ActiveJobGuard};
use crate::config::PipelineConfig;
use crate::error::{JobError, JobResult};
use crate::logging::JobLogger;
use crate::messages;
use crate::metrics;
use crate::orchestrator::TranscodeOrchestrator;
use crate::transport::{MediaSource, Transport};
use crate::validator::UploadValidator;

/// Active jobs keyed by the session that owns them.
pub(crate) type JobMap = Arc<Mutex<HashMap<SessionId, Job>>>;

/// At most one non-terminal job per session.
pub struct SessionManager {
    config: Arc<PipelineConfig>,
    validator: UploadValidator,
    staging: StagingArea,
    orchestrator: TranscodeOrchestrator,
    transport: Arc<dyn Transport>,
    jobs: JobMap,
}

impl SessionManager {
    pub fn new(
        config: PipelineConfig,
        engine: Arc<dyn TranscodeEngine>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            validator: UploadValidator::from_config(&config),
            staging: StagingArea::new(&config.staging_dir),
            orchestrator: TranscodeOrchestrator::new(engine, &config),
            config: Arc::new(config),
            transport,
            jobs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn staging(&self) -> &StagingArea {
        &self.staging
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Snapshot of the session's active job.
    pub async fn active_job(&self, session_id: &SessionId) -> Option<Job> {
        self.jobs.lock().await.get(session_id).cloned()
    }

    pub async fn active_count(&self) -> usize {
        self.jobs.lock().await.len()
    }

    /// Accept an upload, stage its payload and offer the volume choices.
    ///
    /// Returns the job in `AwaitingOption`. If the options cannot be shown the
    /// job fails as a delivery failure and the session is freed.
    pub async fn begin_job(
        &self,
        session_id: &SessionId,
        descriptor: &MediaDescriptor,
        source: &dyn MediaSource,
    ) -> JobResult<Job> {
        let job = {
            let mut jobs = self.jobs.lock().await;
            if jobs.contains_key(session_id) {
                return Err(JobError::Conflict(session_id.clone()));
            }

            let accepted = self.validator.validate(descriptor).map_err(|rejection| {
                metrics::record_rejection(rejection.reason());
                rejection
            })?;

            let job_id = JobId::new();
            let files = self.staging.allocate_job(session_id, &job_id);
            let mut job = Job::new(job_id, session_id.clone(), files, accepted.size_bytes);
            job.mark_validated().map_err(|e| transition_error(session_id, e))?;

            jobs.insert(session_id.clone(), job.clone());
            metrics::set_active_jobs(jobs.len());
            job
        };
        let guard = ActiveJobGuard::new(self.jobs.clone(), self.staging.clone(), &job);

        let logger = JobLogger::new(&job, "upload");
        logger.log_start(&format!("{} bytes accepted", job.size_bytes));
        self.notify(session_id, messages::VIDEO_RECEIVED).await;

        let fetched = catch_abort(async {
            source
                .fetch_to(&job.files.input)
                .await
                .map_err(JobError::DownloadFailure)
        })
        .instrument(logger.create_span())
        .await;

        if let Err(e) = fetched {
            logger.log_error(&e.to_string());
            let kind = e.failure_kind().unwrap_or(FailureKind::Download);
            self.complete_job(session_id, JobOutcome::Failed(kind)).await?;
            guard.disarm();
            return Err(e);
        }

        let pending = {
            let mut jobs = self.jobs.lock().await;
            match jobs.get_mut(session_id) {
                Some(active) if active.id == job.id => {
                    active
                        .mark_awaiting_option()
                        .map_err(|e| transition_error(session_id, e))?;
                    Some(active.clone())
                }
                _ => None,
            }
        };
        guard.disarm();
        let Some(job) = pending else {
            logger.log_warning("job vanished during download");
            self.staging.release_all(&job.files).await;
            return Err(JobError::invalid_state(session_id, None));
        };

        logger.log_progress("awaiting volume option");
        if let Err(e) = self
            .transport
            .present_options(session_id, messages::CHOOSE_VOLUME, &VolumeOption::ALL)
            .await
        {
            logger.log_error(&format!("failed to present options: {}", e));
            self.complete_job(session_id, JobOutcome::Failed(FailureKind::Delivery))
                .await?;
            return Err(JobError::DeliveryFailure(e));
        }

        Ok(job)
    }

    /// Apply the selected volume option, transcode and deliver.
    ///
    /// Awaits the whole pipeline and returns the terminal job on delivery.
    pub async fn select_option(&self, session_id: &SessionId, token: &str) -> JobResult<Job> {
        let (job, option) = {
            let mut jobs = self.jobs.lock().await;
            let job = jobs
                .get_mut(session_id)
                .ok_or_else(|| JobError::invalid_state(session_id, None))?;
            if job.state != JobState::AwaitingOption {
                return Err(JobError::invalid_state(session_id, Some(job.state)));
            }

            let option = VolumeOption::from_token(token)?;
            job.select_option(option).map_err(|e| transition_error(session_id, e))?;
            (job.clone(), option)
        };
        let guard = ActiveJobGuard::new(self.jobs.clone(), self.staging.clone(), &job);

        let logger = JobLogger::new(&job, "transcode");
        logger.log_start(&format!("volume {}", option));
        self.notify(session_id, messages::PROCESSING).await;

        let result = with_job_files(&self.staging, &job.files, async {
            let output = self.orchestrator.run(&job, option).await?;
            self.transport
                .deliver(session_id, &output)
                .await
                .map_err(JobError::DeliveryFailure)
        })
        .instrument(logger.create_span())
        .await;

        let outcome = match &result {
            Ok(()) => JobOutcome::Delivered,
            Err(e) => {
                logger.log_error(&e.to_string());
                JobOutcome::Failed(e.failure_kind().unwrap_or(FailureKind::Aborted))
            }
        };

        let finished = self.complete_job(session_id, outcome).await?;
        guard.disarm();
        result.map(|()| finished)
    }

    /// Release the job's files, record its terminal state and drop it from the map.
    pub async fn complete_job(
        &self,
        session_id: &SessionId,
        outcome: JobOutcome,
    ) -> JobResult<Job> {
        let (job_id, files) = {
            let jobs = self.jobs.lock().await;
            let job = jobs
                .get(session_id)
                .ok_or_else(|| JobError::invalid_state(session_id, None))?;
            if !job.state.can_transition_to(outcome.state()) {
                return Err(JobError::invalid_state(session_id, Some(job.state)));
            }
            (job.id.clone(), job.files.clone())
        };

        self.staging.release_all(&files).await;

        let mut job = {
            let mut jobs = self.jobs.lock().await;
            if jobs.get(session_id).map(|j| &j.id) != Some(&job_id) {
                return Err(JobError::invalid_state(session_id, None));
            }
            let job = jobs
                .remove(session_id)
                .ok_or_else(|| JobError::invalid_state(session_id, None))?;
            metrics::set_active_jobs(jobs.len());
            job
        };

        job.finish(outcome).map_err(|e| transition_error(session_id, e))?;

        metrics::record_job_finished(&job);
        JobLogger::new(&job, "complete").log_completion(job.state.as_str());
        Ok(job)
    }

    /// Fail every job that has waited for an option longer than the configured timeout.
    pub async fn expire_stale(&self) -> Vec<Job> {
        let Ok(timeout) = chrono::Duration::from_std(self.config.option_timeout) else {
            return Vec::new();
        };
        let Some(cutoff) = Utc::now().checked_sub_signed(timeout) else {
            return Vec::new();
        };

        let stale: Vec<Job> = {
            let mut jobs = self.jobs.lock().await;
            let sessions: Vec<SessionId> = jobs
                .iter()
                .filter(|(_, job)| job.is_pending_since(cutoff))
                .map(|(session_id, _)| session_id.clone())
                .collect();
            if sessions.is_empty() {
                return Vec::new();
            }
            let stale = sessions.iter().filter_map(|s| jobs.remove(s)).collect();
            metrics::set_active_jobs(jobs.len());
            stale
        };

        let mut expired = Vec::with_capacity(stale.len());
        for mut job in stale {
            self.staging.release_all(&job.files).await;

            let logger = JobLogger::new(&job, "expire");
            if let Err(e) = job.finish(JobOutcome::Failed(FailureKind::Expired)) {
                logger.log_warning(&e.to_string());
            }
            metrics::record_job_finished(&job);
            logger.log_completion("no volume option chosen in time");

            self.notify(&job.session_id, messages::EXPIRED).await;
            expired.push(job);
        }
        expired
    }

    async fn notify(&self, session_id: &SessionId, text: &str) {
        match self.transport.send_text(session_id, text).await {
            Ok(()) => debug!(session_id = %session_id, text, "Sent message"),
            Err(e) => warn!(session_id = %session_id, error = %e, "Failed to send message"),
        }
    }
}

fn transition_error(session_id: &SessionId, err: JobStateError) -> JobError {
    match err {
        JobStateError::InvalidTransition { from, .. } => {
            JobError::invalid_state(session_id, Some(from))
        }
        JobStateError::OptionAlreadySelected => {
            JobError::invalid_state(session_id, Some(JobState::Processing))
        }
    }
}
