//! Job lifecycle record for one upload-to-delivery run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

use crate::{SessionId, VolumeOption};

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Job lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Upload event accepted into the active map
    #[default]
    Received,
    /// Upload metadata passed validation
    Validated,
    /// Input staged, waiting for the requester to pick a volume
    AwaitingOption,
    /// Transcode and delivery in flight
    Processing,
    Delivered,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Received => "received",
            JobState::Validated => "validated",
            JobState::AwaitingOption => "awaiting_option",
            JobState::Processing => "processing",
            JobState::Delivered => "delivered",
            JobState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Delivered | JobState::Failed)
    }

    /// Whether `next` directly follows `self`.
    ///
    /// Any non-terminal state may fail; everything else moves one step forward.
    pub fn can_transition_to(&self, next: JobState) -> bool {
        match (self, next) {
            (JobState::Received, JobState::Validated)
            | (JobState::Validated, JobState::AwaitingOption)
            | (JobState::AwaitingOption, JobState::Processing)
            | (JobState::Processing, JobState::Delivered) => true,
            (current, JobState::Failed) => !current.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One invocation of the transcoding engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscodeStage {
    /// Scale + center crop
    Preprocess,
    /// Mask overlay + audio mix + duration clip
    Composite,
}

impl TranscodeStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            TranscodeStage::Preprocess => "preprocess",
            TranscodeStage::Composite => "composite",
        }
    }
}

impl fmt::Display for TranscodeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a job ended in [`JobState::Failed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "stage")]
pub enum FailureKind {
    Download,
    Transcode(TranscodeStage),
    Delivery,
    /// No option was selected before the pending timeout
    Expired,
    /// The pipeline body panicked
    Aborted,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Download => "download",
            FailureKind::Transcode(TranscodeStage::Preprocess) => "transcode_preprocess",
            FailureKind::Transcode(TranscodeStage::Composite) => "transcode_composite",
            FailureKind::Delivery => "delivery",
            FailureKind::Expired => "expired",
            FailureKind::Aborted => "aborted",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Terminal outcome handed to job completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobOutcome {
    Delivered,
    Failed(FailureKind),
}

impl JobOutcome {
    pub fn state(&self) -> JobState {
        match self {
            JobOutcome::Delivered => JobState::Delivered,
            JobOutcome::Failed(_) => JobState::Failed,
        }
    }
}

/// Staged artifact slot within a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StagedFile {
    Input,
    Preprocessed,
    Output,
}

impl StagedFile {
    pub const ALL: [StagedFile; 3] = [
        StagedFile::Input,
        StagedFile::Preprocessed,
        StagedFile::Output,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StagedFile::Input => "input",
            StagedFile::Preprocessed => "preprocessed",
            StagedFile::Output => "output",
        }
    }
}

/// Staged file locations for one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedPaths {
    pub input: PathBuf,
    pub preprocessed: PathBuf,
    pub output: PathBuf,
}

impl StagedPaths {
    pub fn get(&self, file: StagedFile) -> &Path {
        match file {
            StagedFile::Input => &self.input,
            StagedFile::Preprocessed => &self.preprocessed,
            StagedFile::Output => &self.output,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        StagedFile::ALL.into_iter().map(move |file| self.get(file))
    }
}

/// Rejected state change.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobStateError {
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: JobState, to: JobState },

    #[error("Option already selected")]
    OptionAlreadySelected,
}

/// Lifecycle record for one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,

    pub session_id: SessionId,

    pub state: JobState,

    /// Set when `state` is `Failed`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,

    pub files: StagedPaths,

    /// Declared upload size
    pub size_bytes: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_option: Option<VolumeOption>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Create a job in the `Received` state.
    pub fn new(id: JobId, session_id: SessionId, files: StagedPaths, size_bytes: u64) -> Self {
        let now = Utc::now();
        Self {
            id,
            session_id,
            state: JobState::Received,
            failure: None,
            files,
            size_bytes,
            selected_option: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    fn transition(&mut self, next: JobState) -> Result<(), JobStateError> {
        if !self.state.can_transition_to(next) {
            return Err(JobStateError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn mark_validated(&mut self) -> Result<(), JobStateError> {
        self.transition(JobState::Validated)
    }

    pub fn mark_awaiting_option(&mut self) -> Result<(), JobStateError> {
        self.transition(JobState::AwaitingOption)
    }

    /// Record the selected option and move to `Processing`.
    pub fn select_option(&mut self, option: VolumeOption) -> Result<(), JobStateError> {
        if self.selected_option.is_some() {
            return Err(JobStateError::OptionAlreadySelected);
        }
        self.transition(JobState::Processing)?;
        self.selected_option = Some(option);
        Ok(())
    }

    /// Move to the terminal state described by `outcome`.
    pub fn finish(&mut self, outcome: JobOutcome) -> Result<(), JobStateError> {
        self.transition(outcome.state())?;
        if let JobOutcome::Failed(kind) = outcome {
            self.failure = Some(kind);
        }
        Ok(())
    }

    /// Whether the job has been idle in `AwaitingOption` since before `cutoff`.
    pub fn is_pending_since(&self, cutoff: DateTime<Utc>) -> bool {
        self.state == JobState::AwaitingOption && self.updated_at <= cutoff
    }
}
