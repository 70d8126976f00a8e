//! Pipeline error types.

use thiserror::Error;

use maskclip_media::MediaError;
use maskclip_models::{
    FailureKind, JobState, MediaKind, SessionId, TranscodeStage, UnknownOptionToken,
};

use crate::messages;

pub type JobResult<T> = Result<T, JobError>;

pub type TransportResult<T> = Result<T, TransportError>;

/// Why an upload was refused before anything was staged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("Upload of {size} bytes exceeds the {limit} byte limit")]
    SizeLimitExceeded { size: u64, limit: u64 },

    #[error("Unsupported media kind: {}", .kind.as_str())]
    UnsupportedMediaKind { kind: MediaKind, limit: u64 },
}

impl Rejection {
    /// Upload ceiling in force when the rejection was issued.
    pub fn limit(&self) -> u64 {
        match self {
            Rejection::SizeLimitExceeded { limit, .. } => *limit,
            Rejection::UnsupportedMediaKind { limit, .. } => *limit,
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            Rejection::SizeLimitExceeded { .. } => "size_limit_exceeded",
            Rejection::UnsupportedMediaKind { .. } => "unsupported_media_kind",
        }
    }
}

/// A transcode stage did not produce its output.
#[derive(Debug, Error)]
#[error("{stage} stage failed: {source}")]
pub struct TranscodeError {
    pub stage: TranscodeStage,
    #[source]
    pub source: MediaError,
}

impl TranscodeError {
    pub fn new(stage: TranscodeStage, source: MediaError) -> Self {
        Self { stage, source }
    }
}

/// Failures of the chat transport collaborator.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    pub fn send_failed(msg: impl Into<String>) -> Self {
        Self::SendFailed(msg.into())
    }

    pub fn download_failed(msg: impl Into<String>) -> Self {
        Self::DownloadFailed(msg.into())
    }
}

/// Errors surfaced by the session/job manager.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Upload rejected: {0}")]
    Rejected(#[from] Rejection),

    #[error("Session {0} already has an active job")]
    Conflict(SessionId),

    #[error("Session {session_id} has no job awaiting an option (state: {state:?})")]
    InvalidState {
        session_id: SessionId,
        state: Option<JobState>,
    },

    #[error(transparent)]
    UnknownOption(#[from] UnknownOptionToken),

    #[error("Download failed: {0}")]
    DownloadFailure(#[source] TransportError),

    #[error(transparent)]
    Transcode(#[from] TranscodeError),

    #[error("Delivery failed: {0}")]
    DeliveryFailure(#[source] TransportError),

    #[error("Pipeline aborted")]
    Aborted,
}

impl JobError {
    pub fn invalid_state(session_id: &SessionId, state: Option<JobState>) -> Self {
        Self::InvalidState {
            session_id: session_id.clone(),
            state,
        }
    }

    /// Failure recorded on the job when this error ends it.
    ///
    /// `None` for errors that leave any existing job untouched.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            JobError::DownloadFailure(_) => Some(FailureKind::Download),
            JobError::Transcode(e) => Some(FailureKind::Transcode(e.stage)),
            JobError::DeliveryFailure(_) => Some(FailureKind::Delivery),
            JobError::Aborted => Some(FailureKind::Aborted),
            JobError::Rejected(_)
            | JobError::Conflict(_)
            | JobError::InvalidState { .. }
            | JobError::UnknownOption(_) => None,
        }
    }

    /// Whether the requester caused this error (as opposed to a pipeline failure).
    pub fn is_user_error(&self) -> bool {
        self.failure_kind().is_none()
    }

    /// Text shown to the requester.
    pub fn user_message(&self) -> String {
        match self {
            JobError::Rejected(rejection) => messages::only_videos(rejection.limit()),
            JobError::Conflict(_) => messages::JOB_IN_PROGRESS.to_string(),
            JobError::InvalidState { .. } => messages::NOTHING_PENDING.to_string(),
            JobError::UnknownOption(_) => messages::UNKNOWN_OPTION.to_string(),
            JobError::DownloadFailure(_)
            | JobError::Transcode(_)
            | JobError::DeliveryFailure(_)
            | JobError::Aborted => messages::PROCESSING_FAILED.to_string(),
        }
    }
}
