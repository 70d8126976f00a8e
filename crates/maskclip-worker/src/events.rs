//! Transport-agnostic inbound events and their dispatch.

use std::fmt;
use std::sync::Arc;

use tracing::{info, warn};

use maskclip_models::{Job, MediaDescriptor, SessionId};

use crate::error::JobResult;
use crate::messages;
use crate::session::SessionManager;
use crate::transport::MediaSource;

/// A video (or something claiming to be one) arrived.
pub struct UploadEvent {
    pub session_id: SessionId,
    pub descriptor: MediaDescriptor,
    pub payload: Box<dyn MediaSource>,
}

impl fmt::Debug for UploadEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadEvent")
            .field("session_id", &self.session_id)
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

/// The requester picked one of the offered volume options.
#[derive(Debug, Clone)]
pub struct OptionSelectedEvent {
    pub session_id: SessionId,
    pub token: String,
}

#[derive(Debug)]
pub enum InboundEvent {
    /// The requester opened the conversation.
    Start { session_id: SessionId },
    Upload(UploadEvent),
    OptionSelected(OptionSelectedEvent),
    /// Anything else; answered with the usage hint.
    Other { session_id: SessionId },
}

impl InboundEvent {
    pub fn session_id(&self) -> &SessionId {
        match self {
            InboundEvent::Start { session_id } | InboundEvent::Other { session_id } => session_id,
            InboundEvent::Upload(event) => &event.session_id,
            InboundEvent::OptionSelected(event) => &event.session_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            InboundEvent::Start { .. } => "start",
            InboundEvent::Upload(_) => "upload",
            InboundEvent::OptionSelected(_) => "option_selected",
            InboundEvent::Other { .. } => "other",
        }
    }
}

/// Routes inbound events to the session manager and answers errors with their user text.
#[derive(Clone)]
pub struct EventDispatcher {
    manager: Arc<SessionManager>,
}

impl EventDispatcher {
    pub fn new(manager: Arc<SessionManager>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &Arc<SessionManager> {
        &self.manager
    }

    /// Handle one event to completion.
    ///
    /// Returns the job the event advanced, if any. Errors have already been
    /// reported to the session when this returns.
    pub async fn dispatch(&self, event: InboundEvent) -> JobResult<Option<Job>> {
        let session_id = event.session_id().clone();
        let kind = event.kind();
        let limit = self.manager.config().max_upload_bytes;

        let result = match event {
            InboundEvent::Start { .. } => {
                self.reply(&session_id, &messages::greeting(limit)).await;
                Ok(None)
            }
            InboundEvent::Other { .. } => {
                self.reply(&session_id, &messages::only_videos(limit)).await;
                Ok(None)
            }
            InboundEvent::Upload(upload) => self
                .manager
                .begin_job(&upload.session_id, &upload.descriptor, upload.payload.as_ref())
                .await
                .map(Some),
            InboundEvent::OptionSelected(selected) => self
                .manager
                .select_option(&selected.session_id, &selected.token)
                .await
                .map(Some),
        };

        if let Err(e) = &result {
            if e.is_user_error() {
                info!(session_id = %session_id, event = kind, error = %e, "Event refused");
            } else {
                warn!(session_id = %session_id, event = kind, error = %e, "Pipeline failed");
            }
            self.reply(&session_id, &e.user_message()).await;
        }

        result
    }

    async fn reply(&self, session_id: &SessionId, text: &str) {
        if let Err(e) = self.manager.transport().send_text(session_id, text).await {
            warn!(session_id = %session_id, error = %e, "Failed to send reply");
        }
    }
}
