//! Outbound chat effects and inbound payload sources.

use std::path::Path;

use async_trait::async_trait;

use maskclip_models::{SessionId, VolumeOption};

use crate::error::TransportResult;

/// Messaging platform the pipeline talks back through.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a plain text message to the session.
    async fn send_text(&self, session_id: &SessionId, text: &str) -> TransportResult<()>;

    /// Offer the volume choices under `prompt`.
    async fn present_options(
        &self,
        session_id: &SessionId,
        prompt: &str,
        options: &[VolumeOption],
    ) -> TransportResult<()>;

    /// Send the finished video at `path`.
    async fn deliver(&self, session_id: &SessionId, path: &Path) -> TransportResult<()>;
}

/// Body of an inbound upload, fetched on demand.
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Write the payload to `dest`, creating or truncating it.
    async fn fetch_to(&self, dest: &Path) -> TransportResult<()>;
}
