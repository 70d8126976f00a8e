//! Upload gate applied to descriptor metadata before any transfer.

use maskclip_models::MediaDescriptor;

use crate::config::PipelineConfig;
use crate::error::Rejection;

/// An upload that passed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accepted {
    pub size_bytes: u64,
}

/// Size and media-kind gate.
#[derive(Debug, Clone, Copy)]
pub struct UploadValidator {
    max_bytes: u64,
}

impl UploadValidator {
    pub fn new(max_bytes: u64) -> Self {
        Self { max_bytes }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.max_upload_bytes)
    }

    /// Accept video-like payloads up to and including the ceiling.
    pub fn validate(&self, descriptor: &MediaDescriptor) -> Result<Accepted, Rejection> {
        if !descriptor.is_video_like() {
            return Err(Rejection::UnsupportedMediaKind {
                kind: descriptor.kind,
                limit: self.max_bytes,
            });
        }

        if descriptor.size_bytes > self.max_bytes {
            return Err(Rejection::SizeLimitExceeded {
                size: descriptor.size_bytes,
                limit: self.max_bytes,
            });
        }

        Ok(Accepted {
            size_bytes: descriptor.size_bytes,
        })
    }
}

impl Default for UploadValidator {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}
