//! Shared data models for the maskclip pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Sessions and jobs, with their lifecycle state machine
//! - Volume options offered to the requester
//! - Inbound media descriptors
//! - Encoding configuration

pub mod encoding;
pub mod job;
pub mod media;
pub mod option;
pub mod session;

// Re-export common types
pub use encoding::EncodingConfig;
pub use job::{
    FailureKind, Job, JobId, JobOutcome, JobState, JobStateError, StagedFile, StagedPaths,
    TranscodeStage,
};
pub use media::{MediaDescriptor, MediaKind};
pub use option::{UnknownOptionToken, VolumeOption};
pub use session::SessionId;
