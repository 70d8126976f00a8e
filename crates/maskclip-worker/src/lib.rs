//! Per-session job pipeline.
//!
//! This crate provides:
//! - Upload validation ahead of any transfer
//! - The session/job manager enforcing one active job per session
//! - The two-stage transcode orchestrator
//! - Scoped cleanup of staged files on every exit path
//! - Transport-agnostic event dispatch and pending-job expiry

pub mod cleanup;
pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod messages;
pub mod metrics;
pub mod orchestrator;
pub mod session;
pub mod sweeper;
pub mod transport;
pub mod validator;

pub use cleanup::{with_job_files, JobFiles};
pub use config::PipelineConfig;
pub use error::{JobError, JobResult, Rejection, TranscodeError, TransportError, TransportResult};
pub use events::{EventDispatcher, InboundEvent, OptionSelectedEvent, UploadEvent};
pub use logging::JobLogger;
pub use orchestrator::TranscodeOrchestrator;
pub use session::SessionManager;
pub use sweeper::spawn_expiry_sweeper;
pub use transport::{MediaSource, Transport};
pub use validator::{Accepted, UploadValidator};
