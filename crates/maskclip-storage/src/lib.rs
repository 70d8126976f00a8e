//! Per-job file staging.
//!
//! This crate provides:
//! - Collision-free staged paths keyed by session, job and creation time
//! - Idempotent release of staged files
//! - Startup sweep of files orphaned by a previous process

pub mod error;
pub mod staging;

pub use error::{StorageError, StorageResult};
pub use staging::StagingArea;
