//! FFmpeg CLI wrapper for the maskclip transcode stages.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with multiple inputs
//! - Filter graphs for the preprocess and composite stages
//! - The [`TranscodeEngine`] seam and its process-backed implementation

pub mod command;
pub mod engine;
pub mod error;
pub mod filters;

pub use command::{check_ffmpeg, FfmpegCommand, FfmpegRunner};
pub use engine::{FfmpegEngine, TranscodeEngine};
pub use error::{MediaError, MediaResult};
pub use filters::{composite_filter, preprocess_filter, AUDIO_OUT_LABEL, VIDEO_OUT_LABEL};
