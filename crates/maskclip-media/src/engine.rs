//! Transcoding engine seam.

use async_trait::async_trait;
use tracing::info;

use crate::command::{check_ffmpeg, FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;

/// Opaque external transform: consumes the command's inputs, writes its output or fails.
#[async_trait]
pub trait TranscodeEngine: Send + Sync {
    async fn execute(&self, cmd: &FfmpegCommand) -> MediaResult<()>;
}

/// Engine backed by the `ffmpeg` process.
#[derive(Debug, Clone, Default)]
pub struct FfmpegEngine {
    runner: FfmpegRunner,
}

impl FfmpegEngine {
    pub fn new(runner: FfmpegRunner) -> Self {
        Self { runner }
    }

    /// Resolve `ffmpeg` from `PATH` and bound every invocation by `timeout_secs`.
    pub fn detect(timeout_secs: u64) -> MediaResult<Self> {
        let binary = check_ffmpeg()?;
        info!(ffmpeg = %binary.display(), timeout_secs, "Using FFmpeg engine");
        Ok(Self::new(
            FfmpegRunner::new()
                .with_binary(binary)
                .with_timeout(timeout_secs),
        ))
    }
}

#[async_trait]
impl TranscodeEngine for FfmpegEngine {
    async fn execute(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        self.runner.run(cmd).await
    }
}
