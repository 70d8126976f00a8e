//! Two-stage transcode: preprocess, then composite with the mask.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use maskclip_media::{
    composite_filter, preprocess_filter, FfmpegCommand, MediaError, TranscodeEngine,
    AUDIO_OUT_LABEL, VIDEO_OUT_LABEL,
};
use maskclip_models::{EncodingConfig, Job, TranscodeStage, VolumeOption};

use crate::config::PipelineConfig;
use crate::error::TranscodeError;
use crate::metrics;

/// Drives the engine through both stages for one job.
pub struct TranscodeOrchestrator {
    engine: Arc<dyn TranscodeEngine>,
    mask_path: PathBuf,
    width: u32,
    height: u32,
    clip_seconds: u32,
    encoding: EncodingConfig,
}

impl TranscodeOrchestrator {
    pub fn new(engine: Arc<dyn TranscodeEngine>, config: &PipelineConfig) -> Self {
        Self {
            engine,
            mask_path: config.mask_path.clone(),
            width: config.target_width,
            height: config.target_height,
            clip_seconds: config.clip_seconds,
            encoding: config.encoding.clone(),
        }
    }

    pub fn mask_path(&self) -> &Path {
        &self.mask_path
    }

    /// Stage 1: scale to the target width and center-crop to the target frame.
    pub fn preprocess_command(&self, job: &Job) -> FfmpegCommand {
        FfmpegCommand::new(&job.files.input, &job.files.preprocessed)
            .video_filter(preprocess_filter(self.width, self.height))
            .encoding(&self.encoding)
    }

    /// Stage 2: overlay the mask and mix its audio with the attenuated original.
    pub fn composite_command(&self, job: &Job, option: VolumeOption) -> FfmpegCommand {
        FfmpegCommand::new(&job.files.preprocessed, &job.files.output)
            .add_input(&self.mask_path)
            .filter_complex(composite_filter(option.gain()))
            .map(VIDEO_OUT_LABEL)
            .map(AUDIO_OUT_LABEL)
            .max_duration(self.clip_seconds)
            .encoding(&self.encoding)
    }

    /// Run both stages for `job` at the chosen volume and return the path of the
    /// finished video. Stage 2 never starts if stage 1 fails.
    pub async fn run(&self, job: &Job, option: VolumeOption) -> Result<PathBuf, TranscodeError> {
        let preprocess = self.preprocess_command(job);
        self.run_stage(TranscodeStage::Preprocess, &preprocess).await?;

        if !exists(&self.mask_path).await {
            metrics::record_stage(TranscodeStage::Composite, false, Default::default());
            return Err(TranscodeError::new(
                TranscodeStage::Composite,
                MediaError::FileNotFound(self.mask_path.clone()),
            ));
        }

        let composite = self.composite_command(job, option);
        self.run_stage(TranscodeStage::Composite, &composite).await?;

        info!(
            session_id = %job.session_id,
            job_id = %job.id,
            gain = option.gain(),
            "Transcode finished"
        );
        Ok(job.files.output.clone())
    }

    async fn run_stage(
        &self,
        stage: TranscodeStage,
        cmd: &FfmpegCommand,
    ) -> Result<(), TranscodeError> {
        debug!(stage = %stage, args = ?cmd.build_args(), "Running engine");
        let started = Instant::now();

        let mut result = self.engine.execute(cmd).await;
        if result.is_ok() && !exists(cmd.output()).await {
            result = Err(MediaError::OutputMissing(cmd.output().to_path_buf()));
        }

        let elapsed = started.elapsed();
        metrics::record_stage(stage, result.is_ok(), elapsed);

        match result {
            Ok(()) => {
                debug!(stage = %stage, elapsed_ms = elapsed.as_millis() as u64, "Stage complete");
                Ok(())
            }
            Err(e) => {
                match &e {
                    MediaError::FfmpegFailed {
                        stderr: Some(stderr),
                        ..
                    } => warn!(
                        stage = %stage,
                        exit_code = ?e.exit_code(),
                        stderr = %stderr,
                        "Stage failed"
                    ),
                    other => warn!(stage = %stage, error = %other, "Stage failed"),
                }
                Err(TranscodeError::new(stage, e))
            }
        }
    }
}

async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}
