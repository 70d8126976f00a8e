//! Pipeline configuration.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use maskclip_models::EncodingConfig;

/// One mebibyte.
pub const MIB: u64 = 1024 * 1024;

/// Shortest volume-choice window accepted from the environment.
const MIN_OPTION_TIMEOUT_SECS: u64 = 60;

/// Pipeline configuration, passed to each component at construction.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Largest accepted upload, inclusive
    pub max_upload_bytes: u64,
    /// Overlay clip composited onto every video
    pub mask_path: PathBuf,
    /// Directory for staged job files
    pub staging_dir: PathBuf,
    /// Frame width after preprocessing
    pub target_width: u32,
    /// Frame height after preprocessing
    pub target_height: u32,
    /// Output duration ceiling in seconds
    pub clip_seconds: u32,
    /// How long a staged video waits for a volume choice
    pub option_timeout: Duration,
    /// How often pending jobs are checked for expiry
    pub sweep_interval: Duration,
    /// Upper bound on a single engine invocation
    pub stage_timeout: Duration,
    /// Codec settings for both stages
    pub encoding: EncodingConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: 20 * MIB,
            mask_path: PathBuf::from("assets/mask.mp4"),
            staging_dir: PathBuf::from("/tmp/maskclip"),
            target_width: 720,
            target_height: 1280,
            clip_seconds: 10,
            option_timeout: Duration::from_secs(600), // 10 minutes
            sweep_interval: Duration::from_secs(60),
            stage_timeout: Duration::from_secs(300),
            encoding: EncodingConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let mut encoding = defaults.encoding.clone();
        if let Ok(codec) = std::env::var("MASKCLIP_VIDEO_CODEC") {
            encoding = encoding.with_codec(codec);
        }
        if let Ok(preset) = std::env::var("MASKCLIP_PRESET") {
            encoding = encoding.with_preset(preset);
        }
        let crf = env_or("MASKCLIP_CRF", encoding.crf);
        encoding = encoding.with_crf(crf);

        Self {
            max_upload_bytes: env_or("MASKCLIP_MAX_UPLOAD_BYTES", defaults.max_upload_bytes),
            mask_path: std::env::var("MASKCLIP_MASK_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.mask_path),
            staging_dir: std::env::var("MASKCLIP_STAGING_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.staging_dir),
            target_width: env_or("MASKCLIP_TARGET_WIDTH", defaults.target_width).max(2),
            target_height: env_or("MASKCLIP_TARGET_HEIGHT", defaults.target_height).max(2),
            clip_seconds: env_or("MASKCLIP_CLIP_SECONDS", defaults.clip_seconds).max(1),
            option_timeout: Duration::from_secs(
                env_or("MASKCLIP_OPTION_TIMEOUT_SECS", defaults.option_timeout.as_secs())
                    .max(MIN_OPTION_TIMEOUT_SECS),
            ),
            sweep_interval: Duration::from_secs(
                env_or("MASKCLIP_SWEEP_INTERVAL_SECS", defaults.sweep_interval.as_secs()).max(1),
            ),
            stage_timeout: Duration::from_secs(
                env_or("MASKCLIP_STAGE_TIMEOUT_SECS", defaults.stage_timeout.as_secs()).max(1),
            ),
            encoding,
        }
    }

    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = dir.into();
        self
    }

    pub fn with_mask_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.mask_path = path.into();
        self
    }

    pub fn with_option_timeout(mut self, timeout: Duration) -> Self {
        self.option_timeout = timeout;
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}
