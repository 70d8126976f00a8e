//! User-facing texts. None of them carry internal diagnostics.

use crate::config::MIB;

pub const VIDEO_RECEIVED: &str = "Video received!";
pub const CHOOSE_VOLUME: &str = "Choose the volume of your video's sound:";
pub const PROCESSING: &str = "Processing video!";
pub const PROCESSING_FAILED: &str = "Processing failed.";
pub const JOB_IN_PROGRESS: &str = "Please wait until your current video is finished.";
pub const NOTHING_PENDING: &str = "There is no video waiting for a volume choice. Send a video first.";
pub const UNKNOWN_OPTION: &str = "Unknown option. Please use one of the buttons.";
pub const EXPIRED: &str = "Your video expired. Please send it again.";

/// Reply to anything that is not an acceptable video.
pub fn only_videos(limit_bytes: u64) -> String {
    format!("Only videos are accepted, up to {}.", format_mib(limit_bytes))
}

/// Reply to the start command.
pub fn greeting(limit_bytes: u64) -> String {
    format!(
        "Hi! Send me a video up to {} and pick how loud its own sound should be.",
        format_mib(limit_bytes)
    )
}

fn format_mib(bytes: u64) -> String {
    if bytes % MIB == 0 {
        format!("{} MiB", bytes / MIB)
    } else {
        format!("{:.1} MiB", bytes as f64 / MIB as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_videos_text() {
        assert_eq!(only_videos(20 * MIB), "Only videos are accepted, up to 20 MiB.");
        assert_eq!(only_videos(MIB + MIB / 2), "Only videos are accepted, up to 1.5 MiB.");
    }
}
