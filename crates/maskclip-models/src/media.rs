//! Inbound media metadata.

use serde::{Deserialize, Serialize};

/// Kind of payload carried by an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Video,
    /// Silent looping clip (GIF-style upload); carries no audio track to mix.
    Animation,
    /// Round video message.
    VideoNote,
    /// File sent as a document; video-like only with a `video/*` MIME type.
    Document,
    Photo,
    Audio,
    Text,
    Other,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Animation => "animation",
            MediaKind::VideoNote => "video_note",
            MediaKind::Document => "document",
            MediaKind::Photo => "photo",
            MediaKind::Audio => "audio",
            MediaKind::Text => "text",
            MediaKind::Other => "other",
        }
    }
}

/// Metadata describing an upload, available before the body is transferred.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaDescriptor {
    pub kind: MediaKind,
    /// Declared size of the payload in bytes
    pub size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

impl MediaDescriptor {
    pub fn new(kind: MediaKind, size_bytes: u64) -> Self {
        Self {
            kind,
            size_bytes,
            mime_type: None,
            file_name: None,
        }
    }

    /// Shorthand for a plain video upload.
    pub fn video(size_bytes: u64) -> Self {
        Self::new(MediaKind::Video, size_bytes)
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    /// Whether the payload is something the pipeline can transcode.
    pub fn is_video_like(&self) -> bool {
        match self.kind {
            MediaKind::Video | MediaKind::VideoNote => true,
            MediaKind::Document => self
                .mime_type
                .as_deref()
                .map(|mime| mime.to_ascii_lowercase().starts_with("video/"))
                .unwrap_or(false),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_kinds_are_video_like() {
        assert!(MediaDescriptor::video(10).is_video_like());
        assert!(MediaDescriptor::new(MediaKind::VideoNote, 10).is_video_like());
    }

    #[test]
    fn test_documents_need_video_mime() {
        let doc = MediaDescriptor::new(MediaKind::Document, 10);
        assert!(!doc.is_video_like());
        assert!(doc.clone().with_mime_type("video/mp4").is_video_like());
        assert!(doc.clone().with_mime_type("VIDEO/QuickTime").is_video_like());
        assert!(!doc.with_mime_type("application/pdf").is_video_like());
    }

    #[test]
    fn test_other_kinds_rejected() {
        for kind in [
            MediaKind::Animation,
            MediaKind::Photo,
            MediaKind::Audio,
            MediaKind::Text,
            MediaKind::Other,
        ] {
            assert!(!MediaDescriptor::new(kind, 1).is_video_like());
        }
    }
}
