//! Upload representation routing by file extension.

use std::fmt;
use std::path::Path;

static VIDEO_EXTENSIONS: &[&str] = &["mkv", "mp4", "webm", "m4v"];
static AUDIO_EXTENSIONS: &[&str] = &["mp3", "flac", "wav", "m4a"];
static IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp"];

/// How an uploaded file is represented on the chat platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UploadKind {
    /// Native video message
    Video,
    /// Native audio message
    Audio,
    /// Photo
    Image,
    /// Generic document (fallback)
    Document,
}

impl UploadKind {
    /// Pick the representation for a file from its extension alone.
    ///
    /// Unknown or missing extensions route to [`UploadKind::Document`].
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase);

        match extension.as_deref() {
            Some(ext) if VIDEO_EXTENSIONS.contains(&ext) => Self::Video,
            Some(ext) if AUDIO_EXTENSIONS.contains(&ext) => Self::Audio,
            Some(ext) if IMAGE_EXTENSIONS.contains(&ext) => Self::Image,
            _ => Self::Document,
        }
    }

    /// Lowercase name used in logs and reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Image => "image",
            Self::Document => "document",
        }
    }
}

impl fmt::Display for UploadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
