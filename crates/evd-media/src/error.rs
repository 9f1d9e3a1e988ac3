//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while probing or decoding media.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    /// Input cannot be decoded. Fatal for the owning job.
    #[error("media unreadable: {message}")]
    MediaUnreadable {
        message: String,
        stderr: Option<String>,
    },

    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("invalid media file: {0}")]
    InvalidMedia(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl MediaError {
    /// Create a media unreadable error.
    pub fn unreadable(message: impl Into<String>) -> Self {
        Self::MediaUnreadable {
            message: message.into(),
            stderr: None,
        }
    }

    /// Create a media unreadable error carrying decoder stderr.
    pub fn unreadable_with_stderr(message: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::MediaUnreadable {
            message: message.into(),
            stderr: Some(stderr.into()),
        }
    }

    /// Whether this error means the input itself is undecodable.
    pub fn is_unreadable(&self) -> bool {
        matches!(
            self,
            MediaError::MediaUnreadable { .. }
                | MediaError::FileNotFound(_)
                | MediaError::InvalidMedia(_)
        )
    }
}
