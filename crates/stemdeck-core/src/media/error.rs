//! Media error types

use thiserror::Error;

/// Errors raised by media elements and source resolution
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MediaError {
    /// Source file could not be read
    #[error("Failed to read {path}: {reason}")]
    Read { path: String, reason: String },

    /// Remote source could not be fetched
    #[error("Failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// No fetcher configured for remote sources
    #[error("No fetcher available for remote source {0}")]
    NoFetcher(String),

    /// Container or codec not understood
    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    /// Element was released and can no longer be used
    #[error("Media element has been released")]
    Released,

    /// Play request rejected by the element
    #[error("Playback failed: {0}")]
    Playback(String),
}

/// Result type for media operations
pub type MediaResult<T> = Result<T, MediaError>;
