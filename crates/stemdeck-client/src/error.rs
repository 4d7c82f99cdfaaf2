//! Analysis service client errors

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    /// Transport-level failure (connect, timeout, body read)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status from the service
    #[error("Service returned {status}: {message}")]
    Status { status: u16, message: String },

    /// Local audio file could not be read for upload
    #[error("Failed to read {path:?}: {source}")]
    ReadAudio {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The job reported a terminal failure (step == -1)
    #[error("Job failed: {0}")]
    JobFailed(String),

    /// Progress polling gave up
    #[error("Gave up after {attempts} consecutive polling failures: {last}")]
    TooManyFailures { attempts: u32, last: String },
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;
