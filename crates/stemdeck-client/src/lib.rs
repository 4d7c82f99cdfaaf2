//! Stemdeck Client - HTTP client for the separation and chord analysis service
//!
//! - Stem separation jobs with progress polling
//! - Chord detection
//! - Analysis history (list, load, delete)
//! - Pitch/tempo rendering (implements the engine's [`EffectRenderer`] seam)
//! - Stem downloads (implements the engine's [`SourceFetcher`] seam)
//!
//! [`EffectRenderer`]: stemdeck_core::engine::EffectRenderer
//! [`SourceFetcher`]: stemdeck_core::media::SourceFetcher

mod client;
mod config;
mod error;
pub mod poll;
mod seams;
pub mod types;

pub use client::AnalysisClient;
pub use config::ServiceConfig;
pub use error::{ClientError, ClientResult};
pub use poll::{poll_until_done, PollPolicy};
pub use types::*;
