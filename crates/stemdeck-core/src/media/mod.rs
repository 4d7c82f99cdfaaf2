//! Media element abstraction
//!
//! The engine never touches audio hardware directly. It drives
//! [`MediaElement`]s created by a [`MediaBackend`]:
//!
//! - Control calls (`play`, `pause`, `set_current_time`, gain, rate) are
//!   synchronous and take effect immediately
//! - Readiness, time progress, completion and failures arrive later as
//!   [`MediaEvent`]s on the channel the backend was built with
//!
//! Every element is created under an [`ElementKey`]. Keys are never reused,
//! so events from an element that has since been replaced can be recognised
//! and dropped.

mod error;
mod headless;
pub mod probe;

#[cfg(test)]
pub(crate) mod fake;

pub use error::{MediaError, MediaResult};
pub use headless::{HeadlessBackend, HeadlessElement};

use futures_util::future::BoxFuture;

use crate::types::{AudioSource, TrackId};

/// Identity of a media element
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ElementKey {
    /// The transport's resource for a given load sequence number
    Transport { load: u64 },
    /// A stem element; `instance` is unique per created element
    Track { id: TrackId, instance: u64 },
}

/// Asynchronous notification from a media element
#[derive(Debug, Clone, PartialEq)]
pub struct MediaEvent {
    pub key: ElementKey,
    pub kind: MediaEventKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MediaEventKind {
    /// Metadata available; duration in seconds
    Ready { duration: f64 },
    /// Playback position advanced
    TimeUpdate { time: f64 },
    /// Playback reached the end
    Finished,
    /// Source could not be loaded or decoded
    Error { message: String },
}

/// A playable audio resource
///
/// Implementations must tolerate any call order: control calls before the
/// element is ready are accepted and applied once metadata is available.
pub trait MediaElement: Send {
    /// Start or resume playback
    fn play(&mut self) -> MediaResult<()>;

    fn pause(&mut self);

    /// Current position in seconds (element timeline)
    fn current_time(&self) -> f64;

    /// Jump to a position in seconds
    fn set_current_time(&mut self, seconds: f64);

    /// Output gain in [0, 1]
    fn set_volume(&mut self, volume: f32);

    fn set_muted(&mut self, muted: bool);

    /// Native rate change (tempo without pitch processing)
    fn set_playback_rate(&mut self, rate: f64);

    /// Stop producing events and free the underlying resource
    fn release(&mut self);
}

/// Factory for media elements
pub trait MediaBackend: Send {
    fn create(&mut self, key: ElementKey, source: &AudioSource) -> Box<dyn MediaElement>;
}

/// Resolves remote sources to raw bytes
pub trait SourceFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> BoxFuture<'static, MediaResult<Vec<u8>>>;
}
