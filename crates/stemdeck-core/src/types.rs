//! Common types for Stemdeck
//!
//! Tracks, sources, and the plain-data state shared between the transport,
//! the track mixer and the effects processor.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Maximum allowed drift between a stem and the master clock before a hard seek
pub const SYNC_EPSILON_SECS: f64 = 0.15;

/// Quiet period after the last pitch/tempo change before a render request is sent
pub const EFFECT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Pitch shift range in semitones
pub const PITCH_MIN_SEMITONES: i32 = -12;
pub const PITCH_MAX_SEMITONES: i32 = 12;

/// Playback rate range (1.0 = original tempo)
pub const RATE_MIN: f64 = 0.5;
pub const RATE_MAX: f64 = 2.0;

/// Progress polling gives up after this many consecutive failed requests
pub const MAX_POLL_FAILURES: u32 = 5;

/// Step value marking a failed operation in a [`ProgressNotice`]
pub const FAILURE_STEP: i32 = -1;

/// Stable identifier of a stem track (the stem name, e.g. "vocals")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(String);

impl TrackId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrackId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Where a media element gets its audio from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AudioSource {
    /// Local file (uploads and processed effect results)
    File(PathBuf),
    /// Remote resource served by the analysis service
    Url(String),
}

impl AudioSource {
    /// File extension used as a format hint when probing
    pub fn extension(&self) -> Option<String> {
        let name = match self {
            AudioSource::File(path) => return path.extension().map(|e| e.to_string_lossy().to_lowercase()),
            AudioSource::Url(url) => url.split(['?', '#']).next().unwrap_or(url),
        };
        let file = name.rsplit('/').next()?;
        let (_, ext) = file.rsplit_once('.')?;
        (!ext.is_empty()).then(|| ext.to_lowercase())
    }
}

impl fmt::Display for AudioSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioSource::File(path) => write!(f, "{}", path.display()),
            AudioSource::Url(url) => f.write_str(url),
        }
    }
}

/// One stem as handed to the track mixer
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub id: TrackId,
    pub source: AudioSource,
    /// Linear gain in [0, 1]
    pub volume: f32,
    pub muted: bool,
    pub solo: bool,
}

impl Track {
    /// New track at unity gain, unmuted, not soloed
    pub fn new(id: impl Into<TrackId>, source: AudioSource) -> Self {
        Self {
            id: id.into(),
            source,
            volume: 1.0,
            muted: false,
            solo: false,
        }
    }
}

/// Master bus controls
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MasterState {
    pub volume: f32,
    pub muted: bool,
}

impl Default for MasterState {
    fn default() -> Self {
        Self {
            volume: 1.0,
            muted: false,
        }
    }
}

/// Transport position as seen by everything downstream
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlaybackState {
    pub current_time: f64,
    pub duration: f64,
    pub is_playing: bool,
}

/// Pitch/tempo settings and the state of the remote render
#[derive(Debug, Clone, PartialEq)]
pub struct EffectState {
    pub pitch_shift_semitones: i32,
    pub playback_rate: f64,
    /// A render request is pending or in flight
    pub processing: bool,
    /// Playable resource of the most recent applied render
    pub result_source: Option<AudioSource>,
    /// Incremented for every render request; older results are discarded
    pub generation: u64,
}

impl Default for EffectState {
    fn default() -> Self {
        Self {
            pitch_shift_semitones: 0,
            playback_rate: 1.0,
            processing: false,
            result_source: None,
            generation: 0,
        }
    }
}

/// Clamp a pitch shift to the supported semitone range
pub fn clamp_pitch(semitones: i32) -> i32 {
    semitones.clamp(PITCH_MIN_SEMITONES, PITCH_MAX_SEMITONES)
}

/// Clamp a playback rate to the supported range; non-finite input maps to 1.0
pub fn clamp_rate(rate: f64) -> f64 {
    if rate.is_finite() {
        rate.clamp(RATE_MIN, RATE_MAX)
    } else {
        1.0
    }
}

/// User-facing progress or failure notice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressNotice {
    pub step: i32,
    pub message: String,
    pub percentage: f32,
}

impl ProgressNotice {
    pub fn new(step: i32, message: impl Into<String>, percentage: f32) -> Self {
        Self {
            step,
            message: message.into(),
            percentage,
        }
    }

    /// Failure notice (negative step sentinel)
    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(FAILURE_STEP, message, 0.0)
    }

    pub fn is_failure(&self) -> bool {
        self.step < 0
    }

    pub fn is_complete(&self) -> bool {
        !self.is_failure() && self.percentage >= 100.0
    }
}

/// Format seconds as `m:ss`
pub fn format_time(seconds: f64) -> String {
    if !seconds.is_finite() || seconds <= 0.0 {
        return "0:00".to_string();
    }
    let total = seconds.floor() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}
