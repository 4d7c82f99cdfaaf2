//! Commands accepted by the player loop
//!
//! Every mutation of engine state goes through a [`PlayerCommand`]. The
//! player task processes them one at a time, interleaved with media events,
//! render outcomes and timers, so no two mutations ever overlap.
//!
//! # Usage
//!
//! ```ignore
//! handle.send(PlayerCommand::LoadSource { source, effect_source: None })?;
//! handle.send(PlayerCommand::SetTrackSolo { id: "vocals".into(), solo: true })?;
//!
//! let (reply, rx) = tokio::sync::oneshot::channel();
//! handle.send(PlayerCommand::Snapshot { reply })?;
//! let snapshot = rx.await?;
//! ```

use tokio::sync::oneshot;

use super::effects::EffectSource;
use super::mixing::ChannelMix;
use crate::music::Chord;
use crate::types::{AudioSource, EffectState, MasterState, PlaybackState, ProgressNotice, Track, TrackId};

pub enum PlayerCommand {
    // ─────────────────────────────────────────────────────────────
    // Session
    // ─────────────────────────────────────────────────────────────
    /// Load a new master source, discarding stems, chords and effects
    ///
    /// `effect_source` is what the render service receives when pitch is
    /// shifted; `None` disables remote rendering for this source.
    LoadSource {
        source: AudioSource,
        effect_source: Option<EffectSource>,
    },
    /// Replace the live stem set
    LoadStems(Vec<Track>),
    /// Replace the chord timeline
    SetChords(Vec<Chord>),
    /// Release everything and return to an empty session
    Reset,

    // ─────────────────────────────────────────────────────────────
    // Playback Control
    // ─────────────────────────────────────────────────────────────
    Play,
    Pause,
    TogglePlay,
    /// Seek to an absolute position (seconds, original timeline)
    Seek(f64),

    // ─────────────────────────────────────────────────────────────
    // Mixing
    // ─────────────────────────────────────────────────────────────
    SetMasterVolume(f32),
    SetMasterMuted(bool),
    ToggleMasterMute,
    SetTrackVolume { id: TrackId, volume: f32 },
    SetTrackMuted { id: TrackId, muted: bool },
    ToggleTrackMute(TrackId),
    SetTrackSolo { id: TrackId, solo: bool },
    ToggleTrackSolo(TrackId),

    // ─────────────────────────────────────────────────────────────
    // Effects
    // ─────────────────────────────────────────────────────────────
    /// Pitch shift in semitones (-12..=12); 0 reverts to the original
    SetPitch(i32),
    /// Tempo multiplier (0.5..=2.0), applied natively at once
    SetPlaybackRate(f64),

    // ─────────────────────────────────────────────────────────────
    // Misc
    // ─────────────────────────────────────────────────────────────
    /// Show a progress notice (e.g. from a separation job)
    Notify(ProgressNotice),
    /// Request a state snapshot
    Snapshot { reply: oneshot::Sender<PlayerSnapshot> },
    /// Stop the player loop
    Shutdown,
}

/// Point-in-time view of the player
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSnapshot {
    pub playback: PlaybackState,
    pub master: MasterState,
    /// Channel controls paired with the gain currently applied
    pub channels: Vec<(ChannelMix, f32)>,
    pub effect: EffectState,
    pub chord: Option<Chord>,
    pub notice: Option<ProgressNotice>,
}
