//! Mixing state
//!
//! Authoritative master and per-track volume/mute/solo. Plain data: setters
//! clamp their input, gain derivation lives in the track mixer.

use crate::types::{MasterState, Track, TrackId};

/// Mix controls for one track
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelMix {
    pub id: TrackId,
    pub volume: f32,
    pub muted: bool,
    pub solo: bool,
}

impl From<&Track> for ChannelMix {
    fn from(track: &Track) -> Self {
        Self {
            id: track.id.clone(),
            volume: clamp_volume(track.volume),
            muted: track.muted,
            solo: track.solo,
        }
    }
}

fn clamp_volume(volume: f32) -> f32 {
    if volume.is_finite() {
        volume.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Master bus plus one [`ChannelMix`] per live track, in track order
#[derive(Debug, Clone, Default)]
pub struct MixingState {
    master: MasterState,
    channels: Vec<ChannelMix>,
}

impl MixingState {
    pub fn new(master_volume: f32) -> Self {
        Self {
            master: MasterState {
                volume: clamp_volume(master_volume),
                muted: false,
            },
            channels: Vec::new(),
        }
    }

    pub fn master(&self) -> &MasterState {
        &self.master
    }

    pub fn channels(&self) -> &[ChannelMix] {
        &self.channels
    }

    pub fn channel(&self, id: &TrackId) -> Option<&ChannelMix> {
        self.channels.iter().find(|c| &c.id == id)
    }

    /// True when any track is soloed
    pub fn solo_active(&self) -> bool {
        self.channels.iter().any(|c| c.solo)
    }

    // ─────────────────────────────────────────────────────────────
    // Master
    // ─────────────────────────────────────────────────────────────

    pub fn set_master_volume(&mut self, volume: f32) {
        self.master.volume = clamp_volume(volume);
    }

    pub fn set_master_muted(&mut self, muted: bool) {
        self.master.muted = muted;
    }

    pub fn toggle_master_muted(&mut self) -> bool {
        self.master.muted = !self.master.muted;
        self.master.muted
    }

    // ─────────────────────────────────────────────────────────────
    // Tracks
    // ─────────────────────────────────────────────────────────────

    /// Replace all channels with the controls carried by `tracks`
    pub fn replace_tracks(&mut self, tracks: &[Track]) {
        self.channels = tracks.iter().map(ChannelMix::from).collect();
    }

    pub fn clear_tracks(&mut self) {
        self.channels.clear();
    }

    /// Returns false if the track is unknown
    pub fn set_volume(&mut self, id: &TrackId, volume: f32) -> bool {
        self.update(id, |c| c.volume = clamp_volume(volume))
    }

    pub fn set_muted(&mut self, id: &TrackId, muted: bool) -> bool {
        self.update(id, |c| c.muted = muted)
    }

    pub fn toggle_muted(&mut self, id: &TrackId) -> bool {
        self.update(id, |c| c.muted = !c.muted)
    }

    pub fn set_solo(&mut self, id: &TrackId, solo: bool) -> bool {
        self.update(id, |c| c.solo = solo)
    }

    pub fn toggle_solo(&mut self, id: &TrackId) -> bool {
        self.update(id, |c| c.solo = !c.solo)
    }

    fn update(&mut self, id: &TrackId, f: impl FnOnce(&mut ChannelMix)) -> bool {
        match self.channels.iter_mut().find(|c| &c.id == id) {
            Some(channel) => {
                f(channel);
                true
            }
            None => {
                log::debug!("[MIX] Ignoring change for unknown track {}", id);
                false
            }
        }
    }
}
