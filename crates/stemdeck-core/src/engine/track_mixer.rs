//! Track mixer - per-stem media elements slaved to the transport
//!
//! The mixer owns one media element per live stem, keyed by track id:
//!
//! - `set_tracks` swaps the live set (destroy stale first, then create)
//! - `resync` pulls drifting stems back onto the master clock
//! - `apply_gains` pushes the effective gain of every track to its element
//! - `play_all` / `pause_all` / `reset_all` act on every live track; one
//!   failing track never blocks the others

use std::collections::HashSet;

use super::mixing::{ChannelMix, MixingState};
use crate::media::{ElementKey, MediaBackend, MediaElement, MediaEvent, MediaEventKind};
use crate::types::{AudioSource, MasterState, Track, TrackId, SYNC_EPSILON_SECS};

/// Final gain for one track
///
/// Rules, in order:
/// 1. Any track soloed and this one is not → 0
/// 2. Master muted or track muted → 0
/// 3. Otherwise `master.volume * track.volume`
pub fn effective_gain(master: &MasterState, channel: &ChannelMix, solo_active: bool) -> f32 {
    if solo_active && !channel.solo {
        return 0.0;
    }
    if master.muted || channel.muted {
        return 0.0;
    }
    master.volume * channel.volume
}

/// Effective gain of `id` under the current mixing state (0 for unknown tracks)
pub fn effective_gain_for(mixing: &MixingState, id: &TrackId) -> f32 {
    mixing
        .channel(id)
        .map(|c| effective_gain(mixing.master(), c, mixing.solo_active()))
        .unwrap_or(0.0)
}

/// A track that failed to start
#[derive(Debug, Clone, PartialEq)]
pub struct TrackFailure {
    pub id: TrackId,
    pub message: String,
}

/// Summary of a track set replacement
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackSetChange {
    pub removed: Vec<TrackId>,
    pub added: Vec<TrackId>,
    pub kept: Vec<TrackId>,
}

struct TrackSlot {
    id: TrackId,
    source: AudioSource,
    instance: u64,
    element: Box<dyn MediaElement>,
    failed: Option<String>,
}

impl TrackSlot {
    fn key(&self) -> ElementKey {
        ElementKey::Track {
            id: self.id.clone(),
            instance: self.instance,
        }
    }

    fn apply_gain(&mut self, gain: f32) {
        self.element.set_volume(gain);
        self.element.set_muted(gain == 0.0);
    }

    /// Silence and free the element. Never rely on drop order for this.
    fn destroy(mut self) {
        self.element.pause();
        self.element.release();
        log::debug!("[MIXER] Destroyed track {} (instance {})", self.id, self.instance);
    }
}

/// Owner of the live stem elements
pub struct TrackMixer {
    slots: Vec<TrackSlot>,
    next_instance: u64,
    playback_rate: f64,
    sync_tolerance: f64,
}

impl Default for TrackMixer {
    fn default() -> Self {
        Self::new(SYNC_EPSILON_SECS)
    }
}

impl TrackMixer {
    /// `sync_tolerance` is the drift in seconds tolerated before a hard seek
    pub fn new(sync_tolerance: f64) -> Self {
        Self {
            slots: Vec::new(),
            next_instance: 0,
            playback_rate: 1.0,
            sync_tolerance,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Live track ids in order
    pub fn ids(&self) -> Vec<TrackId> {
        self.slots.iter().map(|s| s.id.clone()).collect()
    }

    /// Failure message of a track whose element reported an error
    pub fn failure(&self, id: &TrackId) -> Option<&str> {
        self.slots.iter().find(|s| &s.id == id).and_then(|s| s.failed.as_deref())
    }

    /// Replace the live set with `tracks`
    ///
    /// Duplicate ids keep the first occurrence. Tracks whose id disappears or
    /// whose source changes are destroyed before any new element is created.
    /// Mixing channels are replaced from the incoming tracks and gains are
    /// applied immediately.
    pub fn set_tracks(
        &mut self,
        backend: &mut dyn MediaBackend,
        tracks: Vec<Track>,
        mixing: &mut MixingState,
    ) -> TrackSetChange {
        let mut seen = HashSet::new();
        let tracks: Vec<Track> = tracks
            .into_iter()
            .filter(|t| {
                let fresh = seen.insert(t.id.clone());
                if !fresh {
                    log::warn!("[MIXER] Dropping duplicate track {}", t.id);
                }
                fresh
            })
            .collect();

        let mut change = TrackSetChange::default();

        // Phase 1: destroy everything that does not survive
        let mut survivors = Vec::with_capacity(self.slots.len());
        for slot in self.slots.drain(..) {
            let keep = tracks.iter().any(|t| t.id == slot.id && t.source == slot.source);
            if keep {
                survivors.push(slot);
            } else {
                change.removed.push(slot.id.clone());
                slot.destroy();
            }
        }

        // Phase 2: create the missing ones, in incoming order
        let mut slots = Vec::with_capacity(tracks.len());
        for track in &tracks {
            match survivors.iter().position(|s| s.id == track.id) {
                Some(pos) => {
                    change.kept.push(track.id.clone());
                    slots.push(survivors.swap_remove(pos));
                }
                None => {
                    self.next_instance += 1;
                    let key = ElementKey::Track {
                        id: track.id.clone(),
                        instance: self.next_instance,
                    };
                    let element = backend.create(key, &track.source);
                    change.added.push(track.id.clone());
                    slots.push(TrackSlot {
                        id: track.id.clone(),
                        source: track.source.clone(),
                        instance: self.next_instance,
                        element,
                        failed: None,
                    });
                }
            }
        }
        self.slots = slots;

        mixing.replace_tracks(&tracks);
        let rate = self.playback_rate;
        for slot in &mut self.slots {
            slot.element.set_playback_rate(rate);
        }
        self.apply_gains(mixing);

        log::info!(
            "[MIXER] Track set: {} added, {} kept, {} removed",
            change.added.len(),
            change.kept.len(),
            change.removed.len()
        );
        change
    }

    /// Destroy every live track
    pub fn clear(&mut self) {
        for slot in self.slots.drain(..) {
            slot.destroy();
        }
    }

    /// Force tracks that drifted more than the tolerance back to `master_time`
    ///
    /// Returns the number of tracks corrected.
    pub fn resync(&mut self, master_time: f64) -> usize {
        let mut corrected = 0;
        for slot in &mut self.slots {
            let drift = (slot.element.current_time() - master_time).abs();
            if drift > self.sync_tolerance {
                log::trace!("[MIXER] Resync {} (drift {:.3}s)", slot.id, drift);
                slot.element.set_current_time(master_time);
                corrected += 1;
            }
        }
        corrected
    }

    /// Recompute and apply every track's effective gain
    pub fn apply_gains(&mut self, mixing: &MixingState) {
        for slot in &mut self.slots {
            let gain = effective_gain_for(mixing, &slot.id);
            slot.apply_gain(gain);
        }
    }

    /// Start every live track at its current effective gain
    pub fn play_all(&mut self, mixing: &MixingState) -> Vec<TrackFailure> {
        let mut failures = Vec::new();
        for slot in &mut self.slots {
            if let Some(reason) = &slot.failed {
                log::debug!("[MIXER] Skipping failed track {}: {}", slot.id, reason);
                continue;
            }
            let gain = effective_gain_for(mixing, &slot.id);
            slot.apply_gain(gain);
            if let Err(e) = slot.element.play() {
                log::warn!("[MIXER] Track {} failed to play: {}", slot.id, e);
                failures.push(TrackFailure {
                    id: slot.id.clone(),
                    message: e.to_string(),
                });
            }
        }
        failures
    }

    pub fn pause_all(&mut self) {
        for slot in &mut self.slots {
            slot.element.pause();
        }
    }

    /// Rewind every track to the start
    pub fn reset_all(&mut self) {
        for slot in &mut self.slots {
            slot.element.set_current_time(0.0);
        }
    }

    /// Native rate change on every live track
    pub fn set_playback_rate(&mut self, rate: f64) {
        self.playback_rate = rate;
        for slot in &mut self.slots {
            slot.element.set_playback_rate(rate);
        }
    }

    /// Handle an event from a track element
    ///
    /// Returns a failure when a live track reports an error. Events from
    /// destroyed elements are ignored.
    pub fn handle_event(&mut self, event: &MediaEvent) -> Option<TrackFailure> {
        let slot = self.slots.iter_mut().find(|s| s.key() == event.key)?;
        match &event.kind {
            MediaEventKind::Ready { duration } => {
                log::debug!("[MIXER] Track {} ready ({:.2}s)", slot.id, duration);
                None
            }
            MediaEventKind::Error { message } => {
                log::warn!("[MIXER] Track {} failed: {}", slot.id, message);
                slot.element.pause();
                slot.failed = Some(message.clone());
                Some(TrackFailure {
                    id: slot.id.clone(),
                    message: message.clone(),
                })
            }
            // The transport is the clock; stem progress is only corrected, never followed
            MediaEventKind::TimeUpdate { .. } | MediaEventKind::Finished => None,
        }
    }
}

impl Drop for TrackMixer {
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::fake::FakeBackend;

    fn track(id: &str) -> Track {
        Track::new(id, AudioSource::Url(format!("/api/download/song/{}.wav", id)))
    }

    fn key(id: &str, instance: u64) -> ElementKey {
        ElementKey::Track {
            id: id.into(),
            instance,
        }
    }

    fn setup(ids: &[&str]) -> (TrackMixer, FakeBackend, MixingState) {
        let mut backend = FakeBackend::new();
        let mut mixing = MixingState::new(1.0);
        let mut mixer = TrackMixer::default();
        mixer.set_tracks(&mut backend, ids.iter().map(|id| track(id)).collect(), &mut mixing);
        (mixer, backend, mixing)
    }

    fn channel(id: &str, volume: f32, muted: bool, solo: bool) -> ChannelMix {
        ChannelMix {
            id: id.into(),
            volume,
            muted,
            solo,
        }
    }

    #[test]
    fn test_master_mute_silences_everything() {
        let master = MasterState {
            volume: 0.9,
            muted: true,
        };
        assert_eq!(effective_gain(&master, &channel("a", 1.0, false, false), false), 0.0);
        assert_eq!(effective_gain(&master, &channel("b", 0.5, false, true), true), 0.0);
    }

    #[test]
    fn test_solo_dominates() {
        let master = MasterState {
            volume: 0.5,
            muted: false,
        };
        assert_eq!(effective_gain(&master, &channel("a", 1.0, false, false), true), 0.0);
        assert_eq!(effective_gain(&master, &channel("b", 0.8, false, true), true), 0.4);
        // A soloed track that is also muted stays silent
        assert_eq!(effective_gain(&master, &channel("c", 0.8, true, true), true), 0.0);
    }

    #[test]
    fn test_example_mix() {
        let (mut mixer, backend, mut mixing) = setup(&["vocals", "drums"]);
        mixing.set_master_volume(0.5);
        mixing.set_muted(&"vocals".into(), true);
        mixing.set_volume(&"drums".into(), 0.8);
        mixer.apply_gains(&mixing);

        let vocals = backend.state(&key("vocals", 1));
        assert_eq!(vocals.volume, 0.0);
        assert!(vocals.muted);
        let drums = backend.state(&key("drums", 2));
        assert!((drums.volume - 0.4).abs() < 1e-6);
        assert!(!drums.muted);
    }

    #[test]
    fn test_resync_threshold() {
        let (mut mixer, backend, _mixing) = setup(&["a", "b"]);
        backend.with_state(&key("a", 1), |s| s.current_time = 10.10);
        backend.with_state(&key("b", 2), |s| s.current_time = 10.20);

        assert_eq!(mixer.resync(10.0), 1);
        assert_eq!(backend.state(&key("a", 1)).current_time, 10.10);
        assert!(backend.state(&key("a", 1)).seeks.is_empty());
        assert_eq!(backend.state(&key("b", 2)).current_time, 10.0);
    }

    #[test]
    fn test_set_tracks_destroys_before_creating() {
        let (mut mixer, backend, mut mixing) = setup(&["vocals", "drums"]);
        let mut backend_handle = backend.clone();

        let mut changed = track("drums");
        changed.source = AudioSource::Url("/api/download/other-song/drums.wav".into());
        let change = mixer.set_tracks(&mut backend_handle, vec![changed, track("bass")], &mut mixing);

        assert_eq!(change.removed, vec![TrackId::from("vocals"), TrackId::from("drums")]);
        assert_eq!(change.added, vec![TrackId::from("drums"), TrackId::from("bass")]);
        assert!(backend.state(&key("vocals", 1)).released);
        assert!(backend.state(&key("drums", 2)).released);
        assert!(!backend.state(&key("drums", 3)).released);
        assert_eq!(mixer.ids(), vec![TrackId::from("drums"), TrackId::from("bass")]);
        assert_eq!(mixing.channels().len(), 2);
    }

    #[test]
    fn test_set_tracks_keeps_unchanged_and_drops_duplicates() {
        let (mut mixer, backend, mut mixing) = setup(&["vocals"]);
        let mut backend_handle = backend.clone();

        let change = mixer.set_tracks(
            &mut backend_handle,
            vec![track("drums"), track("vocals"), track("drums")],
            &mut mixing,
        );

        assert_eq!(change.kept, vec![TrackId::from("vocals")]);
        assert_eq!(change.added, vec![TrackId::from("drums")]);
        assert_eq!(backend.created_count(), 2);
        assert_eq!(mixer.ids(), vec![TrackId::from("drums"), TrackId::from("vocals")]);
    }

    #[test]
    fn test_play_all_isolates_failures() {
        let mut backend = FakeBackend::new();
        backend.fail_play_for(track("drums").source);
        let mut mixing = MixingState::new(0.5);
        let mut mixer = TrackMixer::default();
        mixer.set_tracks(&mut backend, vec![track("vocals"), track("drums"), track("bass")], &mut mixing);

        let failures = mixer.play_all(&mixing);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].id, TrackId::from("drums"));
        assert!(backend.state(&key("vocals", 1)).playing);
        assert!(backend.state(&key("bass", 3)).playing);
        assert_eq!(backend.state(&key("bass", 3)).volume, 0.5);

        mixer.pause_all();
        mixer.reset_all();
        let bass = backend.state(&key("bass", 3));
        assert!(!bass.playing);
        assert_eq!(bass.current_time, 0.0);
    }

    #[test]
    fn test_error_event_marks_track_failed() {
        let (mut mixer, backend, mixing) = setup(&["vocals", "drums"]);

        let failure = mixer.handle_event(&MediaEvent {
            key: key("drums", 2),
            kind: MediaEventKind::Error {
                message: "decode error".into(),
            },
        });
        assert_eq!(failure.unwrap().id, TrackId::from("drums"));
        assert_eq!(mixer.failure(&"drums".into()), Some("decode error"));

        assert!(mixer.play_all(&mixing).is_empty());
        assert!(!backend.state(&key("drums", 2)).playing);
        assert!(backend.state(&key("vocals", 1)).playing);
    }

    #[test]
    fn test_stale_events_ignored() {
        let (mut mixer, _backend, _mixing) = setup(&["vocals"]);
        let failure = mixer.handle_event(&MediaEvent {
            key: key("vocals", 99),
            kind: MediaEventKind::Error {
                message: "late".into(),
            },
        });
        assert!(failure.is_none());
        assert!(mixer.failure(&"vocals".into()).is_none());
    }

    #[test]
    fn test_rate_applies_to_new_tracks() {
        let (mut mixer, backend, mut mixing) = setup(&["vocals"]);
        mixer.set_playback_rate(1.25);
        assert_eq!(backend.state(&key("vocals", 1)).rate, 1.25);

        let mut backend_handle = backend.clone();
        mixer.set_tracks(&mut backend_handle, vec![track("vocals"), track("bass")], &mut mixing);
        assert_eq!(backend.state(&key("bass", 2)).rate, 1.25);
    }

    #[test]
    fn test_clear_releases_everything() {
        let (mut mixer, backend, _mixing) = setup(&["a", "b"]);
        mixer.clear();
        assert!(mixer.is_empty());
        assert!(backend.state(&key("a", 1)).released);
        assert!(backend.state(&key("b", 2)).released);
    }
}
