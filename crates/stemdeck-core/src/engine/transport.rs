//! Transport - the master audio resource
//!
//! Exactly one media element at a time. The transport is the clock every
//! stem follows, drives the visible cursor, and is the audible output only
//! when no stems are loaded.
//!
//! # Hot swap
//!
//! Replacing the resource (e.g. with a pitch-shifted render) keeps the
//! listener's place: the relative position and play state are captured,
//! the new resource is loaded, and both are restored when it reports ready.
//!
//! # Timeline scale
//!
//! A processed resource may have its tempo baked in. `element_scale` is the
//! rendered rate of the loaded element and the native rate given to it is
//! divided by that so tempo is never applied twice. `time_scale` is the rate
//! of the timeline the cursor is on; `master_time()` maps the cursor back
//! onto the original recording with it. The two differ only while a hot swap
//! is pending, when the cursor still sits on the outgoing resource.

use crate::media::{ElementKey, MediaBackend, MediaElement, MediaError, MediaEvent, MediaEventKind, MediaResult};
use crate::types::{AudioSource, MasterState, PlaybackState};

/// Position and play state carried across a hot swap
#[derive(Debug, Clone, Copy, PartialEq)]
struct SwapRestore {
    /// Position as a fraction of duration
    relative: f64,
    was_playing: bool,
}

/// What the player should react to after a transport event
#[derive(Debug, Clone, PartialEq)]
pub enum TransportNotice {
    Ready { duration: f64 },
    TimeUpdate { time: f64 },
    Finished,
    Failed { message: String },
}

pub struct Transport {
    element: Option<Box<dyn MediaElement>>,
    load_seq: u64,
    source: Option<AudioSource>,
    time_scale: f64,
    element_scale: f64,
    ready: bool,
    state: PlaybackState,
    swap: Option<SwapRestore>,
    error: Option<String>,
    output_silenced: bool,
    master: MasterState,
    target_rate: f64,
}

impl Default for Transport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport {
    pub fn new() -> Self {
        Self {
            element: None,
            load_seq: 0,
            source: None,
            time_scale: 1.0,
            element_scale: 1.0,
            ready: false,
            state: PlaybackState::default(),
            swap: None,
            error: None,
            output_silenced: false,
            master: MasterState::default(),
            target_rate: 1.0,
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────

    pub fn source(&self) -> Option<&AudioSource> {
        self.source.as_ref()
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Playing, or about to resume playing after a pending hot swap
    pub fn is_playing(&self) -> bool {
        self.state.is_playing || self.swap.map(|s| s.was_playing).unwrap_or(false)
    }

    pub fn is_swapping(&self) -> bool {
        self.swap.is_some()
    }

    pub fn playback_state(&self) -> PlaybackState {
        PlaybackState {
            is_playing: self.is_playing(),
            ..self.state
        }
    }

    /// Rendered rate of the timeline `playback_state()` reports on
    ///
    /// 1.0 for unprocessed audio. During a pending hot swap this is still the
    /// outgoing resource's rate.
    pub fn time_scale(&self) -> f64 {
        self.time_scale
    }

    /// Position on the original recording's timeline
    pub fn master_time(&self) -> f64 {
        self.state.current_time * self.time_scale
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Gain currently sent to the element
    pub fn output_gain(&self) -> f32 {
        if self.output_silenced || self.master.muted {
            0.0
        } else {
            self.master.volume
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Loading
    // ─────────────────────────────────────────────────────────────

    /// Load `source`, tearing down any previous resource first
    ///
    /// `time_scale` is the rate baked into the resource (1.0 for originals).
    pub fn load(&mut self, backend: &mut dyn MediaBackend, source: AudioSource, time_scale: f64) {
        self.teardown_element();

        self.load_seq += 1;
        let key = ElementKey::Transport { load: self.load_seq };
        log::info!("[TRANSPORT] Loading {} (load {})", source, self.load_seq);

        let element = backend.create(key, &source);
        self.element = Some(element);
        self.source = Some(source);
        self.element_scale = if time_scale.is_finite() && time_scale > 0.0 { time_scale } else { 1.0 };
        self.time_scale = self.element_scale;
        self.ready = false;
        self.state = PlaybackState::default();
        self.swap = None;
        self.error = None;

        self.apply_output();
        self.apply_rate();
    }

    /// Replace the resource, preserving relative position and play state
    pub fn hot_swap(&mut self, backend: &mut dyn MediaBackend, source: AudioSource, time_scale: f64) {
        // A swap that has not landed yet already holds the listener's place
        let restore = match self.swap {
            Some(pending) if !self.ready => pending,
            _ => SwapRestore {
                relative: if self.state.duration > 0.0 {
                    self.state.current_time / self.state.duration
                } else {
                    0.0
                },
                was_playing: self.state.is_playing,
            },
        };
        let previous = self.state;
        let previous_scale = self.time_scale;

        self.load(backend, source, time_scale);

        // Keep the cursor on the old timeline until the new resource is ready
        self.time_scale = previous_scale;
        self.state.current_time = previous.current_time;
        self.state.duration = previous.duration;
        self.swap = Some(restore);
        log::info!(
            "[TRANSPORT] Hot swap pending (relative {:.3}, was_playing {})",
            restore.relative,
            restore.was_playing
        );
    }

    /// Release the resource entirely
    pub fn unload(&mut self) {
        self.teardown_element();
        self.source = None;
        self.ready = false;
        self.state = PlaybackState::default();
        self.swap = None;
        self.error = None;
        self.time_scale = 1.0;
        self.element_scale = 1.0;
    }

    fn teardown_element(&mut self) {
        if let Some(mut element) = self.element.take() {
            element.pause();
            element.release();
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Playback control
    // ─────────────────────────────────────────────────────────────

    /// Start playback
    ///
    /// Before the resource is ready this only records intent during a hot
    /// swap; otherwise it is a no-op.
    pub fn play(&mut self) -> MediaResult<()> {
        if self.state.is_playing {
            return Ok(());
        }
        if !self.ready {
            match self.swap.as_mut() {
                Some(swap) => swap.was_playing = true,
                None => log::debug!("[TRANSPORT] play() before ready ignored"),
            }
            return Ok(());
        }
        let element = self.element.as_mut().ok_or(MediaError::Released)?;
        match element.play() {
            Ok(()) => {
                self.state.is_playing = true;
                Ok(())
            }
            Err(e) => {
                self.state.is_playing = false;
                Err(e)
            }
        }
    }

    pub fn pause(&mut self) {
        if let Some(swap) = self.swap.as_mut() {
            swap.was_playing = false;
        }
        if let Some(element) = self.element.as_mut() {
            element.pause();
        }
        self.state.is_playing = false;
    }

    /// Toggle play/pause; returns the new playing state
    pub fn toggle(&mut self) -> MediaResult<bool> {
        if self.is_playing() {
            self.pause();
        } else {
            self.play()?;
        }
        Ok(self.is_playing())
    }

    /// Seek to an absolute position in seconds (resource timeline)
    ///
    /// Clamped to `[0, duration]`. Returns the applied position, or `None`
    /// when there is nothing to seek in. During a hot swap the pending
    /// restore target moves instead.
    pub fn seek(&mut self, seconds: f64) -> Option<f64> {
        let duration = self.state.duration;
        if !(duration > 0.0) || !seconds.is_finite() {
            return None;
        }
        let target = seconds.clamp(0.0, duration);

        if !self.ready {
            let swap = self.swap.as_mut()?;
            swap.relative = target / duration;
            self.state.current_time = target;
            return Some(target);
        }

        if let Some(element) = self.element.as_mut() {
            element.set_current_time(target);
        }
        self.state.current_time = target;
        Some(target)
    }

    // ─────────────────────────────────────────────────────────────
    // Output
    // ─────────────────────────────────────────────────────────────

    /// Silence the transport while stems carry the audio
    pub fn set_output_silenced(&mut self, silenced: bool) {
        self.output_silenced = silenced;
        self.apply_output();
    }

    pub fn set_master(&mut self, master: MasterState) {
        self.master = master;
        self.apply_output();
    }

    /// Target tempo on the original timeline
    pub fn set_playback_rate(&mut self, rate: f64) {
        self.target_rate = rate;
        self.apply_rate();
    }

    /// Native rate actually given to the element
    pub fn native_rate(&self) -> f64 {
        self.target_rate / self.element_scale
    }

    fn apply_output(&mut self) {
        let gain = self.output_gain();
        if let Some(element) = self.element.as_mut() {
            element.set_volume(gain);
            element.set_muted(gain == 0.0);
        }
    }

    fn apply_rate(&mut self) {
        let rate = self.native_rate();
        if let Some(element) = self.element.as_mut() {
            element.set_playback_rate(rate);
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Events
    // ─────────────────────────────────────────────────────────────

    /// Apply an event from the transport element
    ///
    /// Events from earlier loads are dropped.
    pub fn handle_event(&mut self, event: &MediaEvent) -> Option<TransportNotice> {
        match event.key {
            ElementKey::Transport { load } if load == self.load_seq && self.element.is_some() => {}
            _ => {
                log::trace!("[TRANSPORT] Ignoring stale event {:?}", event.key);
                return None;
            }
        }

        match &event.kind {
            MediaEventKind::Ready { duration } => Some(self.on_ready(*duration)),
            MediaEventKind::TimeUpdate { time } => {
                if !self.ready {
                    return None;
                }
                self.state.current_time = time.clamp(0.0, self.state.duration);
                Some(TransportNotice::TimeUpdate {
                    time: self.state.current_time,
                })
            }
            MediaEventKind::Finished => {
                if !self.ready {
                    return None;
                }
                if let Some(element) = self.element.as_mut() {
                    element.pause();
                    element.set_current_time(0.0);
                }
                self.state.current_time = 0.0;
                self.state.is_playing = false;
                log::info!("[TRANSPORT] Finished");
                Some(TransportNotice::Finished)
            }
            MediaEventKind::Error { message } => {
                log::warn!("[TRANSPORT] Resource failed: {}", message);
                self.ready = false;
                self.swap = None;
                self.state = PlaybackState::default();
                self.time_scale = self.element_scale;
                self.error = Some(message.clone());
                Some(TransportNotice::Failed {
                    message: message.clone(),
                })
            }
        }
    }

    fn on_ready(&mut self, duration: f64) -> TransportNotice {
        self.ready = true;
        self.time_scale = self.element_scale;
        self.state.duration = duration.max(0.0);
        self.state.current_time = 0.0;
        self.apply_output();
        self.apply_rate();

        if let Some(restore) = self.swap.take() {
            if restore.relative > 0.0 && restore.relative < 1.0 {
                self.seek(restore.relative * self.state.duration);
            }
            if restore.was_playing {
                if let Err(e) = self.play() {
                    log::warn!("[TRANSPORT] Could not resume after swap: {}", e);
                }
            }
            log::info!(
                "[TRANSPORT] Hot swap landed at {:.2}s (playing {})",
                self.state.current_time,
                self.state.is_playing
            );
        }

        TransportNotice::Ready {
            duration: self.state.duration,
        }
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.teardown_element();
    }
}
