//! Player - the single task that owns the engine
//!
//! One `select!` loop multiplexes:
//!
//! - [`PlayerCommand`]s from the UI / CLI
//! - [`MediaEvent`]s from transport and stem elements
//! - [`RenderOutcome`]s from the effects processor
//! - the effect debounce and notice expiry deadlines
//!
//! Handlers are plain synchronous methods, so every state transition runs to
//! completion before the next message is looked at.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::Instant;

use super::command::{PlayerCommand, PlayerSnapshot};
use super::effects::{EffectAction, EffectRenderer, EffectSource, EffectsProcessor, RenderOutcome};
use super::mixing::MixingState;
use super::notice::NoticeBoard;
use super::track_mixer::{effective_gain_for, TrackFailure, TrackMixer};
use super::transport::{Transport, TransportNotice};
use crate::config::EngineConfig;
use crate::media::{ElementKey, MediaBackend, MediaEvent};
use crate::music::ChordTimeline;
use crate::services::messages::{publish, PlayerEvent};
use crate::types::{AudioSource, PlaybackState, ProgressNotice, Track};

pub struct Player<B: MediaBackend> {
    backend: B,
    mixing: MixingState,
    transport: Transport,
    mixer: TrackMixer,
    effects: EffectsProcessor,
    chords: ChordTimeline,
    current_chord: Option<usize>,
    /// Unprocessed source of the current session
    original: Option<AudioSource>,
    notices: NoticeBoard,
    events: crossbeam::channel::Sender<PlayerEvent>,
}

impl<B: MediaBackend> Player<B> {
    /// Build the player; the returned receiver carries render outcomes into [`Player::run`]
    pub fn new(
        backend: B,
        renderer: Arc<dyn EffectRenderer>,
        mut config: EngineConfig,
        events: crossbeam::channel::Sender<PlayerEvent>,
    ) -> (Self, mpsc::UnboundedReceiver<RenderOutcome>) {
        config.validate();
        let (effects, outcomes) = EffectsProcessor::new(renderer, config.effect_debounce());
        let mixing = MixingState::new(config.default_master_volume);
        let mut transport = Transport::new();
        transport.set_master(*mixing.master());

        let player = Self {
            backend,
            mixing,
            transport,
            mixer: TrackMixer::new(config.sync_tolerance_secs),
            effects,
            chords: ChordTimeline::default(),
            current_chord: None,
            original: None,
            notices: NoticeBoard::new(config.success_notice(), config.failure_notice()),
            events,
        };
        (player, outcomes)
    }

    /// Run until `Shutdown` or until every command sender is gone
    pub async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<PlayerCommand>,
        mut media_events: mpsc::UnboundedReceiver<MediaEvent>,
        mut outcomes: mpsc::UnboundedReceiver<RenderOutcome>,
    ) {
        log::info!("[PLAYER] Started");
        loop {
            let effect_deadline = self.effects.deadline();
            let notice_deadline = self.notices.deadline();

            tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(PlayerCommand::Shutdown) | None => break,
                    Some(cmd) => self.handle_command(cmd),
                },
                Some(event) = media_events.recv() => self.handle_media_event(event),
                Some(outcome) = outcomes.recv() => self.handle_render_outcome(outcome),
                _ = sleep_until_opt(effect_deadline) => self.poll_effects(Instant::now()),
                _ = sleep_until_opt(notice_deadline) => self.expire_notices(Instant::now()),
            }
        }
        self.reset();
        log::info!("[PLAYER] Stopped");
    }

    // ─────────────────────────────────────────────────────────────
    // Commands
    // ─────────────────────────────────────────────────────────────

    pub fn handle_command(&mut self, cmd: PlayerCommand) {
        match cmd {
            PlayerCommand::LoadSource { source, effect_source } => self.load_source(source, effect_source),
            PlayerCommand::LoadStems(tracks) => self.load_stems(tracks),
            PlayerCommand::SetChords(chords) => {
                self.chords = ChordTimeline::new(chords);
                self.current_chord = None;
                self.update_chord();
            }
            PlayerCommand::Reset => self.reset(),

            PlayerCommand::Play => self.play(),
            PlayerCommand::Pause => self.pause(),
            PlayerCommand::TogglePlay => self.toggle_play(),
            PlayerCommand::Seek(seconds) => self.seek(seconds),

            PlayerCommand::SetMasterVolume(volume) => {
                self.mixing.set_master_volume(volume);
                self.apply_mix();
            }
            PlayerCommand::SetMasterMuted(muted) => {
                self.mixing.set_master_muted(muted);
                self.apply_mix();
            }
            PlayerCommand::ToggleMasterMute => {
                self.mixing.toggle_master_muted();
                self.apply_mix();
            }
            PlayerCommand::SetTrackVolume { id, volume } => {
                if self.mixing.set_volume(&id, volume) {
                    self.apply_mix();
                }
            }
            PlayerCommand::SetTrackMuted { id, muted } => {
                if self.mixing.set_muted(&id, muted) {
                    self.apply_mix();
                }
            }
            PlayerCommand::ToggleTrackMute(id) => {
                if self.mixing.toggle_muted(&id) {
                    self.apply_mix();
                }
            }
            PlayerCommand::SetTrackSolo { id, solo } => {
                if self.mixing.set_solo(&id, solo) {
                    self.apply_mix();
                }
            }
            PlayerCommand::ToggleTrackSolo(id) => {
                if self.mixing.toggle_solo(&id) {
                    self.apply_mix();
                }
            }

            PlayerCommand::SetPitch(semitones) => {
                let action = self.effects.set_pitch(semitones, Instant::now());
                self.after_effect_change(action);
            }
            PlayerCommand::SetPlaybackRate(rate) => {
                let action = self.effects.set_playback_rate(rate, Instant::now());
                self.apply_rate();
                self.after_effect_change(action);
            }

            PlayerCommand::Notify(notice) => self.notify(notice),
            PlayerCommand::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            PlayerCommand::Shutdown => {}
        }
    }

    fn load_source(&mut self, source: AudioSource, effect_source: Option<EffectSource>) {
        self.mixer.clear();
        self.mixing.clear_tracks();
        self.chords = ChordTimeline::default();
        self.current_chord = None;

        self.transport.set_output_silenced(false);
        self.original = Some(source.clone());
        self.transport.load(&mut self.backend, source.clone(), 1.0);
        // The transport no longer holds any render once the new source is in
        self.effects.set_source(effect_source);
        self.apply_rate();

        self.emit(PlayerEvent::SourceLoading { source });
        self.emit(PlayerEvent::PlaybackChanged { playing: false });
    }

    fn load_stems(&mut self, tracks: Vec<Track>) {
        self.mixer.set_tracks(&mut self.backend, tracks, &mut self.mixing);
        self.transport.set_output_silenced(!self.mixer.is_empty());

        if self.transport.is_playing() {
            self.start_stems();
        }

        self.emit(PlayerEvent::StemsLoaded { ids: self.mixer.ids() });
    }

    fn reset(&mut self) {
        self.mixer.clear();
        self.mixing.clear_tracks();
        self.transport.unload();
        self.transport.set_output_silenced(false);
        self.effects.set_source(None);
        self.chords = ChordTimeline::default();
        self.current_chord = None;
        self.original = None;
        self.notices.clear();
        self.emit(PlayerEvent::PlaybackChanged { playing: false });
    }

    fn play(&mut self) {
        if let Err(e) = self.transport.play() {
            self.transport_failed(format!("Playback failed: {}", e));
            return;
        }
        if self.transport.is_playing() {
            self.start_stems();
        }
        self.emit(PlayerEvent::PlaybackChanged {
            playing: self.transport.is_playing(),
        });
    }

    fn pause(&mut self) {
        self.transport.pause();
        self.mixer.pause_all();
        self.emit(PlayerEvent::PlaybackChanged { playing: false });
    }

    fn toggle_play(&mut self) {
        match self.transport.toggle() {
            Ok(true) => self.start_stems(),
            Ok(false) => self.mixer.pause_all(),
            Err(e) => {
                self.transport_failed(format!("Playback failed: {}", e));
                return;
            }
        }
        self.emit(PlayerEvent::PlaybackChanged {
            playing: self.transport.is_playing(),
        });
    }

    /// Bring the stems in line with the transport and start them
    fn start_stems(&mut self) {
        if self.mixer.is_empty() {
            return;
        }
        self.mixer.resync(self.transport.master_time());
        let failures = self.mixer.play_all(&self.mixing);
        self.report_track_failures(failures);
    }

    /// `seconds` is on the original timeline
    fn seek(&mut self, seconds: f64) {
        let scale = self.transport.time_scale();
        if self.transport.seek(seconds / scale).is_none() {
            return;
        }
        self.mixer.resync(self.transport.master_time());
        self.publish_time();
        self.update_chord();
    }

    fn apply_mix(&mut self) {
        self.mixer.apply_gains(&self.mixing);
        self.transport.set_master(*self.mixing.master());
    }

    fn apply_rate(&mut self) {
        let rate = self.effects.state().playback_rate;
        self.transport.set_playback_rate(rate);
        self.mixer.set_playback_rate(rate);
    }

    // ─────────────────────────────────────────────────────────────
    // Effects
    // ─────────────────────────────────────────────────────────────

    fn after_effect_change(&mut self, action: EffectAction) {
        if self.effects.state().processing {
            self.emit(PlayerEvent::EffectProcessing);
        }
        self.apply_effect_action(action);
    }

    fn poll_effects(&mut self, now: Instant) {
        self.effects.poll_debounce(now);
    }

    pub fn handle_render_outcome(&mut self, outcome: RenderOutcome) {
        let action = self.effects.handle_outcome(outcome);
        self.apply_effect_action(action);
    }

    fn apply_effect_action(&mut self, action: EffectAction) {
        match action {
            EffectAction::None => {}
            EffectAction::Revert => {
                if let Some(original) = self.original.clone() {
                    if self.transport.source() != Some(&original) {
                        self.transport.hot_swap(&mut self.backend, original, 1.0);
                    }
                }
                self.effects.finish_apply();
                self.apply_rate();
                self.emit(PlayerEvent::EffectReverted);
            }
            EffectAction::Swap { source, rendered_rate } => {
                self.transport.hot_swap(&mut self.backend, source, rendered_rate);
                self.effects.finish_apply();
                self.apply_rate();
                let state = self.effects.state();
                self.emit(PlayerEvent::EffectApplied {
                    pitch_shift: state.pitch_shift_semitones,
                    playback_rate: state.playback_rate,
                });
            }
            EffectAction::Failed { message } => {
                self.notify(ProgressNotice::failure(format!("Audio processing failed: {}", message)));
            }
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Media events
    // ─────────────────────────────────────────────────────────────

    pub fn handle_media_event(&mut self, event: MediaEvent) {
        match event.key {
            ElementKey::Transport { .. } => {
                if let Some(notice) = self.transport.handle_event(&event) {
                    self.on_transport_notice(notice);
                }
            }
            ElementKey::Track { .. } => {
                if let Some(failure) = self.mixer.handle_event(&event) {
                    self.report_track_failures(vec![failure]);
                }
            }
        }
    }

    fn on_transport_notice(&mut self, notice: TransportNotice) {
        match notice {
            TransportNotice::Ready { duration } => {
                log::info!("[PLAYER] Source ready ({:.2}s)", duration);
                self.emit(PlayerEvent::Ready {
                    duration: duration * self.transport.time_scale(),
                });
                if !self.mixer.is_empty() {
                    self.mixer.resync(self.transport.master_time());
                }
                self.emit(PlayerEvent::PlaybackChanged {
                    playing: self.transport.is_playing(),
                });
                self.publish_time();
                self.update_chord();
            }
            TransportNotice::TimeUpdate { .. } => {
                if !self.mixer.is_empty() {
                    self.mixer.resync(self.transport.master_time());
                }
                self.publish_time();
                self.update_chord();
            }
            TransportNotice::Finished => {
                self.mixer.pause_all();
                self.mixer.reset_all();
                self.emit(PlayerEvent::Finished);
                self.emit(PlayerEvent::PlaybackChanged { playing: false });
                self.publish_time();
                self.update_chord();
            }
            TransportNotice::Failed { message } => {
                self.mixer.pause_all();
                self.transport_failed(format!("Could not load audio: {}", message));
            }
        }
    }

    fn transport_failed(&mut self, message: String) {
        log::warn!("[PLAYER] {}", message);
        self.emit(PlayerEvent::TransportFailed {
            message: message.clone(),
        });
        self.emit(PlayerEvent::PlaybackChanged {
            playing: self.transport.is_playing(),
        });
        self.notify(ProgressNotice::failure(message));
    }

    fn report_track_failures(&mut self, failures: Vec<TrackFailure>) {
        for failure in failures {
            self.emit(PlayerEvent::TrackFailed {
                id: failure.id,
                message: failure.message,
            });
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Cursor, chords, notices
    // ─────────────────────────────────────────────────────────────

    /// Playback state on the original timeline
    pub fn playback(&self) -> PlaybackState {
        let state = self.transport.playback_state();
        PlaybackState {
            current_time: self.transport.master_time(),
            duration: state.duration * self.transport.time_scale(),
            is_playing: state.is_playing,
        }
    }

    fn publish_time(&mut self) {
        let playback = self.playback();
        self.emit(PlayerEvent::TimeUpdate {
            time: playback.current_time,
            duration: playback.duration,
        });
    }

    fn update_chord(&mut self) {
        let index = self.chords.index_at(self.transport.master_time());
        if index != self.current_chord {
            self.current_chord = index;
            let chord = index.and_then(|i| self.chords.get(i)).cloned();
            self.emit(PlayerEvent::ChordChanged { index, chord });
        }
    }

    fn notify(&mut self, notice: ProgressNotice) {
        self.notices.post(notice.clone(), Instant::now());
        self.emit(PlayerEvent::Progress(notice));
    }

    fn expire_notices(&mut self, now: Instant) {
        if self.notices.expire(now) {
            self.emit(PlayerEvent::ProgressCleared);
        }
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            playback: self.playback(),
            master: *self.mixing.master(),
            channels: self
                .mixing
                .channels()
                .iter()
                .map(|c| (c.clone(), effective_gain_for(&self.mixing, &c.id)))
                .collect(),
            effect: self.effects.state().clone(),
            chord: self.current_chord.and_then(|i| self.chords.get(i)).cloned(),
            notice: self.notices.current().cloned(),
        }
    }

    fn emit(&self, event: PlayerEvent) {
        publish(&self.events, event);
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::effects::{EffectRequest, RenderError, RenderedAudio};
    use crate::media::fake::FakeBackend;
    use crate::media::MediaEventKind;
    use crate::music::Chord;
    use crate::services::messages::EventBus;
    use crate::types::TrackId;
    use futures_util::future::{BoxFuture, FutureExt};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct CountingRenderer {
        calls: AtomicUsize,
    }

    impl EffectRenderer for CountingRenderer {
        fn render(&self, _request: EffectRequest) -> BoxFuture<'static, Result<RenderedAudio, RenderError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            async move {
                Ok(RenderedAudio {
                    bytes: vec![0; 32],
                    extension: Some("wav".into()),
                })
            }
            .boxed()
        }
    }

    struct Harness {
        player: Player<FakeBackend>,
        backend: FakeBackend,
        renderer: Arc<CountingRenderer>,
        outcomes: mpsc::UnboundedReceiver<RenderOutcome>,
        events: crossbeam::channel::Receiver<PlayerEvent>,
        _bus: EventBus,
    }

    impl Harness {
        fn new() -> Self {
            let backend = FakeBackend::new();
            let renderer = Arc::new(CountingRenderer::default());
            let bus = EventBus::new(4096);
            let (player, outcomes) = Player::new(
                backend.clone(),
                Arc::clone(&renderer) as Arc<dyn EffectRenderer>,
                EngineConfig::default(),
                bus.sender(),
            );
            Self {
                player,
                backend,
                renderer,
                outcomes,
                events: bus.subscribe(),
                _bus: bus,
            }
        }

        fn drain(&self) -> Vec<PlayerEvent> {
            self.events.try_iter().collect()
        }

        fn transport_event(&mut self, load: u64, kind: MediaEventKind) {
            self.player.handle_media_event(MediaEvent {
                key: ElementKey::Transport { load },
                kind,
            });
        }

        /// Load the original and report it ready
        fn load_ready(&mut self, duration: f64) {
            self.player.handle_command(PlayerCommand::LoadSource {
                source: original(),
                effect_source: Some(EffectSource::Upload(PathBuf::from("/music/song.mp3"))),
            });
            self.transport_event(1, MediaEventKind::Ready { duration });
        }
    }

    fn original() -> AudioSource {
        AudioSource::File(PathBuf::from("/music/song.mp3"))
    }

    fn stem(id: &str) -> Track {
        Track::new(id, AudioSource::Url(format!("http://localhost:5000/api/download/song/{}.wav", id)))
    }

    fn track_key(id: &str, instance: u64) -> ElementKey {
        ElementKey::Track {
            id: id.into(),
            instance,
        }
    }

    #[tokio::test]
    async fn test_stems_take_over_output_and_follow_transport() {
        let mut h = Harness::new();
        h.load_ready(200.0);
        let transport_key = ElementKey::Transport { load: 1 };
        assert_eq!(h.backend.state(&transport_key).volume, 1.0);

        h.player.handle_command(PlayerCommand::LoadStems(vec![stem("vocals"), stem("drums")]));
        assert_eq!(h.backend.state(&transport_key).volume, 0.0);

        h.player.handle_command(PlayerCommand::Play);
        assert!(h.backend.state(&transport_key).playing);
        assert!(h.backend.state(&track_key("vocals", 1)).playing);

        h.transport_event(1, MediaEventKind::TimeUpdate { time: 10.0 });
        assert_eq!(h.backend.state(&track_key("drums", 2)).current_time, 10.0);

        h.player.handle_command(PlayerCommand::Pause);
        assert!(!h.backend.state(&track_key("drums", 2)).playing);
        assert!(h.drain().contains(&PlayerEvent::StemsLoaded {
            ids: vec![TrackId::from("vocals"), TrackId::from("drums")]
        }));
    }

    #[tokio::test]
    async fn test_stems_loaded_while_playing_start_at_master_time() {
        let mut h = Harness::new();
        h.load_ready(120.0);
        h.player.handle_command(PlayerCommand::Play);
        h.transport_event(1, MediaEventKind::TimeUpdate { time: 30.0 });

        h.player.handle_command(PlayerCommand::LoadStems(vec![stem("bass")]));
        let bass = h.backend.state(&track_key("bass", 1));
        assert!(bass.playing);
        assert_eq!(bass.current_time, 30.0);
    }

    #[tokio::test]
    async fn test_finish_rewinds_stems() {
        let mut h = Harness::new();
        h.load_ready(60.0);
        h.player.handle_command(PlayerCommand::LoadStems(vec![stem("vocals")]));
        h.player.handle_command(PlayerCommand::Play);
        h.transport_event(1, MediaEventKind::TimeUpdate { time: 59.9 });
        h.drain();

        h.transport_event(1, MediaEventKind::Finished);
        let vocals = h.backend.state(&track_key("vocals", 1));
        assert!(!vocals.playing);
        assert_eq!(vocals.current_time, 0.0);
        assert!(!h.player.playback().is_playing);
        let events = h.drain();
        assert!(events.contains(&PlayerEvent::Finished));
        assert!(events.contains(&PlayerEvent::PlaybackChanged { playing: false }));
    }

    #[tokio::test]
    async fn test_mixing_commands_reach_elements() {
        let mut h = Harness::new();
        h.load_ready(60.0);
        h.player.handle_command(PlayerCommand::LoadStems(vec![stem("vocals"), stem("drums")]));

        h.player.handle_command(PlayerCommand::SetMasterVolume(0.5));
        h.player.handle_command(PlayerCommand::ToggleTrackMute("vocals".into()));
        h.player.handle_command(PlayerCommand::SetTrackVolume {
            id: "drums".into(),
            volume: 0.8,
        });
        assert_eq!(h.backend.state(&track_key("vocals", 1)).volume, 0.0);
        assert!((h.backend.state(&track_key("drums", 2)).volume - 0.4).abs() < 1e-6);

        h.player.handle_command(PlayerCommand::SetTrackSolo {
            id: "vocals".into(),
            solo: true,
        });
        assert_eq!(h.backend.state(&track_key("drums", 2)).volume, 0.0);

        let snapshot = h.player.snapshot();
        assert_eq!(snapshot.master.volume, 0.5);
        assert_eq!(snapshot.channels.len(), 2);
        assert!(snapshot.channels.iter().all(|(_, gain)| *gain == 0.0));
    }

    #[tokio::test]
    async fn test_master_volume_drives_transport_without_stems() {
        let mut h = Harness::new();
        h.load_ready(60.0);
        h.player.handle_command(PlayerCommand::SetMasterVolume(0.3));
        assert!((h.backend.state(&ElementKey::Transport { load: 1 }).volume - 0.3).abs() < 1e-6);

        h.player.handle_command(PlayerCommand::ToggleMasterMute);
        assert!(h.backend.state(&ElementKey::Transport { load: 1 }).muted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pitch_shift_swaps_and_reverts() {
        let mut h = Harness::new();
        h.load_ready(200.0);
        h.player.handle_command(PlayerCommand::Play);
        h.transport_event(1, MediaEventKind::TimeUpdate { time: 100.0 });

        for semitones in [1, 2, 3] {
            h.player.handle_command(PlayerCommand::SetPitch(semitones));
            tokio::time::advance(Duration::from_millis(100)).await;
        }
        let deadline = h.player.effects.deadline().unwrap();
        tokio::time::sleep_until(deadline).await;
        h.player.poll_effects(Instant::now());

        let outcome = h.outcomes.recv().await.unwrap();
        h.player.handle_render_outcome(outcome);
        assert_eq!(h.renderer.calls.load(Ordering::SeqCst), 1);

        // Transport now loading the render, still reported as playing
        let swapped = ElementKey::Transport { load: 2 };
        assert!(matches!(h.backend.state(&swapped).source, Some(AudioSource::File(ref p)) if p != &PathBuf::from("/music/song.mp3")));
        assert!(h.player.playback().is_playing);

        h.transport_event(2, MediaEventKind::Ready { duration: 200.0 });
        let element = h.backend.state(&swapped);
        assert!(element.playing);
        assert_eq!(element.seeks, vec![100.0]);

        h.player.handle_command(PlayerCommand::SetPitch(0));
        let reverted = ElementKey::Transport { load: 3 };
        assert_eq!(h.backend.state(&reverted).source, Some(original()));
        assert!(h.backend.state(&swapped).released);
        assert_eq!(h.renderer.calls.load(Ordering::SeqCst), 1);

        let events = h.drain();
        assert!(events.contains(&PlayerEvent::EffectProcessing));
        assert!(events.contains(&PlayerEvent::EffectApplied {
            pitch_shift: 3,
            playback_rate: 1.0
        }));
        assert!(events.contains(&PlayerEvent::EffectReverted));
    }

    #[tokio::test(start_paused = true)]
    async fn test_seek_during_revert_from_tempo_render() {
        let mut h = Harness::new();
        h.load_ready(200.0);
        h.player.handle_command(PlayerCommand::SetPlaybackRate(2.0));
        h.player.handle_command(PlayerCommand::SetPitch(2));
        let deadline = h.player.effects.deadline().unwrap();
        tokio::time::sleep_until(deadline).await;
        h.player.poll_effects(Instant::now());
        let outcome = h.outcomes.recv().await.unwrap();
        h.player.handle_render_outcome(outcome);

        // The render has the 2x tempo baked in: half as long
        h.transport_event(2, MediaEventKind::Ready { duration: 100.0 });
        h.player.handle_command(PlayerCommand::Seek(100.0));
        assert_eq!(h.backend.state(&ElementKey::Transport { load: 2 }).seeks, vec![50.0]);
        assert_eq!(h.player.playback().current_time, 100.0);

        h.player.handle_command(PlayerCommand::SetPitch(0));
        let playback = h.player.playback();
        assert!((playback.current_time - 100.0).abs() < 1e-9);
        assert!((playback.duration - 200.0).abs() < 1e-9);

        h.player.handle_command(PlayerCommand::Seek(60.0));
        assert!((h.player.playback().current_time - 60.0).abs() < 1e-9);

        h.transport_event(3, MediaEventKind::Ready { duration: 200.0 });
        assert_eq!(h.player.playback().current_time, 60.0);
        assert_eq!(h.backend.state(&ElementKey::Transport { load: 3 }).seeks, vec![60.0]);
    }

    #[tokio::test]
    async fn test_toggle_play_drives_stems() {
        let mut h = Harness::new();
        h.player.handle_command(PlayerCommand::LoadSource {
            source: original(),
            effect_source: None,
        });
        h.player.handle_command(PlayerCommand::TogglePlay);
        assert!(!h.player.playback().is_playing);

        h.transport_event(1, MediaEventKind::Ready { duration: 90.0 });
        h.player.handle_command(PlayerCommand::LoadStems(vec![stem("vocals")]));
        h.drain();

        h.player.handle_command(PlayerCommand::TogglePlay);
        assert!(h.backend.state(&ElementKey::Transport { load: 1 }).playing);
        assert!(h.backend.state(&track_key("vocals", 1)).playing);

        h.player.handle_command(PlayerCommand::TogglePlay);
        assert!(!h.backend.state(&ElementKey::Transport { load: 1 }).playing);
        assert!(!h.backend.state(&track_key("vocals", 1)).playing);
        assert_eq!(
            h.drain(),
            vec![
                PlayerEvent::PlaybackChanged { playing: true },
                PlayerEvent::PlaybackChanged { playing: false },
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_previous_render_kept_until_transport_moves_off() {
        let mut h = Harness::new();
        h.load_ready(200.0);
        h.player.handle_command(PlayerCommand::SetPitch(2));
        let deadline = h.player.effects.deadline().unwrap();
        tokio::time::sleep_until(deadline).await;
        h.player.poll_effects(Instant::now());
        let outcome = h.outcomes.recv().await.unwrap();
        h.player.handle_render_outcome(outcome);

        let rendered = match h.backend.state(&ElementKey::Transport { load: 2 }).source {
            Some(AudioSource::File(path)) => path,
            other => panic!("unexpected {:?}", other),
        };
        assert!(rendered.exists());

        h.player.handle_command(PlayerCommand::SetPitch(0));
        assert!(h.backend.state(&ElementKey::Transport { load: 2 }).released);
        assert!(!rendered.exists());
    }

    #[tokio::test]
    async fn test_rate_change_is_native() {
        let mut h = Harness::new();
        h.load_ready(60.0);
        h.player.handle_command(PlayerCommand::LoadStems(vec![stem("vocals")]));

        h.player.handle_command(PlayerCommand::SetPlaybackRate(1.25));
        assert_eq!(h.backend.state(&ElementKey::Transport { load: 1 }).rate, 1.25);
        assert_eq!(h.backend.state(&track_key("vocals", 1)).rate, 1.25);
        assert!(h.player.effects.deadline().is_none());
        assert_eq!(h.renderer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_chord_changes_published() {
        let mut h = Harness::new();
        h.load_ready(30.0);
        h.player.handle_command(PlayerCommand::SetChords(vec![
            Chord {
                chord: "C".into(),
                start: 0.0,
                end: 2.0,
            },
            Chord {
                chord: "G".into(),
                start: 2.0,
                end: 4.0,
            },
        ]));
        h.drain();

        h.player.handle_command(PlayerCommand::Seek(2.5));
        let events = h.drain();
        assert!(events.iter().any(|e| matches!(
            e,
            PlayerEvent::ChordChanged { index: Some(1), chord: Some(c) } if c.chord == "G"
        )));
        assert_eq!(h.player.snapshot().chord.unwrap().chord, "G");
    }

    #[tokio::test]
    async fn test_transport_error_posts_failure_notice() {
        let mut h = Harness::new();
        h.load_ready(30.0);
        h.transport_event(
            1,
            MediaEventKind::Error {
                message: "corrupt header".into(),
            },
        );
        let notice = h.player.snapshot().notice.unwrap();
        assert!(notice.is_failure());
        assert!(notice.message.contains("corrupt header"));
    }

    #[tokio::test]
    async fn test_reset_releases_everything() {
        let mut h = Harness::new();
        h.load_ready(30.0);
        h.player.handle_command(PlayerCommand::LoadStems(vec![stem("vocals")]));
        h.player.handle_command(PlayerCommand::Reset);

        assert!(h.backend.state(&ElementKey::Transport { load: 1 }).released);
        assert!(h.backend.state(&track_key("vocals", 1)).released);
        assert!(h.player.snapshot().channels.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_loop_expires_notices_and_shuts_down() {
        let backend = FakeBackend::new();
        let bus = EventBus::new(64);
        let events = bus.subscribe();
        let (player, outcomes) = Player::new(
            backend,
            Arc::new(CountingRenderer::default()) as Arc<dyn EffectRenderer>,
            EngineConfig::default(),
            bus.sender(),
        );
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (_media_tx, media_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(player.run(command_rx, media_rx, outcomes));

        command_tx
            .send(PlayerCommand::Notify(ProgressNotice::failure("Separation failed")))
            .unwrap();
        tokio::time::sleep(Duration::from_secs(6)).await;

        let (reply, rx) = tokio::sync::oneshot::channel();
        command_tx.send(PlayerCommand::Snapshot { reply }).unwrap();
        assert!(rx.await.unwrap().notice.is_none());

        command_tx.send(PlayerCommand::Shutdown).unwrap();
        task.await.unwrap();

        let received: Vec<PlayerEvent> = events.try_iter().collect();
        assert!(received.contains(&PlayerEvent::ProgressCleared));
    }
}
