//! Effects processor - debounced remote pitch/tempo rendering
//!
//! Tempo alone is a native rate change and never leaves the process. Pitch
//! needs a remote render:
//!
//! ```text
//! Idle ──change──▶ Debouncing ──quiet period──▶ Requesting ──result──▶ Applying ──▶ Idle
//!                      ▲                            │                     │
//!                      └────────── new change ──────┴─────────────────────┘
//! ```
//!
//! Every dispatched request gets a new generation number. A new change
//! aborts the in-flight request at once, and any result whose generation is
//! not current is dropped. Returning pitch to 0 reverts synchronously with
//! no network call.
//!
//! At most one rendered resource (a temp file) is retained. It is deleted
//! when replaced, on revert, on a new source, and on drop.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use tempfile::TempPath;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::types::{clamp_pitch, clamp_rate, AudioSource, EffectState};

/// Audio the render service should process
#[derive(Debug, Clone, PartialEq)]
pub enum EffectSource {
    /// Local file, uploaded as-is
    Upload(PathBuf),
    /// Remote stem, fetched and re-uploaded under `filename`
    Remote { url: String, filename: String },
}

/// One render request
#[derive(Debug, Clone, PartialEq)]
pub struct EffectRequest {
    pub source: EffectSource,
    pub pitch_shift: i32,
    pub time_stretch: f64,
}

/// Raw rendered audio returned by the service
#[derive(Debug, Clone)]
pub struct RenderedAudio {
    pub bytes: Vec<u8>,
    /// Container extension, used as the temp file suffix
    pub extension: Option<String>,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    #[error("Render request failed: {0}")]
    Request(String),

    #[error("Render service rejected the request: {0}")]
    Rejected(String),

    #[error("Failed to store rendered audio: {0}")]
    Storage(String),
}

/// Remote renderer seam
pub trait EffectRenderer: Send + Sync {
    fn render(&self, request: EffectRequest) -> BoxFuture<'static, Result<RenderedAudio, RenderError>>;
}

/// A rendered resource on disk; the file is deleted on drop
#[derive(Debug)]
pub struct ProcessedAudio {
    path: TempPath,
    pitch_shift: i32,
    rendered_rate: f64,
}

impl ProcessedAudio {
    pub fn source(&self) -> AudioSource {
        AudioSource::File(self.path.to_path_buf())
    }

    pub fn pitch_shift(&self) -> i32 {
        self.pitch_shift
    }

    /// Tempo baked into the render
    pub fn rendered_rate(&self) -> f64 {
        self.rendered_rate
    }
}

/// Completion of a dispatched render
#[derive(Debug)]
pub struct RenderOutcome {
    pub generation: u64,
    pub result: Result<ProcessedAudio, RenderError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectPhase {
    Idle,
    Debouncing,
    Requesting,
    Applying,
}

/// What the player must do after an effects transition
#[derive(Debug, Clone, PartialEq)]
pub enum EffectAction {
    None,
    /// Put the transport back on the unprocessed source
    Revert,
    /// Hot swap the transport onto a fresh render
    Swap { source: AudioSource, rendered_rate: f64 },
    /// Render failed; current audio is untouched
    Failed { message: String },
}

pub struct EffectsProcessor {
    state: EffectState,
    phase: EffectPhase,
    debounce: Duration,
    deadline: Option<Instant>,
    source: Option<EffectSource>,
    renderer: Arc<dyn EffectRenderer>,
    in_flight: Option<JoinHandle<()>>,
    processed: Option<ProcessedAudio>,
    /// Render the transport may still be playing until the next swap lands
    retired: Option<ProcessedAudio>,
    outcome_tx: mpsc::UnboundedSender<RenderOutcome>,
}

impl EffectsProcessor {
    /// Create the processor and the channel its render outcomes arrive on
    pub fn new(
        renderer: Arc<dyn EffectRenderer>,
        debounce: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<RenderOutcome>) {
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        let processor = Self {
            state: EffectState::default(),
            phase: EffectPhase::Idle,
            debounce,
            deadline: None,
            source: None,
            renderer,
            in_flight: None,
            processed: None,
            retired: None,
            outcome_tx,
        };
        (processor, outcome_rx)
    }

    pub fn state(&self) -> &EffectState {
        &self.state
    }

    pub fn phase(&self) -> EffectPhase {
        self.phase
    }

    /// When the pending debounce expires
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn processed(&self) -> Option<&ProcessedAudio> {
        self.processed.as_ref()
    }

    /// Audio to render from; a new source resets pitch and tempo
    pub fn set_source(&mut self, source: Option<EffectSource>) {
        self.teardown();
        let generation = self.state.generation;
        self.state = EffectState {
            generation,
            ..EffectState::default()
        };
        self.source = source;
    }

    pub fn set_pitch(&mut self, semitones: i32, now: Instant) -> EffectAction {
        self.state.pitch_shift_semitones = clamp_pitch(semitones);
        self.on_change(now)
    }

    /// Update the tempo. The caller applies it natively right away; a render
    /// is only needed while pitch is shifted.
    pub fn set_playback_rate(&mut self, rate: f64, now: Instant) -> EffectAction {
        let rate = clamp_rate(rate);
        if rate == self.state.playback_rate {
            return EffectAction::None;
        }
        self.state.playback_rate = rate;
        if self.state.pitch_shift_semitones == 0 {
            return EffectAction::None;
        }
        self.on_change(now)
    }

    fn on_change(&mut self, now: Instant) -> EffectAction {
        if self.source.is_none() {
            log::debug!("[FX] No source loaded, nothing to render");
            return EffectAction::None;
        }

        if self.state.pitch_shift_semitones == 0 {
            let retired = self.processed.take();
            self.teardown();
            self.retired = retired;
            log::info!("[FX] Pitch back to 0, reverting to original");
            return EffectAction::Revert;
        }

        self.cancel_in_flight();
        self.deadline = Some(now + self.debounce);
        self.phase = EffectPhase::Debouncing;
        self.state.processing = true;
        EffectAction::None
    }

    /// Dispatch the render if the debounce has expired at `now`
    pub fn poll_debounce(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                self.dispatch();
                true
            }
            _ => false,
        }
    }

    fn dispatch(&mut self) {
        let Some(source) = self.source.clone() else {
            self.phase = EffectPhase::Idle;
            self.state.processing = false;
            return;
        };

        self.cancel_in_flight();
        self.state.generation += 1;
        let generation = self.state.generation;
        let pitch_shift = self.state.pitch_shift_semitones;
        let time_stretch = self.state.playback_rate;
        let request = EffectRequest {
            source,
            pitch_shift,
            time_stretch,
        };

        log::info!(
            "[FX] Render #{}: pitch {:+} st, rate {:.2}x",
            generation,
            pitch_shift,
            time_stretch
        );

        let renderer = Arc::clone(&self.renderer);
        let outcome_tx = self.outcome_tx.clone();
        let task = tokio::spawn(async move {
            let result = match renderer.render(request).await {
                Ok(audio) => store_rendered(audio, pitch_shift, time_stretch).await,
                Err(e) => Err(e),
            };
            let _ = outcome_tx.send(RenderOutcome { generation, result });
        });

        self.in_flight = Some(task);
        self.phase = EffectPhase::Requesting;
    }

    /// Apply a render outcome; stale generations are dropped silently
    pub fn handle_outcome(&mut self, outcome: RenderOutcome) -> EffectAction {
        if outcome.generation != self.state.generation || self.phase != EffectPhase::Requesting {
            log::debug!(
                "[FX] Dropping stale render #{} (current #{})",
                outcome.generation,
                self.state.generation
            );
            return EffectAction::None;
        }
        self.in_flight = None;

        match outcome.result {
            Ok(processed) => {
                let source = processed.source();
                let rendered_rate = processed.rendered_rate();
                self.retired = self.processed.replace(processed);
                self.state.result_source = Some(source.clone());
                self.phase = EffectPhase::Applying;
                EffectAction::Swap { source, rendered_rate }
            }
            Err(e) => {
                log::warn!("[FX] Render #{} failed: {}", outcome.generation, e);
                self.phase = EffectPhase::Idle;
                self.state.processing = false;
                EffectAction::Failed { message: e.to_string() }
            }
        }
    }

    /// The transport has moved off the previous render; it is deleted here
    pub fn finish_apply(&mut self) {
        self.retired = None;
        if self.phase == EffectPhase::Applying {
            self.phase = EffectPhase::Idle;
            self.state.processing = false;
        }
    }

    /// Cancel everything and release the retained render
    pub fn teardown(&mut self) {
        self.cancel_in_flight();
        self.deadline = None;
        self.processed = None;
        self.retired = None;
        self.state.result_source = None;
        self.state.processing = false;
        self.phase = EffectPhase::Idle;
    }

    fn cancel_in_flight(&mut self) {
        if let Some(task) = self.in_flight.take() {
            log::debug!("[FX] Aborting in-flight render #{}", self.state.generation);
            task.abort();
        }
    }
}

impl Drop for EffectsProcessor {
    fn drop(&mut self) {
        self.cancel_in_flight();
    }
}

async fn store_rendered(
    audio: RenderedAudio,
    pitch_shift: i32,
    rendered_rate: f64,
) -> Result<ProcessedAudio, RenderError> {
    tokio::task::spawn_blocking(move || {
        let suffix = format!(".{}", audio.extension.as_deref().unwrap_or("wav"));
        let mut file = tempfile::Builder::new()
            .prefix("stemdeck-fx-")
            .suffix(&suffix)
            .tempfile()
            .map_err(|e| RenderError::Storage(e.to_string()))?;
        file.write_all(&audio.bytes)
            .and_then(|_| file.flush())
            .map_err(|e| RenderError::Storage(e.to_string()))?;
        Ok(ProcessedAudio {
            path: file.into_temp_path(),
            pitch_shift,
            rendered_rate,
        })
    })
    .await
    .map_err(|e| RenderError::Storage(e.to_string()))?
}
