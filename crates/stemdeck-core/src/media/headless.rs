//! Headless media backend
//!
//! Elements play against a virtual clock instead of an audio device. Each
//! element owns a driver task that:
//!
//! 1. Resolves the source (file on disk, or bytes via a [`SourceFetcher`])
//! 2. Probes the duration on the blocking pool
//! 3. Emits `Ready`, then `TimeUpdate` every tick while playing, then `Finished`
//!
//! Clock state lives behind a mutex shared with the driver. Critical sections
//! never span an await point.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::error::{MediaError, MediaResult};
use super::probe;
use super::{ElementKey, MediaBackend, MediaElement, MediaEvent, MediaEventKind, SourceFetcher};
use crate::types::AudioSource;

#[derive(Debug)]
struct Clock {
    duration: Option<f64>,
    /// Position at `anchor`
    position: f64,
    anchor: Instant,
    playing: bool,
    rate: f64,
    released: bool,
}

impl Clock {
    fn new() -> Self {
        Self {
            duration: None,
            position: 0.0,
            anchor: Instant::now(),
            playing: false,
            rate: 1.0,
            released: false,
        }
    }

    /// The clock only runs once the duration is known
    fn position_at(&self, now: Instant) -> f64 {
        match self.duration {
            Some(duration) if self.playing => {
                let elapsed = now.saturating_duration_since(self.anchor).as_secs_f64() * self.rate;
                (self.position + elapsed).min(duration)
            }
            _ => self.position,
        }
    }

    fn reanchor(&mut self, now: Instant) {
        self.position = self.position_at(now);
        self.anchor = now;
    }
}

fn lock(clock: &Mutex<Clock>) -> MutexGuard<'_, Clock> {
    clock.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Media element backed by a virtual clock
pub struct HeadlessElement {
    clock: Arc<Mutex<Clock>>,
    driver: Option<JoinHandle<()>>,
}

impl HeadlessElement {
    /// Create the element and start its driver task
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        key: ElementKey,
        source: AudioSource,
        events: mpsc::UnboundedSender<MediaEvent>,
        fetcher: Option<Arc<dyn SourceFetcher>>,
        tick: Duration,
    ) -> Self {
        let clock = Arc::new(Mutex::new(Clock::new()));
        let driver = tokio::spawn(drive(key, source, Arc::clone(&clock), events, fetcher, tick));
        Self {
            clock,
            driver: Some(driver),
        }
    }

    #[cfg(test)]
    fn duration(&self) -> Option<f64> {
        lock(&self.clock).duration
    }

    #[cfg(test)]
    fn is_playing(&self) -> bool {
        lock(&self.clock).playing
    }
}

impl MediaElement for HeadlessElement {
    fn play(&mut self) -> MediaResult<()> {
        let mut clock = lock(&self.clock);
        if clock.released {
            return Err(MediaError::Released);
        }
        let now = Instant::now();
        clock.reanchor(now);
        // Playing from the end restarts from the top
        if let Some(duration) = clock.duration {
            if clock.position >= duration {
                clock.position = 0.0;
            }
        }
        clock.playing = true;
        Ok(())
    }

    fn pause(&mut self) {
        let mut clock = lock(&self.clock);
        clock.reanchor(Instant::now());
        clock.playing = false;
    }

    fn current_time(&self) -> f64 {
        lock(&self.clock).position_at(Instant::now())
    }

    fn set_current_time(&mut self, seconds: f64) {
        let mut clock = lock(&self.clock);
        let mut target = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
        if let Some(duration) = clock.duration {
            target = target.min(duration);
        }
        clock.position = target;
        clock.anchor = Instant::now();
    }

    // No output device; gain only matters to real backends
    fn set_volume(&mut self, volume: f32) {
        log::trace!("[MEDIA] volume {:.2}", volume);
    }

    fn set_muted(&mut self, muted: bool) {
        log::trace!("[MEDIA] muted {}", muted);
    }

    fn set_playback_rate(&mut self, rate: f64) {
        let mut clock = lock(&self.clock);
        clock.reanchor(Instant::now());
        clock.rate = if rate.is_finite() && rate > 0.0 { rate } else { 1.0 };
    }

    fn release(&mut self) {
        {
            let mut clock = lock(&self.clock);
            clock.released = true;
            clock.playing = false;
        }
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
    }
}

impl Drop for HeadlessElement {
    fn drop(&mut self) {
        self.release();
    }
}

async fn drive(
    key: ElementKey,
    source: AudioSource,
    clock: Arc<Mutex<Clock>>,
    events: mpsc::UnboundedSender<MediaEvent>,
    fetcher: Option<Arc<dyn SourceFetcher>>,
    tick: Duration,
) {
    let duration = match resolve_duration(&source, fetcher).await {
        Ok(duration) => duration,
        Err(e) => {
            log::warn!("[MEDIA] {:?}: failed to load {}: {}", key, source, e);
            let _ = events.send(MediaEvent {
                key,
                kind: MediaEventKind::Error {
                    message: e.to_string(),
                },
            });
            return;
        }
    };

    {
        let mut clock = lock(&clock);
        if clock.released {
            return;
        }
        clock.duration = Some(duration);
        clock.position = clock.position.min(duration);
        clock.anchor = Instant::now();
    }

    log::debug!("[MEDIA] {:?}: ready ({:.2}s)", key, duration);
    if events
        .send(MediaEvent {
            key: key.clone(),
            kind: MediaEventKind::Ready { duration },
        })
        .is_err()
    {
        return;
    }

    let mut ticker = tokio::time::interval_at(Instant::now() + tick, tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let kind = {
            let mut clock = lock(&clock);
            if clock.released {
                break;
            }
            if !clock.playing {
                continue;
            }
            let now = Instant::now();
            let position = clock.position_at(now);
            if position >= duration {
                clock.position = duration;
                clock.anchor = now;
                clock.playing = false;
                MediaEventKind::Finished
            } else {
                MediaEventKind::TimeUpdate { time: position }
            }
        };

        if events.send(MediaEvent { key: key.clone(), kind }).is_err() {
            break;
        }
    }
}

async fn resolve_duration(
    source: &AudioSource,
    fetcher: Option<Arc<dyn SourceFetcher>>,
) -> MediaResult<f64> {
    let probe_failed = |e: tokio::task::JoinError| MediaError::UnsupportedFormat(format!("probe task failed: {}", e));

    match source {
        AudioSource::File(path) => {
            let path = path.clone();
            tokio::task::spawn_blocking(move || probe::probe_file(&path))
                .await
                .map_err(probe_failed)?
        }
        AudioSource::Url(url) => {
            let fetcher = fetcher.ok_or_else(|| MediaError::NoFetcher(url.clone()))?;
            let bytes = fetcher.fetch(url).await?;
            let ext = source.extension();
            tokio::task::spawn_blocking(move || probe::probe_bytes(bytes, ext.as_deref()))
                .await
                .map_err(probe_failed)?
        }
    }
}

/// Backend producing [`HeadlessElement`]s
pub struct HeadlessBackend {
    events: mpsc::UnboundedSender<MediaEvent>,
    fetcher: Option<Arc<dyn SourceFetcher>>,
    tick: Duration,
}

impl HeadlessBackend {
    /// `tick` is the time-update cadence while playing
    pub fn new(events: mpsc::UnboundedSender<MediaEvent>, tick: Duration) -> Self {
        Self {
            events,
            fetcher: None,
            tick,
        }
    }

    /// Enable URL sources
    pub fn with_fetcher(mut self, fetcher: Arc<dyn SourceFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }
}

impl MediaBackend for HeadlessBackend {
    fn create(&mut self, key: ElementKey, source: &AudioSource) -> Box<dyn MediaElement> {
        log::debug!("[MEDIA] create {:?} <- {}", key, source);
        Box::new(HeadlessElement::spawn(
            key,
            source.clone(),
            self.events.clone(),
            self.fetcher.clone(),
            self.tick,
        ))
    }
}
