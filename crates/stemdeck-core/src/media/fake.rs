//! Recording media backend for engine tests

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{ElementKey, MediaBackend, MediaElement, MediaError, MediaResult};
use crate::types::AudioSource;

#[derive(Debug, Clone, Default)]
pub struct FakeState {
    pub source: Option<AudioSource>,
    pub playing: bool,
    pub current_time: f64,
    pub volume: f32,
    pub muted: bool,
    pub rate: f64,
    pub released: bool,
    pub play_calls: usize,
    pub seeks: Vec<f64>,
}

pub struct FakeElement {
    state: Arc<Mutex<FakeState>>,
    fail_play: bool,
}

impl MediaElement for FakeElement {
    fn play(&mut self) -> MediaResult<()> {
        let mut state = self.state.lock().unwrap();
        state.play_calls += 1;
        if state.released {
            return Err(MediaError::Released);
        }
        if self.fail_play {
            return Err(MediaError::Playback("device busy".to_string()));
        }
        state.playing = true;
        Ok(())
    }

    fn pause(&mut self) {
        self.state.lock().unwrap().playing = false;
    }

    fn current_time(&self) -> f64 {
        self.state.lock().unwrap().current_time
    }

    fn set_current_time(&mut self, seconds: f64) {
        let mut state = self.state.lock().unwrap();
        state.current_time = seconds;
        state.seeks.push(seconds);
    }

    fn set_volume(&mut self, volume: f32) {
        self.state.lock().unwrap().volume = volume;
    }

    fn set_muted(&mut self, muted: bool) {
        self.state.lock().unwrap().muted = muted;
    }

    fn set_playback_rate(&mut self, rate: f64) {
        self.state.lock().unwrap().rate = rate;
    }

    fn release(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.released = true;
        state.playing = false;
    }
}

/// Backend handing out [`FakeElement`]s whose state the test can inspect
#[derive(Clone, Default)]
pub struct FakeBackend {
    created: Arc<Mutex<Vec<(ElementKey, Arc<Mutex<FakeState>>)>>>,
    failing_sources: Arc<Mutex<HashSet<AudioSource>>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Elements created for `source` will refuse to play
    pub fn fail_play_for(&self, source: AudioSource) {
        self.failing_sources.lock().unwrap().insert(source);
    }

    pub fn created_count(&self) -> usize {
        self.created.lock().unwrap().len()
    }

    /// Keys in creation order
    pub fn keys(&self) -> Vec<ElementKey> {
        self.created.lock().unwrap().iter().map(|(k, _)| k.clone()).collect()
    }

    /// Snapshot of the element created under `key`
    pub fn state(&self, key: &ElementKey) -> FakeState {
        self.handle(key).lock().unwrap().clone()
    }

    /// Mutate an element's state directly (e.g. to simulate drift)
    pub fn with_state<R>(&self, key: &ElementKey, f: impl FnOnce(&mut FakeState) -> R) -> R {
        let handle = self.handle(key);
        let mut guard: MutexGuard<'_, FakeState> = handle.lock().unwrap();
        f(&mut guard)
    }

    /// Most recently created element key
    pub fn last_key(&self) -> ElementKey {
        self.created.lock().unwrap().last().map(|(k, _)| k.clone()).expect("no elements created")
    }

    fn handle(&self, key: &ElementKey) -> Arc<Mutex<FakeState>> {
        self.created
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, state)| Arc::clone(state))
            .unwrap_or_else(|| panic!("no element created for {:?}", key))
    }
}

impl MediaBackend for FakeBackend {
    fn create(&mut self, key: ElementKey, source: &AudioSource) -> Box<dyn MediaElement> {
        let state = Arc::new(Mutex::new(FakeState {
            source: Some(source.clone()),
            volume: 1.0,
            rate: 1.0,
            ..FakeState::default()
        }));
        self.created.lock().unwrap().push((key, Arc::clone(&state)));
        let fail_play = self.failing_sources.lock().unwrap().contains(source);
        Box::new(FakeElement { state, fail_play })
    }
}
