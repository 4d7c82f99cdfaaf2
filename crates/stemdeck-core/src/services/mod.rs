//! Player task wiring
//!
//! Spawns the [`Player`](crate::engine::Player) loop on the current tokio
//! runtime and hands back a [`PlayerHandle`] for commands and events.

pub mod messages;

pub use messages::{EventBus, PlayerClosed, PlayerEvent, PlayerHandle};

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::EngineConfig;
use crate::engine::{EffectRenderer, Player};
use crate::media::{HeadlessBackend, MediaBackend, MediaEvent, SourceFetcher};

/// Spawn a player over `backend`; `media_events` must be the receiving end
/// of the channel the backend reports on
pub fn spawn_player<B>(
    backend: B,
    media_events: mpsc::UnboundedReceiver<MediaEvent>,
    renderer: Arc<dyn EffectRenderer>,
    config: EngineConfig,
) -> PlayerHandle
where
    B: MediaBackend + 'static,
{
    let bus = EventBus::default();
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (player, outcomes) = Player::new(backend, renderer, config, bus.sender());
    let task = tokio::spawn(player.run(command_rx, media_events, outcomes));
    PlayerHandle::new(command_tx, bus.subscribe(), task)
}

/// Spawn a player on the headless backend
pub fn spawn_headless(
    config: EngineConfig,
    renderer: Arc<dyn EffectRenderer>,
    fetcher: Option<Arc<dyn SourceFetcher>>,
) -> PlayerHandle {
    let (media_tx, media_rx) = mpsc::unbounded_channel();
    let mut backend = HeadlessBackend::new(media_tx, config.time_update_interval());
    if let Some(fetcher) = fetcher {
        backend = backend.with_fetcher(fetcher);
    }
    spawn_player(backend, media_rx, renderer, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EffectRequest, PlayerCommand, RenderError, RenderedAudio};
    use crate::media::probe::tests::wav_bytes;
    use crate::types::AudioSource;
    use futures_util::future::{BoxFuture, FutureExt};
    use std::time::Duration;

    struct OfflineRenderer;

    impl EffectRenderer for OfflineRenderer {
        fn render(&self, _request: EffectRequest) -> BoxFuture<'static, Result<RenderedAudio, RenderError>> {
            async { Err(RenderError::Request("offline".into())) }.boxed()
        }
    }

    async fn wait_for(
        events: &crossbeam::channel::Receiver<PlayerEvent>,
        pred: impl Fn(&PlayerEvent) -> bool,
    ) -> PlayerEvent {
        for _ in 0..300 {
            if let Some(event) = events.try_iter().find(|e| pred(e)) {
                return event;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("event never arrived");
    }

    #[tokio::test]
    async fn test_headless_player_plays_file_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("song.wav");
        std::fs::write(&path, wav_bytes(8_000, 2_400)).unwrap();

        let config = EngineConfig {
            time_update_interval_ms: 20,
            ..EngineConfig::default()
        };
        let handle = spawn_headless(config, Arc::new(OfflineRenderer), None);
        let events = handle.events();

        handle
            .send(PlayerCommand::LoadSource {
                source: AudioSource::File(path),
                effect_source: None,
            })
            .unwrap();
        match wait_for(&events, |e| matches!(e, PlayerEvent::Ready { .. })).await {
            PlayerEvent::Ready { duration } => assert!((duration - 0.3).abs() < 1e-6),
            _ => unreachable!(),
        }

        handle.send(PlayerCommand::Play).unwrap();
        wait_for(&events, |e| *e == PlayerEvent::Finished).await;

        assert!(handle.is_running());
        handle.shutdown().await;
    }
}
