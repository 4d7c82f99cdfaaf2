//! Player events and the handle used to talk to the player task
//!
//! Commands go in over an unbounded tokio channel; events come out over a
//! bounded crossbeam channel so any thread (UI, stdout printer) can consume
//! them without a runtime.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::engine::PlayerCommand;
use crate::music::Chord;
use crate::types::{AudioSource, ProgressNotice, TrackId};

// ============================================================================
// Events (Broadcast)
// ============================================================================

/// Events published by the player loop
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    /// A new master source started loading
    SourceLoading { source: AudioSource },
    /// Master source ready
    Ready { duration: f64 },
    /// Cursor moved (original timeline)
    TimeUpdate { time: f64, duration: f64 },
    PlaybackChanged { playing: bool },
    /// Master reached the end; everything rewound
    Finished,
    /// Master source could not be loaded or played
    TransportFailed { message: String },
    StemsLoaded { ids: Vec<TrackId> },
    TrackFailed { id: TrackId, message: String },
    /// Current chord changed (`None` between chords)
    ChordChanged { index: Option<usize>, chord: Option<Chord> },
    /// A pitch/tempo render is pending
    EffectProcessing,
    /// A render was swapped in
    EffectApplied { pitch_shift: i32, playback_rate: f64 },
    /// Back on the unprocessed source
    EffectReverted,
    Progress(ProgressNotice),
    ProgressCleared,
}

/// Event bus for broadcasting player events
pub struct EventBus {
    sender: crossbeam::channel::Sender<PlayerEvent>,
    receiver: crossbeam::channel::Receiver<PlayerEvent>,
}

impl EventBus {
    /// Create a new event bus with bounded capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = crossbeam::channel::bounded(capacity);
        Self { sender, receiver }
    }

    pub fn sender(&self) -> crossbeam::channel::Sender<PlayerEvent> {
        self.sender.clone()
    }

    pub fn subscribe(&self) -> crossbeam::channel::Receiver<PlayerEvent> {
        self.receiver.clone()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

/// Publish without ever blocking the player loop; events are dropped when
/// nobody keeps up
pub(crate) fn publish(sender: &crossbeam::channel::Sender<PlayerEvent>, event: PlayerEvent) {
    if let Err(e) = sender.try_send(event) {
        log::trace!("[EVENTS] Dropped event: {:?}", e.into_inner());
    }
}

// ============================================================================
// Handle
// ============================================================================

/// Error returned when the player task has stopped
#[derive(Debug, thiserror::Error)]
#[error("Player task is no longer running")]
pub struct PlayerClosed;

/// Handle to a running player task
pub struct PlayerHandle {
    command_tx: mpsc::UnboundedSender<PlayerCommand>,
    events: crossbeam::channel::Receiver<PlayerEvent>,
    task: Option<JoinHandle<()>>,
}

impl PlayerHandle {
    pub fn new(
        command_tx: mpsc::UnboundedSender<PlayerCommand>,
        events: crossbeam::channel::Receiver<PlayerEvent>,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            command_tx,
            events,
            task: Some(task),
        }
    }

    pub fn send(&self, cmd: PlayerCommand) -> Result<(), PlayerClosed> {
        self.command_tx.send(cmd).map_err(|_| PlayerClosed)
    }

    /// Sender usable from other tasks
    pub fn commands(&self) -> mpsc::UnboundedSender<PlayerCommand> {
        self.command_tx.clone()
    }

    pub fn events(&self) -> crossbeam::channel::Receiver<PlayerEvent> {
        self.events.clone()
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().map(|t| !t.is_finished()).unwrap_or(false)
    }

    /// Ask the loop to stop and wait for it
    pub async fn shutdown(mut self) {
        let _ = self.command_tx.send(PlayerCommand::Shutdown);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                log::warn!("[PLAYER] Task ended abnormally: {}", e);
            }
        }
    }
}
