//! Playback engine
//!
//! - [`Transport`]: the master resource and clock
//! - [`TrackMixer`]: stem elements, gains and drift correction
//! - [`EffectsProcessor`]: debounced remote pitch/tempo renders with hot swap
//! - [`Player`]: the event loop tying them together

mod command;
mod effects;
mod mixing;
mod notice;
mod player;
mod track_mixer;
mod transport;

pub use command::{PlayerCommand, PlayerSnapshot};
pub use effects::{
    EffectAction, EffectPhase, EffectRenderer, EffectRequest, EffectSource, EffectsProcessor, ProcessedAudio,
    RenderError, RenderOutcome, RenderedAudio,
};
pub use mixing::{ChannelMix, MixingState};
pub use notice::NoticeBoard;
pub use player::Player;
pub use track_mixer::{effective_gain, effective_gain_for, TrackFailure, TrackMixer, TrackSetChange};
pub use transport::{Transport, TransportNotice};
