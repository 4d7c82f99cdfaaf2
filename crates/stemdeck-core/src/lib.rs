//! Stemdeck Core - stem playback engine for the analysis player
//!
//! Keeps any number of separated stems in sync with one master transport,
//! mixes them under master/track volume, mute and solo, and hot-swaps the
//! master resource when a remote pitch/tempo render completes.

pub mod config;
pub mod engine;
pub mod media;
pub mod music;
pub mod services;
pub mod types;

pub use types::*;
