//! Player configuration for stemdeck-player
//!
//! Configuration is stored as YAML in the user's config directory.
//! Default location: ~/.config/stemdeck/player.yaml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use stemdeck_client::{QualityMode, ServiceConfig, StemsMode};
use stemdeck_core::config::{default_config_path, EngineConfig};

pub const CONFIG_FILENAME: &str = "player.yaml";

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Sync tolerance, debounce and notice timers
    pub engine: EngineConfig,
    /// Analysis service connection
    pub service: ServiceConfig,
    /// Defaults for new separation jobs
    pub separation: SeparationConfig,
}

/// Separation defaults, overridable per run with `--stems` / `--quality`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeparationConfig {
    pub stems_mode: StemsMode,
    pub quality_mode: QualityMode,
}

impl PlayerConfig {
    pub fn validate(&mut self) {
        self.engine.validate();
    }
}

pub fn default_config_file() -> PathBuf {
    default_config_path(CONFIG_FILENAME)
}
