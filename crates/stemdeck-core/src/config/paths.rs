//! Standard locations for stemdeck configuration files

use std::path::PathBuf;

/// Directory holding stemdeck config files
///
/// Returns: `~/.config/stemdeck` (platform config dir), or `./stemdeck`
/// when the platform has none.
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("stemdeck")
}

/// Default path for a config file, e.g. `default_config_path("player.yaml")`
pub fn default_config_path(filename: &str) -> PathBuf {
    default_config_dir().join(filename)
}
