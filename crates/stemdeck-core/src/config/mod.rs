//! Shared configuration utilities for stemdeck applications
//!
//! - Generic YAML config loading/saving
//! - Config file locations
//! - Engine timing and notice configuration
//!
//! # Usage
//!
//! ```ignore
//! use stemdeck_core::config::{load_config, save_config, default_config_path};
//!
//! let path = default_config_path("player.yaml");
//! let config: MyAppConfig = load_config(&path);
//! save_config(&config, &path)?;
//! ```

mod engine;
mod io;
mod paths;

pub use engine::EngineConfig;
pub use io::{load_config, save_config};
pub use paths::{default_config_dir, default_config_path};
