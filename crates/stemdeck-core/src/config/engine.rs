//! Engine timing configuration
//!
//! Tolerances and timers used by the player loop. All values have defaults
//! matching the behavior listeners expect; the YAML file only needs to carry
//! overrides.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::types::{EFFECT_DEBOUNCE, SYNC_EPSILON_SECS};

/// Engine configuration (the `engine:` section of the player config)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum stem drift in seconds before a forced resync
    /// Default: 0.15
    pub sync_tolerance_secs: f64,

    /// Quiet period before a pitch/tempo change is sent for rendering
    /// Default: 500 ms
    pub effect_debounce_ms: u64,

    /// Cadence of time-update events from the headless backend
    /// Default: 250 ms
    pub time_update_interval_ms: u64,

    /// Initial master volume (0.0 - 1.0)
    pub default_master_volume: f32,

    /// How long a completed progress notice stays visible
    pub success_notice_secs: f64,

    /// How long a failure notice stays visible
    pub failure_notice_secs: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sync_tolerance_secs: SYNC_EPSILON_SECS,
            effect_debounce_ms: EFFECT_DEBOUNCE.as_millis() as u64,
            time_update_interval_ms: 250,
            default_master_volume: 1.0,
            success_notice_secs: 2.0,
            failure_notice_secs: 5.0,
        }
    }
}

impl EngineConfig {
    /// Clamp every field into its usable range
    pub fn validate(&mut self) {
        if !self.sync_tolerance_secs.is_finite() {
            self.sync_tolerance_secs = SYNC_EPSILON_SECS;
        }
        self.sync_tolerance_secs = self.sync_tolerance_secs.clamp(0.01, 2.0);
        self.effect_debounce_ms = self.effect_debounce_ms.clamp(50, 5_000);
        self.time_update_interval_ms = self.time_update_interval_ms.clamp(10, 1_000);
        if !self.default_master_volume.is_finite() {
            self.default_master_volume = 1.0;
        }
        self.default_master_volume = self.default_master_volume.clamp(0.0, 1.0);
        self.success_notice_secs = sanitize_secs(self.success_notice_secs, 2.0);
        self.failure_notice_secs = sanitize_secs(self.failure_notice_secs, 5.0);
    }

    pub fn effect_debounce(&self) -> Duration {
        Duration::from_millis(self.effect_debounce_ms)
    }

    pub fn time_update_interval(&self) -> Duration {
        Duration::from_millis(self.time_update_interval_ms)
    }

    pub fn success_notice(&self) -> Duration {
        Duration::from_secs_f64(self.success_notice_secs)
    }

    pub fn failure_notice(&self) -> Duration {
        Duration::from_secs_f64(self.failure_notice_secs)
    }
}

fn sanitize_secs(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.1, 60.0)
    } else {
        fallback
    }
}
