//! Service connection settings (the `service:` section of the player config)

use serde::{Deserialize, Serialize};
use std::time::Duration;

use stemdeck_core::MAX_POLL_FAILURES;

use crate::poll::PollPolicy;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Base URL of the analysis service (routes live under `/api`)
    /// Default: http://localhost:5000
    pub base_url: String,

    /// Progress polling interval
    /// Default: 300 ms
    pub poll_interval_ms: u64,

    /// Consecutive failed progress requests before polling gives up
    /// Default: 5
    pub max_consecutive_failures: u32,

    /// Per-request timeout; separation uploads can be large
    /// Default: 300 s
    pub request_timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            poll_interval_ms: 300,
            max_consecutive_failures: MAX_POLL_FAILURES,
            request_timeout_secs: 300,
        }
    }
}

impl ServiceConfig {
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(self.poll_interval_ms.max(10)),
            max_consecutive_failures: self.max_consecutive_failures.max(1),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}
