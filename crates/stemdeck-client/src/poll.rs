//! Job progress polling
//!
//! Polls at a fixed interval until the job completes (`percentage >= 100`)
//! or fails terminally (`step == -1`). Request errors are tolerated up to a
//! number of consecutive failures; any success resets the count.

use std::future::Future;
use std::time::Duration;

use stemdeck_core::MAX_POLL_FAILURES;

use crate::error::{ClientError, ClientResult};
use crate::types::ProgressData;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_consecutive_failures: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(300),
            max_consecutive_failures: MAX_POLL_FAILURES,
        }
    }
}

/// Poll `fetch` until the job finishes
///
/// `on_update` sees every successfully fetched progress, including the final one.
pub async fn poll_until_done<F, Fut, U>(policy: PollPolicy, mut fetch: F, mut on_update: U) -> ClientResult<ProgressData>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ClientResult<ProgressData>>,
    U: FnMut(&ProgressData),
{
    let mut failures = 0u32;

    loop {
        tokio::time::sleep(policy.interval).await;

        match fetch().await {
            Ok(progress) => {
                failures = 0;
                on_update(&progress);
                if progress.is_complete() {
                    return Ok(progress);
                }
                if progress.is_failed() {
                    return Err(ClientError::JobFailed(progress.message));
                }
            }
            Err(e) => {
                failures += 1;
                log::warn!(
                    "[POLL] Progress request failed ({}/{}): {}",
                    failures,
                    policy.max_consecutive_failures,
                    e
                );
                if failures >= policy.max_consecutive_failures {
                    return Err(ClientError::TooManyFailures {
                        attempts: failures,
                        last: e.to_string(),
                    });
                }
            }
        }
    }
}
