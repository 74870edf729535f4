// ── Retry policy ──
//
// Capped exponential backoff shared by reads (query cache) and writes
// (mutation coordinator). Only the budget differs.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt, for retryable errors.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    /// Reads: two retries, 1 s base, 30 s cap.
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Writes: a single retry.
    pub fn mutations() -> Self {
        Self {
            max_retries: 1,
            ..Self::default()
        }
    }

    /// No retries at all.
    pub fn never() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// `min(base * 2^attempt, cap)`, attempt counted from zero.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }

    /// Whether another attempt is allowed after `failures` failed ones.
    pub fn should_retry(&self, failures: u32, error: &CoreError) -> bool {
        error.is_retryable() && failures < self.max_retries
    }
}

/// Run `op` until it succeeds or the policy gives up.
///
/// `op` is invoked at most `1 + max_retries` times, and exactly once when
/// the first error is not retryable.
pub async fn retry_with<T, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut op: F,
) -> Result<T, CoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CoreError>>,
{
    let mut failures = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                if !policy.should_retry(failures, &error) {
                    if failures > 0 || error.is_retryable() {
                        warn!(%label, attempts = failures + 1, error = %error, "giving up");
                    } else {
                        debug!(%label, error = %error, "not retrying");
                    }
                    return Err(error);
                }
                let delay = policy.delay_for(failures);
                debug!(
                    %label,
                    attempt = failures + 1,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %error,
                    "retrying after backoff"
                );
                tokio::time::sleep(delay).await;
                failures += 1;
            }
        }
    }
}
