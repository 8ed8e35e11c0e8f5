//! Retry with exponential backoff for remote requests.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// How many times a failed request is repeated and how long to wait between
/// attempts. The delay starts at `base_delay` and is multiplied by
/// `backoff_factor` after every attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub backoff_factor: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_secs(1),
            backoff_factor: 2,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (zero-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay
            .saturating_mul(self.backoff_factor.saturating_pow(retry))
    }
}

pub trait RetryableError {
    fn is_retryable(&self) -> bool;
}

/// Run `f` until it succeeds, fails with a non-retryable error, or the policy
/// runs out of retries. The last error is returned unchanged.
pub async fn retry<F, Fut, T, E>(policy: &RetryPolicy, target: &str, mut f: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: RetryableError + std::fmt::Display,
{
    let mut retries = 0;

    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(err) if !err.is_retryable() || retries >= policy.max_retries => return Err(err),
            Err(err) => {
                let delay = policy.delay_for(retries);
                retries += 1;
                warn!(
                    target_url = %target,
                    error = %err,
                    attempt = retries,
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    "Request failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
