//! Bounded retry for outbound service calls
//!
//! Transiently failed calls are retried a fixed number of times with a
//! fixed interval between attempts, per the `[client]` configuration.
//! Non-retryable errors surface immediately.

use std::future::Future;
use std::time::Duration;
use stockpile_common::Result;
use stockpile_common::config::ClientConfig;
use tokio::time::sleep;
use tracing::{info, warn};

/// Retry policy for a single outbound call
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// Total attempts per call, including the first; clamped to at least 1
    pub max_attempts: u32,
    /// Fixed delay between attempts
    pub interval: Duration,
}

impl RetryPolicy {
    /// Create a policy with explicit bounds
    #[must_use]
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            interval,
        }
    }

    /// Create a policy from the `[client]` configuration section
    #[must_use]
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.call_max_retries, config.call_retry_interval())
    }

    /// Minimal-delay policy for tests
    #[cfg(test)]
    pub fn test() -> Self {
        Self::new(3, Duration::from_millis(1))
    }
}

/// Run `operation`, retrying retryable failures per `policy`
pub async fn call_with_retries<F, Fut, T>(
    operation_name: &str,
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;

    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    info!("Call '{operation_name}' succeeded on attempt {attempt}");
                }
                return Ok(value);
            }
            Err(err) if err.is_retryable() && attempt < policy.max_attempts => {
                warn!(
                    "Call '{operation_name}' failed (attempt {attempt}/{}): {err}. Retrying in {:?}",
                    policy.max_attempts, policy.interval
                );
                sleep(policy.interval).await;
            }
            Err(err) => return Err(err),
        }
    }
}
