/*!
 * Retry logic with exponential backoff
 *
 * One call to [`run`] owns its whole retry budget: the attempt counter and
 * the current backoff are locals, never shared between calls. There is no
 * jitter and no circuit breaker: the device is a single client's private
 * hardware, not a shared service.
 */

use std::future::Future;
use std::time::Duration;
use tracing::debug;

use crate::error::{Error, Result};

/// Retry budget for one logical request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt fails
    pub max_retries: u32,
    /// Backoff before the first retry; doubles each retry after that
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_secs(3),
        }
    }
}

/// Execute an idempotent operation with bounded exponential backoff.
///
/// The operation is attempted up to `max_retries + 1` times. Retryable
/// failures (transport errors and non-success device responses) wait for
/// the current backoff and try again with the backoff doubled. Exhausting
/// the budget yields [`Error::RetriesExhausted`] carrying the attempt
/// count, the last backoff actually slept, and the last underlying
/// failure. Non-retryable errors pass through immediately.
pub async fn run<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempts = 0u32;
    let mut backoff = policy.initial_backoff;
    let mut last_backoff = Duration::ZERO;

    loop {
        attempts += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempts <= policy.max_retries => {
                debug!(
                    attempt = attempts,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %e,
                    "request failed, backing off"
                );
                tokio::time::sleep(backoff).await;
                last_backoff = backoff;
                backoff *= 2;
            }
            Err(e) if e.is_retryable() => {
                return Err(Error::RetriesExhausted {
                    attempts,
                    last_backoff,
                    reason: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        }
    }
}
