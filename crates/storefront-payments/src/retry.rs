//! # Retry With Backoff
//!
//! Wraps every provider call in a timeout and retries transient failures.
//!
//! ## Attempt Timeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  attempt 1 ──► Timeout(15) ── retryable ── sleep ~200ms                │
//! │  attempt 2 ──► Api { 503 } ── retryable ── sleep ~400ms                │
//! │  attempt 3 ──► Ok(..)                                                  │
//! │                                                                         │
//! │  Non-retryable errors (422, missing credentials) return immediately.   │
//! │  After max_attempts the last error is returned.                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::HttpSettings;
use crate::error::{GatewayError, GatewayResult};

/// Timeout and backoff parameters for one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub call_timeout: Duration,
}

impl RetryPolicy {
    /// Creates the exponential backoff configuration.
    fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.initial_backoff,
            max_interval: self.max_backoff,
            multiplier: 2.0,
            max_elapsed_time: None, // bounded by max_attempts instead
            ..Default::default()
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&HttpSettings::default())
    }
}

impl From<&HttpSettings> for RetryPolicy {
    fn from(http: &HttpSettings) -> Self {
        Self {
            max_attempts: http.max_attempts.max(1),
            initial_backoff: Duration::from_millis(http.initial_backoff_ms),
            max_backoff: Duration::from_millis(http.max_backoff_ms),
            call_timeout: Duration::from_secs(http.request_timeout_secs),
        }
    }
}

/// Runs `op` until it succeeds, fails permanently, or attempts run out.
///
/// Each attempt is bounded by `policy.call_timeout`; an elapsed timeout is
/// reported as [`GatewayError::Timeout`] and counts as retryable.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    op_name: &str,
    mut op: F,
) -> GatewayResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = GatewayResult<T>>,
{
    let mut backoff = policy.create_backoff();
    let mut attempt = 1;

    loop {
        let outcome = match tokio::time::timeout(policy.call_timeout, op()).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Timeout(policy.call_timeout.as_secs())),
        };

        let err = match outcome {
            Ok(value) => {
                if attempt > 1 {
                    debug!(op = op_name, attempt, "Gateway call succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        if !err.is_retryable() || attempt >= policy.max_attempts {
            return Err(err);
        }

        let delay = backoff.next_backoff().unwrap_or(policy.max_backoff);
        warn!(
            op = op_name,
            attempt,
            max_attempts = policy.max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Gateway call failed, retrying"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
