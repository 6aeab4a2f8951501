//! Retry with exponential backoff for HTTP calls
//!
//! Used by the HTTP transport only: rate-limited (429) and transient server or
//! connection failures are retried here, below the fetch engines, which never
//! retry on their own.

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (not including the initial attempt)
    pub max_retries: u32,

    /// Initial backoff duration
    pub initial_backoff: Duration,

    /// Upper bound for any single wait, including server-provided Retry-After
    pub max_backoff: Duration,

    /// Backoff multiplier (typically 2.0 for exponential backoff)
    pub multiplier: f64,

    /// Add random jitter to prevent thundering herd
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Never retry; every failure is returned as-is
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Short waits, for tests and interactive use
    pub fn quick() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
            multiplier: 2.0,
            jitter: true,
        }
    }

    /// Calculate backoff duration for a given attempt
    pub fn backoff_duration(&self, attempt: u32) -> Duration {
        let base = self.initial_backoff.as_secs_f64() * self.multiplier.powi(attempt as i32);
        let capped = base.min(self.max_backoff.as_secs_f64());

        let final_duration = if self.jitter {
            // 0-25% on top
            capped * (1.0 + rand_jitter() * 0.25)
        } else {
            capped
        };

        Duration::from_secs_f64(final_duration)
    }
}

/// Pseudo-random value in [0, 1) taken from the clock's sub-second nanos
fn rand_jitter() -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    (nanos % 1000) as f64 / 1000.0
}

/// Retry classification for errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the operation
    Retry,
    /// Retry after a specific duration (e.g., from Retry-After header)
    RetryAfter(Duration),
    /// Don't retry, the error is permanent
    NoRetry,
}

/// Errors that know whether the failed call is worth repeating
pub trait RetryableError {
    fn retry_decision(&self) -> RetryDecision;
}

/// Execute an async operation with retry logic
///
/// Backoff waits end early when `cancel` fires; the last error is returned in
/// that case. The operation itself is responsible for observing `cancel`
/// while it runs.
pub async fn with_retry<F, Fut, T, E>(
    config: &RetryConfig,
    operation_name: &str,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: RetryableError + std::fmt::Display,
{
    let mut attempt = 0;

    loop {
        let err = match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => e,
        };

        let backoff = match err.retry_decision() {
            RetryDecision::NoRetry => {
                debug!(
                    operation = operation_name,
                    attempt, "Operation failed with non-retryable error: {}", err
                );
                return Err(err);
            }
            RetryDecision::RetryAfter(d) => d.min(config.max_backoff),
            RetryDecision::Retry => config.backoff_duration(attempt),
        };

        if attempt >= config.max_retries {
            if config.max_retries > 0 {
                warn!(
                    operation = operation_name,
                    attempts = attempt + 1,
                    "Operation failed after {} attempts: {}",
                    attempt + 1,
                    err
                );
            }
            return Err(err);
        }

        warn!(
            operation = operation_name,
            attempt = attempt + 1,
            max_attempts = config.max_retries + 1,
            backoff_secs = backoff.as_secs_f64(),
            "Retrying after error: {}",
            err
        );

        tokio::select! {
            _ = cancel.cancelled() => return Err(err),
            _ = tokio::time::sleep(backoff) => {}
        }
        attempt += 1;
    }
}
