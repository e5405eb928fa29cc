//! Retry policy: timeouts and bounded backoff at the storage and transport boundaries.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use super::config::RetryConfig;
use crate::domain::{PersistenceError, TransportError};

/// Errors the policy knows how to classify.
pub trait Retryable: Sized {
    fn is_retryable(&self) -> bool;

    fn timed_out(op: &'static str, after: Duration) -> Self;
}

impl Retryable for PersistenceError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::Timeout { .. } | Self::Unavailable(_)
        )
    }

    fn timed_out(op: &'static str, after: Duration) -> Self {
        Self::Timeout { op, after }
    }
}

impl Retryable for TransportError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Closed | Self::Timeout(_))
    }

    fn timed_out(_op: &'static str, after: Duration) -> Self {
        Self::Timeout(after)
    }
}

/// Upper bound of a single backoff delay.
pub const MAX_DELAY: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Base delay for the first retry.
    pub base_delay: Duration,

    /// Backoff multiplier for exponential backoff.
    pub multiplier: f64,

    /// Total attempts, the first one included.
    pub max_attempts: u32,
}

impl RetryPolicy {
    /// A multiplier that is not a finite number >= 1 is replaced by 1.
    pub fn from_config(config: &RetryConfig) -> Self {
        let multiplier = if config.multiplier.is_finite() && config.multiplier >= 1.0 {
            config.multiplier
        } else {
            warn!(multiplier = config.multiplier, "retry multiplier must be a finite number >= 1, using 1");
            1.0
        };
        Self {
            base_delay: Duration::from_millis(config.base_delay_ms),
            multiplier,
            max_attempts: config.max_attempts.max(1),
        }
    }

    /// A single attempt, no retries.
    pub fn once() -> Self {
        Self {
            base_delay: Duration::ZERO,
            multiplier: 1.0,
            max_attempts: 1,
        }
    }

    /// delay = base_delay * multiplier^(attempts - 1), within `0..=MAX_DELAY`
    pub fn next_delay(&self, attempts: u32) -> Duration {
        let base_secs = self.base_delay.as_secs_f64();
        let exponent = i32::try_from(attempts.saturating_sub(1)).unwrap_or(i32::MAX);
        let delay_secs = base_secs * self.multiplier.powi(exponent);
        if delay_secs.is_nan() || delay_secs <= 0.0 {
            return Duration::ZERO;
        }
        Duration::try_from_secs_f64(delay_secs)
            .unwrap_or(MAX_DELAY)
            .min(MAX_DELAY)
    }

    /// Run `f` under `timeout`, retrying retryable failures up to `max_attempts`.
    pub async fn run<T, E, F, Fut>(&self, op: &'static str, timeout: Duration, mut f: F) -> Result<T, E>
    where
        E: Retryable + std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let result = match tokio::time::timeout(timeout, f()).await {
                Ok(result) => result,
                Err(_) => Err(E::timed_out(op, timeout)),
            };
            match result {
                Ok(value) => return Ok(value),
                Err(e) if attempts < self.max_attempts && e.is_retryable() => {
                    let delay = self.next_delay(attempts);
                    warn!(op, attempts, ?delay, error = %e, "retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
