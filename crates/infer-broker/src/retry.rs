//! Bounded retry with pure exponential backoff.
//!
//! `max_attempts` always counts **total** attempts, including the first one.
//! Every retry site in the workspace goes through [`with_retry`] so the
//! semantic cannot drift between callers.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use crate::constants::{DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY};

/// Retry budget and backoff schedule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, first try included. Values below 1 behave as 1.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Factor applied to the delay after every further failure.
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_RETRIES,
            initial_delay: DEFAULT_RETRY_DELAY,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }
}

impl RetryPolicy {
    /// Policy with the default schedule and `attempts` total attempts.
    pub fn from_retries(attempts: u32) -> Self {
        Self {
            max_attempts: attempts,
            ..Self::default()
        }
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Sleep inserted after failed attempt `attempt` (1-based):
    /// `initial_delay * backoff_multiplier^(attempt - 1)`.
    ///
    /// A negative or non-finite multiplier is treated as 1 (constant delay).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let multiplier = if self.backoff_multiplier.is_finite() && self.backoff_multiplier >= 0.0 {
            self.backoff_multiplier
        } else {
            1.0
        };
        let secs = self.initial_delay.as_secs_f64() * multiplier.powi(exp);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }
}

/// Run `operation` until it succeeds or `policy.max_attempts` attempts have failed.
///
/// On exhaustion the error from the final attempt is returned untouched.
/// `label` only feeds the diagnostics.
pub async fn with_retry<T, E, F, Fut>(policy: &RetryPolicy, label: &str, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let max_attempts = policy.attempts();
    let mut attempt = 1;

    loop {
        tracing::debug!(operation = label, attempt, max_attempts, "attempt");

        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::debug!(operation = label, attempt, "succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) if attempt >= max_attempts => {
                tracing::warn!(
                    operation = label,
                    attempt,
                    max_attempts,
                    error = %err,
                    "giving up"
                );
                return Err(err);
            }
            Err(err) => {
                let delay = policy.delay_after(attempt);
                tracing::warn!(
                    operation = label,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
