//! Retry execution with exponential backoff.
//!
//! Wraps an arbitrary async unit of work and retries transient failures
//! (per [`AppError::is_retryable`]) with exponentially growing delays.
//! Permanent failures propagate on first occurrence.

use std::future::Future;
use std::time::Duration;

use crate::error::AppError;

/// Retry policy: attempt budget plus backoff bounds.
///
/// `delay(attempt) = min(backoff_max, backoff_min * multiplier^(attempt-1))`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff_min: Duration,
    backoff_max: Duration,
    backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    /// 3 attempts, 1s..4s backoff, doubling.
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_min: Duration::from_secs(1),
            backoff_max: Duration::from_secs(4),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Create a policy, validating bounds at construction time.
    ///
    /// Rejects `max_attempts == 0`, `backoff_min > backoff_max`, and
    /// non-positive multipliers as configuration errors.
    pub fn new(
        max_attempts: u32,
        backoff_min: Duration,
        backoff_max: Duration,
        backoff_multiplier: f64,
    ) -> Result<Self, AppError> {
        if max_attempts == 0 {
            return Err(AppError::Config("max_attempts must be at least 1".into()));
        }
        if backoff_min > backoff_max {
            return Err(AppError::Config(format!(
                "backoff_min ({backoff_min:?}) must not exceed backoff_max ({backoff_max:?})"
            )));
        }
        if !backoff_multiplier.is_finite() || backoff_multiplier <= 0.0 {
            return Err(AppError::Config(format!(
                "backoff_multiplier must be positive, got {backoff_multiplier}"
            )));
        }
        Ok(Self {
            max_attempts,
            backoff_min,
            backoff_max,
            backoff_multiplier,
        })
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Backoff delay before the retry that follows `attempt` (1-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = self.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);
        let delay = self.backoff_min.as_secs_f64() * exp;
        Duration::from_secs_f64(delay.min(self.backoff_max.as_secs_f64()))
    }

    /// Run `op` until it succeeds, fails permanently, or the attempt
    /// budget is exhausted.
    ///
    /// The only suspension point is the backoff sleep between attempts,
    /// which blocks the calling task and nothing else. With
    /// `max_attempts == 1` this is a pass-through that adds
    /// classification-aware logging.
    pub async fn execute<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, AppError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let mut attempt = 1u32;
        loop {
            tracing::debug!(
                %operation,
                attempt,
                max_attempts = self.max_attempts,
                "attempting operation"
            );

            match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!(%operation, attempt, "operation succeeded after retry");
                    } else {
                        tracing::debug!(%operation, "operation succeeded");
                    }
                    return Ok(value);
                }
                Err(err) if !err.is_retryable() => {
                    tracing::error!(
                        %operation,
                        error = %err,
                        "operation failed with non-retryable error"
                    );
                    return Err(err);
                }
                Err(err) if attempt >= self.max_attempts => {
                    tracing::error!(
                        %operation,
                        attempts = attempt,
                        error = %err,
                        "operation failed after exhausting retries"
                    );
                    return Err(err);
                }
                Err(err) => {
                    let delay = self.delay_for_attempt(attempt);
                    tracing::warn!(
                        %operation,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient failure, retrying after backoff"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
