//! Retry executor with exponential backoff and a total time budget.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use crate::Transient;

/// How a task is retried.
///
/// The delay before retry `n` (1-indexed) is `initial_delay * 2^(n-1)`,
/// capped at `max_delay`. The whole run, including delays, is bounded by
/// `total_timeout`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub total_timeout: Duration,
    /// Maximum number of attempts. None retries until the timeout.
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            total_timeout: Duration::from_secs(60),
            max_attempts: None,
        }
    }
}

/// Why a retried task gave up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryError<E> {
    /// The task failed permanently, or ran out of attempts.
    Failed { error: E, attempts: u32 },

    /// The time budget ran out.
    TimedOut(Duration),
}

impl RetryPolicy {
    pub fn with_total_timeout(mut self, total_timeout: Duration) -> Self {
        self.total_timeout = total_timeout;
        self
    }

    /// Returns the delay to wait before retry `attempt` (1-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let multiplier = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_delay
            .saturating_mul(multiplier)
            .min(self.max_delay)
    }

    /// Runs `operation` until it succeeds, fails permanently, or the budget
    /// runs out.
    ///
    /// The closure receives the 1-indexed attempt number.
    pub async fn execute<T, E, F, Fut>(&self, mut operation: F) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Transient + Display,
    {
        let attempts = async {
            let mut attempt = 0u32;
            loop {
                attempt += 1;
                match operation(attempt).await {
                    Ok(value) => return Ok(value),
                    Err(error)
                        if error.is_transient()
                            && self.max_attempts.is_none_or(|max| attempt < max) =>
                    {
                        let delay = self.delay_for_attempt(attempt);
                        tracing::warn!(
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %error,
                            "transient task failure, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    Err(error) => {
                        return Err(RetryError::Failed {
                            error,
                            attempts: attempt,
                        });
                    }
                }
            }
        };

        match tokio::time::timeout(self.total_timeout, attempts).await {
            Ok(result) => result,
            Err(_) => Err(RetryError::TimedOut(self.total_timeout)),
        }
    }
}
