//! Bounded retry with fixed backoff for generator calls.

use crate::generator::GeneratorError;
use std::future::Future;
use std::time::Duration;

/// How often and how patiently a generator call is retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. At least 1.
    pub max_attempts: u32,
    /// Fixed pause between attempts.
    pub backoff: Duration,
    /// Upper bound on a single attempt. `None` leaves timeouts to the generator.
    pub attempt_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            backoff: Duration::from_secs(1),
            attempt_timeout: None,
        }
    }
}

impl RetryPolicy {
    /// A single attempt, no backoff.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::ZERO,
            attempt_timeout: None,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    /// Run `operation` until it succeeds or the attempts run out, returning
    /// the last error in that case.
    pub async fn run<T, F, Fut>(&self, operation_name: &str, mut operation: F) -> Result<T, GeneratorError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, GeneratorError>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut last_error = GeneratorError::Empty;

        for attempt in 1..=attempts {
            let result = match self.attempt_timeout {
                Some(limit) => tokio::time::timeout(limit, operation())
                    .await
                    .unwrap_or(Err(GeneratorError::Timeout)),
                None => operation().await,
            };

            match result {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!(attempt, operation = operation_name, "generator call succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) => {
                    if attempt < attempts {
                        tracing::warn!(
                            attempt,
                            max_attempts = attempts,
                            error = %e,
                            operation = operation_name,
                            "generator call failed, retrying"
                        );
                        if !self.backoff.is_zero() {
                            tokio::time::sleep(self.backoff).await;
                        }
                    }
                    last_error = e;
                }
            }
        }

        tracing::error!(
            attempts,
            error = %last_error,
            operation = operation_name,
            "generator call failed after all attempts"
        );
        Err(last_error)
    }
}
