//! Retry with capped exponential backoff for transient database failures.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::StorageError;

/// Retry policy configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub initial_delay: Duration,
    /// Upper bound for any single backoff, jitter included.
    pub max_delay: Duration,
    pub multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub const fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    #[must_use]
    pub const fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    #[must_use]
    pub const fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }
}

/// Runs an operation, retrying transient failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    #[must_use]
    pub const fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Backoff before retry number `attempt` (zero-based).
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let max_ms = self.config.max_delay.as_millis() as f64;
        let base_ms = self.config.initial_delay.as_millis() as f64
            * self.config.multiplier.powi(attempt.min(i32::MAX as u32) as i32);

        let mut delay_ms = base_ms.min(max_ms);
        if self.config.jitter {
            // Up to 25% jitter, still capped.
            delay_ms = (delay_ms * (1.0 + rand::random::<f64>() * 0.25)).min(max_ms);
        }

        Duration::from_millis(delay_ms as u64)
    }

    /// Execute `operation` until it succeeds, fails permanently, or retries run out.
    ///
    /// Exhausted transient failures are reported as [`StorageError::Unavailable`];
    /// permanent failures are returned unchanged.
    pub async fn execute<F, Fut, T>(&self, operation: F) -> Result<T, StorageError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StorageError>>,
    {
        self.execute_if(operation, StorageError::is_transient).await
    }

    /// Same as [`RetryPolicy::execute`], with `retryable` deciding which errors
    /// are retried. Errors it rejects are returned unchanged.
    pub async fn execute_if<F, Fut, T, P>(
        &self,
        mut operation: F,
        retryable: P,
    ) -> Result<T, StorageError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StorageError>>,
        P: Fn(&StorageError) -> bool,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(error) if retryable(&error) && attempt < self.config.max_retries => {
                    let delay = self.delay_for_attempt(attempt);
                    warn!(
                        "Transient storage failure (attempt {} of {}), retrying in {:?}: {error}",
                        attempt + 1,
                        self.config.max_retries + 1,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) if retryable(&error) => {
                    return Err(StorageError::Unavailable {
                        attempts: attempt + 1,
                        message: error.to_string(),
                    });
                }
                Err(error) => return Err(error),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}
