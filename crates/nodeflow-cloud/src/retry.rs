//! Retry wrapper for backend calls
//!
//! Only transient errors (rate limiting) are retried. Everything else
//! propagates on the first failure.

use crate::error::{CloudError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, sleep};

/// Retry configuration for backend operations
///
/// Delays grow linearly: the wait after attempt `n` (0-based) is
/// `initial_delay + n * increment`.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,

    /// Delay before the second attempt
    pub initial_delay: Duration,

    /// Added to the delay after every further attempt
    pub increment: Duration,

    /// Stop early once this much time would have been spent waiting
    pub max_elapsed: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 24,
            initial_delay: Duration::from_secs(1),
            increment: Duration::from_secs(1),
            max_elapsed: None,
        }
    }
}

impl RetryConfig {
    /// Same attempt budget without any waiting in between
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::ZERO,
            increment: Duration::ZERO,
            max_elapsed: None,
        }
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.initial_delay + self.increment * attempt
    }
}

/// Call `operation`, retrying while it fails with a transient error.
///
/// `name` identifies the operation in logs and in
/// [`CloudError::RetriesExhausted`].
pub async fn retry<T, F, Fut>(config: &RetryConfig, name: &str, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = config.max_attempts.max(1);
    let started = Instant::now();
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::debug!("'{}' succeeded after {} tries", name, attempt);
                }
                return Ok(result);
            }
            Err(e) if e.is_transient() => {
                let delay = config.delay_for_attempt(attempt - 1);
                let over_budget = config
                    .max_elapsed
                    .is_some_and(|max| started.elapsed() + delay > max);

                if attempt >= max_attempts || over_budget {
                    return Err(CloudError::RetriesExhausted {
                        operation: name.to_string(),
                        attempts: attempt,
                        source: Box::new(e),
                    });
                }

                tracing::trace!(
                    "'{}' attempt {}/{} hit a transient error ({}), waiting {:?}",
                    name,
                    attempt,
                    max_attempts,
                    e,
                    delay
                );
                sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
