//! Explicit retry policy with capped exponential backoff

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use crate::config::RetryConfig;

/// How many times an operation is re-attempted and how long to wait between
/// attempts. Delays start at `base_delay` and double up to `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
}

/// Failure of an operation run under a [`RetryPolicy`]
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// The operation reported a failure that retrying cannot fix
    #[error("permanent failure after {attempts} attempt(s): {error}")]
    Permanent { attempts: u32, error: E },

    /// Every allowed attempt failed
    #[error("gave up after {attempts} attempt(s): {error}")]
    Exhausted { attempts: u32, error: E },
}

impl<E> RetryError<E> {
    /// Number of times the operation was invoked
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Permanent { attempts, .. } | RetryError::Exhausted { attempts, .. } => {
                *attempts
            },
        }
    }

    /// The last error reported by the operation
    pub fn into_inner(self) -> E {
        match self {
            RetryError::Permanent { error, .. } | RetryError::Exhausted { error, .. } => error,
        }
    }
}

impl RetryPolicy {
    /// Exponential policy; a cap below the base is raised to the base
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay: max_delay.max(base_delay),
        }
    }

    /// Constant delay between at most `max_attempts` invocations
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self::new(max_attempts.saturating_sub(1), delay, delay)
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Initial attempt plus retries
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Fresh, deterministic backoff schedule for one operation
    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: self.base_delay,
            initial_interval: self.base_delay,
            randomization_factor: 0.0,
            multiplier: 2.0,
            max_interval: self.max_delay,
            max_elapsed_time: None,
            ..Default::default()
        }
    }

    /// The delays awaited before each retry, in order
    pub fn delays(&self) -> Vec<Duration> {
        let mut backoff = self.backoff();
        (0..self.max_retries)
            .map(|_| backoff.next_backoff().unwrap_or(self.max_delay))
            .collect()
    }

    /// Run `operation` until it succeeds, reports a permanent failure, or
    /// the attempts are used up. Waits are timer-based.
    pub async fn run<F, Fut, T, E>(&self, operation: &str, mut f: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, backoff::Error<E>>>,
        E: std::fmt::Display,
    {
        let mut backoff = self.backoff();
        let mut attempts = 0;

        loop {
            attempts += 1;

            match f().await {
                Ok(value) => return Ok(value),
                Err(backoff::Error::Permanent(error)) => {
                    return Err(RetryError::Permanent { attempts, error });
                },
                Err(backoff::Error::Transient { err, .. }) => {
                    if attempts > self.max_retries {
                        warn!(
                            operation,
                            attempts,
                            error = %err,
                            "Giving up after exhausting retries"
                        );
                        return Err(RetryError::Exhausted {
                            attempts,
                            error: err,
                        });
                    }

                    let delay = backoff.next_backoff().unwrap_or(self.max_delay);
                    warn!(
                        operation,
                        attempt = attempts,
                        max_attempts = self.max_attempts(),
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Operation failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                },
            }
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        RetryPolicy::new(
            config.max_retries,
            config.backoff_base(),
            config.backoff_cap(),
        )
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::new(3, Duration::from_millis(1000), Duration::from_millis(30000))
    }
}
