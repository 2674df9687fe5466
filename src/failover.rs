//! Retry logic around gallery round-trips

use std::future::Future;
use std::time::Duration;
use log::{debug, warn};

use crate::config::RetryConfig;
use crate::error::Error;

/// Decides how often and how patiently a failed call is re-run
pub trait RetryStrategy: Send + Sync
{   /// Total attempts, including the first one
    fn max_attempts(&self) -> usize;

    /// Delay before the retry following `attempt` (zero based)
    fn backoff_for_attempt(&self, attempt: usize) -> Duration;

    fn should_retry(&self, error: &Error) -> bool
    {   error.is_retryable()
    }
}

/// Exponential backoff retry policy
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy
{   pub max_attempts: usize
  , pub backoff_multiplier: f32
  , pub initial_backoff: Duration
}

impl RetryPolicy
{   /// Create a new retry policy
    pub fn new(
      max_attempts: usize
    , backoff_multiplier: f32
    , initial_backoff_ms: u64
    ) -> Self
    {   RetryPolicy
        {   max_attempts
          , backoff_multiplier
          , initial_backoff: Duration::from_millis(
              initial_backoff_ms
            )
        }
    }

    /// Policy that never re-runs a failed call
    pub fn no_retry() -> Self
    {   RetryPolicy::new(1, 1.0, 0)
    }
}

impl Default for RetryPolicy
{   fn default() -> Self
    {   RetryPolicy::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy
{   fn from(config: &RetryConfig) -> Self
    {   RetryPolicy::new(
          config.max_attempts
        , config.backoff_multiplier
        , config.initial_backoff_ms
        )
    }
}

impl RetryStrategy for RetryPolicy
{   fn max_attempts(&self) -> usize
    {   self.max_attempts
    }

    /// Saturates at `Duration::MAX` instead of overflowing
    fn backoff_for_attempt(&self, attempt: usize) -> Duration
    {   let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let scale = f64::from(self.backoff_multiplier).powi(exponent);
        Duration::try_from_secs_f64(
          self.initial_backoff.as_secs_f64() * scale
        ).unwrap_or(Duration::MAX)
    }
}

/// Run `operation` under `strategy`.
///
/// The last error is returned as is once attempts run out, and
/// non-retryable errors are returned after the first attempt.
pub async fn execute_with_retry<F, Fut, T>(
  strategy: &dyn RetryStrategy
, mut operation: F
) -> Result<T, Error>
where
  F: FnMut() -> Fut
, Fut: Future<Output = Result<T, Error>>
{   let attempts = strategy.max_attempts().max(1);
    let mut attempt = 0;
    loop
    { match operation().await
      {   Ok(value) => return Ok(value)
        , Err(error) => {
            attempt += 1;
            if attempt >= attempts || !strategy.should_retry(&error)
            {   debug!(
                  "Giving up after {} attempt(s): {}",
                  attempt, error
                );
                return Err(error);
            }
            let delay = strategy.backoff_for_attempt(attempt - 1);
            warn!(
              "Attempt {}/{} failed: {}; retrying in {:?}",
              attempt, attempts, error, delay
            );
            tokio::time::sleep(delay).await;
          }
      }
    }
}
