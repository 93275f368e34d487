//! Retry with exponential backoff for completion requests.

use std::time::Duration;

use crate::error::CompletionError;

/// How often and how patiently to repeat a failed completion request.
///
/// The default makes a single attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self
            .backoff_multiplier
            .powi(i32::try_from(attempt).unwrap_or(i32::MAX));
        #[allow(clippy::cast_precision_loss)]
        let scaled = self.base_delay.as_nanos() as f64 * factor;
        #[allow(clippy::cast_precision_loss)]
        let ceiling = self.max_delay.as_nanos() as f64;
        if scaled.is_finite() && scaled < ceiling {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            Duration::from_nanos(scaled as u64)
        } else {
            self.max_delay
        }
    }

    /// Run `operation`, repeating it while it fails with a retryable error.
    ///
    /// A `Retry-After` hint from the service overrides the computed delay,
    /// still capped at `max_delay`.
    pub async fn run<F, Fut, T>(&self, operation_name: &str, mut operation: F) -> Result<T, CompletionError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CompletionError>>,
    {
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.max_retries => {
                    let delay = err
                        .retry_after()
                        .map_or_else(|| self.delay_for_attempt(attempt), |hint| hint.min(self.max_delay));
                    tracing::warn!(
                        operation = operation_name,
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "Retrying completion request"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
