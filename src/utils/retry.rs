//! Backoff for transient embedding failures on the ingest path.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(200);
const MAX_DELAY: Duration = Duration::from_secs(10);

/// How many times a failed call may be repeated, and how long to wait.
///
/// `max_retries` counts repeats after the first call, so `0` means a
/// single attempt. The wait doubles after every retry, capped at ten seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }

    /// A single attempt.
    #[must_use]
    pub fn none() -> Self {
        Self::new(0)
    }

    #[must_use]
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Wait before retry number `retry` (zero-based).
    fn delay_before(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.min(16));
        self.base_delay.saturating_mul(factor).min(MAX_DELAY)
    }
}

/// Determines if an error is transient.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// A successful value and the number of retries it took.
#[derive(Debug, Clone, PartialEq)]
pub struct Retried<T> {
    pub value: T,
    pub retries: u32,
}

/// Run `operation`, repeating it on transient errors per `policy`.
///
/// Permanent errors and the error of the last allowed attempt are returned
/// as is.
pub async fn with_retry<T, E, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<Retried<T>, E>
where
    E: Retryable + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut retries = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(Retried { value, retries }),
            Err(error) if retries < policy.max_retries && error.is_retryable() => {
                let delay = policy.delay_before(retries);
                retries += 1;
                tracing::warn!(
                    retry = retries,
                    of = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    %error,
                    "embedding call failed, retrying"
                );
                sleep(delay).await;
            }
            Err(error) => {
                if retries > 0 {
                    tracing::warn!(retries, %error, "giving up after retries");
                }
                return Err(error);
            }
        }
    }
}
