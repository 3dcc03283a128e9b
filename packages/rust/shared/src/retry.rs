//! Bounded retry for collaborator calls.
//!
//! Only `Err` results are retried. An `Ok` value, including `Ok(None)`
//! meaning "nothing to fetch here", is returned as-is.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::Result;

/// How many extra attempts a failed call gets, and the delay before each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff: Duration) -> Self {
        Self {
            max_retries,
            backoff,
        }
    }

    /// A single attempt per call.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Run `op` until it succeeds or the retry budget is spent.
    /// The delay doubles after each failed attempt.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0u32;
        let mut delay = self.backoff;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        call = label,
                        attempt,
                        max_retries = self.max_retries,
                        error = %e,
                        "call failed, retrying"
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                        delay = delay.saturating_mul(2);
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}
