//! Fixed-interval retry for registry calls.

use std::future::Future;
use std::time::Duration;

use tracing::{error, warn};

use crate::constants::{DEFAULT_ATTEMPT_WAIT_SECONDS, DEFAULT_MAX_ATTEMPTS};

/// Retry ceiling and the fixed wait between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Wait between two consecutive attempts
    pub wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            wait: Duration::from_secs(DEFAULT_ATTEMPT_WAIT_SECONDS),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, wait: Duration) -> Self {
        Self { max_attempts, wait }
    }

    /// Run `operation` until it succeeds or `max_attempts` is reached.
    ///
    /// Every failure is logged. There is no wait after the final attempt; the
    /// last error is returned to the caller.
    pub async fn run<F, Fut, T, E>(
        &self,
        operation_name: &str,
        hostname: &str,
        mut operation: F,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if attempt >= max_attempts {
                        error!(
                            operation = %operation_name,
                            hostname = %hostname,
                            attempt,
                            error = %e,
                            "Registry call failed after max attempts"
                        );
                        return Err(e);
                    }

                    warn!(
                        operation = %operation_name,
                        hostname = %hostname,
                        attempt,
                        error = %e,
                        wait_secs = self.wait.as_secs_f64(),
                        "Registry call failed, retrying"
                    );

                    tokio::time::sleep(self.wait).await;
                }
            }
        }
    }
}
