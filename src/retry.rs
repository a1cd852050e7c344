use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::time;
use tracing::warn;

use crate::config::RetryConfig;

/// Bounded retries with a linearly growing delay.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// The pause after the `attempt`-th failure (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }

    /// Runs `op` until it succeeds, fails with an error `is_retryable` rejects, or the
    /// attempt ceiling is hit. The last error is returned as is.
    pub async fn run<T, E, F, Fut, P>(&self, mut op: F, is_retryable: P) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: Display,
    {
        let mut attempt = 1;

        loop {
            match op().await {
                Ok(value) => return Ok(value),

                Err(e) if attempt < self.max_attempts && is_retryable(&e) => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        "Transient failure, retrying in {}ms: {e}",
                        delay.as_millis(),
                    );
                    time::sleep(delay).await;
                    attempt += 1;
                }

                Err(e) => return Err(e),
            }
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(cfg: &RetryConfig) -> Self {
        Self {
            max_attempts: cfg.attempts.max(1),
            base_delay: cfg.base_delay.into(),
        }
    }
}
