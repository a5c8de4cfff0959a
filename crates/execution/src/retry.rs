use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Bounded retry with linear backoff.
///
/// Delay before attempt `n + 1` is `base_delay × n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub const fn new(attempts: u32, base_delay: Duration) -> Self {
        Self {
            attempts,
            base_delay,
        }
    }

    /// Delay after the failed `attempt` (1-based).
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }

    /// Runs `operation` until it succeeds or the attempts are exhausted.
    ///
    /// The closure receives the 1-based attempt number. At least one attempt is
    /// always made.
    ///
    /// # Errors
    ///
    /// Returns the last error once every attempt has failed.
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> anyhow::Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;
        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt >= attempts => return Err(e),
                Err(e) => {
                    let delay = self.delay_after(attempt);
                    warn!(attempt, max = attempts, delay_ms = delay.as_millis() as u64, error = %e, "Attempt failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast(attempts: u32) -> RetryPolicy {
        RetryPolicy::new(attempts, Duration::from_millis(1))
    }

    #[test]
    fn delay_grows_linearly() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100));
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(200));
    }

    #[tokio::test]
    async fn succeeds_on_nth_attempt_after_n_calls() {
        for n in 1..=4 {
            let calls = Arc::new(AtomicU32::new(0));
            let counter = calls.clone();
            let result = fast(4)
                .run(|attempt| {
                    let counter = counter.clone();
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        if attempt < n {
                            Err(anyhow!("failure {attempt}"))
                        } else {
                            Ok(attempt)
                        }
                    }
                })
                .await;
            assert_eq!(result.unwrap(), n);
            assert_eq!(calls.load(Ordering::SeqCst), n);
        }
    }

    #[tokio::test]
    async fn exhausts_attempts_and_returns_last_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: anyhow::Result<()> = fast(3)
            .run(|attempt| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(anyhow!("failure {attempt}"))
                }
            })
            .await;
        assert_eq!(result.unwrap_err().to_string(), "failure 3");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn zero_attempts_still_tries_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let _ = fast(0)
            .run(|_| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(anyhow!("nope"))
                }
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
