//! Bounded-exponential-backoff retry policy shared by every Backend
//! Adapter (`spec.md` §5, §7): "Timeouts on individual RPCs and list pages
//! follow a bounded-exponential-backoff retry (5 tries default, initial
//! delay 1s, max 3s, factor 2) applied by the backend adapter; the core
//! does not retry list operations itself."

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_tries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_tries: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(3),
            factor: 2.0,
        }
    }
}

impl RetryPolicy {
    fn delay_for(&self, attempt: u32) -> Duration {
        let scaled = self.initial_delay.as_secs_f64() * self.factor.powi(attempt as i32);
        Duration::from_secs_f64(scaled.min(self.max_delay.as_secs_f64()))
    }

    /// Run `operation`, retrying transient failures (those for which
    /// `is_transient` returns true) up to `max_tries` times total.
    pub async fn run<T, E, F, Fut, IsTransient>(&self, mut operation: F, is_transient: IsTransient) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        IsTransient: Fn(&E) -> bool,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(error) if attempt + 1 < self.max_tries && is_transient(&error) => {
                    let delay = self.delay_for(attempt);
                    warn!(attempt, ?delay, "retrying after transient backend error");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => {
                    debug!(attempt, "retry policy exhausted or error is not transient");
                    return Err(error);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tracing_test::traced_test;

    #[tokio::test]
    #[traced_test]
    async fn retry_logs_a_warning_on_each_transient_failure() {
        let policy = RetryPolicy {
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            ..Default::default()
        };
        let attempts = AtomicU32::new(0);
        let result: Result<u32, &str> = policy
            .run(
                || async {
                    let n = attempts.fetch_add(1, Ordering::SeqCst);
                    if n < 1 {
                        Err("throttled")
                    } else {
                        Ok(n)
                    }
                },
                |_| true,
            )
            .await;
        assert_eq!(result, Ok(1));
        assert!(logs_contain("retrying after transient backend error"));
    }

    #[tokio::test]
    async fn retries_until_success() {
        let policy = RetryPolicy {
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            ..Default::default()
        };
        let attempts = AtomicU32::new(0);
        let result: Result<u32, &str> = policy
            .run(
                || async {
                    let n = attempts.fetch_add(1, Ordering::SeqCst);
                    if n < 2 {
                        Err("throttled")
                    } else {
                        Ok(n)
                    }
                },
                |_| true,
            )
            .await;
        assert_eq!(result, Ok(2));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausts_after_max_tries() {
        let policy = RetryPolicy {
            max_tries: 2,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
            factor: 2.0,
        };
        let attempts = AtomicU32::new(0);
        let result: Result<(), &str> = policy
            .run(
                || async {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err("throttled")
                },
                |_| true,
            )
            .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn non_transient_errors_do_not_retry() {
        let policy = RetryPolicy::default();
        let attempts = AtomicU32::new(0);
        let result: Result<(), &str> = policy
            .run(
                || async {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err("bad request")
                },
                |_| false,
            )
            .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
