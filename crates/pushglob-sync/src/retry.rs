//! Exponential backoff for ledger writes
//!
//! Ledger writes that follow an accepted transfer request must not be lost,
//! so every error is retried, not just transient ones.

use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

/// Retry schedule: `base_delay`, then doubling, for `max_retries` attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    /// 0.5s, 1s, 2s
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Runs `f` until it succeeds or the policy is exhausted
pub(crate) async fn with_retry<F, Fut, T>(
    policy: RetryPolicy,
    operation_name: &str,
    f: F,
) -> anyhow::Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let mut attempt = 0;
    loop {
        match f().await {
            Ok(value) => {
                if attempt > 0 {
                    info!(operation = operation_name, attempt, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) if attempt < policy.max_retries => {
                let delay = policy.delay_for(attempt);
                warn!(
                    operation = operation_name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Ledger operation failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn fast(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(1),
        }
    }

    #[test]
    fn delay_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_millis(500));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn succeeds_after_failures() {
        let calls = AtomicU32::new(0);
        let result = with_retry(fast(3), "op", || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                anyhow::bail!("database is locked")
            }
            Ok(7)
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let result: anyhow::Result<()> = with_retry(fast(2), "op", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("disk I/O error")
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn zero_retries_tries_once() {
        let calls = AtomicU32::new(0);
        let result: anyhow::Result<()> = with_retry(fast(0), "op", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("no")
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
