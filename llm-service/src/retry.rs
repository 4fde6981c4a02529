//! Bounded retry with exponential backoff for transient remote failures.
//!
//! Retrying happens at the call site that issued the remote request (an
//! embedding batch, a single query, a single judge call), so exhausting the
//! budget degrades to a per-item failure instead of aborting the run.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error_handler::LlmError;

/// Retry budget for one remote call site.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    /// Total attempts including the first (must be >= 1).
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each subsequent one.
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
        }
    }
}

impl RetryPolicy {
    /// Runs `op` until it succeeds, fails terminally, or the attempt budget
    /// is spent. Only errors classified transient by
    /// [`LlmError::is_transient`] are retried.
    pub async fn run<T, F, Fut>(&self, op_name: &str, mut op: F) -> Result<T, LlmError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, LlmError>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut delay = Duration::from_millis(self.base_delay_ms);

        for attempt in 1..=attempts {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) if e.is_transient() && attempt < attempts => {
                    warn!(
                        "{op_name}: transient failure on attempt {attempt}/{attempts}: {e}; \
                         retrying in {:?}",
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                }
                Err(e) if e.is_transient() => {
                    return Err(LlmError::RetriesExhausted {
                        attempts,
                        last: Box::new(e),
                    });
                }
                Err(e) => return Err(e),
            }
        }
        unreachable!("retry loop returns on every branch")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn transient() -> LlmError {
        LlmError::HttpStatus {
            status: StatusCode::SERVICE_UNAVAILABLE,
            url: "http://localhost/test".into(),
            snippet: String::new(),
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay_ms: 1,
        }
    }

    #[tokio::test]
    async fn recovers_from_transient_failures() {
        let calls = AtomicU32::new(0);
        let out = policy()
            .run("test", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 { Err(transient()) } else { Ok(n) }
                }
            })
            .await
            .unwrap();
        assert_eq!(out, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausts_budget_on_persistent_transient_errors() {
        let calls = AtomicU32::new(0);
        let err = policy()
            .run("test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(transient()) }
            })
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::RetriesExhausted { attempts: 3, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn terminal_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let err = policy()
            .run("test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(LlmError::Decode("bad json".into())) }
            })
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Decode(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
