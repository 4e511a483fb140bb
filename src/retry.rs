//! Bounded retry for operations that can fail transiently.
//!
//! Exchange calls share one helper instead of each call site carrying its
//! own attempt loop. Only errors classified transient by
//! [`Error::is_transient`] are retried; everything else surfaces immediately.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::prelude::*;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    /// Short budget for read-mostly calls inside the execution loop.
    pub const fn quick() -> Self {
        Self::new(3, Duration::from_millis(100))
    }

    /// Long budget for calls the cycle cannot proceed without.
    pub const fn persistent() -> Self {
        Self::new(15, Duration::from_millis(100))
    }
}

/// Run `f` until it succeeds, fails fatally, or the attempt budget runs out.
pub async fn with_retries<T, F, Fut>(policy: RetryPolicy, op: &'static str, mut f: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_error = None;
    for attempt in 1..=policy.max_attempts {
        match f().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() => {
                warn!(
                    op = op,
                    attempt = attempt,
                    max_attempts = policy.max_attempts,
                    error = %e,
                    "transient error, retrying"
                );
                last_error = Some(e);
                if attempt < policy.max_attempts {
                    tokio::time::sleep(policy.backoff).await;
                }
            }
            Err(e) => return Err(e),
        }
    }

    Err(Error::RetriesExhausted {
        op,
        attempts: policy.max_attempts,
        last_error: last_error.map(|e| e.to_string()).unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn transient() -> Error {
        Error::ServerRequest {
            status_code: 503,
            error_message: "unavailable".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = with_retries(RetryPolicy::quick(), "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(transient())
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_error_short_circuits() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retries(RetryPolicy::quick(), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(Error::Api {
                    code: "INVALID_PARAM".to_string(),
                    message: "bad size".to_string(),
                })
            }
        })
        .await;
        assert!(matches!(result, Err(Error::Api { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_budget_and_reports_last_error() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retries(RetryPolicy::new(5, Duration::from_millis(10)), "depth", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(transient()) }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        match result {
            Err(Error::RetriesExhausted { op, attempts, .. }) => {
                assert_eq!(op, "depth");
                assert_eq!(attempts, 5);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
