// src/txn.rs

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::debug;

use crate::Error;

/// Bounded retry for optimistic read-modify-write transactions.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_backoff: Duration::from_millis(5),
        }
    }
}

impl RetryPolicy {
    fn backoff_for(&self, attempt: u32) -> Duration {
        let base = self.base_backoff.as_millis() as u64;
        let exp = base.saturating_mul(1u64 << attempt.min(6));
        let jitter = if base > 0 {
            rand::rng().random_range(0..=base)
        } else {
            0
        };
        Duration::from_millis(exp + jitter)
    }
}

/// Outcome of one optimistic attempt.
pub enum Attempt<T> {
    Committed(T),
    /// The version check failed; re-read and try again.
    Conflict,
}

/// Runs `attempt` until it commits, fails with a business error, or the
/// policy's attempts run out (surfaced as `Error::TransactionConflict`).
pub async fn run_optimistic<T, F, Fut>(
    policy: &RetryPolicy,
    aggregate: &str,
    mut attempt: F,
) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Attempt<T>, Error>>,
{
    let attempts = policy.max_attempts.max(1);
    for n in 0..attempts {
        match attempt().await? {
            Attempt::Committed(value) => return Ok(value),
            Attempt::Conflict => {
                debug!("write conflict on {} (attempt {}/{})", aggregate, n + 1, attempts);
                if n + 1 < attempts {
                    let wait = policy.backoff_for(n);
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }
    Err(Error::TransactionConflict(aggregate.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_until_commit() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let policy = RetryPolicy { max_attempts: 5, base_backoff: Duration::from_millis(0) };
        let out = run_optimistic(&policy, "test", || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Ok(Attempt::Conflict)
            } else {
                Ok(Attempt::Committed(42))
            }
        })
        .await
        .unwrap();
        assert_eq!(out, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let policy = RetryPolicy { max_attempts: 3, base_backoff: Duration::from_millis(0) };
        let err = run_optimistic::<(), _, _>(&policy, "points:u1", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(Attempt::Conflict)
        })
        .await
        .unwrap_err();
        assert!(matches!(err, Error::TransactionConflict(ref a) if a == "points:u1"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn business_errors_are_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let policy = RetryPolicy::default();
        let err = run_optimistic::<(), _, _>(&policy, "stock", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::OutOfStock("r1".into()))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, Error::OutOfStock(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
