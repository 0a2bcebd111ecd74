// SPDX-License-Identifier: MIT OR Apache-2.0
//! Jittered-backoff retry for the storage hub's transactional driver writes.
//!
//! The revocation cache's `setAuthTimestamp` path runs its driver write
//! inside a bounded retry loop (2 tries, 100–350 ms jittered backoff
//! between attempts) so a transient conflict on the backing store doesn't
//! surface as a hard failure.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use rand::Rng;
use std::future::Future;
use std::ops::Range;
use std::time::Duration;

/// A retry policy: how many attempts to make and the jitter window between
/// them.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub attempts: u32,
    /// Jittered delay window between attempts, in milliseconds.
    pub backoff_ms: Range<u64>,
}

impl RetryPolicy {
    /// The policy used by the revocation cache's transactional write:
    /// 2 tries, 100–350 ms jitter.
    pub fn revocation_write() -> Self {
        Self {
            attempts: 2,
            backoff_ms: 100..350,
        }
    }
}

/// Exhausted all retry attempts; carries the last error observed.
#[derive(Debug, thiserror::Error)]
#[error("retry exhausted after {attempts} attempt(s)")]
pub struct RetryExhausted<E> {
    /// Number of attempts made.
    pub attempts: u32,
    /// The last error returned by the operation.
    pub last_error: E,
}

/// Run `op` under `policy`, retrying on `Err` until attempts are exhausted.
///
/// A jittered delay (uniformly sampled from `policy.backoff_ms`) separates
/// attempts; there is no delay before the first attempt or after the last.
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: &RetryPolicy,
    mut op: F,
) -> Result<T, RetryExhausted<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(last_error) => {
                if attempt >= policy.attempts {
                    tracing::warn!(attempt, "retry attempts exhausted");
                    return Err(RetryExhausted {
                        attempts: attempt,
                        last_error,
                    });
                }
                let delay_ms = jittered_delay_ms(&policy.backoff_ms);
                tracing::debug!(attempt, delay_ms, "retrying after transient failure");
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}

fn jittered_delay_ms(range: &Range<u64>) -> u64 {
    if range.start >= range.end {
        return range.start;
    }
    rand::thread_rng().gen_range(range.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_on_first_try_without_retrying() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            attempts: 2,
            backoff_ms: 1..2,
        };
        let result: Result<_, RetryExhausted<&str>> = retry_with_backoff(&policy, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, &str>(42) }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_until_success_within_budget() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            attempts: 2,
            backoff_ms: 1..2,
        };
        let result = retry_with_backoff(&policy, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err("transient")
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn exhausts_after_configured_attempts() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            attempts: 2,
            backoff_ms: 1..2,
        };
        let result: Result<i32, _> = retry_with_backoff(&policy, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<i32, _>("still broken") }
        })
        .await;
        let err = result.unwrap_err();
        assert_eq!(err.attempts, 2);
        assert_eq!(err.last_error, "still broken");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn revocation_write_policy_matches_spec() {
        let policy = RetryPolicy::revocation_write();
        assert_eq!(policy.attempts, 2);
        assert_eq!(policy.backoff_ms, 100..350);
    }
}
