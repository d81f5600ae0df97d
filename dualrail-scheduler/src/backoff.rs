//! Exponential backoff for idempotent duty cycles (spec §4.11/§5): up to 3
//! retries at 1/2/4 minutes before a cycle is marked failed.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

pub const DEFAULT_DELAYS: [Duration; 3] =
    [Duration::from_secs(60), Duration::from_secs(120), Duration::from_secs(240)];

/// Retry `attempt` up to `delays.len()` additional times, sleeping `delays[i]`
/// between attempt `i` and `i+1`. Returns the first success, or the last
/// error once retries are exhausted.
pub async fn retry_with_backoff<F, Fut, T, E>(
    label: &str,
    delays: &[Duration],
    mut attempt: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut last_err = None;
    for (retry, delay) in std::iter::once(None).chain(delays.iter().map(|d| Some(*d))).enumerate() {
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                warn!(cycle = label, attempt = retry, %err, "attempt failed");
                last_err = Some(err);
            }
        }
    }
    Err(last_err.expect("at least one attempt always runs"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_without_retry_when_first_attempt_works() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = retry_with_backoff("test", &[], || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(7)
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_until_success_within_budget() {
        let calls = AtomicU32::new(0);
        let delays = [Duration::from_millis(1), Duration::from_millis(1)];
        let result: Result<u32, &str> = retry_with_backoff("test", &delays, || async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 { Err("not yet") } else { Ok(42) }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausts_retries_and_returns_last_error() {
        let delays = [Duration::from_millis(1), Duration::from_millis(1)];
        let result: Result<u32, &str> =
            retry_with_backoff("test", &delays, || async { Err("still broken") }).await;
        assert_eq!(result.unwrap_err(), "still broken");
    }
}
