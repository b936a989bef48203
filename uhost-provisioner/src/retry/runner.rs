//! The polling loop shared by every wait phase.

use super::policy::{should_retry, RetryDecision, RetryPolicy, RetryState};
use crate::cancellation::CancellationToken;
use crate::errors::{millis, RetryError};
use std::fmt::Display;
use std::future::Future;

/// Executes an operation until it succeeds, fails fatally, or runs out of attempts.
///
/// `is_retryable` decides whether an error earns another attempt. Both the
/// operation and the sleep between attempts are raced against `token`, so a
/// cancellation returns [`RetryError::Cancelled`] without waiting out the
/// remaining budget.
pub async fn with_retry<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    token: &CancellationToken,
    mut is_retryable: P,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: FnMut(&E) -> bool,
    E: Display,
{
    let mut state = RetryState::new();

    loop {
        if token.is_cancelled() {
            return Err(RetryError::Cancelled {
                reason: token.reason().unwrap_or_default(),
            });
        }

        state.begin_attempt();
        let result = tokio::select! {
            biased;
            reason = token.cancelled() => return Err(RetryError::Cancelled { reason }),
            result = operation() => result,
        };

        let error = match result {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        match should_retry(&state, policy, is_retryable(&error)) {
            RetryDecision::Retry(delay) => {
                tracing::debug!(
                    attempt = state.attempt,
                    delay_ms = millis(delay),
                    error = %error,
                    "Retrying after error"
                );
                tokio::select! {
                    biased;
                    reason = token.cancelled() => return Err(RetryError::Cancelled { reason }),
                    () = tokio::time::sleep(delay) => {}
                }
            }
            RetryDecision::GiveUp => {
                return Err(RetryError::Exhausted {
                    attempts: state.attempt,
                    last: error,
                });
            }
            RetryDecision::NotRetryable => return Err(RetryError::Fatal(error)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::Instant;

    #[derive(Debug, PartialEq)]
    enum Probe {
        NotYet,
        Broken,
    }

    impl Display for Probe {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{self:?}")
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_first_try() {
        let token = CancellationToken::new();
        let mut calls = 0;

        let result: Result<i32, RetryError<Probe>> =
            with_retry(&RetryPolicy::wait_running(), &token, |_| true, || {
                calls += 1;
                async { Ok(42) }
            })
            .await;

        assert_eq!(result, Ok(42));
        assert_eq!(calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_retryable_failures() {
        let token = CancellationToken::new();
        let start = Instant::now();
        let mut calls = 0;

        let result = with_retry(
            &RetryPolicy::wait_running(),
            &token,
            |e: &Probe| *e == Probe::NotYet,
            || {
                calls += 1;
                let outcome = if calls < 4 { Err(Probe::NotYet) } else { Ok(calls) };
                async move { outcome }
            },
        )
        .await;

        assert_eq!(result, Ok(4));
        // 2s + 4s + 6s between the four attempts
        assert_eq!(start.elapsed(), Duration::from_secs(12));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_stops_immediately() {
        let token = CancellationToken::new();
        let start = Instant::now();
        let mut calls = 0;

        let result: Result<(), _> = with_retry(
            &RetryPolicy::wait_running(),
            &token,
            |e: &Probe| *e == Probe::NotYet,
            || {
                calls += 1;
                async { Err(Probe::Broken) }
            },
        )
        .await;

        assert_eq!(result, Err(RetryError::Fatal(Probe::Broken)));
        assert_eq!(calls, 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_reports_attempts_without_trailing_sleep() {
        let token = CancellationToken::new();
        let policy = RetryPolicy::wait_running().with_max_attempts(3);
        let start = Instant::now();
        let mut calls = 0;

        let result: Result<(), _> = with_retry(&policy, &token, |_: &Probe| true, || {
            calls += 1;
            async { Err(Probe::NotYet) }
        })
        .await;

        assert_eq!(
            result,
            Err(RetryError::Exhausted { attempts: 3, last: Probe::NotYet })
        );
        assert_eq!(calls, 3);
        assert_eq!(start.elapsed(), Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_mid_wait_returns_promptly() {
        let token = Arc::new(CancellationToken::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let start = Instant::now();

        let canceller = {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(3)).await;
                token.cancel("build interrupted");
            })
        };

        let counter = calls.clone();
        let result: Result<(), _> = with_retry(
            &RetryPolicy::wait_boot_disk(),
            &token,
            |_: &Probe| true,
            || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(Probe::NotYet) }
            },
        )
        .await;
        canceller.await.unwrap();

        assert_eq!(
            result,
            Err(RetryError::Cancelled { reason: "build interrupted".into() })
        );
        // attempts at t=0 and t=2s, cancelled while sleeping 4s
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_already_cancelled_makes_no_attempt() {
        let token = CancellationToken::new();
        token.cancel("stop");
        let mut calls = 0;

        let result: Result<(), RetryError<Probe>> =
            with_retry(&RetryPolicy::wait_running(), &token, |_| true, || {
                calls += 1;
                async { Ok(()) }
            })
            .await;

        assert!(result.unwrap_err().is_cancelled());
        assert_eq!(calls, 0);
    }
}
