//! Retry loop: run a closure until success, cancellation, or the policy says stop.

use std::time::Duration;

use super::error::{AttemptFailure, FetchError, RetryError, TerminalFailure};
use super::policy::{RetryDecision, RetryPolicy};

/// Runs `f` until it succeeds or the policy says to stop.
/// On retryable failure, sleeps for the policy's wait then tries again.
pub fn run_with_retry<T, F>(policy: &RetryPolicy, f: F) -> Result<T, RetryError>
where
    F: FnMut() -> Result<T, FetchError>,
{
    run_with_retry_notify(policy, |_, _| {}, f)
}

/// Like [`run_with_retry`], but calls `notify` with each retryable failure and the
/// delay about to be slept. `notify` runs exactly once per wait.
pub fn run_with_retry_notify<T, F, N>(
    policy: &RetryPolicy,
    mut notify: N,
    mut f: F,
) -> Result<T, RetryError>
where
    F: FnMut() -> Result<T, FetchError>,
    N: FnMut(&AttemptFailure, Duration),
{
    let mut history: Vec<AttemptFailure> = Vec::new();
    let mut attempt = 1u32;
    loop {
        let err = match f() {
            Ok(v) => return Ok(v),
            Err(e) => e,
        };
        let decision = policy.decide(attempt, &err);
        let error = match err {
            FetchError::Cancelled => {
                tracing::debug!(attempt, "attempt cancelled, not retrying");
                return Err(RetryError::Cancelled { attempt, history });
            }
            FetchError::Transient(e) => e,
        };
        history.push(AttemptFailure { attempt, error });
        match decision {
            RetryDecision::NoRetry => {
                return Err(RetryError::Exhausted(TerminalFailure { attempts: history }));
            }
            RetryDecision::RetryAfter(d) => {
                if let Some(last) = history.last() {
                    notify(last, d);
                }
                if !d.is_zero() {
                    std::thread::sleep(d);
                }
                attempt += 1;
            }
        }
    }
}
