use std::time::Duration;

use super::error::FetchError;

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Do not retry; the failure is terminal.
    NoRetry,
    /// Retry after the given delay.
    RetryAfter(Duration),
}

/// Fixed-interval retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first). Always >= 1.
    pub max_attempts: u32,
    /// Delay between a failed attempt and the next one.
    pub wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            wait: Duration::from_secs(3),
        }
    }
}

/// Per-request overrides; `None` falls back to the gate's default policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryOverrides {
    pub max_attempts: Option<u32>,
    pub wait: Option<Duration>,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, wait: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            wait,
        }
    }

    /// Policy that never retries.
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Build from a wait given in (possibly negative or NaN) seconds, as found in config.
    pub fn from_secs_f64(max_attempts: u32, wait_secs: f64) -> Self {
        let wait = if wait_secs.is_finite() && wait_secs > 0.0 {
            Duration::try_from_secs_f64(wait_secs).unwrap_or(Duration::MAX)
        } else {
            Duration::ZERO
        };
        Self::new(max_attempts, wait)
    }

    /// Apply per-request overrides on top of this policy, clamping the attempt count to >= 1.
    pub fn resolve(&self, overrides: &RetryOverrides) -> RetryPolicy {
        RetryPolicy::new(
            overrides.max_attempts.unwrap_or(self.max_attempts),
            overrides.wait.unwrap_or(self.wait),
        )
    }

    /// Decide what to do after attempt `attempt` (1-based) failed with `err`.
    pub fn decide(&self, attempt: u32, err: &FetchError) -> RetryDecision {
        if err.is_cancelled() || attempt >= self.max_attempts.max(1) {
            return RetryDecision::NoRetry;
        }
        RetryDecision::RetryAfter(self.wait)
    }
}
