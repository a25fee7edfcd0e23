//! Fault types produced by a fetch attempt and by the retry loop.

use std::fmt;

/// Fault raised by a single fetch attempt.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Any I/O or protocol failure. Retried while attempts remain.
    #[error(transparent)]
    Transient(#[from] anyhow::Error),
    /// The attempt was interrupted. Never retried.
    #[error("fetch cancelled")]
    Cancelled,
}

impl FetchError {
    /// Wrap any displayable fault as a transient one.
    pub fn transient(msg: impl fmt::Display) -> Self {
        FetchError::Transient(anyhow::anyhow!("{}", msg))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Cancelled)
    }
}

/// One failed attempt, kept so the terminal failure can show the full history.
#[derive(Debug)]
pub struct AttemptFailure {
    /// 1-based attempt index.
    pub attempt: u32,
    pub error: anyhow::Error,
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "attempt {}: {:#}", self.attempt, self.error)
    }
}

/// Fault that persisted through every configured attempt.
#[derive(Debug)]
pub struct TerminalFailure {
    /// Every attempt in order; never empty.
    pub attempts: Vec<AttemptFailure>,
}

impl TerminalFailure {
    pub fn attempt_count(&self) -> usize {
        self.attempts.len()
    }

    /// The fault of the final attempt.
    pub fn last(&self) -> Option<&AttemptFailure> {
        self.attempts.last()
    }
}

impl fmt::Display for TerminalFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed after {} attempt(s)", self.attempts.len())?;
        for a in &self.attempts {
            write!(f, "; {}", a)?;
        }
        Ok(())
    }
}

impl std::error::Error for TerminalFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.attempts.last().map(|a| {
            let e: &(dyn std::error::Error + 'static) = &*a.error;
            e
        })
    }
}

/// Terminal outcome of the retry loop.
#[derive(Debug, thiserror::Error)]
pub enum RetryError {
    /// Every attempt failed.
    #[error("{0}")]
    Exhausted(TerminalFailure),
    /// Attempt `attempt` was cancelled; `history` holds the failures before it.
    #[error("cancelled during attempt {attempt}")]
    Cancelled {
        attempt: u32,
        history: Vec<AttemptFailure>,
    },
}

impl RetryError {
    /// Number of attempts that were started before the loop stopped.
    pub fn attempts_made(&self) -> u32 {
        match self {
            RetryError::Exhausted(t) => t.attempts.len() as u32,
            RetryError::Cancelled { attempt, .. } => *attempt,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RetryError::Cancelled { .. })
    }
}
