//! Retry policy and retry loop.
//!
//! Every fault raised by a fetch attempt is retried after a fixed wait until
//! the attempt budget is spent; a cancellation is never retried. The terminal
//! failure keeps the fault of every attempt so intermittent and persistent
//! failures can be told apart.

mod error;
mod policy;
mod run;

pub use error::{AttemptFailure, FetchError, RetryError, TerminalFailure};
pub use policy::{RetryDecision, RetryOverrides, RetryPolicy};
pub use run::{run_with_retry, run_with_retry_notify};
