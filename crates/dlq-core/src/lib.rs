//! Bounded-concurrency download queue with retry.
//!
//! Submit [`Request`]s to an [`AdmissionGate`]; at most `capacity` of them are
//! fetched at once, the rest wait in an overflow buffer and are promoted as
//! slots free up. Each fetch runs under a [`RetryPolicy`].

pub mod config;
pub mod executor;
pub mod fetch;
pub mod gate;
pub mod logging;
pub mod observer;
pub mod request;
pub mod retry;
pub mod url_model;
pub mod worker;

pub use executor::{Executor, ThreadExecutor, TokioExecutor};
pub use fetch::{Fetch, HttpFetch, HttpOptions};
pub use gate::{AdmissionGate, GateBuilder, GateError, GateStats, OverflowBuffer, ReleaseOrder};
pub use observer::{LogObserver, NoopObserver, QueueObserver};
pub use request::{Destination, Request, RequestOptions, SharedBuffer};
pub use retry::{FetchError, RetryError, RetryOverrides, RetryPolicy, TerminalFailure};
pub use worker::{Worker, WorkerId, WorkerReport, WorkerStatus};
