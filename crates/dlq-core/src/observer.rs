//! Observer hooks for queue events.
//!
//! The observer is handed to the gate at construction and from there to every
//! worker; workers never reach back through the gate to find it.

use std::time::Duration;

use crate::request::Request;
use crate::retry::AttemptFailure;
use crate::worker::{WorkerId, WorkerReport, WorkerStatus};

/// Receives queue events. Every hook defaults to a no-op.
pub trait QueueObserver: Send + Sync {
    /// A request got a slot at submission time.
    fn on_admitted(&self, _id: WorkerId, _request: &Request) {}
    /// A request was held because every slot was busy; `buffered` counts it.
    fn on_buffered(&self, _id: WorkerId, _target: &str, _buffered: usize) {}
    /// A held request got the slot of a finished worker.
    fn on_promoted(&self, _id: WorkerId, _request: &Request) {}
    /// An attempt failed and will be retried after `wait`.
    fn on_attempt_failed(&self, _id: WorkerId, _failure: &AttemptFailure, _wait: Duration) {}
    /// A worker reached a terminal status.
    fn on_finished(&self, _report: &WorkerReport) {}
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl QueueObserver for NoopObserver {}

/// Observer reporting through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl QueueObserver for LogObserver {
    fn on_admitted(&self, id: WorkerId, request: &Request) {
        tracing::debug!(worker = id, url = request.target(), "admitted");
    }

    fn on_buffered(&self, id: WorkerId, target: &str, buffered: usize) {
        tracing::debug!(worker = id, url = target, buffered, "queue full, request held");
    }

    fn on_promoted(&self, id: WorkerId, request: &Request) {
        tracing::debug!(worker = id, url = request.target(), "promoted from overflow");
    }

    fn on_attempt_failed(&self, id: WorkerId, failure: &AttemptFailure, wait: Duration) {
        tracing::debug!(
            worker = id,
            attempt = failure.attempt,
            "attempt failed, retrying in {:?}: {:#}",
            wait,
            failure.error
        );
    }

    fn on_finished(&self, report: &WorkerReport) {
        match (&report.status, &report.failure) {
            (WorkerStatus::Failed, Some(err)) => tracing::error!(
                worker = report.id,
                url = %report.target,
                attempts = report.attempts,
                "failed to download: {}",
                err
            ),
            (WorkerStatus::Failed, None) => {
                tracing::error!(worker = report.id, url = %report.target, "failed to download")
            }
            _ => tracing::info!(
                worker = report.id,
                url = %report.target,
                dest = %report.destination,
                attempts = report.attempts,
                "download finished"
            ),
        }
    }
}
