//! Worker: one admitted request, one execution unit, one completion report.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::fetch::Fetch;
use crate::observer::QueueObserver;
use crate::request::{Destination, Request};
use crate::retry::{run_with_retry_notify, AttemptFailure, RetryError, RetryPolicy, TerminalFailure};

/// Identifier assigned to a request when it is submitted.
pub type WorkerId = u64;

/// Lifecycle of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl WorkerStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkerStatus::Pending => "pending",
            WorkerStatus::Running => "running",
            WorkerStatus::Succeeded => "succeeded",
            WorkerStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, WorkerStatus::Succeeded | WorkerStatus::Failed)
    }
}

impl fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a worker, handed to completion hooks and observers.
#[derive(Debug, Clone)]
pub struct WorkerReport {
    pub id: WorkerId,
    pub target: String,
    pub destination: Destination,
    pub status: WorkerStatus,
    /// Attempts started so far.
    pub attempts: u32,
    /// Terminal failure, when `status` is `Failed`.
    pub failure: Option<Arc<RetryError>>,
}

impl WorkerReport {
    pub fn succeeded(&self) -> bool {
        self.status == WorkerStatus::Succeeded
    }
}

/// Whoever handed the worker its slot. Told exactly once when the worker is done.
pub trait SlotOwner: Send + Sync {
    fn on_worker_complete(self: Arc<Self>, report: &WorkerReport);
}

/// Runs one request's fetch under its retry policy.
///
/// Completion is reported from `run` or, failing that, from `Drop`; a worker
/// that never ran or whose fetch panicked still frees its slot.
pub struct Worker {
    id: WorkerId,
    request: Request,
    policy: RetryPolicy,
    fetch: Arc<dyn Fetch>,
    observer: Arc<dyn QueueObserver>,
    owner: Arc<dyn SlotOwner>,
    status: WorkerStatus,
    attempts: u32,
    failure: Option<Arc<RetryError>>,
    reported: bool,
}

impl Worker {
    /// Build a worker; per-request retry overrides are resolved against `defaults` here, once.
    pub fn new(
        id: WorkerId,
        request: Request,
        defaults: &RetryPolicy,
        fetch: Arc<dyn Fetch>,
        observer: Arc<dyn QueueObserver>,
        owner: Arc<dyn SlotOwner>,
    ) -> Self {
        let policy = defaults.resolve(&request.options().retry);
        Self {
            id,
            request,
            policy,
            fetch,
            observer,
            owner,
            status: WorkerStatus::Pending,
            attempts: 0,
            failure: None,
            reported: false,
        }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    pub fn status(&self) -> WorkerStatus {
        self.status
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run the fetch to a terminal status and free the slot.
    ///
    /// With `block_on_error` set on the request, a terminal failure is re-raised
    /// as a panic on the current execution unit after the slot is freed, so the
    /// runtime's uncaught-fault handling sees it.
    pub fn run(mut self) {
        self.status = WorkerStatus::Running;
        tracing::debug!(worker = self.id, url = self.request.target(), "attempting to download");

        // Counted on the worker itself so a panicking fetch still reports its attempt.
        self.attempts = 0;
        let result = {
            let Worker {
                id,
                request,
                policy,
                fetch,
                observer,
                attempts,
                ..
            } = &mut self;
            let id = *id;
            run_with_retry_notify(
                policy,
                |failure, wait| observer.on_attempt_failed(id, failure, wait),
                || {
                    *attempts += 1;
                    fetch.fetch(request)
                },
            )
        };
        match result {
            Ok(()) => self.status = WorkerStatus::Succeeded,
            Err(e) => {
                self.status = WorkerStatus::Failed;
                self.failure = Some(Arc::new(e));
            }
        }

        let escalate = if self.request.options().block_on_error {
            self.failure.clone()
        } else {
            None
        };
        self.finish();
        if let Some(failure) = escalate {
            panic!("download of {} failed: {}", self.request.target(), failure);
        }
    }

    fn report(&self) -> WorkerReport {
        WorkerReport {
            id: self.id,
            target: self.request.target().to_string(),
            destination: self.request.destination().clone(),
            status: self.status,
            attempts: self.attempts,
            failure: self.failure.clone(),
        }
    }

    /// Fail a worker whose execution unit could not be started.
    ///
    /// The completion hook and observer run as usual, but the owner is not told:
    /// the returned report is for the caller to account for.
    pub(crate) fn abandon(mut self, reason: &dyn fmt::Display) -> WorkerReport {
        self.status = WorkerStatus::Failed;
        self.failure = Some(synthetic_failure(
            self.attempts.max(1),
            format!("could not start worker: {}", reason),
        ));
        match self.settle() {
            Some(report) => report,
            None => self.report(),
        }
    }

    /// Settle the status, run the completion hook, and tell the owner. Idempotent.
    fn finish(&mut self) {
        if let Some(report) = self.settle() {
            Arc::clone(&self.owner).on_worker_complete(&report);
        }
    }

    /// Give the worker a terminal status and run the hook and observer, once.
    fn settle(&mut self) -> Option<WorkerReport> {
        if self.reported {
            return None;
        }
        self.reported = true;

        if !self.status.is_terminal() {
            let reason = if self.status == WorkerStatus::Pending {
                "worker never started"
            } else if std::thread::panicking() {
                "worker panicked during fetch"
            } else {
                "worker stopped before reaching a result"
            };
            self.status = WorkerStatus::Failed;
            self.failure = Some(synthetic_failure(self.attempts.max(1), reason.to_string()));
        }

        let report = self.report();
        if let Some(hook) = self.request.options().on_complete.as_ref() {
            if catch_unwind(AssertUnwindSafe(|| hook(&report))).is_err() {
                tracing::warn!(worker = self.id, "completion hook panicked");
            }
        }
        self.observer.on_finished(&report);
        Some(report)
    }
}

fn synthetic_failure(attempt: u32, reason: String) -> Arc<RetryError> {
    Arc::new(RetryError::Exhausted(TerminalFailure {
        attempts: vec![AttemptFailure {
            attempt,
            error: anyhow::anyhow!(reason),
        }],
    }))
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.finish();
    }
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.id)
            .field("target", &self.request.target())
            .field("status", &self.status)
            .field("policy", &self.policy)
            .finish()
    }
}
