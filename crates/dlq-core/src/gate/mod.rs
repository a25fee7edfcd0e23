//! Admission gate: at most `capacity` fetches in flight, the rest held in order.
//!
//! `submit` either starts a worker right away or holds the request in the
//! overflow buffer. When a worker finishes it hands its slot straight to the
//! next held request, so the live count stays constant across a promotion.
//!
//! ## Invariants
//! - `0 <= live <= capacity`, and `live` equals the number of workers between
//!   admission and their completion report.
//! - The overflow buffer is only non-empty while every slot is taken.
//! - `live` and the buffer change only under the gate lock; the lock is never
//!   held while a fetch runs or while a worker is being started.
//! - A worker whose execution unit cannot be started is failed and its slot
//!   passed on without recursion.

mod error;
mod overflow;

pub use error::GateError;
pub use overflow::{OverflowBuffer, ReleaseOrder};

use std::sync::atomic::{AtomicU64, Ordering};
use std::io;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::executor::{Executor, Task, ThreadExecutor};
use crate::fetch::Fetch;
use crate::observer::{LogObserver, QueueObserver};
use crate::request::Request;
use crate::retry::RetryPolicy;
use crate::worker::{SlotOwner, Worker, WorkerId, WorkerReport, WorkerStatus};

/// Counters over the lifetime of a gate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GateStats {
    pub submitted: u64,
    pub succeeded: u64,
    pub failed: u64,
}

/// A request waiting for a slot, with the id it was given at submission.
#[derive(Debug)]
struct Held {
    id: WorkerId,
    request: Request,
}

#[derive(Debug)]
struct GateState {
    live: usize,
    overflow: OverflowBuffer<Held>,
    stats: GateStats,
}

struct Shared {
    capacity: usize,
    state: Mutex<GateState>,
    idle: Condvar,
    fetch: Arc<dyn Fetch>,
    executor: Arc<dyn Executor>,
    observer: Arc<dyn QueueObserver>,
    retry: RetryPolicy,
    next_id: AtomicU64,
}

impl Shared {
    /// Bookkeeping stays consistent even if a holder panicked, so poison is ignored.
    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a worker for a request whose slot is already counted in `live`.
    ///
    /// A request carrying its own fetch uses it; the rest use the gate's. On a
    /// spawn failure the worker is settled here without reporting back, and its
    /// report is returned so the caller can release the slot.
    fn launch(
        self: &Arc<Self>,
        id: WorkerId,
        request: Request,
    ) -> Result<(), (WorkerReport, io::Error)> {
        let fetch = match request.options().fetch.as_ref() {
            Some(own) => Arc::clone(own),
            None => Arc::clone(&self.fetch),
        };
        let owner: Arc<dyn SlotOwner> = Arc::clone(self) as Arc<dyn SlotOwner>;
        let worker = Worker::new(
            id,
            request,
            &self.retry,
            fetch,
            Arc::clone(&self.observer),
            owner,
        );
        let slot = Arc::new(Mutex::new(Some(worker)));
        let task_slot = Arc::clone(&slot);
        let task: Task = Box::new(move || {
            let worker = task_slot.lock().unwrap_or_else(PoisonError::into_inner).take();
            if let Some(worker) = worker {
                worker.run();
            }
        });
        match self.executor.execute(format!("dlq-worker-{}", id), task) {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::error!(worker = id, "could not start worker: {}", e);
                let unstarted = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
                match unstarted {
                    Some(worker) => Err((worker.abandon(&e), e)),
                    // The executor ran the task before failing; it reported already.
                    None => Ok(()),
                }
            }
        }
    }

    /// Account for a finished worker and claim its slot for the next held request, if any.
    fn release(&self, report: &WorkerReport) -> Option<Held> {
        let mut st = self.lock();
        debug_assert!(st.live > 0, "completion reported with no live workers");
        st.live = st.live.saturating_sub(1);
        match report.status {
            WorkerStatus::Succeeded => st.stats.succeeded += 1,
            _ => st.stats.failed += 1,
        }
        let next = if st.overflow.is_empty() {
            None
        } else {
            match st.overflow.pop_next() {
                Ok(held) => {
                    st.live += 1;
                    Some(held)
                }
                Err(e) => {
                    tracing::error!("overflow bookkeeping: {}", e);
                    None
                }
            }
        };
        if st.live == 0 && st.overflow.is_empty() {
            self.idle.notify_all();
        }
        next
    }
}

impl SlotOwner for Shared {
    fn on_worker_complete(self: Arc<Self>, report: &WorkerReport) {
        // Promotions whose spawn fails are released in this loop, so a long
        // run of failures never nests.
        let mut next = self.release(report);
        while let Some(Held { id, request }) = next.take() {
            self.observer.on_promoted(id, &request);
            if let Err((unstarted, _)) = self.launch(id, request) {
                next = self.release(&unstarted);
            }
        }
    }
}

/// Builder for [`AdmissionGate`].
pub struct GateBuilder {
    capacity: usize,
    retry: RetryPolicy,
    order: ReleaseOrder,
    executor: Arc<dyn Executor>,
    observer: Arc<dyn QueueObserver>,
}

impl GateBuilder {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            retry: RetryPolicy::default(),
            order: ReleaseOrder::default(),
            executor: Arc::new(ThreadExecutor),
            observer: Arc::new(LogObserver),
        }
    }

    /// Default retry policy for requests without overrides.
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn release_order(mut self, order: ReleaseOrder) -> Self {
        self.order = order;
        self
    }

    pub fn executor(mut self, executor: impl Executor + 'static) -> Self {
        self.executor = Arc::new(executor);
        self
    }

    pub fn observer(mut self, observer: impl QueueObserver + 'static) -> Self {
        self.observer = Arc::new(observer);
        self
    }

    pub fn build(self, fetch: impl Fetch + 'static) -> Result<AdmissionGate, GateError> {
        self.build_arc(Arc::new(fetch))
    }

    pub fn build_arc(self, fetch: Arc<dyn Fetch>) -> Result<AdmissionGate, GateError> {
        if self.capacity < 1 {
            return Err(GateError::InvalidCapacity(self.capacity));
        }
        let GateBuilder {
            capacity,
            retry,
            order,
            executor,
            observer,
        } = self;
        let shared = Arc::new(Shared {
            capacity,
            state: Mutex::new(GateState {
                live: 0,
                overflow: OverflowBuffer::new(order),
                stats: GateStats::default(),
            }),
            idle: Condvar::new(),
            fetch,
            executor,
            observer,
            retry,
            next_id: AtomicU64::new(1),
        });
        Ok(AdmissionGate { shared })
    }
}

/// Bounded-concurrency download queue.
///
/// Dropping the gate drains it, so work submitted in a scope is finished when
/// the scope closes.
pub struct AdmissionGate {
    shared: Arc<Shared>,
}

impl AdmissionGate {
    /// Gate with default policy, FIFO release, one thread per worker and `tracing` output.
    pub fn new(capacity: usize, fetch: impl Fetch + 'static) -> Result<Self, GateError> {
        GateBuilder::new(capacity).build(fetch)
    }

    pub fn builder(capacity: usize) -> GateBuilder {
        GateBuilder::new(capacity)
    }

    /// Start `request` now if a slot is free, otherwise hold it. Never waits for a fetch.
    ///
    /// Returns the id of the worker that runs (or will run) the request.
    pub fn submit(&self, request: Request) -> Result<WorkerId, GateError> {
        let shared = &self.shared;
        let id = shared.next_id.fetch_add(1, Ordering::Relaxed);
        let admitted = {
            let mut st = shared.lock();
            st.stats.submitted += 1;
            if st.live < shared.capacity {
                st.live += 1;
                Ok(request)
            } else {
                let target = request.target().to_string();
                st.overflow.push(Held { id, request });
                Err((target, st.overflow.len()))
            }
        };

        match admitted {
            Ok(request) => {
                shared.observer.on_admitted(id, &request);
                if let Err((unstarted, e)) = shared.launch(id, request) {
                    Arc::clone(shared).on_worker_complete(&unstarted);
                    return Err(GateError::Spawn(e));
                }
            }
            Err((target, held)) => shared.observer.on_buffered(id, &target, held),
        }
        Ok(id)
    }

    /// Block until no worker is live and nothing is held. Returns at once on an idle gate.
    ///
    /// Callers must not submit while a drain is in progress.
    pub fn drain(&self) {
        let st = self.shared.lock();
        let _st = self
            .shared
            .idle
            .wait_while(st, |st| st.live > 0 || !st.overflow.is_empty())
            .unwrap_or_else(PoisonError::into_inner);
    }

    /// Like [`drain`](Self::drain) but gives up after `timeout`. Returns true if the gate is idle.
    pub fn drain_timeout(&self, timeout: Duration) -> bool {
        let st = self.shared.lock();
        let (st, _) = self
            .shared
            .idle
            .wait_timeout_while(st, timeout, |st| st.live > 0 || !st.overflow.is_empty())
            .unwrap_or_else(PoisonError::into_inner);
        st.live == 0 && st.overflow.is_empty()
    }

    /// Number of live workers (observational).
    pub fn remaining(&self) -> usize {
        self.shared.lock().live
    }

    /// Number of held requests (observational).
    pub fn buffered(&self) -> usize {
        self.shared.lock().overflow.len()
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    pub fn release_order(&self) -> ReleaseOrder {
        self.shared.lock().overflow.order()
    }

    pub fn stats(&self) -> GateStats {
        self.shared.lock().stats
    }
}

impl Drop for AdmissionGate {
    fn drop(&mut self) {
        let (live, held) = {
            let st = self.shared.lock();
            (st.live, st.overflow.len())
        };
        if live > 0 || held > 0 {
            tracing::warn!(
                live,
                held,
                "download queue dropped before all downloads finished; waiting"
            );
            self.drain();
        }
    }
}

impl std::fmt::Debug for AdmissionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.shared.lock();
        f.debug_struct("AdmissionGate")
            .field("capacity", &self.shared.capacity)
            .field("live", &st.live)
            .field("buffered", &st.overflow.len())
            .finish()
    }
}
