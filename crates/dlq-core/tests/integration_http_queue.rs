//! Integration test: HTTP fetches through the admission gate against a local server.
//!
//! Covers file and memory destinations, retry on HTTP errors, exhaustion and
//! aborting a transfer that is already running.

mod common;

use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use dlq_core::{
    AdmissionGate, HttpFetch, HttpOptions, NoopObserver, Request, RetryError, RetryPolicy,
    SharedBuffer, TokioExecutor, WorkerReport, WorkerStatus,
};
use tempfile::tempdir;

fn body() -> Vec<u8> {
    (0u8..100).cycle().take(64 * 1024).collect()
}

fn gate(capacity: usize, fetch: HttpFetch, policy: RetryPolicy) -> AdmissionGate {
    AdmissionGate::builder(capacity)
        .retry(policy)
        .observer(NoopObserver)
        .build(fetch)
        .unwrap()
}

/// Completion hook that stores every report it sees.
fn collect(reports: &Arc<Mutex<Vec<WorkerReport>>>) -> impl Fn(&WorkerReport) + Send + Sync {
    let reports = Arc::clone(reports);
    move |r: &WorkerReport| reports.lock().unwrap().push(r.clone())
}

#[test]
fn files_download_through_gate_and_match_body() {
    let body = body();
    let server = common::http_server::start(body.clone());
    let dir = tempdir().unwrap();
    let reports = Arc::new(Mutex::new(Vec::new()));

    let gate = gate(2, HttpFetch::default(), RetryPolicy::new(3, Duration::ZERO));
    for i in 0..5 {
        let dest = dir.path().join(format!("out-{}.bin", i));
        let url = server.url(&format!("/file/{}.bin", i));
        gate.submit(Request::new(url, dest).on_complete(collect(&reports)))
            .unwrap();
    }
    gate.drain();

    let reports = reports.lock().unwrap();
    assert_eq!(reports.len(), 5);
    assert!(reports.iter().all(|r| r.status == WorkerStatus::Succeeded));
    for i in 0..5 {
        let path = dir.path().join(format!("out-{}.bin", i));
        assert_eq!(std::fs::read(&path).unwrap(), body, "file {} content", i);
        let mut part = path.into_os_string();
        part.push(".part");
        assert!(!std::path::Path::new(&part).exists(), "no temp file left");
    }
    assert_eq!(gate.stats().succeeded, 5);
    assert_eq!(gate.remaining(), 0);
}

#[test]
fn missing_url_fails_after_all_attempts() {
    let server = common::http_server::start(body());
    let dir = tempdir().unwrap();
    let dest = dir.path().join("missing.bin");
    let reports = Arc::new(Mutex::new(Vec::new()));

    let gate = gate(1, HttpFetch::default(), RetryPolicy::new(3, Duration::ZERO));
    gate.submit(Request::new(server.url("/missing"), dest.clone()).on_complete(collect(&reports)))
        .unwrap();
    gate.drain();

    let reports = reports.lock().unwrap();
    assert_eq!(reports.len(), 1);
    let report = &reports[0];
    assert_eq!(report.status, WorkerStatus::Failed);
    assert_eq!(report.attempts, 3);
    match report.failure.as_deref() {
        Some(RetryError::Exhausted(terminal)) => {
            assert_eq!(terminal.attempts.len(), 3);
            assert!(terminal.to_string().contains("HTTP 404"));
        }
        other => panic!("expected exhausted failure, got {:?}", other),
    }
    assert_eq!(server.hits("/missing"), 3);
    assert!(!dest.exists());
    assert_eq!(gate.stats().failed, 1);
}

#[test]
fn flaky_url_succeeds_after_retries() {
    let body = body();
    let server = common::http_server::start(body.clone());
    let buf = SharedBuffer::new();
    let reports = Arc::new(Mutex::new(Vec::new()));

    let gate = gate(1, HttpFetch::default(), RetryPolicy::new(5, Duration::from_millis(10)));
    gate.submit(
        Request::new(server.url("/flaky/a"), buf.clone()).on_complete(collect(&reports)),
    )
    .unwrap();
    gate.drain();

    let reports = reports.lock().unwrap();
    assert_eq!(reports[0].status, WorkerStatus::Succeeded);
    assert_eq!(reports[0].attempts, 3);
    assert_eq!(server.hits("/flaky/a"), 3);
    assert_eq!(buf.contents(), body);
}

#[test]
fn per_request_attempts_limit_flaky_url() {
    let server = common::http_server::start(body());
    let buf = SharedBuffer::new();
    let reports = Arc::new(Mutex::new(Vec::new()));

    let gate = gate(1, HttpFetch::default(), RetryPolicy::new(10, Duration::ZERO));
    gate.submit(
        Request::new(server.url("/flaky/b"), buf.clone())
            .attempts(2)
            .on_complete(collect(&reports)),
    )
    .unwrap();
    gate.drain();

    let reports = reports.lock().unwrap();
    assert_eq!(reports[0].status, WorkerStatus::Failed);
    assert_eq!(reports[0].attempts, 2);
    assert!(buf.is_empty());
}

#[test]
fn existing_file_kept_unless_overwrite_enabled() {
    let body = body();
    let server = common::http_server::start(body.clone());
    let dir = tempdir().unwrap();
    let dest = dir.path().join("exists.bin");
    std::fs::write(&dest, b"old").unwrap();

    {
        let gate = gate(1, HttpFetch::default(), RetryPolicy::once());
        gate.submit(Request::new(server.url("/file/x"), dest.clone()))
            .unwrap();
    }
    assert_eq!(std::fs::read(&dest).unwrap(), b"old");

    let opts = HttpOptions {
        overwrite_existing: true,
        ..HttpOptions::default()
    };
    {
        let gate = gate(1, HttpFetch::new(opts), RetryPolicy::once());
        gate.submit(Request::new(server.url("/file/x"), dest.clone()))
            .unwrap();
    }
    assert_eq!(std::fs::read(&dest).unwrap(), body);
}

#[test]
fn abort_token_stops_running_transfer_without_retry() {
    let server = common::http_server::start(body());
    let abort = Arc::new(AtomicBool::new(false));
    let reports = Arc::new(Mutex::new(Vec::new()));

    let fetch = HttpFetch::default().with_abort(Arc::clone(&abort));
    let gate = gate(1, fetch, RetryPolicy::new(5, Duration::ZERO));
    let started = Instant::now();
    gate.submit(
        Request::new(server.url("/slow"), SharedBuffer::new()).on_complete(collect(&reports)),
    )
    .unwrap();
    std::thread::sleep(Duration::from_millis(200));
    abort.store(true, std::sync::atomic::Ordering::Relaxed);
    assert!(gate.drain_timeout(Duration::from_secs(10)), "gate idles after abort");

    let reports = reports.lock().unwrap();
    assert_eq!(reports[0].status, WorkerStatus::Failed);
    assert!(reports[0].failure.as_ref().unwrap().is_cancelled());
    assert_eq!(reports[0].attempts, 1);
    assert_eq!(server.hits("/slow"), 1);
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test(flavor = "multi_thread")]
async fn tokio_executor_runs_http_fetches() {
    let body = body();
    let server = common::http_server::start(body.clone());
    let buffers: Vec<SharedBuffer> = (0..4).map(|_| SharedBuffer::new()).collect();

    let gate = AdmissionGate::builder(2)
        .retry(RetryPolicy::new(3, Duration::ZERO))
        .executor(TokioExecutor::current())
        .observer(NoopObserver)
        .build(HttpFetch::default())
        .unwrap();
    for (i, buf) in buffers.iter().enumerate() {
        gate.submit(Request::new(server.url(&format!("/file/{}", i)), buf.clone()))
            .unwrap();
    }
    let gate = tokio::task::spawn_blocking(move || {
        gate.drain();
        gate
    })
    .await
    .unwrap();

    assert_eq!(gate.stats().succeeded, 4);
    for buf in &buffers {
        assert_eq!(buf.contents(), body);
    }
}
