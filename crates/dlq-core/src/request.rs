//! Request model: what to fetch, where to put it, and per-request options.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::fetch::Fetch;
use crate::retry::RetryOverrides;
use crate::worker::WorkerReport;

/// Hook invoked once with the terminal report of a request's worker.
pub type CompletionHook = Arc<dyn Fn(&WorkerReport) + Send + Sync>;

/// In-memory destination shared between the caller and the worker.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole content (an attempt overwrites, never appends).
    pub fn replace(&self, data: Vec<u8>) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = data;
    }

    /// Copy of the current content.
    pub fn contents(&self) -> Vec<u8> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Where a fetched body ends up.
#[derive(Debug, Clone)]
pub enum Destination {
    Path(PathBuf),
    Memory(SharedBuffer),
}

impl Destination {
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Destination::Path(p) => Some(p),
            Destination::Memory(_) => None,
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Path(p) => write!(f, "{}", p.display()),
            Destination::Memory(_) => write!(f, "<memory>"),
        }
    }
}

impl From<PathBuf> for Destination {
    fn from(p: PathBuf) -> Self {
        Destination::Path(p)
    }
}

impl From<&Path> for Destination {
    fn from(p: &Path) -> Self {
        Destination::Path(p.to_path_buf())
    }
}

impl From<SharedBuffer> for Destination {
    fn from(b: SharedBuffer) -> Self {
        Destination::Memory(b)
    }
}

/// Options resolved once, when the request is built.
#[derive(Clone, Default)]
pub struct RequestOptions {
    pub retry: RetryOverrides,
    /// Called with the terminal report before the worker frees its slot.
    pub on_complete: Option<CompletionHook>,
    /// Re-raise a terminal failure on the worker's execution unit after it frees its slot.
    pub block_on_error: bool,
    /// Extra request headers, merged over the fetch operation's defaults.
    pub headers: BTreeMap<String, String>,
    /// Fetch operation for this request only; the gate's default is used when unset.
    pub fetch: Option<Arc<dyn Fetch>>,
}

impl fmt::Debug for RequestOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestOptions")
            .field("retry", &self.retry)
            .field("on_complete", &self.on_complete.is_some())
            .field("block_on_error", &self.block_on_error)
            .field("headers", &self.headers)
            .field("fetch", &self.fetch.is_some())
            .finish()
    }
}

/// A fetch request. Immutable once submitted.
#[derive(Debug, Clone)]
pub struct Request {
    target: String,
    destination: Destination,
    options: RequestOptions,
}

impl Request {
    pub fn new(target: impl Into<String>, destination: impl Into<Destination>) -> Self {
        Self {
            target: target.into(),
            destination: destination.into(),
            options: RequestOptions::default(),
        }
    }

    pub fn attempts(mut self, n: u32) -> Self {
        self.options.retry.max_attempts = Some(n);
        self
    }

    pub fn wait(mut self, d: Duration) -> Self {
        self.options.retry.wait = Some(d);
        self
    }

    pub fn on_complete<F>(mut self, hook: F) -> Self
    where
        F: Fn(&WorkerReport) + Send + Sync + 'static,
    {
        self.options.on_complete = Some(Arc::new(hook));
        self
    }

    pub fn block_on_error(mut self, yes: bool) -> Self {
        self.options.block_on_error = yes;
        self
    }

    /// Run this request with its own fetch operation instead of the gate's.
    pub fn fetch_with(mut self, fetch: impl Fetch + 'static) -> Self {
        self.options.fetch = Some(Arc::new(fetch));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.headers.insert(name.into(), value.into());
        self
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    pub fn options(&self) -> &RequestOptions {
        &self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_overrides() {
        let r = Request::new("https://example.com/a.iso", PathBuf::from("/tmp/a.iso"))
            .attempts(3)
            .wait(Duration::ZERO)
            .block_on_error(true)
            .header("Referer", "https://example.com/");
        assert_eq!(r.target(), "https://example.com/a.iso");
        assert_eq!(r.destination().as_path(), Some(Path::new("/tmp/a.iso")));
        assert_eq!(r.options().retry.max_attempts, Some(3));
        assert_eq!(r.options().retry.wait, Some(Duration::ZERO));
        assert!(r.options().block_on_error);
        assert_eq!(
            r.options().headers.get("Referer").map(String::as_str),
            Some("https://example.com/")
        );
    }

    #[test]
    fn own_fetch_is_optional() {
        let plain = Request::new("mem://a", SharedBuffer::new());
        assert!(plain.options().fetch.is_none());
        let custom = plain.fetch_with(|_: &Request| -> Result<(), crate::FetchError> { Ok(()) });
        assert!(custom.options().fetch.is_some());
        assert!(format!("{:?}", custom.options()).contains("fetch: true"));
    }

    #[test]
    fn shared_buffer_replace_overwrites() {
        let b = SharedBuffer::new();
        b.replace(b"first attempt, longer".to_vec());
        b.replace(b"second".to_vec());
        assert_eq!(b.contents(), b"second");
        assert_eq!(Destination::from(b).to_string(), "<memory>");
    }
}
