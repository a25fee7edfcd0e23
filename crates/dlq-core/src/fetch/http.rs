//! HTTP GET fetch backed by libcurl.
//!
//! Each attempt buffers the full response body in memory and only then writes
//! the destination, so a failed attempt never leaves a half-written file behind.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::classify::{classify_curl_error, classify_http_status};
use super::store::store_body;
use super::Fetch;
use crate::request::{Destination, Request};
use crate::retry::FetchError;

/// Servers tend to treat the default curl agent as a bot; look like a browser instead.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 6.3; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/67.0.3396.99 Safari/537.36";

/// Transfer settings shared by every request fetched through one [`HttpFetch`].
#[derive(Debug, Clone)]
pub struct HttpOptions {
    pub user_agent: String,
    pub connect_timeout: Duration,
    /// Upper bound for a whole attempt.
    pub timeout: Duration,
    /// Receive buffer size hint for libcurl (None = library default).
    pub buffer_size: Option<usize>,
    /// When false, a request whose destination file already exists fails.
    pub overwrite_existing: bool,
    /// Headers sent with every request; per-request headers win on conflict.
    pub headers: BTreeMap<String, String>,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            connect_timeout: Duration::from_secs(30),
            timeout: Duration::from_secs(3600),
            buffer_size: None,
            overwrite_existing: false,
            headers: BTreeMap::new(),
        }
    }
}

/// [`Fetch`] implementation issuing a plain HTTP GET per attempt.
#[derive(Debug, Clone, Default)]
pub struct HttpFetch {
    opts: HttpOptions,
    abort: Option<Arc<AtomicBool>>,
}

impl HttpFetch {
    pub fn new(opts: HttpOptions) -> Self {
        Self { opts, abort: None }
    }

    /// Attach an abort token. Once set, running transfers stop and new attempts
    /// fail with [`FetchError::Cancelled`].
    pub fn with_abort(mut self, abort: Arc<AtomicBool>) -> Self {
        self.abort = Some(abort);
        self
    }

    pub fn options(&self) -> &HttpOptions {
        &self.opts
    }

    fn aborted(&self) -> bool {
        self.abort
            .as_ref()
            .map(|a| a.load(Ordering::Relaxed))
            .unwrap_or(false)
    }

    fn merged_headers<'a>(&'a self, request: &'a Request) -> BTreeMap<&'a str, &'a str> {
        let mut merged: BTreeMap<&str, &str> = self
            .opts
            .headers
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        for (k, v) in &request.options().headers {
            merged.insert(k.as_str(), v.as_str());
        }
        merged
    }

    /// GET the target and return the whole body.
    fn get(&self, request: &Request) -> Result<Vec<u8>, FetchError> {
        let url = request.target();
        let mut body: Vec<u8> = Vec::new();

        let mut easy = curl::easy::Easy::new();
        easy.url(url).map_err(classify_curl_error)?;
        easy.follow_location(true).map_err(classify_curl_error)?;
        easy.max_redirections(10).map_err(classify_curl_error)?;
        easy.useragent(&self.opts.user_agent)
            .map_err(classify_curl_error)?;
        easy.connect_timeout(self.opts.connect_timeout)
            .map_err(classify_curl_error)?;
        easy.timeout(self.opts.timeout).map_err(classify_curl_error)?;
        if let Some(sz) = self.opts.buffer_size {
            easy.buffer_size(sz).map_err(classify_curl_error)?;
        }

        let headers = self.merged_headers(request);
        if !headers.is_empty() {
            let mut list = curl::easy::List::new();
            for (k, v) in &headers {
                list.append(&format!("{}: {}", k.trim(), v.trim()))
                    .map_err(classify_curl_error)?;
            }
            easy.http_headers(list).map_err(classify_curl_error)?;
        }
        if self.abort.is_some() {
            easy.progress(true).map_err(classify_curl_error)?;
        }

        {
            let mut transfer = easy.transfer();
            transfer
                .write_function(|data| {
                    body.extend_from_slice(data);
                    Ok(data.len())
                })
                .map_err(classify_curl_error)?;
            if let Some(abort) = self.abort.as_ref() {
                transfer
                    .progress_function(move |_, _, _, _| !abort.load(Ordering::Relaxed))
                    .map_err(classify_curl_error)?;
            }
            transfer.perform().map_err(classify_curl_error)?;
        }

        let code = easy.response_code().map_err(classify_curl_error)?;
        classify_http_status(url, code)?;
        Ok(body)
    }
}

impl Fetch for HttpFetch {
    fn fetch(&self, request: &Request) -> Result<(), FetchError> {
        if self.aborted() {
            return Err(FetchError::Cancelled);
        }
        if let Destination::Path(p) = request.destination() {
            if !self.opts.overwrite_existing && p.exists() {
                return Err(FetchError::transient(format!(
                    "destination already exists: {}",
                    p.display()
                )));
            }
        }
        let body = self.get(request)?;
        tracing::debug!(url = request.target(), bytes = body.len(), "GET complete");
        store_body(request.destination(), body)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::SharedBuffer;

    #[test]
    fn request_headers_override_defaults() {
        let mut opts = HttpOptions::default();
        opts.headers.insert("Accept".into(), "*/*".into());
        opts.headers.insert("Referer".into(), "https://a/".into());
        let fetch = HttpFetch::new(opts);
        let req = Request::new("http://127.0.0.1/", SharedBuffer::new())
            .header("Referer", "https://b/");
        let merged = fetch.merged_headers(&req);
        assert_eq!(merged.get("Accept"), Some(&"*/*"));
        assert_eq!(merged.get("Referer"), Some(&"https://b/"));
    }

    #[test]
    fn aborted_fetch_is_cancelled_without_io() {
        let abort = Arc::new(AtomicBool::new(true));
        let fetch = HttpFetch::default().with_abort(abort);
        let req = Request::new("http://127.0.0.1:9/never", SharedBuffer::new());
        assert!(fetch.fetch(&req).unwrap_err().is_cancelled());
    }

    #[test]
    fn existing_destination_refused_without_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exists.bin");
        std::fs::write(&path, b"old").unwrap();
        let fetch = HttpFetch::default();
        let req = Request::new("http://127.0.0.1:9/x", path.clone());
        let err = fetch.fetch(&req).unwrap_err();
        assert!(err.to_string().contains("already exists"));
        assert_eq!(std::fs::read(&path).unwrap(), b"old");
    }
}
