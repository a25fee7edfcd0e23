//! The fetch operation: given a request, transfer its target into its destination.
//!
//! The queue treats a fetch as opaque. Implementations must be safe to call
//! again for the same request after a failed attempt: a retry overwrites the
//! destination, it never appends to what a failed attempt left behind.

mod classify;
mod http;
mod store;

pub use classify::{classify_curl_error, classify_http_status};
pub use http::{HttpFetch, HttpOptions, DEFAULT_USER_AGENT};
pub use store::{store_body, temp_path, TEMP_SUFFIX};

use crate::request::Request;
use crate::retry::FetchError;

/// A fallible transfer of one request.
pub trait Fetch: Send + Sync {
    fn fetch(&self, request: &Request) -> Result<(), FetchError>;
}

impl<F> Fetch for F
where
    F: Fn(&Request) -> Result<(), FetchError> + Send + Sync,
{
    fn fetch(&self, request: &Request) -> Result<(), FetchError> {
        self(request)
    }
}
