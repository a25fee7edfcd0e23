//! Map curl errors and HTTP status codes onto fetch faults.

use crate::retry::FetchError;

/// Classify a curl error. An abort requested by our progress callback is a
/// cancellation; everything else is transient.
pub fn classify_curl_error(e: curl::Error) -> FetchError {
    if e.is_aborted_by_callback() {
        return FetchError::Cancelled;
    }
    FetchError::Transient(anyhow::Error::new(e).context("GET failed"))
}

/// `Ok` for 2xx, a transient fault otherwise.
pub fn classify_http_status(url: &str, code: u32) -> Result<(), FetchError> {
    if (200..300).contains(&code) {
        return Ok(());
    }
    Err(FetchError::transient(format!("GET {} returned HTTP {}", url, code)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_2xx_ok() {
        assert!(classify_http_status("http://h/", 200).is_ok());
        assert!(classify_http_status("http://h/", 204).is_ok());
    }

    #[test]
    fn http_errors_are_transient() {
        let e = classify_http_status("http://h/x", 404).unwrap_err();
        assert!(!e.is_cancelled());
        assert_eq!(e.to_string(), "GET http://h/x returned HTTP 404");
        assert!(classify_http_status("http://h/x", 503).is_err());
    }
}
