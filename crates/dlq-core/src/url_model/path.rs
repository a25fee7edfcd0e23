//! Filename extraction from URL path.

/// Last non-empty path segment of `url`, percent-decoding left to the caller.
///
/// Returns `None` if the URL cannot be parsed or the path is empty/root.
pub fn filename_from_url_path(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.filter(|s| !s.is_empty()).last()?;
    match segment {
        "." | ".." => None,
        s => Some(s.to_string()),
    }
}
