//! Destination naming: derive a safe local file name from a request URL.

mod path;
mod sanitize;

pub use path::filename_from_url_path;
pub use sanitize::sanitize_filename;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Default filename when the URL path yields nothing usable.
pub const DEFAULT_FILENAME: &str = "download.bin";

/// Safe file name for `url`: last path segment, sanitized, or [`DEFAULT_FILENAME`].
pub fn derive_filename(url: &str) -> String {
    let sanitized = filename_from_url_path(url)
        .map(|raw| sanitize_filename(&raw))
        .unwrap_or_default();
    if sanitized.is_empty() || sanitized == "." || sanitized == ".." {
        DEFAULT_FILENAME.to_string()
    } else {
        sanitized
    }
}

/// Assigns destination paths inside one directory, suffixing `-1`, `-2`, ...
/// when two URLs map to the same name within a batch.
#[derive(Debug)]
pub struct DestinationNamer {
    dir: PathBuf,
    taken: HashSet<String>,
}

impl DestinationNamer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            taken: HashSet::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path for `url`, unique among the paths handed out so far.
    pub fn path_for(&mut self, url: &str) -> PathBuf {
        let name = derive_filename(url);
        let mut candidate = name.clone();
        let mut n = 1u32;
        while !self.taken.insert(candidate.clone()) {
            candidate = with_suffix(&name, n);
            n += 1;
        }
        self.dir.join(candidate)
    }
}

/// `file.tar.gz` + 1 → `file-1.tar.gz`; `README` + 2 → `README-2`.
fn with_suffix(name: &str, n: u32) -> String {
    match name.find('.').filter(|&i| i > 0) {
        Some(i) => format!("{}-{}{}", &name[..i], n, &name[i..]),
        None => format!("{}-{}", name, n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_from_path_or_default() {
        assert_eq!(derive_filename("https://example.com/archive.zip"), "archive.zip");
        assert_eq!(derive_filename("https://example.com/"), DEFAULT_FILENAME);
        assert_eq!(derive_filename("not a url"), DEFAULT_FILENAME);
        assert_eq!(derive_filename("https://example.com/a%20b.txt"), "a%20b.txt");
    }

    #[test]
    fn namer_deduplicates_within_batch() {
        let mut namer = DestinationNamer::new("/srv/dl");
        assert_eq!(
            namer.path_for("https://a.example/pool/file.tar.gz"),
            PathBuf::from("/srv/dl/file.tar.gz")
        );
        assert_eq!(
            namer.path_for("https://b.example/other/file.tar.gz"),
            PathBuf::from("/srv/dl/file-1.tar.gz")
        );
        assert_eq!(
            namer.path_for("https://c.example/file.tar.gz?v=3"),
            PathBuf::from("/srv/dl/file-2.tar.gz")
        );
        assert_eq!(namer.path_for("https://a.example/"), PathBuf::from("/srv/dl/download.bin"));
        assert_eq!(namer.path_for("https://b.example/"), PathBuf::from("/srv/dl/download-1.bin"));
    }

    #[test]
    fn suffix_without_extension() {
        assert_eq!(with_suffix("README", 2), "README-2");
        assert_eq!(with_suffix(".hidden", 1), ".hidden-1");
    }
}
