//! Write a fetched body into its destination.

use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::request::Destination;

/// Temporary file suffix used before atomic rename.
pub const TEMP_SUFFIX: &str = ".part";

/// Path for the temp file: appends `.part` to the final path (e.g. `file.iso` → `file.iso.part`).
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}

/// Store `body` in `dest`, replacing whatever an earlier attempt left there.
///
/// Files are written to `<dest>.part` and renamed into place; the temp file is
/// removed if anything fails.
pub fn store_body(dest: &Destination, body: Vec<u8>) -> Result<()> {
    match dest {
        Destination::Memory(buf) => {
            buf.replace(body);
            Ok(())
        }
        Destination::Path(final_path) => {
            let tmp = temp_path(final_path);
            let res = write_and_rename(&tmp, final_path, &body);
            if res.is_err() {
                match fs::remove_file(&tmp) {
                    Ok(()) => tracing::debug!(path = %tmp.display(), "removed failed temp file"),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => tracing::warn!(path = %tmp.display(), "could not remove temp file: {}", e),
                }
            }
            res
        }
    }
}

fn write_and_rename(tmp: &Path, final_path: &Path, body: &[u8]) -> Result<()> {
    if let Some(parent) = final_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let mut f = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(tmp)
        .with_context(|| format!("open temp file {}", tmp.display()))?;
    f.write_all(body)
        .with_context(|| format!("write {}", tmp.display()))?;
    f.sync_all().context("sync temp file")?;
    drop(f);
    fs::rename(tmp, final_path).with_context(|| {
        format!("failed to rename {} to {}", tmp.display(), final_path.display())
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::SharedBuffer;

    #[test]
    fn temp_path_appends_part() {
        let p = temp_path(Path::new("file.iso"));
        assert_eq!(p.to_string_lossy(), "file.iso.part");
        let p2 = temp_path(Path::new("/tmp/archive.zip"));
        assert_eq!(p2.to_string_lossy(), "/tmp/archive.zip.part");
    }

    #[test]
    fn second_store_overwrites_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        let dest = Destination::Path(path.clone());
        store_body(&dest, b"a much longer first body".to_vec()).unwrap();
        store_body(&dest, b"short".to_vec()).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"short");
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn creates_missing_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/out.bin");
        store_body(&Destination::Path(path.clone()), b"x".to_vec()).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"x");
    }

    #[test]
    fn memory_destination_replaced() {
        let buf = SharedBuffer::new();
        let dest = Destination::Memory(buf.clone());
        store_body(&dest, b"one two".to_vec()).unwrap();
        store_body(&dest, b"three".to_vec()).unwrap();
        assert_eq!(buf.contents(), b"three");
    }

    #[test]
    fn failed_store_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        // Final path is an existing directory, so the rename fails.
        let final_path = dir.path().join("taken");
        fs::create_dir(&final_path).unwrap();
        fs::write(final_path.join("inner"), b"keep").unwrap();
        let res = store_body(&Destination::Path(final_path.clone()), b"body".to_vec());
        assert!(res.is_err());
        assert!(!temp_path(&final_path).exists());
    }
}
