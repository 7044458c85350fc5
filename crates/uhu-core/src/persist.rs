//! Crash-safe file writes.

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::error::UhuError;

/// Write `data` to `path` through a temp file in the same directory, then
/// rename over the target. Readers see either the old or the new content.
pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> Result<(), UhuError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(data)?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;

    tracing::trace!(path = %path.display(), bytes = data.len(), "File written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"second");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/dir/doc.json");
        write_atomic(&path, b"{}").unwrap();
        assert!(path.exists());
    }
}
