//! Crash-safe file replacement.
//!
//! Content goes to a sibling temp file, is synced, then renamed over the
//! target, so a manifest on disk is always either the old or the new one.

use crate::error::{GalleryError, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

/// Parse a JSON file; `None` when it does not exist.
pub fn atomic_read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(GalleryError::io_with_path(e, path)),
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| GalleryError::Json {
            message: format!("{} is not valid JSON: {}", path.display(), e),
            source: Some(e),
        })
}

/// Write `data` as pretty JSON with a trailing newline.
pub fn atomic_write_json<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    let mut bytes = serde_json::to_vec_pretty(data)?;
    bytes.push(b'\n');
    atomic_write_bytes(path, &bytes)
}

/// Replace `path` with `bytes`, creating missing parent directories.
pub fn atomic_write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(|e| GalleryError::io_with_path(e, dir))?;

    let mut staged = NamedTempFile::new_in(dir).map_err(|e| GalleryError::io_with_path(e, dir))?;
    staged
        .write_all(bytes)
        .and_then(|()| staged.as_file().sync_all())
        .map_err(|e| GalleryError::io_with_path(e, staged.path()))?;
    staged
        .persist(path)
        .map_err(|e| GalleryError::io_with_path(e.error, path))?;

    debug!("Wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_json_is_pretty_with_newline() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("Bridal.json");

        atomic_write_json(&path, &json!({"meta": {"gallery_title": "Bridal"}})).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.ends_with("}\n"));
        assert!(text.contains("\n  \"meta\""));
    }

    #[test]
    fn test_replace_leaves_no_temp_files() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("image_hashes.jsonl");

        atomic_write_bytes(&path, b"first").unwrap();
        atomic_write_bytes(&path, b"second").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"second");
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_read_missing_and_broken() {
        let temp = TempDir::new().unwrap();
        let missing: Option<serde_json::Value> =
            atomic_read_json(&temp.path().join("none.json")).unwrap();
        assert!(missing.is_none());

        let broken = temp.path().join("broken.json");
        fs::write(&broken, "{\"meta\": ").unwrap();
        let result: Result<Option<serde_json::Value>> = atomic_read_json(&broken);
        assert!(matches!(result, Err(GalleryError::Json { .. })));
    }

    #[test]
    fn test_missing_parents_are_created() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("exports/bridal/data/gallery.json");

        atomic_write_json(&path, &json!([])).unwrap();
        assert!(path.is_file());
    }
}
