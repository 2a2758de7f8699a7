//! Verified backups of gallery manifests.
//!
//! A backup is copied to a `.tmp` path, compared against the original by
//! SHA-256, and only then renamed into place. A backup that fails its digest
//! check is deleted and reported as an integrity error.

use crate::config::PathsConfig;
use crate::error::{GalleryError, Result};
use crate::hashing::{compute_sha256, sha256_bytes};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// `<dir of original>/backups`
pub fn backup_dir_for(original: &Path) -> PathBuf {
    original
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(PathsConfig::BACKUP_DIR_NAME)
}

/// Create a timestamped, digest-verified copy of `original` in `backup_dir`.
///
/// The name is `<stem>_v2backup_<YYYYMMDD_HHMMSS><.ext>`, with a numeric
/// suffix if a backup with the same timestamp already exists.
pub fn create_verified_backup(original: &Path, backup_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(backup_dir).map_err(|e| GalleryError::io_with_path(e, backup_dir))?;

    let stem = original
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "gallery".to_string());
    let extension = original
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let timestamp = chrono::Local::now()
        .format(PathsConfig::BACKUP_TIMESTAMP_FORMAT)
        .to_string();

    let base = format!("{}{}{}", stem, PathsConfig::BACKUP_INFIX, timestamp);
    let mut backup_path = backup_dir.join(format!("{}{}", base, extension));
    let mut counter = 1;
    while backup_path.exists() {
        backup_path = backup_dir.join(format!("{}_{}{}", base, counter, extension));
        counter += 1;
    }

    copy_verified(original, &backup_path)?;
    info!("Created backup {}", backup_path.display());
    Ok(backup_path)
}

/// Copy `src` to `dest` through a temp file, verifying the digest before the
/// final rename.
pub(crate) fn copy_verified(src: &Path, dest: &Path) -> Result<()> {
    let original_bytes = fs::read(src).map_err(|e| GalleryError::io_with_path(e, src))?;
    let expected = sha256_bytes(&original_bytes);

    let temp_path = dest.with_extension("tmp");
    fs::copy(src, &temp_path).map_err(|e| GalleryError::io_with_path(e, &temp_path))?;

    let actual = compute_sha256(&temp_path)?;
    if actual != expected {
        let _ = fs::remove_file(&temp_path);
        return Err(GalleryError::Integrity {
            path: dest.to_path_buf(),
            expected,
            actual,
        });
    }

    fs::rename(&temp_path, dest).map_err(|e| GalleryError::io_with_path(e, dest))?;
    debug!("Verified copy {} -> {}", src.display(), dest.display());
    Ok(())
}
