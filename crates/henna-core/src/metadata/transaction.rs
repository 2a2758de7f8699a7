//! Scoped write transactions over a single manifest file.
//!
//! [`Transaction::begin`] takes a verified backup of the target before any
//! mutation. [`Transaction::commit`] releases it. A transaction dropped
//! without a commit (an early `?` return, or a panic) restores the target's
//! original bytes, or removes the target if it did not exist before.

use crate::config::PathsConfig;
use crate::error::{GalleryError, Result};
use crate::metadata::atomic::atomic_write_bytes;
use crate::metadata::backup::{copy_verified, create_verified_backup};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

pub struct Transaction {
    target: PathBuf,
    /// Verified copy of the target, `None` if the target did not exist.
    backup: Option<PathBuf>,
    /// Whether the backup outlives the transaction.
    keep_backup: bool,
    finished: bool,
}

impl Transaction {
    /// Begin a transaction with a temporary sibling backup
    /// (`<name>.bak`), removed when the transaction ends.
    pub fn begin(target: impl Into<PathBuf>) -> Result<Self> {
        let target = target.into();
        let backup = if target.exists() {
            let backup_path = target.with_extension(PathsConfig::TRANSACTION_SUFFIX);
            copy_verified(&target, &backup_path)?;
            Some(backup_path)
        } else {
            None
        };

        Ok(Self {
            target,
            backup,
            keep_backup: false,
            finished: false,
        })
    }

    /// Begin a transaction whose backup is a permanent timestamped copy in
    /// `backup_dir`. The target must exist.
    pub fn begin_with_backup(target: impl Into<PathBuf>, backup_dir: &Path) -> Result<Self> {
        let target = target.into();
        if !target.exists() {
            return Err(GalleryError::FileNotFound(target));
        }
        let backup_path = create_verified_backup(&target, backup_dir)?;

        Ok(Self {
            target,
            backup: Some(backup_path),
            keep_backup: true,
            finished: false,
        })
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn backup_path(&self) -> Option<&Path> {
        self.backup.as_deref()
    }

    /// Run a fallible mutation inside the transaction, committing on
    /// success and restoring on error.
    pub fn run<T>(self, mutation: impl FnOnce(&Path) -> Result<T>) -> Result<T> {
        match mutation(&self.target) {
            Ok(value) => {
                self.commit();
                Ok(value)
            }
            Err(e) => {
                if let Err(restore_err) = self.rollback() {
                    error!("Rollback failed after error ({}): {}", e, restore_err);
                }
                Err(e)
            }
        }
    }

    /// Keep the mutation. Returns the backup path if it is kept.
    pub fn commit(mut self) -> Option<PathBuf> {
        self.finished = true;
        self.release()
    }

    /// Restore the original state explicitly.
    pub fn rollback(mut self) -> Result<()> {
        self.finished = true;
        let result = self.restore();
        self.release();
        result
    }

    fn restore(&self) -> Result<()> {
        match &self.backup {
            Some(backup) => {
                let bytes = fs::read(backup).map_err(|e| GalleryError::io_with_path(e, backup))?;
                atomic_write_bytes(&self.target, &bytes)?;
                warn!("Restored {} from {}", self.target.display(), backup.display());
            }
            None => {
                if self.target.exists() {
                    fs::remove_file(&self.target)
                        .map_err(|e| GalleryError::io_with_path(e, &self.target))?;
                    warn!("Removed {} created by a failed transaction", self.target.display());
                }
            }
        }
        Ok(())
    }

    fn release(&mut self) -> Option<PathBuf> {
        let backup = self.backup.take()?;
        if self.keep_backup {
            return Some(backup);
        }
        if let Err(e) = fs::remove_file(&backup) {
            warn!("Failed to remove transaction backup {}: {}", backup.display(), e);
        } else {
            debug!("Released transaction backup {}", backup.display());
        }
        None
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Err(e) = self.restore() {
            error!("Failed to restore {}: {}", self.target.display(), e);
        }
        self.release();
    }
}
