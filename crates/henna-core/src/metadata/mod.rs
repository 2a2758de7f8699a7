//! Manifest persistence.
//!
//! This module provides:
//! - Atomic JSON file operations
//! - Digest-verified backups
//! - Scoped write transactions with restore-on-failure

mod atomic;
mod backup;
mod transaction;

pub use atomic::{atomic_read_json, atomic_write_bytes, atomic_write_json};
pub use backup::{backup_dir_for, create_verified_backup};
pub use transaction::Transaction;
