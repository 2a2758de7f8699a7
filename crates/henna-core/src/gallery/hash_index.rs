//! Content-hash index of processed images.
//!
//! Persisted as an append-only JSON-lines log: each insert appends one
//! record, and replaying the log on open lets later lines win. [`compact`]
//! rewrites the log with one line per hash.
//!
//! [`compact`]: HashIndex::compact

use crate::document::timestamp_now;
use crate::error::{GalleryError, Result};
use crate::metadata::atomic_write_bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// What is known about one piece of image content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HashRecord {
    pub hash: String,
    /// Name the image was given when it was processed.
    pub filename: String,
    #[serde(default)]
    pub labels: Vec<String>,
    pub processed_date: String,
}

impl HashRecord {
    pub fn new(hash: impl Into<String>, filename: impl Into<String>, labels: Vec<String>) -> Self {
        Self {
            hash: hash.into(),
            filename: filename.into(),
            labels,
            processed_date: timestamp_now(),
        }
    }
}

#[derive(Debug)]
pub struct HashIndex {
    path: PathBuf,
    records: HashMap<String, HashRecord>,
    /// Lines in the log that are shadowed by a later line or unreadable.
    stale_lines: usize,
}

impl HashIndex {
    /// Open the log at `path`, replaying it into memory. A missing log is an
    /// empty index; unreadable lines are skipped with a warning.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut index = Self {
            path,
            records: HashMap::new(),
            stale_lines: 0,
        };

        let content = match fs::read_to_string(&index.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(index),
            Err(e) => return Err(GalleryError::io_with_path(e, &index.path)),
        };

        for (line_no, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<HashRecord>(line) {
                Ok(record) => {
                    if index.records.insert(record.hash.clone(), record).is_some() {
                        index.stale_lines += 1;
                    }
                }
                Err(e) => {
                    warn!(
                        "Skipping corrupt hash index line {} in {}: {}",
                        line_no + 1,
                        index.path.display(),
                        e
                    );
                    index.stale_lines += 1;
                }
            }
        }

        debug!(
            "Loaded {} hash records from {}",
            index.records.len(),
            index.path.display()
        );
        Ok(index)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, hash: &str) -> Option<&HashRecord> {
        self.records.get(hash)
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.records.contains_key(hash)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &HashRecord> {
        self.records.values()
    }

    /// Number of log lines a [`compact`](Self::compact) would remove.
    pub fn stale_lines(&self) -> usize {
        self.stale_lines
    }

    /// Append a record to the log and make it visible in memory.
    pub fn insert(&mut self, record: HashRecord) -> Result<()> {
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| GalleryError::io_with_path(e, parent))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| GalleryError::io_with_path(e, &self.path))?;
        file.write_all(line.as_bytes())
            .and_then(|_| file.sync_data())
            .map_err(|e| GalleryError::io_with_path(e, &self.path))?;

        if self.records.insert(record.hash.clone(), record).is_some() {
            self.stale_lines += 1;
        }
        Ok(())
    }

    /// Rewrite the log atomically with exactly one line per hash.
    pub fn compact(&mut self) -> Result<()> {
        let mut records: Vec<&HashRecord> = self.records.values().collect();
        records.sort_by(|a, b| a.hash.cmp(&b.hash));

        let mut content = String::new();
        for record in records {
            content.push_str(&serde_json::to_string(record)?);
            content.push('\n');
        }
        atomic_write_bytes(&self.path, content.as_bytes())?;

        debug!(
            "Compacted {} ({} stale lines removed)",
            self.path.display(),
            self.stale_lines
        );
        self.stale_lines = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(hash: &str, filename: &str) -> HashRecord {
        HashRecord::new(hash, filename, vec!["henna".into()])
    }

    #[test]
    fn test_missing_log_is_empty() {
        let temp = TempDir::new().unwrap();
        let index = HashIndex::open(temp.path().join("image_hashes.jsonl")).unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn test_insert_then_reopen() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("image_hashes.jsonl");

        let mut index = HashIndex::open(&path).unwrap();
        index.insert(record("aaa", "one.jpg")).unwrap();
        index.insert(record("bbb", "two.jpg")).unwrap();

        let reopened = HashIndex::open(&path).unwrap();
        assert_eq!(reopened.len(), 2);
        assert_eq!(reopened.get("bbb").unwrap().filename, "two.jpg");
    }

    #[test]
    fn test_later_lines_win_and_corrupt_lines_skipped() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("image_hashes.jsonl");
        let first = serde_json::to_string(&record("aaa", "old.jpg")).unwrap();
        let second = serde_json::to_string(&record("aaa", "new.jpg")).unwrap();
        fs::write(&path, format!("{}\n{{broken\n\n{}\n", first, second)).unwrap();

        let index = HashIndex::open(&path).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.get("aaa").unwrap().filename, "new.jpg");
        assert_eq!(index.stale_lines(), 2);
    }

    #[test]
    fn test_compact_rewrites_one_line_per_hash() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("image_hashes.jsonl");
        let mut index = HashIndex::open(&path).unwrap();
        index.insert(record("bbb", "b.jpg")).unwrap();
        index.insert(record("aaa", "a.jpg")).unwrap();
        index.insert(record("bbb", "b2.jpg")).unwrap();

        index.compact().unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"aaa\""));
        assert!(lines[1].contains("b2.jpg"));
        assert_eq!(index.stale_lines(), 0);
    }
}
