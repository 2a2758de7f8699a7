//! Manifest migration.
//!
//! Migrating a file moves through the stages of [`MigrationStage`]:
//! decode and detect, take a verified backup, ask for confirmation,
//! transform, drop dangling records, validate, then write atomically. Any
//! failure stops the run at its stage and leaves the manifest untouched.

use crate::config::PathsConfig;
use crate::document::{folder_name, GalleryDocument};
use crate::error::{GalleryError, Result};
use crate::metadata::{backup_dir_for, Transaction};
use crate::schema::{detect_format, transform, DetectedFormat, SchemaValidator, TransformContext};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

/// Stage at which a migration stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationStage {
    Detecting,
    BackingUp,
    Confirming,
    Transforming,
    Validating,
    Writing,
}

impl fmt::Display for MigrationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MigrationStage::Detecting => "detecting",
            MigrationStage::BackingUp => "backing up",
            MigrationStage::Confirming => "confirming",
            MigrationStage::Transforming => "transforming",
            MigrationStage::Validating => "validating",
            MigrationStage::Writing => "writing",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MigrationOutcome {
    /// Current, valid and already normalized; nothing written.
    AlreadyCurrent,
    /// Current and valid, but re-indexing changed it; rewritten.
    Repaired,
    /// Legacy or invalid manifest transformed and rewritten.
    Migrated,
    /// Confirmation refused; nothing written.
    Declined,
    Failed { stage: MigrationStage, message: String },
}

/// Result of migrating one manifest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MigrationReport {
    pub path: PathBuf,
    pub outcome: MigrationOutcome,
    pub format: Option<DetectedFormat>,
    pub backup_path: Option<PathBuf>,
    /// `src` of every record dropped because its file was missing.
    pub dropped: Vec<String>,
    /// Schema violations, when validation failed.
    pub errors: Vec<String>,
}

impl MigrationReport {
    fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            outcome: MigrationOutcome::AlreadyCurrent,
            format: None,
            backup_path: None,
            dropped: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn fail(mut self, stage: MigrationStage, message: impl Into<String>) -> Self {
        let message = message.into();
        error!(
            "Migration of {} failed while {}: {}",
            self.path.display(),
            stage,
            message
        );
        self.outcome = MigrationOutcome::Failed { stage, message };
        self
    }

    /// True when the manifest is current on disk after the run.
    pub fn success(&self) -> bool {
        matches!(
            self.outcome,
            MigrationOutcome::AlreadyCurrent | MigrationOutcome::Repaired | MigrationOutcome::Migrated
        )
    }

    /// Whether the run rewrote the manifest.
    pub fn wrote(&self) -> bool {
        matches!(
            self.outcome,
            MigrationOutcome::Repaired | MigrationOutcome::Migrated
        )
    }
}

/// Asks whether a legacy manifest may be migrated.
pub trait Confirm {
    fn confirm(&self, path: &Path, format: DetectedFormat) -> bool;
}

impl<F> Confirm for F
where
    F: Fn(&Path, DetectedFormat) -> bool,
{
    fn confirm(&self, path: &Path, format: DetectedFormat) -> bool {
        self(path, format)
    }
}

/// Read-only assessment of a manifest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GalleryHealth {
    pub path: PathBuf,
    pub format: DetectedFormat,
    pub needs_migration: bool,
    pub is_valid: bool,
    pub errors: Vec<String>,
}

/// Migrates gallery manifests to the current schema.
#[derive(Debug, Clone, Default)]
pub struct Migrator {
    validator: SchemaValidator,
    /// Override for the backup directory; defaults to `<folder>/backups`.
    backup_dir: Option<PathBuf>,
}

impl Migrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_backup_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.backup_dir = Some(dir.into());
        self
    }

    /// Migrate one manifest. Never fails: every failure is captured in the
    /// report along with the stage it happened at.
    ///
    /// Without a `confirm` handler legacy manifests are migrated without
    /// asking. Current manifests are never asked about.
    pub fn migrate_file(&self, path: &Path, confirm: Option<&dyn Confirm>) -> MigrationReport {
        let mut report = MigrationReport::new(path);

        let value = match read_value(path) {
            Ok(value) => value,
            Err(e) => return report.fail(MigrationStage::Detecting, e.to_string()),
        };
        let format = detect_format(&value);
        report.format = Some(format);
        debug!("Detected {} format for {}", format, path.display());

        let folder = path.parent().unwrap_or_else(|| Path::new("."));
        let context = TransformContext::for_folder(&folder_name(folder));

        if format.is_current() && self.validator.validate(&value) {
            return self.normalize_current(report, value, folder, &context);
        }

        let transaction = match self.begin(path) {
            Ok(txn) => txn,
            Err(e) => return report.fail(MigrationStage::BackingUp, e.to_string()),
        };
        report.backup_path = transaction.backup_path().map(Path::to_path_buf);

        if !format.is_current() {
            if let Some(confirm) = confirm {
                if !confirm.confirm(path, format) {
                    info!("Migration of {} declined", path.display());
                    // Nothing written; the backup is kept.
                    transaction.commit();
                    report.outcome = MigrationOutcome::Declined;
                    return report;
                }
            }
        }

        let transformed = transform(format, value, &context);
        let errors = self.validator.check(&transformed);
        if !errors.is_empty() {
            transaction.commit();
            let message = format!("{} schema violation(s)", errors.len());
            report.errors = errors;
            return report.fail(MigrationStage::Validating, message);
        }

        let mut document = match GalleryDocument::from_current_value(transformed) {
            Ok(doc) => doc,
            Err(e) => {
                transaction.commit();
                return report.fail(MigrationStage::Transforming, e.to_string());
            }
        };
        report.dropped = document.reindex(folder);

        if let Err(e) = transaction.run(|target| document.save(target)) {
            return report.fail(MigrationStage::Writing, e.to_string());
        }

        info!(
            "Migrated {} from {} format ({} images, {} dropped)",
            path.display(),
            format,
            document.len(),
            report.dropped.len()
        );
        report.outcome = MigrationOutcome::Migrated;
        report
    }

    /// Re-index a valid current manifest, writing only if that changed it.
    fn normalize_current(
        &self,
        mut report: MigrationReport,
        value: Value,
        folder: &Path,
        context: &TransformContext,
    ) -> MigrationReport {
        let path = report.path.clone();
        let mut document = match GalleryDocument::from_any_value(value.clone(), context) {
            Ok(doc) => doc,
            Err(e) => return report.fail(MigrationStage::Transforming, e.to_string()),
        };
        report.dropped = document.reindex(folder);

        let unchanged = serde_json::to_value(&document)
            .map(|normalized| normalized == value)
            .unwrap_or(false);
        if unchanged {
            debug!("{} is current; nothing to do", path.display());
            return report;
        }

        let transaction = match self.begin(&path) {
            Ok(txn) => txn,
            Err(e) => return report.fail(MigrationStage::BackingUp, e.to_string()),
        };
        report.backup_path = transaction.backup_path().map(Path::to_path_buf);

        if let Err(e) = transaction.run(|target| document.save(target)) {
            return report.fail(MigrationStage::Writing, e.to_string());
        }

        info!(
            "Repaired {} ({} dropped, indices renumbered)",
            path.display(),
            report.dropped.len()
        );
        report.outcome = MigrationOutcome::Repaired;
        report
    }

    fn begin(&self, path: &Path) -> Result<Transaction> {
        let backup_dir = self
            .backup_dir
            .clone()
            .unwrap_or_else(|| backup_dir_for(path));
        Transaction::begin_with_backup(path, &backup_dir)
    }

    /// Migrate every manifest under `root`.
    ///
    /// A manifest is a `<name>.json` file inside a folder called `<name>`.
    /// Backup and export directories are skipped.
    pub fn migrate_tree(&self, root: &Path, confirm: Option<&dyn Confirm>) -> Vec<MigrationReport> {
        find_manifests(root)
            .iter()
            .map(|path| self.migrate_file(path, confirm))
            .collect()
    }

    /// Assess a manifest without changing anything.
    pub fn check_health(&self, path: &Path) -> Result<GalleryHealth> {
        let value = read_value(path)?;
        let format = detect_format(&value);
        let errors = self.validator.errors(&value);
        let is_valid = errors.is_empty();
        Ok(GalleryHealth {
            path: path.to_path_buf(),
            format,
            needs_migration: !format.is_current() || !is_valid,
            is_valid,
            errors,
        })
    }

    pub fn needs_migration(&self, path: &Path) -> Result<bool> {
        Ok(self.check_health(path)?.needs_migration)
    }
}

fn read_value(path: &Path) -> Result<Value> {
    let bytes = fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            GalleryError::FileNotFound(path.to_path_buf())
        } else {
            GalleryError::io_with_path(e, path)
        }
    })?;
    serde_json::from_slice(&bytes).map_err(|e| GalleryError::Json {
        message: format!("{} is not valid JSON: {}", path.display(), e),
        source: Some(e),
    })
}

/// Gallery manifests under `root`, sorted by path.
pub fn find_manifests(root: &Path) -> Vec<PathBuf> {
    let skip = [PathsConfig::BACKUP_DIR_NAME, PathsConfig::EXPORT_DIR_NAME];
    let mut manifests: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| {
            !(entry.file_type().is_dir()
                && entry.depth() > 0
                && skip.iter().any(|name| entry.file_name() == *name))
        })
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| is_manifest(path))
        .collect();
    manifests.sort();
    manifests
}

fn is_manifest(path: &Path) -> bool {
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let parent_name = path.parent().and_then(Path::file_name);
    is_json && parent_name.is_some() && path.file_stem() == parent_name
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn gallery(temp: &TempDir, name: &str, content: &Value, files: &[&str]) -> PathBuf {
        let folder = temp.path().join(name);
        fs::create_dir_all(&folder).unwrap();
        for file in files {
            fs::write(folder.join(file), b"img").unwrap();
        }
        let path = folder.join(format!("{}.json", name));
        fs::write(&path, serde_json::to_vec_pretty(content).unwrap()).unwrap();
        path
    }

    #[test]
    fn test_undecodable_file_fails_at_detecting() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("broken.json");
        fs::write(&path, b"{ nope").unwrap();

        let report = Migrator::new().migrate_file(&path, None);
        assert!(!report.success());
        assert!(matches!(
            report.outcome,
            MigrationOutcome::Failed {
                stage: MigrationStage::Detecting,
                ..
            }
        ));
        assert_eq!(fs::read(&path).unwrap(), b"{ nope");
    }

    #[test]
    fn test_missing_file_fails_at_detecting() {
        let temp = TempDir::new().unwrap();
        let report = Migrator::new().migrate_file(&temp.path().join("none.json"), None);
        assert!(!report.success());
        assert!(report.format.is_none());
    }

    #[test]
    fn test_declined_leaves_file_untouched() {
        let temp = TempDir::new().unwrap();
        let path = gallery(&temp, "Feet", &json!([{"url": "a.jpg"}]), &["a.jpg"]);
        let before = fs::read(&path).unwrap();

        let refuse = |_: &Path, _: DetectedFormat| false;
        let report = Migrator::new().migrate_file(&path, Some(&refuse));

        assert_eq!(report.outcome, MigrationOutcome::Declined);
        assert!(!report.success());
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_confirm_not_asked_for_current_format() {
        let temp = TempDir::new().unwrap();
        let path = gallery(
            &temp,
            "G",
            &json!({"meta": {"gallery_title": "G"}, "images": [{"src": "a.jpg", "order": 5}]}),
            &["a.jpg"],
        );

        let panicking = |_: &Path, _: DetectedFormat| -> bool { panic!("should not be asked") };
        let report = Migrator::new().migrate_file(&path, Some(&panicking));
        assert_eq!(report.outcome, MigrationOutcome::Repaired);
    }

    #[test]
    fn test_validation_failure_aborts_without_writing() {
        let temp = TempDir::new().unwrap();
        let content = json!({"images": [{"src": "a.jpg"}, {"url": "a.jpg"}]});
        let path = gallery(&temp, "Dup", &content, &["a.jpg"]);
        let before = fs::read(&path).unwrap();

        let report = Migrator::new().migrate_file(&path, None);

        assert!(matches!(
            report.outcome,
            MigrationOutcome::Failed {
                stage: MigrationStage::Validating,
                ..
            }
        ));
        assert_eq!(report.errors.len(), 1);
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_health_check() {
        let temp = TempDir::new().unwrap();
        let path = gallery(&temp, "H", &json!({"meta": {}, "images": []}), &[]);

        let health = Migrator::new().check_health(&path).unwrap();
        assert!(health.needs_migration);
        assert!(!health.is_valid);
        assert_eq!(health.errors, vec!["$.meta: 'gallery_title' is a required property"]);
    }

    #[test]
    fn test_find_manifests_skips_backups_and_strays() {
        let temp = TempDir::new().unwrap();
        gallery(&temp, "A", &json!([]), &[]);
        gallery(&temp, "B", &json!([]), &[]);
        fs::create_dir_all(temp.path().join("A/backups/A")).unwrap();
        fs::write(temp.path().join("A/backups/A/A.json"), b"[]").unwrap();
        fs::write(temp.path().join("A/notes.json"), b"{}").unwrap();

        let found = find_manifests(temp.path());
        assert_eq!(
            found,
            vec![temp.path().join("A/A.json"), temp.path().join("B/B.json")]
        );
    }
}
