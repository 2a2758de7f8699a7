//! Manifest migration, validation and health checks.

use crate::error::{GalleryError, Result};
use crate::migration::{find_manifests, Confirm, GalleryHealth, MigrationReport};
use crate::schema::SchemaValidator;
use crate::GalleryApi;
use std::path::Path;
use tracing::info;

impl GalleryApi {
    /// Migrate one manifest, or every manifest under a directory.
    pub fn migrate(&self, target: &Path, confirm: Option<&dyn Confirm>) -> Vec<MigrationReport> {
        let reports = if target.is_dir() {
            self.migrator.migrate_tree(target, confirm)
        } else {
            vec![self.migrator.migrate_file(target, confirm)]
        };

        let succeeded = reports.iter().filter(|r| r.success()).count();
        info!(
            "Migration finished: {} of {} manifests current",
            succeeded,
            reports.len()
        );
        reports
    }

    /// Health of one manifest, or of every manifest under a directory.
    pub fn health(&self, target: &Path) -> Result<Vec<GalleryHealth>> {
        if target.is_dir() {
            find_manifests(target)
                .iter()
                .map(|path| self.migrator.check_health(path))
                .collect()
        } else {
            Ok(vec![self.migrator.check_health(target)?])
        }
    }

    /// Schema violations of a manifest file; errors if it is not JSON.
    pub fn validate_file(&self, path: &Path) -> Result<Vec<String>> {
        let bytes = std::fs::read(path).map_err(|e| GalleryError::io_with_path(e, path))?;
        SchemaValidator::new().validate_bytes(&bytes)
    }
}
