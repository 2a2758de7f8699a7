//! Henna Core - Headless library for henna gallery curation.
//!
//! A gallery is a root folder of subfolders, each holding images and one
//! JSON manifest named after the folder. This crate migrates legacy
//! manifests to the current schema behind verified backups, validates them,
//! processes new images (content-hash dedup, label extraction, renaming),
//! exports web-ready packages, and watches the root for new images.
//!
//! # Example
//!
//! ```rust,no_run
//! use henna_core::GalleryApi;
//!
//! #[tokio::main]
//! async fn main() -> henna_core::Result<()> {
//!     let api = GalleryApi::new("/path/to/galleries")?;
//!
//!     // Bring every manifest up to date
//!     for report in api.migrate(api.root(), None) {
//!         println!("{}: {:?}", report.path.display(), report.outcome);
//!     }
//!
//!     // Label and list new images
//!     let summaries = api.process_all(None).await?;
//!     println!("Processed {} folders", summaries.len());
//!
//!     Ok(())
//! }
//! ```

pub mod cancel;
pub mod config;
pub mod document;
pub mod error;
pub mod export;
pub mod gallery;
pub mod hashing;
pub mod metadata;
pub mod migration;
pub mod naming;
pub mod schema;
pub mod vision;
pub mod watcher;

mod api;

// Re-export commonly used types
pub use cancel::CancellationToken;
pub use config::{ExportProfile, Settings, VisionConfig};
pub use document::{GalleryDocument, GalleryMeta, ImageRecord, ImageUpdate};
pub use error::{GalleryError, Result};
pub use export::{ExportManager, ExportOptions};
pub use gallery::{FolderProcessor, FolderSummary, HashIndex, HashRecord, ProgressCallback};
pub use metadata::Transaction;
pub use migration::{
    Confirm, GalleryHealth, MigrationOutcome, MigrationReport, MigrationStage, Migrator,
};
pub use schema::{detect_format, DetectedFormat, SchemaValidator};
pub use vision::{GoogleVisionClient, LabelExtractor, NoLabels};
pub use watcher::FolderWatcher;

pub use api::GalleryApiBuilder;

use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Main API struct for gallery operations.
///
/// Holds the gallery root, the loaded [`Settings`] and the label extractor,
/// and exposes migration, processing, editing, export and watching. Methods
/// are implemented in the `api` submodules.
pub struct GalleryApi {
    root: PathBuf,
    settings: Settings,
    /// `None` when no vision API key is available and not running offline.
    extractor: Option<Arc<dyn LabelExtractor>>,
    migrator: Migrator,
    cancel: CancellationToken,
}

impl GalleryApi {
    /// Create a builder for GalleryApi.
    pub fn builder(root: impl Into<PathBuf>) -> GalleryApiBuilder {
        GalleryApiBuilder::new(root)
    }

    /// Create an API over an existing gallery root with settings from the
    /// default `config.json`.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        Self::builder(root).build()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Token that cancels processing and export started through this API.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn has_label_extraction(&self) -> bool {
        self.extractor.is_some()
    }
}
