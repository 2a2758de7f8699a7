//! Folder processing, editing, export and watching.

use crate::config::PathsConfig;
use crate::document::{gallery_json_path, GalleryDocument};
use crate::error::{GalleryError, Result};
use crate::export::{ExportManager, ExportOptions};
use crate::gallery::{FolderProcessor, FolderSummary, HashIndex, ProgressCallback};
use crate::metadata::Transaction;
use crate::vision::LabelExtractor;
use crate::watcher::{FolderCallback, FolderWatcher};
use crate::GalleryApi;
use std::path::{Path, PathBuf};
use std::sync::Arc;

impl GalleryApi {
    fn extractor(&self) -> Result<Arc<dyn LabelExtractor>> {
        self.extractor.clone().ok_or_else(|| GalleryError::Config {
            message: "Label extraction is not configured; provide a vision API key or run offline"
                .to_string(),
        })
    }

    fn processor(&self, progress: Option<ProgressCallback>) -> Result<FolderProcessor> {
        let processor = FolderProcessor::new(self.extractor()?, self.settings.gallery.clone())
            .with_cancellation(self.cancel.clone());
        Ok(match progress {
            Some(progress) => processor.with_progress(progress),
            None => processor,
        })
    }

    pub fn hash_index_path(&self) -> PathBuf {
        self.root.join(PathsConfig::HASH_INDEX_FILENAME)
    }

    /// Process every gallery folder under the root.
    pub async fn process_all(&self, progress: Option<ProgressCallback>) -> Result<Vec<FolderSummary>> {
        self.processor(progress)?.process_root(&self.root).await
    }

    /// Process a single gallery folder against the root's hash index.
    pub async fn process_folder(
        &self,
        folder: &Path,
        progress: Option<ProgressCallback>,
    ) -> Result<FolderSummary> {
        let processor = self.processor(progress)?;
        let mut index = HashIndex::open(self.hash_index_path())?;
        processor.process_folder(folder, &mut index).await
    }

    /// Load a folder's manifest; it must exist.
    pub fn load_gallery(&self, folder: &Path) -> Result<GalleryDocument> {
        let path = gallery_json_path(folder);
        GalleryDocument::load(&path)?.ok_or(GalleryError::FileNotFound(path))
    }

    /// Apply an edit to a folder's manifest and save it, restoring the
    /// previous manifest if the edit or the write fails.
    pub fn edit_gallery<T>(
        &self,
        folder: &Path,
        edit: impl FnOnce(&mut GalleryDocument) -> Result<T>,
    ) -> Result<T> {
        let mut document = self.load_gallery(folder)?;
        let path = gallery_json_path(folder);
        Transaction::begin(&path)?.run(|target| {
            let value = edit(&mut document)?;
            document.save(target)?;
            Ok(value)
        })
    }

    /// Move the image at position `from` to position `to`.
    pub fn reorder(&self, folder: &Path, from: usize, to: usize) -> Result<()> {
        self.edit_gallery(folder, |doc| doc.move_image(from, to))
    }

    /// Export a folder's gallery.
    pub async fn export(&self, folder: &Path, options: &ExportOptions) -> Result<PathBuf> {
        let document = self.load_gallery(folder)?;
        ExportManager::new(&self.settings.export)
            .with_cancellation(self.cancel.clone())
            .export_gallery(&document, folder, options)
            .await
    }

    /// Watch the root for new images.
    pub fn watch(&self, on_new_images: FolderCallback) -> Result<FolderWatcher> {
        FolderWatcher::with_default_debounce(&self.root, self.settings.gallery.clone(), on_new_images)
    }
}
