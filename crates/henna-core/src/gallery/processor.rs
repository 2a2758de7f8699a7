//! Folder processing: dedup by content hash, label new images, rename them,
//! and merge them into the folder's manifest newest-first.

use super::hash_index::{HashIndex, HashRecord};
use crate::cancel::CancellationToken;
use crate::config::{GallerySettings, PathsConfig};
use crate::document::{folder_name, gallery_json_path, GalleryDocument, ImageRecord};
use crate::error::{GalleryError, Result};
use crate::hashing::compute_sha256;
use crate::metadata::{atomic_read_json, Transaction};
use crate::naming::{processed_filename, unique_path};
use crate::schema::{normalize_labels, TransformContext};
use crate::vision::{caption_for, generate_alt_text, generate_headline, LabelExtractor};
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Progress callback: `(folder, files handled, files total)`.
pub type ProgressCallback = Arc<dyn Fn(&Path, usize, usize) + Send + Sync>;

/// Outcome of processing one folder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FolderSummary {
    pub folder: PathBuf,
    /// Images labeled and added to the manifest.
    pub new_images: usize,
    /// Images already known, left as they were.
    pub skipped: usize,
    /// Known images renamed back to their recorded filename.
    pub repaired: usize,
    /// Images that could not be decoded, labeled or renamed.
    pub failed: usize,
    /// Manifest records dropped because their file was gone.
    pub dropped: usize,
    /// Set when the folder as a whole could not be processed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FolderSummary {
    fn new(folder: &Path) -> Self {
        Self {
            folder: folder.to_path_buf(),
            ..Default::default()
        }
    }
}

pub struct FolderProcessor {
    extractor: Arc<dyn LabelExtractor>,
    settings: GallerySettings,
    progress: Option<ProgressCallback>,
    cancel: CancellationToken,
}

impl FolderProcessor {
    pub fn new(extractor: Arc<dyn LabelExtractor>, settings: GallerySettings) -> Self {
        Self {
            extractor,
            settings,
            progress: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Process every immediate subfolder of `root` with the index at
    /// `<root>/image_hashes.jsonl`. A failing folder is logged and recorded
    /// in its summary; cancellation stops the whole run.
    pub async fn process_root(&self, root: &Path) -> Result<Vec<FolderSummary>> {
        if !root.is_dir() {
            return Err(GalleryError::NotADirectory(root.to_path_buf()));
        }
        let mut index = HashIndex::open(root.join(PathsConfig::HASH_INDEX_FILENAME))?;

        let mut summaries = Vec::new();
        for folder in gallery_folders(root)? {
            match self.process_folder(&folder, &mut index).await {
                Ok(summary) => summaries.push(summary),
                Err(GalleryError::Cancelled) => return Err(GalleryError::Cancelled),
                Err(e) => {
                    error!("Failed to process {}: {}", folder.display(), e);
                    let mut summary = FolderSummary::new(&folder);
                    summary.error = Some(e.to_string());
                    summaries.push(summary);
                }
            }
        }

        if index.stale_lines() > 0 {
            index.compact()?;
        }
        Ok(summaries)
    }

    /// Process the images in one folder against `index`.
    ///
    /// New hash records reach `index` only after the manifest listing their
    /// images has been written. On cancellation the work finished so far is
    /// still written before `Cancelled` is returned.
    pub async fn process_folder(&self, folder: &Path, index: &mut HashIndex) -> Result<FolderSummary> {
        if !folder.is_dir() {
            return Err(GalleryError::NotADirectory(folder.to_path_buf()));
        }
        let name = folder_name(folder);
        let manifest = gallery_json_path(folder);

        let on_disk: Option<Value> = atomic_read_json(&manifest)?;
        let mut document = match &on_disk {
            Some(value) => {
                GalleryDocument::from_any_value(value.clone(), &TransformContext::for_folder(&name))?
            }
            None => GalleryDocument::new(&name),
        };

        let files = self.image_files(folder)?;
        let total = files.len();
        let mut summary = FolderSummary::new(folder);
        let mut new_records = Vec::new();
        let mut pending = PendingHashes::default();
        let mut in_batch = 0;
        let mut cancelled = false;

        info!("Processing {} ({} images)", folder.display(), total);

        for (handled, path) in files.iter().enumerate() {
            if self.cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            match self
                .process_file(folder, &name, path, index, &mut pending, &mut document)
                .await
            {
                Ok(FileOutcome::New(record)) => {
                    summary.new_images += 1;
                    in_batch += 1;
                    new_records.insert(0, record);
                }
                Ok(FileOutcome::Skipped) => summary.skipped += 1,
                Ok(FileOutcome::Repaired) => summary.repaired += 1,
                Err(e) if e.is_per_item() => {
                    warn!("Skipping {}: {}", path.display(), e);
                    summary.failed += 1;
                }
                Err(e) => return Err(e),
            }

            if let Some(progress) = &self.progress {
                progress(folder, handled + 1, total);
            }
            if in_batch >= self.settings.batch_size.max(1) && handled + 1 < total {
                debug!("Batch complete, pausing");
                tokio::time::sleep(self.settings.batch_pause()).await;
                in_batch = 0;
            }
        }

        document.merge_new(new_records);
        summary.dropped = document.reindex(folder).len();

        let unchanged = match &on_disk {
            Some(value) => serde_json::to_value(&document).map(|v| v == *value).unwrap_or(false),
            None => document.is_empty(),
        };
        if unchanged {
            debug!("{} unchanged", manifest.display());
        } else {
            Transaction::begin(&manifest)?.run(|target| document.save(target))?;
        }
        for record in pending.0 {
            index.insert(record)?;
        }

        info!(
            "Processed {}: {} new, {} skipped, {} repaired, {} failed, {} dropped",
            name, summary.new_images, summary.skipped, summary.repaired, summary.failed, summary.dropped
        );

        if cancelled {
            info!("Processing of {} cancelled", folder.display());
            return Err(GalleryError::Cancelled);
        }
        Ok(summary)
    }

    async fn process_file(
        &self,
        folder: &Path,
        name: &str,
        path: &Path,
        index: &HashIndex,
        pending: &mut PendingHashes,
        document: &mut GalleryDocument,
    ) -> Result<FileOutcome> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let hash = fingerprint(path.to_path_buf()).await?;

        if let Some(known) = index.get(&hash).or_else(|| pending.get(&hash)) {
            if known.filename == file_name {
                return Ok(FileOutcome::Skipped);
            }
            let canonical = folder.join(&known.filename);
            if canonical.exists() {
                debug!("{} duplicates {}", file_name, known.filename);
                return Ok(FileOutcome::Skipped);
            }
            fs::rename(path, &canonical).map_err(|e| GalleryError::ImageProcessing {
                path: path.to_path_buf(),
                message: format!("rename to {} failed: {}", known.filename, e),
            })?;
            if let Some(record) = document.images.iter_mut().find(|img| img.src == file_name) {
                record.src = known.filename.clone();
                record.touch();
            }
            info!("Renamed {} back to {}", file_name, known.filename);
            return Ok(FileOutcome::Repaired);
        }

        if let Some(existing) = document.get(&file_name) {
            debug!("{} already listed; indexing without extraction", file_name);
            let labels = existing.keywords.clone();
            pending.push(HashRecord::new(hash, file_name, labels));
            return Ok(FileOutcome::Skipped);
        }

        let labels = self.extractor.extract_labels(path).await?;
        let new_name = processed_filename(name, &labels, &hash, path);
        let target = unique_path(folder, &new_name);
        fs::rename(path, &target).map_err(|e| GalleryError::ImageProcessing {
            path: path.to_path_buf(),
            message: format!("rename to {} failed: {}", target.display(), e),
        })?;
        let final_name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or(new_name);

        pending.push(HashRecord::new(&hash, &final_name, labels.clone()));
        debug!("Processed {} as {}", file_name, final_name);

        let mut record = ImageRecord::new(final_name);
        record.caption = caption_for(name, &labels);
        record.alt_text = generate_alt_text(name, &labels);
        record.headline = generate_headline(name, &labels);
        record.keywords = normalize_labels(&labels);
        Ok(FileOutcome::New(record))
    }

    /// Supported image files directly inside `folder`, sorted by name.
    fn image_files(&self, folder: &Path) -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(folder).map_err(|e| GalleryError::io_with_path(e, folder))?;
        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && self.settings.is_supported(path))
            .collect();
        files.sort();
        Ok(files)
    }
}

/// Hash records of one folder run, held back until its manifest is saved.
#[derive(Default)]
struct PendingHashes(Vec<HashRecord>);

impl PendingHashes {
    fn get(&self, hash: &str) -> Option<&HashRecord> {
        self.0.iter().find(|record| record.hash == hash)
    }

    fn push(&mut self, record: HashRecord) {
        self.0.push(record);
    }
}

enum FileOutcome {
    New(ImageRecord),
    Skipped,
    Repaired,
}

/// Check the file decodes as an image, then hash its content.
async fn fingerprint(path: PathBuf) -> Result<String> {
    tokio::task::spawn_blocking(move || {
        image::image_dimensions(&path).map_err(|e| GalleryError::image(e, path.as_path()))?;
        compute_sha256(&path)
    })
    .await
    .map_err(|e| GalleryError::Other(format!("Hashing task failed: {}", e)))?
}

/// Immediate subfolders of `root` that hold galleries, sorted by name.
pub fn gallery_folders(root: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(root).map_err(|e| GalleryError::io_with_path(e, root))?;
    let mut folders: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .filter(|path| {
            let name = folder_name(path);
            !name.starts_with('.')
                && name != PathsConfig::BACKUP_DIR_NAME
                && name != PathsConfig::EXPORT_DIR_NAME
        })
        .collect();
    folders.sort();
    Ok(folders)
}
