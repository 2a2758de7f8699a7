//! File system watcher for new gallery images.
//!
//! Watches a gallery root recursively and reports each folder that received
//! a supported image, once per debounce window.

use crate::config::{GallerySettings, NetworkConfig, PathsConfig};
use crate::error::{GalleryError, Result};
use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{new_debouncer, DebouncedEvent, Debouncer};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Callback invoked with the folder that received new images.
pub type FolderCallback = Box<dyn Fn(PathBuf) + Send + Sync + 'static>;

pub struct FolderWatcher {
    _debouncer: Debouncer<RecommendedWatcher>,
    stop_tx: mpsc::Sender<()>,
}

impl FolderWatcher {
    /// Start watching `root`.
    ///
    /// # Arguments
    ///
    /// * `root` - Gallery root to watch recursively
    /// * `settings` - Decides which file extensions count as images
    /// * `debounce_duration` - Quiet period before a batch of events is reported
    /// * `on_new_images` - Called once per affected folder per batch
    pub fn new(
        root: impl AsRef<Path>,
        settings: GallerySettings,
        debounce_duration: Duration,
        on_new_images: FolderCallback,
    ) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let (stop_tx, mut stop_rx) = mpsc::channel::<()>(1);
        let (event_tx, event_rx) = std::sync::mpsc::channel();

        let mut debouncer = new_debouncer(debounce_duration, event_tx)
            .map_err(|e| GalleryError::Other(format!("Failed to create file watcher: {}", e)))?;
        debouncer
            .watcher()
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|e| GalleryError::Other(format!("Failed to watch directory: {}", e)))?;

        info!("Watching {} for new images", root.display());

        let on_new_images = Arc::new(on_new_images);
        let watched_root = root.clone();
        std::thread::spawn(move || loop {
            if stop_rx.try_recv().is_ok() {
                debug!("Folder watcher stopping");
                break;
            }

            match event_rx.recv_timeout(NetworkConfig::FILE_WATCHER_DEBOUNCE) {
                Ok(Ok(events)) => {
                    for folder in folders_with_new_images(&watched_root, &events, &settings) {
                        debug!("New images in {}", folder.display());
                        on_new_images(folder);
                    }
                }
                Ok(Err(e)) => warn!("File watcher error: {}", e),
                Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {}
                Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                    warn!("File watcher channel disconnected");
                    break;
                }
            }
        });

        Ok(Self {
            _debouncer: debouncer,
            stop_tx,
        })
    }

    /// Start watching with the default debounce window.
    pub fn with_default_debounce(
        root: impl AsRef<Path>,
        settings: GallerySettings,
        on_new_images: FolderCallback,
    ) -> Result<Self> {
        Self::new(root, settings, NetworkConfig::FILE_WATCHER_DEBOUNCE, on_new_images)
    }

    pub async fn stop(&self) {
        let _ = self.stop_tx.send(()).await;
    }
}

/// Distinct parent folders of events that point at existing image files.
fn folders_with_new_images(
    root: &Path,
    events: &[DebouncedEvent],
    settings: &GallerySettings,
) -> BTreeSet<PathBuf> {
    events
        .iter()
        .map(|event| event.path.as_path())
        .filter(|path| is_new_image(root, path, settings))
        .filter_map(|path| path.parent().map(Path::to_path_buf))
        .collect()
}

fn is_new_image(root: &Path, path: &Path, settings: &GallerySettings) -> bool {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let in_special_dir = relative.components().any(|c| {
        let name = c.as_os_str();
        name == PathsConfig::BACKUP_DIR_NAME || name == PathsConfig::EXPORT_DIR_NAME
    });
    !in_special_dir && settings.is_supported(path) && path.is_file()
}
