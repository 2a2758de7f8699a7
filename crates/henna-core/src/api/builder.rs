//! Builder for configuring GalleryApi initialization.

use crate::cancel::CancellationToken;
use crate::config::{Settings, VisionConfig};
use crate::error::{GalleryError, Result};
use crate::migration::Migrator;
use crate::vision::{GoogleVisionClient, LabelExtractor, NoLabels};
use crate::GalleryApi;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// Builder for configuring GalleryApi initialization.
///
/// # Example
///
/// ```rust,no_run
/// use henna_core::GalleryApi;
///
/// # fn main() -> henna_core::Result<()> {
/// let api = GalleryApi::builder("./galleries")
///     .auto_create_dirs(true)
///     .offline(true)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct GalleryApiBuilder {
    root: PathBuf,
    settings: Option<Settings>,
    settings_path: Option<PathBuf>,
    extractor: Option<Arc<dyn LabelExtractor>>,
    offline: bool,
    auto_create_dirs: bool,
    cancel: CancellationToken,
}

impl GalleryApiBuilder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            settings: None,
            settings_path: None,
            extractor: None,
            offline: false,
            auto_create_dirs: false,
            cancel: CancellationToken::new(),
        }
    }

    /// Use these settings instead of loading `config.json`.
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Load settings from this file instead of the default location.
    pub fn settings_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings_path = Some(path.into());
        self
    }

    /// Use a custom label extractor.
    pub fn extractor(mut self, extractor: Arc<dyn LabelExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    /// Process images without label extraction.
    ///
    /// Default: `false`
    pub fn offline(mut self, enable: bool) -> Self {
        self.offline = enable;
        self
    }

    /// Create the gallery root if it does not exist.
    ///
    /// Default: `false` (the root must exist)
    pub fn auto_create_dirs(mut self, enable: bool) -> Self {
        self.auto_create_dirs = enable;
        self
    }

    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn build(self) -> Result<GalleryApi> {
        if !self.root.exists() {
            if !self.auto_create_dirs {
                return Err(GalleryError::Config {
                    message: format!("Gallery root does not exist: {}", self.root.display()),
                });
            }
            std::fs::create_dir_all(&self.root)
                .map_err(|e| GalleryError::io_with_path(e, &self.root))?;
        }
        if !self.root.is_dir() {
            return Err(GalleryError::NotADirectory(self.root));
        }

        let settings = match (self.settings, self.settings_path.or_else(Settings::default_path)) {
            (Some(settings), _) => settings,
            (None, Some(path)) => Settings::load(&path)?,
            (None, None) => {
                warn!("No configuration directory; using default settings");
                Settings::default()
            }
        };

        let extractor: Option<Arc<dyn LabelExtractor>> = match self.extractor {
            Some(extractor) => Some(extractor),
            None if self.offline => Some(Arc::new(NoLabels)),
            None => match VisionConfig::resolve(&settings.vision) {
                Ok(config) => Some(Arc::new(GoogleVisionClient::new(config)?)),
                Err(e) => {
                    debug!("Label extraction unavailable: {}", e);
                    None
                }
            },
        };

        Ok(GalleryApi {
            root: self.root,
            settings,
            extractor,
            migrator: Migrator::new(),
            cancel: self.cancel,
        })
    }
}
