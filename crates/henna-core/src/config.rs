//! Centralized configuration for Henna Gallery.
//!
//! Compile-time constants live on the `*Config` unit structs. Runtime
//! settings that a user may override live in [`Settings`], persisted as
//! `config.json` and merged section by section over the defaults.

use crate::error::{GalleryError, Result};
use crate::metadata::{atomic_read_json, atomic_write_json};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Application-level configuration.
pub struct AppConfig;

impl AppConfig {
    pub const APP_NAME: &'static str = "Henna Gallery Editor";
    pub const APP_DIR_NAME: &'static str = "henna-gallery";
    pub const VERSION: &'static str = env!("CARGO_PKG_VERSION");
}

/// Gallery processing defaults.
pub struct GalleryConfig;

impl GalleryConfig {
    pub const SUPPORTED_EXTENSIONS: &'static [&'static str] = &["jpg", "jpeg", "png", "webp"];
    pub const BATCH_SIZE: usize = 50;
    pub const BATCH_PAUSE: Duration = Duration::from_secs(1);
    pub const THUMBNAIL_SIZE: u32 = 120;
    pub const DEFAULT_GALLERY_TITLE: &'static str = "Migrated Gallery";
    pub const DEFAULT_GALLERY_SLUG: &'static str = "migrated-gallery";
    /// Labels used when deriving a processed filename.
    pub const FILENAME_LABELS: usize = 2;
    /// Hex characters of the content hash appended to processed filenames.
    pub const FILENAME_HASH_CHARS: usize = 6;
}

/// Directory and file names.
pub struct PathsConfig;

impl PathsConfig {
    pub const BACKUP_DIR_NAME: &'static str = "backups";
    pub const BACKUP_INFIX: &'static str = "_v2backup_";
    pub const BACKUP_TIMESTAMP_FORMAT: &'static str = "%Y%m%d_%H%M%S";
    pub const EXPORT_DIR_NAME: &'static str = "exports";
    pub const HASH_INDEX_FILENAME: &'static str = "image_hashes.jsonl";
    pub const CONFIG_FILENAME: &'static str = "config.json";
    pub const TRANSACTION_SUFFIX: &'static str = "bak";
}

/// Network-related configuration.
pub struct NetworkConfig;

impl NetworkConfig {
    pub const VISION_ENDPOINT: &'static str = "https://vision.googleapis.com";
    pub const VISION_API_KEY_ENV: &'static str = "HENNA_VISION_API_KEY";
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
    pub const MAX_LABELS: usize = 6;
    pub const FILE_WATCHER_DEBOUNCE: Duration = Duration::from_millis(500);
}

/// Export defaults.
pub struct ExportConfig;

impl ExportConfig {
    pub const MAX_WORKERS: usize = 4;
    pub const DEFAULT_PROFILE: &'static str = "web_ready";
    pub const PALETTE_COLORS: usize = 3;
}

/// A named output size. `None` dimensions mean "copy the original".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    pub name: String,
    pub dimensions: Option<(u32, u32)>,
}

impl ImageSize {
    fn new(name: &str, dimensions: Option<(u32, u32)>) -> Self {
        Self {
            name: name.to_string(),
            dimensions,
        }
    }
}

/// Export profile: which variants to produce and which extra fields to fill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportProfile {
    pub name: String,
    pub description: String,
    pub image_sizes: Vec<ImageSize>,
    pub format: String,
    pub quality: u8,
    pub required_fields: Vec<String>,
}

impl ExportProfile {
    /// Built-in profile names.
    pub const BUILTIN: &'static [&'static str] = &["web_ready", "social_media"];

    /// Look up a built-in profile by name.
    pub fn builtin(name: &str) -> Result<Self> {
        match name {
            "web_ready" => Ok(Self {
                name: "web_ready".into(),
                description: "Optimized for web display with responsive sizes".into(),
                image_sizes: vec![
                    ImageSize::new("original", None),
                    ImageSize::new("lg", Some((1920, 1080))),
                    ImageSize::new("md", Some((1280, 720))),
                    ImageSize::new("thumb", Some((400, 400))),
                ],
                format: "webp".into(),
                quality: 85,
                required_fields: vec!["alt_text".into(), "color_palette".into()],
            }),
            "social_media" => Ok(Self {
                name: "social_media".into(),
                description: "Formats optimized for social platforms".into(),
                image_sizes: vec![
                    ImageSize::new("square", Some((1080, 1080))),
                    ImageSize::new("story", Some((1080, 1920))),
                ],
                format: "jpg".into(),
                quality: 90,
                required_fields: vec!["alt_text".into(), "seo_attributes".into()],
            }),
            other => Err(GalleryError::UnknownProfile(other.to_string())),
        }
    }

    pub fn requires(&self, field: &str) -> bool {
        self.required_fields.iter().any(|f| f == field)
    }
}

/// User-overridable gallery settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GallerySettings {
    pub supported_extensions: Vec<String>,
    pub batch_size: usize,
    pub batch_pause_ms: u64,
    pub thumbnail_size: u32,
}

impl Default for GallerySettings {
    fn default() -> Self {
        Self {
            supported_extensions: GalleryConfig::SUPPORTED_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
            batch_size: GalleryConfig::BATCH_SIZE,
            batch_pause_ms: GalleryConfig::BATCH_PAUSE.as_millis() as u64,
            thumbnail_size: GalleryConfig::THUMBNAIL_SIZE,
        }
    }
}

impl GallerySettings {
    pub fn batch_pause(&self) -> Duration {
        Duration::from_millis(self.batch_pause_ms)
    }

    /// Whether a path has one of the supported image extensions.
    pub fn is_supported(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .map(|ext| self.supported_extensions.iter().any(|s| *s == ext))
            .unwrap_or(false)
    }
}

/// User-overridable export settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportSettings {
    pub max_workers: usize,
    pub default_profile: String,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            max_workers: ExportConfig::MAX_WORKERS,
            default_profile: ExportConfig::DEFAULT_PROFILE.to_string(),
        }
    }
}

/// Vision service settings as stored on disk. The API key is optional
/// here; [`VisionConfig::resolve`] falls back to the environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisionSettings {
    #[serde(default)]
    pub api_key: Option<String>,
    pub endpoint: String,
    pub max_labels: usize,
    pub timeout_secs: u64,
}

impl Default for VisionSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: NetworkConfig::VISION_ENDPOINT.to_string(),
            max_labels: NetworkConfig::MAX_LABELS,
            timeout_secs: NetworkConfig::REQUEST_TIMEOUT.as_secs(),
        }
    }
}

/// Root of `config.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub gallery: GallerySettings,
    #[serde(default)]
    pub export: ExportSettings,
    #[serde(default)]
    pub vision: VisionSettings,
    #[serde(default = "default_tag_suggestions")]
    pub tag_suggestions: Vec<String>,
}

fn default_tag_suggestions() -> Vec<String> {
    [
        "henna",
        "design",
        "hand",
        "foot",
        "arabic",
        "indian",
        "bridal",
        "traditional",
        "modern",
        "floral",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Settings {
    /// Default location: `<config dir>/henna-gallery/config.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| {
            dir.join(AppConfig::APP_DIR_NAME)
                .join(PathsConfig::CONFIG_FILENAME)
        })
    }

    /// Load settings, merging each section of the user file over the
    /// defaults. A missing file yields the defaults and writes them out; an
    /// unreadable or malformed file yields the defaults with a warning.
    pub fn load(path: &Path) -> Result<Self> {
        let user: Option<Value> = match atomic_read_json(path) {
            Ok(value) => value,
            Err(e) => {
                warn!("Ignoring unreadable settings {}: {}", path.display(), e);
                return Ok(Self::default());
            }
        };

        let Some(user) = user else {
            debug!("No settings at {}, writing defaults", path.display());
            let defaults = Self::default();
            defaults.save(path)?;
            return Ok(defaults);
        };

        let mut merged = serde_json::to_value(Self::default())?;
        merge_sections(&mut merged, user);
        match serde_json::from_value(merged) {
            Ok(settings) => Ok(settings),
            Err(e) => {
                warn!("Settings at {} have invalid values: {}", path.display(), e);
                Ok(Self::default())
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        atomic_write_json(path, self)
    }
}

/// Section-wise merge: object sections are updated key by key, any other
/// value replaces the default outright.
fn merge_sections(defaults: &mut Value, user: Value) {
    let (Value::Object(base), Value::Object(overrides)) = (defaults, user) else {
        return;
    };
    for (section, value) in overrides {
        if let (Some(Value::Object(existing)), Value::Object(incoming)) =
            (base.get_mut(&section), &value)
        {
            existing.extend(incoming.clone());
            continue;
        }
        base.insert(section, value);
    }
}

/// Resolved configuration for the label-extraction service. Built once at
/// startup and handed to the client that needs it.
#[derive(Clone, PartialEq)]
pub struct VisionConfig {
    pub api_key: String,
    pub endpoint: String,
    pub max_labels: usize,
    pub timeout: Duration,
}

impl std::fmt::Debug for VisionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisionConfig")
            .field("api_key", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .field("max_labels", &self.max_labels)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl VisionConfig {
    /// Resolve from settings, with the environment variable taking
    /// precedence over a key stored in the settings file.
    pub fn resolve(settings: &VisionSettings) -> Result<Self> {
        let env_key = std::env::var(NetworkConfig::VISION_API_KEY_ENV).ok();
        Self::resolve_with_key(settings, env_key)
    }

    fn resolve_with_key(settings: &VisionSettings, env_key: Option<String>) -> Result<Self> {
        let api_key = env_key
            .filter(|k| !k.trim().is_empty())
            .or_else(|| settings.api_key.clone().filter(|k| !k.trim().is_empty()))
            .ok_or_else(|| GalleryError::Config {
                message: format!(
                    "No vision API key: set {} or vision.api_key in config.json",
                    NetworkConfig::VISION_API_KEY_ENV
                ),
            })?;

        Ok(Self {
            api_key,
            endpoint: settings.endpoint.trim_end_matches('/').to_string(),
            max_labels: settings.max_labels,
            timeout: Duration::from_secs(settings.timeout_secs),
        })
    }
}
