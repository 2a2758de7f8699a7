//! Error types for Henna Gallery.
//!
//! The taxonomy follows the failure classes the library has to distinguish:
//! I/O, undecodable JSON, schema violations, backup integrity, per-image
//! processing failures, and export failures.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the henna gallery library.
#[derive(Debug, Error)]
pub enum GalleryError {
    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Path is not a directory: {0}")]
    NotADirectory(PathBuf),

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Schema errors
    #[error("Gallery failed validation with {} error(s): {}", .errors.len(), .errors.join("; "))]
    Validation { errors: Vec<String> },

    // Backup errors
    #[error("Backup verification failed for {path}: expected digest {expected}, got {actual}")]
    Integrity {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    // Image errors
    #[error("Image processing failed for {path}: {message}")]
    ImageProcessing { path: PathBuf, message: String },

    #[error("Label extraction failed: {message}")]
    LabelExtraction { message: String },

    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Request timeout")]
    Timeout,

    // Export errors
    #[error("Export failed: {message}")]
    Export {
        message: String,
        problematic_files: Vec<String>,
    },

    #[error("Unknown export profile: {0}")]
    UnknownProfile(String),

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Operation cancelled")]
    Cancelled,

    // Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for gallery operations.
pub type Result<T> = std::result::Result<T, GalleryError>;

impl From<std::io::Error> for GalleryError {
    fn from(err: std::io::Error) -> Self {
        GalleryError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for GalleryError {
    fn from(err: serde_json::Error) -> Self {
        GalleryError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<reqwest::Error> for GalleryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GalleryError::Timeout
        } else {
            GalleryError::Network {
                message: err.to_string(),
            }
        }
    }
}

impl From<zip::result::ZipError> for GalleryError {
    fn from(err: zip::result::ZipError) -> Self {
        GalleryError::Export {
            message: format!("ZIP archive error: {}", err),
            problematic_files: Vec::new(),
        }
    }
}

impl From<image::ImageError> for GalleryError {
    fn from(err: image::ImageError) -> Self {
        GalleryError::ImageProcessing {
            path: PathBuf::new(),
            message: err.to_string(),
        }
    }
}

impl From<walkdir::Error> for GalleryError {
    fn from(err: walkdir::Error) -> Self {
        let path = err.path().map(|p| p.to_path_buf());
        GalleryError::Io {
            message: err.to_string(),
            path,
            source: err.into_io_error(),
        }
    }
}

impl GalleryError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        GalleryError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Create an image processing error from an `image` crate failure.
    pub fn image(err: image::ImageError, path: impl Into<PathBuf>) -> Self {
        GalleryError::ImageProcessing {
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// Whether this error only affects a single image and the surrounding
    /// batch may continue.
    pub fn is_per_item(&self) -> bool {
        matches!(
            self,
            GalleryError::ImageProcessing { .. }
                | GalleryError::LabelExtraction { .. }
                | GalleryError::Network { .. }
                | GalleryError::Timeout
        )
    }
}
