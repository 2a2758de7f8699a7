//! Label extraction for gallery images.
//!
//! [`LabelExtractor`] is the seam between the folder processor and whatever
//! service names the contents of an image. [`GoogleVisionClient`] talks to
//! the Cloud Vision REST API; [`NoLabels`] is used when processing offline.

mod google;
mod text;

pub use google::GoogleVisionClient;
pub use text::{caption_for, generate_alt_text, generate_headline};

use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// Names the contents of an image.
#[async_trait]
pub trait LabelExtractor: Send + Sync {
    /// Labels for the image at `path`, most relevant first, lowercased.
    async fn extract_labels(&self, path: &Path) -> Result<Vec<String>>;
}

/// Extractor that never finds anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLabels;

#[async_trait]
impl LabelExtractor for NoLabels {
    async fn extract_labels(&self, _path: &Path) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}
