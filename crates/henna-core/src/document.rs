//! Typed gallery manifest.
//!
//! A [`GalleryDocument`] is always built from a value that has been through
//! [`crate::schema::transform`], so it only ever sees canonical field names.
//! Legacy aliases are emitted on serialization: `url` and `filename` mirror
//! `src`, `index` and `sort_order` mirror `order`. Unknown fields at every
//! level survive a load/save cycle in the `extra` maps.

use crate::error::{GalleryError, Result};
use crate::metadata::{atomic_read_json, atomic_write_json};
use crate::naming::slugify;
use crate::schema::{self, TransformContext};
use chrono::SecondsFormat;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Field names written by [`ImageRecord`]'s serializer; never taken from
/// `extra`.
const RESERVED_IMAGE_FIELDS: &[&str] = &[
    "src",
    "url",
    "filename",
    "keywords",
    "tags",
    "categories",
    "alt_text",
    "caption",
    "headline",
    "featured",
    "order",
    "index",
    "sort_order",
    "total",
    "modified_date",
];

/// Current local time as an RFC 3339 timestamp.
pub fn timestamp_now() -> String {
    chrono::Local::now().to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// Manifest path for a gallery folder: `<folder>/<folder_name>.json`.
pub fn gallery_json_path(folder: &Path) -> PathBuf {
    let name = folder_name(folder);
    folder.join(format!("{}.json", name))
}

/// Final path component of a folder, or `"gallery"` for a bare root.
pub fn folder_name(folder: &Path) -> String {
    folder
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "gallery".to_string())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GalleryMeta {
    pub gallery_title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gallery_slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
    #[serde(default)]
    pub export_profiles: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GalleryMeta {
    pub fn new(title: &str) -> Self {
        let now = timestamp_now();
        Self {
            gallery_title: title.to_string(),
            gallery_slug: Some(slugify(title)),
            created_date: Some(now.clone()),
            last_updated: Some(now),
            export_profiles: Vec::new(),
            extra: Map::new(),
        }
    }
}

/// One photo in a gallery.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ImageRecord {
    pub src: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub alt_text: String,
    #[serde(default)]
    pub caption: String,
    #[serde(default)]
    pub headline: String,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub order: usize,
    #[serde(default)]
    pub total: usize,
    #[serde(default)]
    pub modified_date: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ImageRecord {
    pub fn new(src: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            keywords: Vec::new(),
            alt_text: String::new(),
            caption: String::new(),
            headline: String::new(),
            featured: false,
            order: 0,
            total: 0,
            modified_date: Some(timestamp_now()),
            extra: Map::new(),
        }
    }

    /// Mark the record as modified now.
    pub fn touch(&mut self) {
        self.modified_date = Some(timestamp_now());
    }
}

#[derive(Serialize)]
struct ImageRecordWire<'a> {
    src: &'a str,
    url: &'a str,
    filename: &'a str,
    keywords: &'a [String],
    tags: &'a [String],
    categories: &'a [String],
    alt_text: &'a str,
    caption: &'a str,
    headline: &'a str,
    featured: bool,
    order: usize,
    index: usize,
    sort_order: usize,
    total: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    modified_date: Option<&'a str>,
    #[serde(flatten)]
    extra: UnreservedFields<'a>,
}

struct UnreservedFields<'a>(&'a Map<String, Value>);

impl Serialize for UnreservedFields<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(
            self.0
                .iter()
                .filter(|(key, _)| !RESERVED_IMAGE_FIELDS.contains(&key.as_str())),
        )
    }
}

impl Serialize for ImageRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        ImageRecordWire {
            src: &self.src,
            url: &self.src,
            filename: &self.src,
            keywords: &self.keywords,
            tags: &self.keywords,
            categories: &self.keywords,
            alt_text: &self.alt_text,
            caption: &self.caption,
            headline: &self.headline,
            featured: self.featured,
            order: self.order,
            index: self.order,
            sort_order: self.order,
            total: self.total,
            modified_date: self.modified_date.as_deref(),
            extra: UnreservedFields(&self.extra),
        }
        .serialize(serializer)
    }
}

/// Partial edit of an image record; `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageUpdate {
    pub keywords: Option<Vec<String>>,
    pub alt_text: Option<String>,
    pub caption: Option<String>,
    pub headline: Option<String>,
    pub featured: Option<bool>,
}

/// The per-folder gallery manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GalleryDocument {
    pub meta: GalleryMeta,
    #[serde(default)]
    pub images: Vec<ImageRecord>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GalleryDocument {
    pub fn new(title: &str) -> Self {
        Self {
            meta: GalleryMeta::new(title),
            images: Vec::new(),
            extra: Map::new(),
        }
    }

    /// Build from a value already in current shape.
    pub fn from_current_value(value: Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| GalleryError::Json {
            message: format!("Gallery does not match the current schema: {}", e),
            source: Some(e),
        })
    }

    /// Normalize any decoded manifest (legacy or current) and validate it.
    pub fn from_any_value(value: Value, context: &TransformContext) -> Result<Self> {
        let format = schema::detect_format(&value);
        let transformed = schema::transform(format, value, context);
        let errors = schema::SchemaValidator::new().check(&transformed);
        if !errors.is_empty() {
            return Err(GalleryError::Validation { errors });
        }
        Self::from_current_value(transformed)
    }

    /// Load a folder's manifest, normalizing legacy fields on the way in.
    /// Returns `None` if the manifest does not exist.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let Some(value) = atomic_read_json::<Value>(path)? else {
            return Ok(None);
        };
        let folder = path.parent().unwrap_or_else(|| Path::new("."));
        let context = TransformContext::for_folder(&folder_name(folder));
        Self::from_any_value(value, &context).map(Some)
    }

    /// Stamp `last_updated` and write atomically.
    pub fn save(&mut self, path: &Path) -> Result<()> {
        self.meta.last_updated = Some(timestamp_now());
        atomic_write_json(path, self)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn position(&self, src: &str) -> Option<usize> {
        self.images.iter().position(|img| img.src == src)
    }

    pub fn get(&self, src: &str) -> Option<&ImageRecord> {
        self.images.iter().find(|img| img.src == src)
    }

    /// Recompute `order` and `total` from array position.
    pub fn renumber(&mut self) {
        let total = self.images.len();
        for (i, img) in self.images.iter_mut().enumerate() {
            img.order = i;
            img.total = total;
        }
    }

    /// Drop records whose file is missing from `folder`, then renumber.
    ///
    /// Returns the `src` of every dropped record; each drop is logged.
    pub fn reindex(&mut self, folder: &Path) -> Vec<String> {
        let mut dropped = Vec::new();
        self.images.retain(|img| {
            if folder.join(&img.src).is_file() {
                true
            } else {
                warn!(
                    "Dropping gallery entry '{}': file not found in {}",
                    img.src,
                    folder.display()
                );
                dropped.push(img.src.clone());
                false
            }
        });
        self.renumber();
        dropped
    }

    /// Put `new_records` at the front (newest first). Existing records with
    /// a colliding `src` are replaced by the new ones.
    pub fn merge_new(&mut self, new_records: Vec<ImageRecord>) {
        if new_records.is_empty() {
            return;
        }
        let incoming: HashSet<String> = new_records.iter().map(|img| img.src.clone()).collect();
        let existing = std::mem::take(&mut self.images);
        self.images = new_records;
        self.images.extend(existing.into_iter().filter(|old| {
            let replaced = incoming.contains(&old.src);
            if replaced {
                debug!("Replacing existing entry '{}'", old.src);
            }
            !replaced
        }));
        self.renumber();
    }

    /// Move the image at `from` to position `to`.
    pub fn move_image(&mut self, from: usize, to: usize) -> Result<()> {
        let len = self.images.len();
        if from >= len || to >= len {
            return Err(GalleryError::Other(format!(
                "Cannot move image {} to {}: gallery has {} images",
                from, to, len
            )));
        }
        let mut record = self.images.remove(from);
        record.touch();
        self.images.insert(to, record);
        self.renumber();
        Ok(())
    }

    /// Apply a partial edit to the record with `src`.
    pub fn update_image(&mut self, src: &str, update: ImageUpdate) -> Result<()> {
        let record = self
            .images
            .iter_mut()
            .find(|img| img.src == src)
            .ok_or_else(|| GalleryError::Other(format!("No image '{}' in gallery", src)))?;

        if let Some(keywords) = update.keywords {
            record.keywords = schema::normalize_labels(&keywords);
        }
        if let Some(alt_text) = update.alt_text {
            record.alt_text = alt_text;
        }
        if let Some(caption) = update.caption {
            record.caption = caption;
        }
        if let Some(headline) = update.headline {
            record.headline = headline;
        }
        if let Some(featured) = update.featured {
            record.featured = featured;
        }
        record.touch();
        Ok(())
    }

    /// Remove the record with `src`, keeping positions contiguous.
    pub fn remove_image(&mut self, src: &str) -> Option<ImageRecord> {
        let index = self.position(src)?;
        let removed = self.images.remove(index);
        self.renumber();
        Some(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn doc_with(srcs: &[&str]) -> GalleryDocument {
        let mut doc = GalleryDocument::new("Test");
        doc.images = srcs.iter().map(|s| ImageRecord::new(*s)).collect();
        doc.renumber();
        doc
    }

    fn orders(doc: &GalleryDocument) -> Vec<usize> {
        doc.images.iter().map(|img| img.order).collect()
    }

    #[test]
    fn test_serialization_writes_aliases() {
        let doc = doc_with(&["a.jpg", "b.jpg"]);
        let value = serde_json::to_value(&doc).unwrap();
        let second = &value["images"][1];

        assert_eq!(second["src"], "b.jpg");
        assert_eq!(second["url"], "b.jpg");
        assert_eq!(second["filename"], "b.jpg");
        assert_eq!(second["order"], 1);
        assert_eq!(second["index"], 1);
        assert_eq!(second["sort_order"], 1);
        assert_eq!(second["total"], 2);
        assert_eq!(value["meta"]["gallery_slug"], "test");
    }

    #[test]
    fn test_keyword_aliases_mirror_keywords() {
        let mut record = ImageRecord::new("a.jpg");
        record.keywords = vec!["bridal".into(), "hand".into()];
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["keywords"], json!(["bridal", "hand"]));
        assert_eq!(value["tags"], json!(["bridal", "hand"]));
        assert_eq!(value["categories"], json!(["bridal", "hand"]));
    }

    #[test]
    fn test_unknown_fields_survive_round_trip() {
        let value = json!({
            "meta": {"gallery_title": "G", "theme": "dark"},
            "images": [{"src": "a.jpg", "color_palette": ["#ffffff"]}],
            "version": 2
        });
        let doc = GalleryDocument::from_any_value(value, &TransformContext::validation()).unwrap();
        let out = serde_json::to_value(&doc).unwrap();

        assert_eq!(out["meta"]["theme"], "dark");
        assert_eq!(out["images"][0]["color_palette"], json!(["#ffffff"]));
        assert_eq!(out["version"], 2);
    }

    #[test]
    fn test_reserved_extra_keys_are_not_duplicated() {
        let mut record = ImageRecord::new("a.jpg");
        record.extra.insert("url".into(), json!("stale.jpg"));
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["url"], "a.jpg");
    }

    #[test]
    fn test_reindex_drops_missing_files() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("a.jpg"), b"a").unwrap();
        std::fs::write(temp.path().join("c.jpg"), b"c").unwrap();
        let mut doc = doc_with(&["a.jpg", "b.jpg", "c.jpg"]);

        let dropped = doc.reindex(temp.path());

        assert_eq!(dropped, vec!["b.jpg".to_string()]);
        assert_eq!(orders(&doc), vec![0, 1]);
        assert!(doc.images.iter().all(|img| img.total == 2));
    }

    #[test]
    fn test_merge_new_puts_new_first_and_replaces_collisions() {
        let mut doc = doc_with(&["old1.jpg", "shared.jpg", "old2.jpg"]);
        let mut replacement = ImageRecord::new("shared.jpg");
        replacement.caption = "fresh".into();

        doc.merge_new(vec![ImageRecord::new("new.jpg"), replacement]);

        let srcs: Vec<&str> = doc.images.iter().map(|i| i.src.as_str()).collect();
        assert_eq!(srcs, vec!["new.jpg", "shared.jpg", "old1.jpg", "old2.jpg"]);
        assert_eq!(doc.get("shared.jpg").unwrap().caption, "fresh");
        assert_eq!(orders(&doc), vec![0, 1, 2, 3]);
        assert!(doc.images.iter().all(|img| img.total == 4));
    }

    #[test]
    fn test_move_image() {
        let mut doc = doc_with(&["a.jpg", "b.jpg", "c.jpg"]);
        doc.move_image(2, 0).unwrap();
        let srcs: Vec<&str> = doc.images.iter().map(|i| i.src.as_str()).collect();
        assert_eq!(srcs, vec!["c.jpg", "a.jpg", "b.jpg"]);
        assert_eq!(orders(&doc), vec![0, 1, 2]);
        assert!(doc.move_image(0, 3).is_err());
    }

    #[test]
    fn test_update_and_remove() {
        let mut doc = doc_with(&["a.jpg", "b.jpg"]);
        doc.update_image(
            "b.jpg",
            ImageUpdate {
                keywords: Some(vec!["Floral".into(), "floral".into()]),
                featured: Some(true),
                ..Default::default()
            },
        )
        .unwrap();
        let b = doc.get("b.jpg").unwrap();
        assert_eq!(b.keywords, vec!["floral"]);
        assert!(b.featured);
        assert!(doc.update_image("zzz.jpg", ImageUpdate::default()).is_err());

        let removed = doc.remove_image("a.jpg").unwrap();
        assert_eq!(removed.src, "a.jpg");
        assert_eq!(doc.images[0].order, 0);
        assert_eq!(doc.images[0].total, 1);
        assert!(doc.remove_image("a.jpg").is_none());
    }

    #[test]
    fn test_load_normalizes_legacy_manifest() {
        let temp = TempDir::new().unwrap();
        let folder = temp.path().join("Feet");
        std::fs::create_dir(&folder).unwrap();
        let path = gallery_json_path(&folder);
        std::fs::write(&path, r#"[{"url": "x.jpg", "tags": ["Toe", "toe"]}]"#).unwrap();

        let doc = GalleryDocument::load(&path).unwrap().unwrap();
        assert_eq!(doc.meta.gallery_title, "Feet");
        assert_eq!(doc.images[0].src, "x.jpg");
        assert_eq!(doc.images[0].keywords, vec!["toe"]);

        assert!(GalleryDocument::load(&folder.join("missing.json")).unwrap().is_none());
    }

    #[test]
    fn test_save_stamps_last_updated() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("g.json");
        let mut doc = GalleryDocument::new("G");
        doc.meta.last_updated = None;

        doc.save(&path).unwrap();

        assert!(doc.meta.last_updated.is_some());
        let reloaded = GalleryDocument::load(&path).unwrap().unwrap();
        assert_eq!(reloaded, doc);
    }

    #[test]
    fn test_gallery_json_path() {
        assert_eq!(
            gallery_json_path(Path::new("/photos/Bridal")),
            PathBuf::from("/photos/Bridal/Bridal.json")
        );
    }
}
