//! Transformation of any detected manifest shape into the current shape.

use super::format::DetectedFormat;
use super::keywords::{normalize_keywords, KEYWORD_FIELDS};
use crate::config::GalleryConfig;
use crate::document::timestamp_now;
use crate::naming::slugify;
use serde_json::{json, Map, Value};

/// Fields an image's `src` may be found under, in priority order.
const SRC_FIELDS: &[&str] = &["src", "url", "filename"];

/// Fields an image's `order` may be found under, in priority order.
const ORDER_FIELDS: &[&str] = &["order", "sort_order", "index"];

/// Defaults used while transforming a manifest.
#[derive(Debug, Clone)]
pub struct TransformContext {
    /// Title used when the manifest carries none.
    pub title: String,
    /// Fill a missing `src` with `image_<position>.jpg`.
    pub placeholder_src: bool,
    /// Timestamp stamped into synthesized metadata.
    pub now: String,
}

impl TransformContext {
    /// Context for standalone validation: generic title, no placeholders.
    pub fn validation() -> Self {
        Self {
            title: GalleryConfig::DEFAULT_GALLERY_TITLE.to_string(),
            placeholder_src: false,
            now: timestamp_now(),
        }
    }

    /// Context for migrating the manifest of the folder named `folder_name`.
    pub fn for_folder(folder_name: &str) -> Self {
        Self {
            title: folder_name.to_string(),
            placeholder_src: true,
            now: timestamp_now(),
        }
    }
}

/// Bring a decoded manifest into current shape.
///
/// The current meta object is left as found so the validator can report
/// what is wrong with it. Legacy metadata is synthesized from `title` and
/// `created`. Each image object gets its `src`, `keywords` and `order`
/// resolved from legacy aliases; every other field is kept.
pub fn transform(format: DetectedFormat, value: Value, context: &TransformContext) -> Value {
    let (meta, images, mut root) = match (format, value) {
        (DetectedFormat::Current, Value::Object(mut map)) => {
            let meta = map.remove("meta").unwrap_or(Value::Null);
            let images = map.remove("images").unwrap_or(Value::Null);
            (meta, images, map)
        }
        (DetectedFormat::LegacyObject, Value::Object(mut map)) => {
            let images = map.remove("images").unwrap_or(Value::Null);
            let title = take_string(&mut map, "title");
            let created = take_string(&mut map, "created");
            (synthesize_meta(title, created, context), images, map)
        }
        (DetectedFormat::LegacyArray, images @ Value::Array(_)) => {
            (synthesize_meta(None, None, context), images, Map::new())
        }
        _ => (
            synthesize_meta(None, None, context),
            Value::Array(Vec::new()),
            Map::new(),
        ),
    };

    let images = match images {
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .enumerate()
                .map(|(position, image)| coerce_image(position, image, context))
                .collect(),
        ),
        other => other,
    };

    root.insert("meta".to_string(), meta);
    root.insert("images".to_string(), images);
    Value::Object(root)
}

fn take_string(map: &mut Map<String, Value>, key: &str) -> Option<String> {
    match map.remove(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
        Some(other) => {
            map.insert(key.to_string(), other);
            None
        }
        None => None,
    }
}

fn synthesize_meta(title: Option<String>, created: Option<String>, context: &TransformContext) -> Value {
    let title = title.unwrap_or_else(|| context.title.clone());
    json!({
        "gallery_title": title,
        "gallery_slug": slugify(&title),
        "created_date": created.unwrap_or_else(|| context.now.clone()),
        "last_updated": context.now,
        "export_profiles": [],
    })
}

fn coerce_image(position: usize, image: Value, context: &TransformContext) -> Value {
    let mut map = match image {
        Value::Object(map) => map,
        Value::String(src) => {
            let mut map = Map::new();
            map.insert("src".to_string(), Value::String(src));
            map
        }
        other => return other,
    };
    // Absent and null mean the same thing for every image field.
    map.retain(|_, value| !value.is_null());

    let src = SRC_FIELDS.iter().find_map(|field| {
        map.get(*field)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string)
    });
    let src = src.or_else(|| {
        context
            .placeholder_src
            .then(|| format!("image_{}.jpg", position))
    });
    if let Some(src) = src {
        map.remove("url");
        map.remove("filename");
        map.insert("src".to_string(), Value::String(src));
    }

    let keyword_sources: Vec<Value> = KEYWORD_FIELDS
        .iter()
        .filter_map(|field| map.remove(*field))
        .collect();
    map.insert(
        "keywords".to_string(),
        json!(normalize_keywords(keyword_sources.iter())),
    );

    let order = ORDER_FIELDS
        .iter()
        .find_map(|field| map.get(*field).and_then(as_position));
    if let Some(order) = order {
        map.remove("sort_order");
        map.remove("index");
        map.insert("order".to_string(), json!(order));
    }

    if let Some(total) = map.get("total").and_then(as_position) {
        map.insert("total".to_string(), json!(total));
    }

    Value::Object(map)
}

/// Read a JSON number as a non-negative integer position.
fn as_position(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .map(|f| if f.is_finite() && f > 0.0 { f as u64 } else { 0 })
    })
}
