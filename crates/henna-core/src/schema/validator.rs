//! Structural validation of gallery manifests.

use super::coerce::{transform, TransformContext};
use super::format::detect_format;
use crate::error::{GalleryError, Result};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Longest value excerpt quoted in an error message.
const EXCERPT_LEN: usize = 40;

/// Validates manifests against the current gallery schema.
///
/// Input is coerced to the current shape first (on a copy), so legacy
/// manifests are judged on what they would become after migration. Unknown
/// fields are always permitted.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaValidator;

impl SchemaValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(&self, value: &Value) -> bool {
        self.errors(value).is_empty()
    }

    /// All violations found, as `$.path: message` strings.
    pub fn errors(&self, value: &Value) -> Vec<String> {
        let coerced = transform(
            detect_format(value),
            value.clone(),
            &TransformContext::validation(),
        );
        self.check(&coerced)
    }

    /// Decode raw bytes and validate. Errors only if the bytes are not JSON.
    pub fn validate_bytes(&self, bytes: &[u8]) -> Result<Vec<String>> {
        let value: Value = serde_json::from_slice(bytes).map_err(|e| GalleryError::Json {
            message: format!("Gallery is not valid JSON: {}", e),
            source: Some(e),
        })?;
        Ok(self.errors(&value))
    }

    /// Check a value that is already in current shape, without coercion.
    pub fn check(&self, value: &Value) -> Vec<String> {
        let mut errors = Vec::new();
        let Some(root) = value.as_object() else {
            errors.push(format!("$: {} is not of type 'object'", excerpt(value)));
            return errors;
        };

        match root.get("meta") {
            None => errors.push("$: 'meta' is a required property".to_string()),
            Some(Value::Object(meta)) => check_meta(meta, &mut errors),
            Some(other) => errors.push(format!("$.meta: {} is not of type 'object'", excerpt(other))),
        }

        match root.get("images") {
            None => errors.push("$: 'images' is a required property".to_string()),
            Some(Value::Array(images)) => check_images(images, &mut errors),
            Some(other) => errors.push(format!("$.images: {} is not of type 'array'", excerpt(other))),
        }

        errors
    }
}

fn check_meta(meta: &Map<String, Value>, errors: &mut Vec<String>) {
    match meta.get("gallery_title") {
        None => errors.push("$.meta: 'gallery_title' is a required property".to_string()),
        Some(value) => expect_type(value, JsonType::String, "$.meta.gallery_title", errors),
    }
    for field in ["gallery_slug", "created_date", "last_updated"] {
        if let Some(value) = meta.get(field) {
            if !value.is_null() {
                expect_type(value, JsonType::String, &format!("$.meta.{}", field), errors);
            }
        }
    }
    match meta.get("export_profiles") {
        Some(Value::Array(profiles)) => {
            for (i, profile) in profiles.iter().enumerate() {
                expect_type(
                    profile,
                    JsonType::String,
                    &format!("$.meta.export_profiles[{}]", i),
                    errors,
                );
            }
        }
        Some(other) => expect_type(other, JsonType::Array, "$.meta.export_profiles", errors),
        None => {}
    }
}

fn check_images(images: &[Value], errors: &mut Vec<String>) {
    let mut seen: HashMap<&str, usize> = HashMap::new();

    for (i, image) in images.iter().enumerate() {
        let path = format!("$.images[{}]", i);
        let Some(image) = image.as_object() else {
            expect_type(image, JsonType::Object, &path, errors);
            continue;
        };

        match image.get("src") {
            None => errors.push(format!("{}: 'src' is a required property", path)),
            Some(Value::String(src)) if src.trim().is_empty() => {
                errors.push(format!("{}.src: '' should be non-empty", path));
            }
            Some(Value::String(src)) => {
                if let Some(first) = seen.insert(src.as_str(), i) {
                    errors.push(format!(
                        "{}.src: duplicate src '{}' (first used at $.images[{}])",
                        path, src, first
                    ));
                    seen.insert(src.as_str(), first);
                }
            }
            Some(other) => expect_type(other, JsonType::String, &format!("{}.src", path), errors),
        }

        let typed_fields = [
            ("alt_text", JsonType::String),
            ("caption", JsonType::String),
            ("headline", JsonType::String),
            ("modified_date", JsonType::String),
            ("featured", JsonType::Boolean),
            ("order", JsonType::Number),
            ("total", JsonType::Number),
            ("keywords", JsonType::Array),
        ];
        for (field, expected) in typed_fields {
            if let Some(value) = image.get(field) {
                expect_type(value, expected, &format!("{}.{}", path, field), errors);
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum JsonType {
    String,
    Number,
    Boolean,
    Array,
    Object,
}

impl JsonType {
    fn name(self) -> &'static str {
        match self {
            JsonType::String => "string",
            JsonType::Number => "number",
            JsonType::Boolean => "boolean",
            JsonType::Array => "array",
            JsonType::Object => "object",
        }
    }

    fn matches(self, value: &Value) -> bool {
        match self {
            JsonType::String => value.is_string(),
            JsonType::Number => value.is_number(),
            JsonType::Boolean => value.is_boolean(),
            JsonType::Array => value.is_array(),
            JsonType::Object => value.is_object(),
        }
    }
}

fn expect_type(value: &Value, expected: JsonType, path: &str, errors: &mut Vec<String>) {
    if !expected.matches(value) {
        errors.push(format!(
            "{}: {} is not of type '{}'",
            path,
            excerpt(value),
            expected.name()
        ));
    }
}

fn excerpt(value: &Value) -> String {
    let text = value.to_string();
    if text.chars().count() <= EXCERPT_LEN {
        text
    } else {
        let short: String = text.chars().take(EXCERPT_LEN).collect();
        format!("{}...", short)
    }
}
