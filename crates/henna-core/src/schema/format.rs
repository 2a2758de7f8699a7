//! Manifest format detection.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Shape of a decoded gallery manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DetectedFormat {
    /// Object with both `meta` and `images`.
    Current,
    /// Object with `images` but no `meta` (v1: `{"title", "images"}`).
    LegacyObject,
    /// A bare array used as the images list.
    LegacyArray,
    /// Anything else; regenerated from defaults.
    Unrecognized,
}

impl DetectedFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectedFormat::Current => "current",
            DetectedFormat::LegacyObject => "legacy-object",
            DetectedFormat::LegacyArray => "legacy-array",
            DetectedFormat::Unrecognized => "unrecognized",
        }
    }

    pub fn is_current(&self) -> bool {
        matches!(self, DetectedFormat::Current)
    }
}

impl fmt::Display for DetectedFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a decoded manifest. Pure and infallible.
pub fn detect_format(value: &Value) -> DetectedFormat {
    match value {
        Value::Object(map) if map.contains_key("meta") && map.contains_key("images") => {
            DetectedFormat::Current
        }
        Value::Object(map) if map.contains_key("images") => DetectedFormat::LegacyObject,
        Value::Array(_) => DetectedFormat::LegacyArray,
        _ => DetectedFormat::Unrecognized,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_detect_each_shape() {
        assert_eq!(
            detect_format(&json!({"meta": {}, "images": []})),
            DetectedFormat::Current
        );
        assert_eq!(
            detect_format(&json!({"title": "Wedding", "images": []})),
            DetectedFormat::LegacyObject
        );
        assert_eq!(
            detect_format(&json!([{"filename": "x.jpg"}])),
            DetectedFormat::LegacyArray
        );
        assert_eq!(detect_format(&json!([])), DetectedFormat::LegacyArray);
    }

    #[test]
    fn test_detect_unrecognized() {
        assert_eq!(detect_format(&json!({"meta": {}})), DetectedFormat::Unrecognized);
        assert_eq!(detect_format(&json!("gallery")), DetectedFormat::Unrecognized);
        assert_eq!(detect_format(&json!(null)), DetectedFormat::Unrecognized);
        assert_eq!(detect_format(&json!(42)), DetectedFormat::Unrecognized);
    }

    #[test]
    fn test_display_names() {
        assert_eq!(DetectedFormat::LegacyObject.to_string(), "legacy-object");
        assert_eq!(
            serde_json::to_string(&DetectedFormat::LegacyArray).unwrap(),
            "\"legacy-array\""
        );
    }
}
