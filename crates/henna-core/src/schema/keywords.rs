//! Keyword field normalization.
//!
//! Galleries have carried keywords under `keywords`, `tags` and
//! `categories` at different times. Every load folds them into one sorted,
//! deduplicated, lowercase list.

use serde_json::Value;
use std::collections::BTreeSet;

/// Legacy field names merged into `keywords`, in merge order.
pub const KEYWORD_FIELDS: &[&str] = &["keywords", "tags", "categories"];

/// Merge keyword sources into one sorted, deduplicated, lowercase list.
///
/// Each source may be an array or a single scalar. Strings are trimmed,
/// numbers and booleans use their JSON text, and nulls, nested containers
/// and blank entries are discarded.
pub fn normalize_keywords<'a>(sources: impl IntoIterator<Item = &'a Value>) -> Vec<String> {
    let mut keywords = BTreeSet::new();
    for source in sources {
        match source {
            Value::Array(items) => {
                keywords.extend(items.iter().filter_map(normalize_entry));
            }
            other => keywords.extend(normalize_entry(other)),
        }
    }
    keywords.into_iter().collect()
}

/// Normalize plain string labels, e.g. from label extraction.
pub fn normalize_labels<S: AsRef<str>>(labels: &[S]) -> Vec<String> {
    labels
        .iter()
        .map(|l| l.as_ref().trim().to_lowercase())
        .filter(|l| !l.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn normalize_entry(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_lowercase(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => return None,
    };
    (!text.is_empty()).then_some(text)
}
