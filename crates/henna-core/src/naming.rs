//! Slugs and processed-image filenames.

use crate::config::GalleryConfig;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Characters that are neither word characters, whitespace nor hyphens.
static NON_SLUG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s-]").unwrap());

/// Runs of hyphens and whitespace.
static SEPARATOR_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[-\s]+").unwrap());

/// Convert text to a URL- and filesystem-safe slug.
///
/// # Examples
///
/// ```
/// use henna_core::naming::slugify;
///
/// assert_eq!(slugify("Bridal Henna!"), "bridal-henna");
/// assert_eq!(slugify("  Arabic -- Floral "), "arabic-floral");
/// ```
pub fn slugify(text: &str) -> String {
    let lowered = text.to_lowercase();
    let stripped = NON_SLUG.replace_all(&lowered, "");
    let collapsed = SEPARATOR_RUNS.replace_all(&stripped, "-");
    collapsed.trim_matches(|c| c == '-' || c == '_').to_string()
}

/// Capitalize the first letter of each whitespace-separated word and
/// lowercase the rest.
pub fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Filename for a newly processed image:
/// `<folder-slug>-<label1>-<label2>-<hash prefix><.ext>`.
pub fn processed_filename(folder_name: &str, labels: &[String], hash: &str, source: &Path) -> String {
    let mut parts = vec![slugify(folder_name)];
    parts.extend(
        labels
            .iter()
            .take(GalleryConfig::FILENAME_LABELS)
            .map(|label| slugify(label)),
    );
    parts.push(hash.chars().take(GalleryConfig::FILENAME_HASH_CHARS).collect());
    parts.retain(|part| !part.is_empty());

    let extension = source
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_default();

    format!("{}{}", parts.join("-"), extension)
}

/// Return `dir/name`, or `dir/<stem>-<n><.ext>` for the first `n` that is
/// free if the name is already taken.
pub fn unique_path(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }

    let as_path = Path::new(name);
    let stem = as_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string());
    let extension = as_path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    (1..)
        .map(|n| dir.join(format!("{}-{}{}", stem, n, extension)))
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}
