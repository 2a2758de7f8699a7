//! Profile-based gallery export.
//!
//! An export is a self-contained directory
//! `<folder>/exports/<slug>_<profile>_<timestamp>/` holding resized image
//! variants under `images/`, the manifest at `data/gallery.json` (each
//! record carrying a `srcset` and, when the profile asks for it, a
//! `color_palette`) and a `preview.html`. Optionally the directory is
//! packed into `<name>.zip` and removed.
//!
//! Image work runs on the blocking pool, bounded by a semaphore. Nothing
//! after the image stage starts until every image task has finished.

use crate::cancel::CancellationToken;
use crate::config::{ExportConfig, ExportProfile, ExportSettings, ImageSize, PathsConfig};
use crate::document::GalleryDocument;
use crate::error::{GalleryError, Result};
use crate::metadata::{atomic_write_bytes, atomic_write_json};
use crate::naming::slugify;
use futures::future::join_all;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GenericImageView, ImageEncoder};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Side length images are reduced to before palette extraction.
const PALETTE_SAMPLE_SIZE: u32 = 64;

/// Options for one export run.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub profile: String,
    /// Directory the export is created in; defaults to `<folder>/exports`.
    pub output_dir: Option<PathBuf>,
    /// Pack the export into a ZIP archive and remove the directory.
    pub zip: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            profile: ExportConfig::DEFAULT_PROFILE.to_string(),
            output_dir: None,
            zip: false,
        }
    }
}

/// Variants and palette produced for one image.
#[derive(Debug, Clone, Default, PartialEq)]
struct ExportedImage {
    srcset: BTreeMap<String, String>,
    color_palette: Option<Vec<String>>,
}

pub struct ExportManager {
    max_workers: usize,
    cancel: CancellationToken,
}

impl ExportManager {
    pub fn new(settings: &ExportSettings) -> Self {
        Self {
            max_workers: settings.max_workers.max(1),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Export the gallery whose images live in `source`.
    ///
    /// Returns the export directory, or the archive path when zipping. If
    /// any image fails, the partial export is removed and the error lists
    /// every problematic `src`.
    pub async fn export_gallery(
        &self,
        document: &GalleryDocument,
        source: &Path,
        options: &ExportOptions,
    ) -> Result<PathBuf> {
        let profile = ExportProfile::builtin(&options.profile)?;
        let slug = document
            .meta
            .gallery_slug
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| slugify(&document.meta.gallery_title));
        let timestamp = chrono::Local::now().format(PathsConfig::BACKUP_TIMESTAMP_FORMAT);
        let parent = options
            .output_dir
            .clone()
            .unwrap_or_else(|| source.join(PathsConfig::EXPORT_DIR_NAME));
        let output = parent.join(format!("{}_{}_{}", slug, profile.name, timestamp));

        let images_dir = output.join("images");
        fs::create_dir_all(&images_dir).map_err(|e| GalleryError::io_with_path(e, &images_dir))?;
        let data_dir = output.join("data");
        fs::create_dir_all(&data_dir).map_err(|e| GalleryError::io_with_path(e, &data_dir))?;

        info!(
            "Exporting {} images from {} with profile '{}'",
            document.len(),
            source.display(),
            profile.name
        );

        let exported = match self.export_images(document, source, &images_dir, &profile).await {
            Ok(exported) => exported,
            Err(e) => {
                if let Err(cleanup) = fs::remove_dir_all(&output) {
                    warn!("Failed to remove partial export {}: {}", output.display(), cleanup);
                }
                return Err(e);
            }
        };

        let manifest = export_manifest(document, &exported)?;
        atomic_write_json(&data_dir.join("gallery.json"), &manifest)?;
        atomic_write_bytes(&output.join("preview.html"), preview_html(&manifest).as_bytes())?;

        if !options.zip {
            info!("Export written to {}", output.display());
            return Ok(output);
        }

        let dir = output.clone();
        let archive = tokio::task::spawn_blocking(move || zip_directory(&dir))
            .await
            .map_err(|e| GalleryError::Other(format!("Archive task failed: {}", e)))??;
        fs::remove_dir_all(&output).map_err(|e| GalleryError::io_with_path(e, &output))?;
        info!("Export archived to {}", archive.display());
        Ok(archive)
    }

    /// Produce every image's variants, waiting for all tasks to finish.
    async fn export_images(
        &self,
        document: &GalleryDocument,
        source: &Path,
        images_dir: &Path,
        profile: &ExportProfile,
    ) -> Result<HashMap<String, ExportedImage>> {
        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        let sizes = Arc::new(profile.image_sizes.clone());
        let quality = profile.quality;
        let want_palette = profile.requires("color_palette");

        let tasks = document.images.iter().map(|record| {
            let semaphore = Arc::clone(&semaphore);
            let sizes = Arc::clone(&sizes);
            let src = record.src.clone();
            let src_path = source.join(&record.src);
            let images_dir = images_dir.to_path_buf();
            let palette = want_palette && !record.extra.contains_key("color_palette");
            let cancel = self.cancel.clone();

            async move {
                let result = match semaphore.acquire_owned().await {
                    Err(e) => Err(GalleryError::Other(format!("Export pool closed: {}", e))),
                    Ok(_permit) if cancel.is_cancelled() => Err(GalleryError::Cancelled),
                    Ok(_permit) => tokio::task::spawn_blocking(move || {
                        export_image(&src_path, &images_dir, &sizes, quality, palette)
                    })
                    .await
                    .unwrap_or_else(|e| Err(GalleryError::Other(format!("Export task failed: {}", e)))),
                };
                (src, result)
            }
        });

        let results = join_all(tasks).await;
        self.cancel.check()?;

        let mut exported = HashMap::new();
        let mut problematic = Vec::new();
        for (src, result) in results {
            match result {
                Ok(image) => {
                    exported.insert(src, image);
                }
                Err(e) => {
                    warn!("Failed to export {}: {}", src, e);
                    problematic.push(src);
                }
            }
        }

        if !problematic.is_empty() {
            return Err(GalleryError::Export {
                message: format!("Failed to process {} files", problematic.len()),
                problematic_files: problematic,
            });
        }
        Ok(exported)
    }
}

fn export_image(
    src_path: &Path,
    images_dir: &Path,
    sizes: &[ImageSize],
    quality: u8,
    palette: bool,
) -> Result<ExportedImage> {
    let file_name = src_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| GalleryError::FileNotFound(src_path.to_path_buf()))?;
    let stem = src_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.clone());
    let extension = src_path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_else(|| "jpg".to_string());

    let image = image::open(src_path).map_err(|e| GalleryError::image(e, src_path))?;
    let mut exported = ExportedImage::default();

    for size in sizes {
        match size.dimensions {
            None => {
                let dest = images_dir.join(&file_name);
                fs::copy(src_path, &dest).map_err(|e| GalleryError::io_with_path(e, &dest))?;
                exported
                    .srcset
                    .insert(size.name.clone(), format!("images/{}", file_name));
            }
            Some((width, height)) => {
                let name = format!("{}_{}.{}", stem, size.name, extension);
                let dest = images_dir.join(&name);
                let resized = fit_within(&image, width, height);
                save_variant(&resized, &dest, quality)?;
                exported.srcset.insert(size.name.clone(), format!("images/{}", name));
            }
        }
    }

    if palette {
        exported.color_palette = Some(dominant_colors(&image, ExportConfig::PALETTE_COLORS));
    }
    debug!("Exported {} ({} variants)", file_name, exported.srcset.len());
    Ok(exported)
}

/// Scale down to fit within `width` x `height`, keeping the aspect ratio.
/// Images that already fit are left as they are.
fn fit_within(image: &DynamicImage, width: u32, height: u32) -> DynamicImage {
    let (w, h) = image.dimensions();
    if w <= width && h <= height {
        image.clone()
    } else {
        image.thumbnail(width, height)
    }
}

fn save_variant(image: &DynamicImage, dest: &Path, quality: u8) -> Result<()> {
    let is_jpeg = dest
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("jpg") || e.eq_ignore_ascii_case("jpeg"));
    if !is_jpeg {
        return image.save(dest).map_err(|e| GalleryError::image(e, dest));
    }

    // JPEG has no alpha channel.
    let rgb = image.to_rgb8();
    let file = fs::File::create(dest).map_err(|e| GalleryError::io_with_path(e, dest))?;
    JpegEncoder::new_with_quality(BufWriter::new(file), quality)
        .write_image(&rgb, rgb.width(), rgb.height(), image::ExtendedColorType::Rgb8)
        .map_err(|e| GalleryError::image(e, dest))
}

/// The `count` most common colors as `#rrggbb`, most common first.
///
/// Colors are bucketed at 5 bits per channel on a small thumbnail, and each
/// bucket reports the mean of the pixels in it.
fn dominant_colors(image: &DynamicImage, count: usize) -> Vec<String> {
    let sample = fit_within(image, PALETTE_SAMPLE_SIZE, PALETTE_SAMPLE_SIZE).to_rgb8();
    let mut buckets: HashMap<(u8, u8, u8), (u64, [u64; 3])> = HashMap::new();
    for pixel in sample.pixels() {
        let [r, g, b] = pixel.0;
        let entry = buckets.entry((r >> 3, g >> 3, b >> 3)).or_insert((0, [0; 3]));
        entry.0 += 1;
        entry.1[0] += u64::from(r);
        entry.1[1] += u64::from(g);
        entry.1[2] += u64::from(b);
    }

    let mut ranked: Vec<_> = buckets.into_iter().collect();
    ranked.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then(a.0.cmp(&b.0)));
    ranked
        .into_iter()
        .take(count)
        .map(|(_, (n, sums))| {
            format!(
                "#{:02x}{:02x}{:02x}",
                sums[0] / n,
                sums[1] / n,
                sums[2] / n
            )
        })
        .collect()
}

/// The gallery as written into the export, with per-image `srcset` and
/// `color_palette`.
fn export_manifest(document: &GalleryDocument, exported: &HashMap<String, ExportedImage>) -> Result<Value> {
    let mut manifest = serde_json::to_value(document)?;
    if let Some(images) = manifest.get_mut("images").and_then(Value::as_array_mut) {
        for image in images {
            let Some(record) = image.as_object_mut() else {
                continue;
            };
            let Some(produced) = record
                .get("src")
                .and_then(Value::as_str)
                .and_then(|src| exported.get(src))
            else {
                continue;
            };
            record.insert("srcset".to_string(), json!(produced.srcset));
            if let Some(palette) = &produced.color_palette {
                record.insert("color_palette".to_string(), json!(palette));
            }
        }
    }
    Ok(manifest)
}

fn preview_html(manifest: &Value) -> String {
    let title = escape_html(
        manifest["meta"]["gallery_title"]
            .as_str()
            .unwrap_or_default(),
    );

    let mut items = String::new();
    for image in manifest["images"].as_array().into_iter().flatten() {
        let src = image["srcset"]["md"]
            .as_str()
            .or_else(|| image["srcset"]["original"].as_str())
            .or_else(|| image["src"].as_str())
            .unwrap_or_default();
        let headline = image["headline"]
            .as_str()
            .filter(|h| !h.is_empty())
            .unwrap_or("Henna Design");
        let swatches: String = image["color_palette"]
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
            .map(|color| {
                format!(
                    r#"<div class="color-swatch" style="background-color: {};"></div>"#,
                    escape_html(color)
                )
            })
            .collect();
        items.push_str(&format!(
            r#"
    <div class="gallery-item">
      <img src="{}" alt="{}">
      <h3>{}</h3>
      <div class="color-palette">{}</div>
    </div>"#,
            escape_html(src),
            escape_html(image["alt_text"].as_str().unwrap_or_default()),
            escape_html(headline),
            swatches
        ));
    }

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>{title} Preview</title>
  <style>
    body {{ font-family: sans-serif; margin: 20px; }}
    .gallery {{ display: grid; grid-template-columns: repeat(auto-fill, minmax(300px, 1fr)); gap: 20px; }}
    .gallery-item {{ border: 1px solid #ddd; padding: 10px; border-radius: 5px; }}
    .gallery-item img {{ max-width: 100%; height: auto; }}
    .color-palette {{ display: flex; margin-top: 10px; }}
    .color-swatch {{ width: 30px; height: 30px; margin-right: 5px; }}
  </style>
</head>
<body>
  <h1>{title}</h1>
  <div class="gallery">{items}
  </div>
</body>
</html>
"#
    )
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Pack `dir` into `<dir>.zip`, entries prefixed with the directory name.
fn zip_directory(dir: &Path) -> Result<PathBuf> {
    let base = dir.parent().unwrap_or(dir);
    let archive_path = dir.with_extension("zip");
    let file = fs::File::create(&archive_path).map_err(|e| GalleryError::io_with_path(e, &archive_path))?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        let path = entry.path();
        let name = path
            .strip_prefix(base)
            .map_err(|e| GalleryError::Other(e.to_string()))?
            .to_string_lossy()
            .replace('\\', "/");
        if entry.file_type().is_dir() {
            zip.add_directory(name, options)?;
        } else {
            zip.start_file(name, options)?;
            let mut source = fs::File::open(path).map_err(|e| GalleryError::io_with_path(e, path))?;
            io::copy(&mut source, &mut zip).map_err(|e| GalleryError::io_with_path(e, path))?;
        }
    }
    zip.finish()?;
    Ok(archive_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::ImageRecord;
    use tempfile::TempDir;

    fn manager() -> ExportManager {
        ExportManager::new(&ExportSettings::default())
    }

    fn gallery(temp: &TempDir, srcs: &[&str]) -> (PathBuf, GalleryDocument) {
        let folder = temp.path().join("Bridal");
        fs::create_dir_all(&folder).unwrap();
        let mut doc = GalleryDocument::new("Bridal <Henna>");
        for (i, src) in srcs.iter().enumerate() {
            image::RgbImage::from_pixel(32, 16, image::Rgb([200, (i * 40) as u8, 10]))
                .save(folder.join(src))
                .unwrap();
            let mut record = ImageRecord::new(*src);
            record.alt_text = format!("alt {}", i);
            doc.images.push(record);
        }
        doc.renumber();
        (folder, doc)
    }

    #[tokio::test]
    async fn test_export_directory_layout() {
        let temp = TempDir::new().unwrap();
        let (folder, doc) = gallery(&temp, &["a.png", "b.png"]);

        let out = manager()
            .export_gallery(&doc, &folder, &ExportOptions::default())
            .await
            .unwrap();

        assert!(out.starts_with(folder.join("exports")));
        let name = out.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("bridal-henna_web_ready_"));
        assert!(out.join("images/a.png").exists());
        assert!(out.join("images/a_thumb.png").exists());
        assert!(out.join("preview.html").exists());

        let manifest: Value =
            serde_json::from_slice(&fs::read(out.join("data/gallery.json")).unwrap()).unwrap();
        let first = &manifest["images"][0];
        assert_eq!(first["srcset"]["original"], "images/a.png");
        assert_eq!(first["srcset"]["md"], "images/a_md.png");
        assert_eq!(first["color_palette"].as_array().unwrap().len(), 1);

        let html = fs::read_to_string(out.join("preview.html")).unwrap();
        assert!(html.contains("<h1>Bridal &lt;Henna&gt;</h1>"));
        assert!(html.contains(r#"<img src="images/b_md.png" alt="alt 1">"#));
    }

    #[tokio::test]
    async fn test_missing_image_fails_whole_export() {
        let temp = TempDir::new().unwrap();
        let (folder, mut doc) = gallery(&temp, &["a.png"]);
        doc.images.push(ImageRecord::new("gone.png"));

        let err = manager()
            .export_gallery(&doc, &folder, &ExportOptions::default())
            .await
            .unwrap_err();

        match err {
            GalleryError::Export { problematic_files, .. } => {
                assert_eq!(problematic_files, vec!["gone.png".to_string()])
            }
            other => panic!("unexpected error: {other:?}"),
        }
        let leftovers = fs::read_dir(folder.join("exports")).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_zip_export_removes_directory() {
        let temp = TempDir::new().unwrap();
        let (folder, doc) = gallery(&temp, &["a.png"]);
        let options = ExportOptions {
            profile: "social_media".into(),
            output_dir: Some(temp.path().join("out")),
            zip: true,
        };

        let archive = manager().export_gallery(&doc, &folder, &options).await.unwrap();

        assert_eq!(archive.extension().unwrap(), "zip");
        assert!(!archive.with_extension("").exists());
        let mut zip = zip::ZipArchive::new(fs::File::open(&archive).unwrap()).unwrap();
        let prefix = archive.file_stem().unwrap().to_string_lossy().into_owned();
        assert!(zip.by_name(&format!("{}/data/gallery.json", prefix)).is_ok());
        assert!(zip.by_name(&format!("{}/images/a_square.png", prefix)).is_ok());
    }

    #[tokio::test]
    async fn test_unknown_profile() {
        let temp = TempDir::new().unwrap();
        let (folder, doc) = gallery(&temp, &[]);
        let options = ExportOptions {
            profile: "print".into(),
            ..Default::default()
        };
        let err = manager().export_gallery(&doc, &folder, &options).await.unwrap_err();
        assert!(matches!(err, GalleryError::UnknownProfile(name) if name == "print"));
    }

    #[test]
    fn test_dominant_colors() {
        let mut img = image::RgbImage::from_pixel(10, 10, image::Rgb([255, 0, 0]));
        for x in 0..3 {
            img.put_pixel(x, 0, image::Rgb([0, 0, 255]));
        }
        let colors = dominant_colors(&DynamicImage::ImageRgb8(img), 3);
        assert_eq!(colors, vec!["#ff0000", "#0000ff"]);
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html(r#"<a href="x">'&'</a>"#), "&lt;a href=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/a&gt;");
    }
}
