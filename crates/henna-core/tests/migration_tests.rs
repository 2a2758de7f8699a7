//! Integration tests for manifest migration.
//!
//! Each test builds a gallery folder in a temporary directory, runs the
//! migrator over its manifest and inspects what ends up on disk.

use henna_core::{
    detect_format, DetectedFormat, GalleryDocument, MigrationOutcome, MigrationStage, Migrator,
    SchemaValidator,
};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Create `<temp>/<name>/` with empty image files and a manifest holding
/// `content`. Returns the manifest path.
fn create_gallery(temp: &TempDir, name: &str, content: &Value, files: &[&str]) -> PathBuf {
    let folder = temp.path().join(name);
    fs::create_dir_all(&folder).unwrap();
    for file in files {
        fs::write(folder.join(file), b"image bytes").unwrap();
    }
    let manifest = folder.join(format!("{}.json", name));
    fs::write(&manifest, serde_json::to_vec_pretty(content).unwrap()).unwrap();
    manifest
}

fn read_json(path: &Path) -> Value {
    serde_json::from_slice(&fs::read(path).unwrap()).unwrap()
}

fn orders(doc: &Value) -> Vec<u64> {
    doc["images"]
        .as_array()
        .unwrap()
        .iter()
        .map(|img| img["order"].as_u64().unwrap())
        .collect()
}

#[test]
fn test_wedding_legacy_object() {
    let temp = TempDir::new().unwrap();
    let content = json!({
        "title": "Wedding",
        "images": [{"url": "a.jpg", "tags": ["Bridal", "bridal"]}]
    });
    assert_eq!(detect_format(&content), DetectedFormat::LegacyObject);
    let manifest = create_gallery(&temp, "Wedding", &content, &["a.jpg"]);

    let report = Migrator::new().migrate_file(&manifest, None);

    assert!(report.success());
    assert_eq!(report.outcome, MigrationOutcome::Migrated);
    assert_eq!(report.format, Some(DetectedFormat::LegacyObject));

    let migrated = read_json(&manifest);
    let image = &migrated["images"][0];
    assert_eq!(image["keywords"], json!(["bridal"]));
    assert_eq!(image["src"], "a.jpg");
    assert_eq!(image["url"], "a.jpg");
    assert_eq!(image["tags"], json!(["bridal"]));
    assert_eq!(image["categories"], json!(["bridal"]));
    assert_eq!(migrated["meta"]["gallery_title"], "Wedding");
    assert_eq!(migrated["meta"]["gallery_slug"], "wedding");
}

#[test]
fn test_bare_array_takes_folder_name() {
    let temp = TempDir::new().unwrap();
    let content = json!([{"filename": "x.jpg"}]);
    assert_eq!(detect_format(&content), DetectedFormat::LegacyArray);
    let manifest = create_gallery(&temp, "Arabic Designs", &content, &["x.jpg"]);

    let report = Migrator::new().migrate_file(&manifest, None);
    assert!(report.success());

    let migrated = read_json(&manifest);
    assert_eq!(migrated["meta"]["gallery_title"], "Arabic Designs");
    assert_eq!(migrated["meta"]["gallery_slug"], "arabic-designs");
    let images = migrated["images"].as_array().unwrap();
    assert_eq!(images.len(), 1);
    assert_eq!(images[0]["src"], "x.jpg");
    assert_eq!(images[0]["order"], 0);
    assert_eq!(images[0]["total"], 1);
}

#[test]
fn test_dangling_record_is_dropped_and_total_recomputed() {
    let temp = TempDir::new().unwrap();
    let content = json!({
        "meta": {"gallery_title": "Hands"},
        "images": [
            {"src": "a.jpg", "order": 0, "total": 3},
            {"src": "missing.jpg", "order": 1, "total": 3},
            {"src": "c.jpg", "order": 2, "total": 3}
        ]
    });
    let manifest = create_gallery(&temp, "Hands", &content, &["a.jpg", "c.jpg"]);

    let report = Migrator::new().migrate_file(&manifest, None);

    assert_eq!(report.outcome, MigrationOutcome::Repaired);
    assert_eq!(report.dropped, vec!["missing.jpg".to_string()]);
    let migrated = read_json(&manifest);
    assert_eq!(orders(&migrated), vec![0, 1]);
    for image in migrated["images"].as_array().unwrap() {
        assert_eq!(image["total"], 2);
    }
}

#[test]
fn test_current_document_round_trip_leaves_bytes_untouched() {
    let temp = TempDir::new().unwrap();
    let manifest = create_gallery(
        &temp,
        "Feet",
        &json!([{"url": "a.jpg"}, {"url": "b.jpg"}]),
        &["a.jpg", "b.jpg"],
    );
    let migrator = Migrator::new();
    assert!(migrator.migrate_file(&manifest, None).success());
    let after_first = fs::read(&manifest).unwrap();

    let report = migrator.migrate_file(&manifest, None);

    assert_eq!(report.outcome, MigrationOutcome::AlreadyCurrent);
    assert!(report.backup_path.is_none());
    assert_eq!(fs::read(&manifest).unwrap(), after_first);
}

#[test]
fn test_contiguity_after_migration() {
    let temp = TempDir::new().unwrap();
    let content = json!({
        "title": "Mixed",
        "images": [
            {"url": "a.jpg", "sort_order": 7},
            {"filename": "b.jpg", "index": 3},
            {"src": "gone.jpg"},
            {"src": "c.jpg", "order": 12}
        ]
    });
    let manifest = create_gallery(&temp, "Mixed", &content, &["a.jpg", "b.jpg", "c.jpg"]);

    assert!(Migrator::new().migrate_file(&manifest, None).success());

    let migrated = read_json(&manifest);
    assert_eq!(orders(&migrated), vec![0, 1, 2]);
    let doc = GalleryDocument::load(&manifest).unwrap().unwrap();
    assert!(doc.images.iter().all(|img| img.total == 3 && img.order < img.total));
}

#[test]
fn test_no_partial_write_on_validation_failure() {
    let temp = TempDir::new().unwrap();
    let content = json!({
        "meta": {"gallery_title": 42},
        "images": [{"src": "a.jpg"}]
    });
    let manifest = create_gallery(&temp, "Broken", &content, &["a.jpg"]);
    let before = fs::read(&manifest).unwrap();

    let report = Migrator::new().migrate_file(&manifest, None);

    assert!(!report.success());
    match &report.outcome {
        MigrationOutcome::Failed { stage, .. } => assert_eq!(*stage, MigrationStage::Validating),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(report.errors.iter().any(|e| e.contains("gallery_title")));
    assert_eq!(fs::read(&manifest).unwrap(), before);
}

#[test]
fn test_backup_matches_original_bytes() {
    let temp = TempDir::new().unwrap();
    let manifest = create_gallery(&temp, "Bridal", &json!([{"url": "a.jpg"}]), &["a.jpg"]);
    let original = fs::read(&manifest).unwrap();

    let report = Migrator::new().migrate_file(&manifest, None);

    let backup = report.backup_path.expect("migration keeps a backup");
    assert_eq!(backup.parent().unwrap(), temp.path().join("Bridal/backups"));
    let name = backup.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("Bridal_v2backup_"));
    assert!(name.ends_with(".json"));
    assert_eq!(fs::read(&backup).unwrap(), original);
}

#[test]
fn test_missing_title_is_reported() {
    let errors = SchemaValidator::new().errors(&json!({"meta": {}, "images": []}));
    assert_eq!(errors, vec!["$.meta: 'gallery_title' is a required property"]);
}

#[test]
fn test_migrate_tree_reports_each_manifest() {
    let temp = TempDir::new().unwrap();
    create_gallery(&temp, "A", &json!([{"url": "a.jpg"}]), &["a.jpg"]);
    create_gallery(&temp, "B", &json!({"meta": {"gallery_title": "B"}, "images": []}), &[]);
    fs::write(temp.path().join("B/B.json"), b"{ broken").unwrap();

    let reports = Migrator::new().migrate_tree(temp.path(), None);

    assert_eq!(reports.len(), 2);
    assert!(reports[0].success());
    assert!(matches!(
        reports[1].outcome,
        MigrationOutcome::Failed {
            stage: MigrationStage::Detecting,
            ..
        }
    ));
}

#[test]
fn test_null_image_fields_are_migrated() {
    let temp = TempDir::new().unwrap();
    let content = json!({
        "title": "G",
        "images": [{"url": "a.jpg", "caption": null, "alt_text": null}]
    });
    let manifest = create_gallery(&temp, "G", &content, &["a.jpg"]);

    let report = Migrator::new().migrate_file(&manifest, None);

    assert_eq!(report.outcome, MigrationOutcome::Migrated);
    assert!(report.errors.is_empty());
    let image = &read_json(&manifest)["images"][0];
    assert_eq!(image["src"], "a.jpg");
    assert_eq!(image["caption"], "");
    assert_eq!(image["alt_text"], "");
}

#[test]
fn test_keyword_aliases_round_trip_unchanged() {
    let temp = TempDir::new().unwrap();
    let manifest = create_gallery(
        &temp,
        "Tagged",
        &json!([{"url": "a.jpg", "categories": ["Arabic"], "tags": ["Floral"]}]),
        &["a.jpg"],
    );
    assert!(Migrator::new().migrate_file(&manifest, None).success());
    let written = fs::read(&manifest).unwrap();
    let image = &read_json(&manifest)["images"][0];
    assert_eq!(image["tags"], json!(["arabic", "floral"]));
    assert_eq!(image["categories"], json!(["arabic", "floral"]));

    let report = Migrator::new().migrate_file(&manifest, None);

    assert_eq!(report.outcome, MigrationOutcome::AlreadyCurrent);
    assert_eq!(fs::read(&manifest).unwrap(), written);
}
