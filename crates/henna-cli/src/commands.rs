//! Subcommand handlers.
//!
//! Each handler returns `Ok(true)` when everything it touched ended up in a
//! good state, `Ok(false)` when some item failed, and `Err` when the command
//! could not run at all.

use crate::prompt::TerminalConfirm;
use anyhow::{Context as _, Result};
use henna_core::{
    CancellationToken, Confirm, ExportOptions, FolderSummary, GalleryApi, GalleryError,
    GalleryHealth, MigrationOutcome, MigrationReport, ProgressCallback,
};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Options shared by every subcommand.
pub struct Context {
    pub root: PathBuf,
    pub config: Option<PathBuf>,
    pub json: bool,
}

impl Context {
    fn api(&self, offline: bool, cancel: CancellationToken) -> Result<GalleryApi> {
        let mut builder = GalleryApi::builder(&self.root)
            .offline(offline)
            .cancellation(cancel);
        if let Some(config) = &self.config {
            builder = builder.settings_file(config);
        }
        builder
            .build()
            .with_context(|| format!("Cannot open gallery root {}", self.root.display()))
    }

    fn target(&self, target: Option<PathBuf>) -> PathBuf {
        target.unwrap_or_else(|| self.root.clone())
    }
}

/// Cancel `token` on the first Ctrl-C.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; finishing the current image");
            token.cancel();
        }
    });
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn describe_outcome(report: &MigrationReport) -> String {
    let mut text = match &report.outcome {
        MigrationOutcome::AlreadyCurrent => "already current".to_string(),
        MigrationOutcome::Repaired => "repaired".to_string(),
        MigrationOutcome::Migrated => match report.format {
            Some(format) => format!("migrated from {}", format),
            None => "migrated".to_string(),
        },
        MigrationOutcome::Declined => "skipped".to_string(),
        MigrationOutcome::Failed { stage, message } => {
            format!("FAILED while {}: {}", stage, message)
        }
    };
    if !report.dropped.is_empty() {
        text.push_str(&format!(" ({} missing images dropped)", report.dropped.len()));
    }
    if let Some(backup) = &report.backup_path {
        text.push_str(&format!(" [backup: {}]", backup.display()));
    }
    text
}

pub fn migrate(ctx: &Context, target: Option<PathBuf>, yes: bool) -> Result<bool> {
    let api = ctx.api(true, CancellationToken::new())?;
    let target = ctx.target(target);
    let confirm: Option<&dyn Confirm> = if yes { None } else { Some(&TerminalConfirm) };

    let reports = api.migrate(&target, confirm);
    let success = reports
        .iter()
        .all(|r| !matches!(r.outcome, MigrationOutcome::Failed { .. }));

    if ctx.json {
        print_json(&reports)?;
        return Ok(success);
    }

    for report in &reports {
        println!("{}: {}", report.path.display(), describe_outcome(report));
        for violation in &report.errors {
            println!("    {}", violation);
        }
    }
    if reports.is_empty() {
        println!("No manifests found under {}", target.display());
    }
    Ok(success)
}

pub fn validate(ctx: &Context, file: &Path) -> Result<bool> {
    let api = ctx.api(true, CancellationToken::new())?;
    let errors = api.validate_file(file)?;

    if ctx.json {
        print_json(&json!({
            "path": file,
            "is_valid": errors.is_empty(),
            "errors": errors,
        }))?;
    } else if errors.is_empty() {
        println!("{}: valid", file.display());
    } else {
        println!("{}: {} schema violation(s)", file.display(), errors.len());
        for violation in &errors {
            println!("    {}", violation);
        }
    }
    Ok(errors.is_empty())
}

fn describe_health(health: &GalleryHealth) -> String {
    match (health.is_valid, health.needs_migration) {
        (true, false) => "ok".to_string(),
        (true, true) => format!("valid, {} format needs migration", health.format),
        (false, _) => format!(
            "{} format, {} schema violation(s)",
            health.format,
            health.errors.len()
        ),
    }
}

pub fn health(ctx: &Context, target: Option<PathBuf>) -> Result<bool> {
    let api = ctx.api(true, CancellationToken::new())?;
    let reports = api.health(&ctx.target(target))?;
    let healthy = reports.iter().all(|h| !h.needs_migration);

    if ctx.json {
        print_json(&reports)?;
        return Ok(healthy);
    }

    for health in &reports {
        println!("{}: {}", health.path.display(), describe_health(health));
        for violation in &health.errors {
            println!("    {}", violation);
        }
    }
    Ok(healthy)
}

fn describe_summary(summary: &FolderSummary) -> String {
    match &summary.error {
        Some(message) => format!("FAILED: {}", message),
        None => format!(
            "{} new, {} skipped, {} repaired, {} failed, {} dropped",
            summary.new_images, summary.skipped, summary.repaired, summary.failed, summary.dropped
        ),
    }
}

fn progress_logger() -> ProgressCallback {
    Arc::new(|path: &Path, done: usize, total: usize| {
        info!("[{}/{}] {}", done, total, path.display());
    })
}

pub async fn process(ctx: &Context, folder: Option<PathBuf>, offline: bool) -> Result<bool> {
    let cancel = CancellationToken::new();
    let api = ctx.api(offline, cancel.clone())?;
    if !api.has_label_extraction() {
        anyhow::bail!(
            "No vision API key configured; set HENNA_VISION_API_KEY or pass --offline"
        );
    }
    cancel_on_ctrl_c(cancel);

    let result = match folder {
        Some(folder) => api
            .process_folder(&folder, Some(progress_logger()))
            .await
            .map(|summary| vec![summary]),
        None => api.process_all(Some(progress_logger())).await,
    };

    let summaries = match result {
        Ok(summaries) => summaries,
        Err(GalleryError::Cancelled) => {
            warn!("Processing cancelled; finished images were saved");
            return Ok(false);
        }
        Err(e) => return Err(e.into()),
    };

    let success = summaries
        .iter()
        .all(|s| s.error.is_none() && s.failed == 0);
    if ctx.json {
        print_json(&summaries)?;
    } else {
        for summary in &summaries {
            println!("{}: {}", summary.folder.display(), describe_summary(summary));
        }
    }
    Ok(success)
}

pub async fn export(
    ctx: &Context,
    folder: &Path,
    profile: String,
    output: Option<PathBuf>,
    zip: bool,
) -> Result<bool> {
    let cancel = CancellationToken::new();
    let api = ctx.api(true, cancel.clone())?;
    cancel_on_ctrl_c(cancel);

    let options = ExportOptions {
        profile,
        output_dir: output,
        zip,
    };
    match api.export(folder, &options).await {
        Ok(path) => {
            if ctx.json {
                print_json(&json!({ "path": path }))?;
            } else {
                println!("Exported to {}", path.display());
            }
            Ok(true)
        }
        Err(GalleryError::Export {
            message,
            problematic_files,
        }) => {
            error!("Export failed: {}", message);
            for src in &problematic_files {
                println!("    {}", src);
            }
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn watch(ctx: &Context, offline: bool) -> Result<bool> {
    let api = ctx.api(offline, CancellationToken::new())?;
    if !api.has_label_extraction() {
        anyhow::bail!(
            "No vision API key configured; set HENNA_VISION_API_KEY or pass --offline"
        );
    }

    let (tx, mut rx) = mpsc::unbounded_channel::<PathBuf>();
    let watcher = api.watch(Box::new(move |folder| {
        let _ = tx.send(folder);
    }))?;

    info!("Press Ctrl-C to stop watching");
    loop {
        tokio::select! {
            Some(folder) = rx.recv() => {
                match api.process_folder(&folder, None).await {
                    Ok(summary) => info!("{}: {}", folder.display(), describe_summary(&summary)),
                    Err(e) => error!("Failed to process {}: {}", folder.display(), e),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received, exiting");
                break;
            }
        }
    }

    watcher.stop().await;
    Ok(true)
}

pub fn reorder(ctx: &Context, folder: &Path, from: usize, to: usize) -> Result<bool> {
    let api = ctx.api(true, CancellationToken::new())?;
    api.reorder(folder, from, to)?;
    info!("Moved image {} to position {} in {}", from, to, folder.display());
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use henna_core::{DetectedFormat, MigrationStage};

    fn report(outcome: MigrationOutcome) -> MigrationReport {
        MigrationReport {
            path: PathBuf::from("Bridal/Bridal.json"),
            outcome,
            format: Some(DetectedFormat::LegacyArray),
            backup_path: None,
            dropped: Vec::new(),
            errors: Vec::new(),
        }
    }

    #[test]
    fn test_describe_outcome() {
        let mut migrated = report(MigrationOutcome::Migrated);
        migrated.dropped = vec!["gone.jpg".to_string()];
        assert_eq!(
            describe_outcome(&migrated),
            "migrated from legacy-array (1 missing images dropped)"
        );

        let failed = report(MigrationOutcome::Failed {
            stage: MigrationStage::Validating,
            message: "2 schema violation(s)".to_string(),
        });
        assert_eq!(
            describe_outcome(&failed),
            "FAILED while validating: 2 schema violation(s)"
        );
    }
}
