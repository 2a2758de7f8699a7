//! henna-gallery - command-line front end for henna-core.
//!
//! Migrates and validates gallery manifests, processes new images, exports
//! galleries and watches a gallery root for new files.

mod commands;
mod prompt;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "henna-gallery")]
#[command(about = "Curate henna gallery folders and their JSON manifests")]
#[command(version)]
struct Args {
    /// Gallery root directory (defaults to the current directory)
    #[arg(short, long, global = true)]
    root: Option<PathBuf>,

    /// Settings file (defaults to config.json in the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print results as JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Migrate a manifest, or every manifest under a directory, to the current schema
    Migrate {
        /// Manifest file or directory (defaults to the gallery root)
        target: Option<PathBuf>,

        /// Migrate legacy manifests without asking
        #[arg(short, long)]
        yes: bool,
    },

    /// Report schema violations in a manifest without changing it
    Validate {
        /// Manifest file
        file: PathBuf,
    },

    /// Report format and validity of manifests without changing them
    Health {
        /// Manifest file or directory (defaults to the gallery root)
        target: Option<PathBuf>,
    },

    /// Label, rename and list new images
    Process {
        /// Single gallery folder (defaults to every folder under the root)
        folder: Option<PathBuf>,

        /// Skip label extraction; new images get no keywords
        #[arg(long)]
        offline: bool,
    },

    /// Export a gallery folder with an export profile
    Export {
        /// Gallery folder
        folder: PathBuf,

        /// Export profile (web_ready or social_media)
        #[arg(short, long, default_value = "web_ready")]
        profile: String,

        /// Directory the export is created in (defaults to <folder>/exports)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Pack the export into a ZIP archive
        #[arg(long)]
        zip: bool,
    },

    /// Watch the gallery root and process folders that receive new images
    Watch {
        /// Skip label extraction; new images get no keywords
        #[arg(long)]
        offline: bool,
    },

    /// Move an image to a new position in a gallery
    Reorder {
        /// Gallery folder
        folder: PathBuf,

        /// Current zero-based position
        from: usize,

        /// New zero-based position
        to: usize,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let root = match args.root {
        Some(path) => path,
        None => std::env::current_dir()?,
    };
    debug!("Gallery root: {}", root.display());

    let ctx = commands::Context {
        root,
        config: args.config,
        json: args.json,
    };

    let success = match args.command {
        Command::Migrate { target, yes } => commands::migrate(&ctx, target, yes)?,
        Command::Validate { file } => commands::validate(&ctx, &file)?,
        Command::Health { target } => commands::health(&ctx, target)?,
        Command::Process { folder, offline } => commands::process(&ctx, folder, offline).await?,
        Command::Export {
            folder,
            profile,
            output,
            zip,
        } => commands::export(&ctx, &folder, profile, output, zip).await?,
        Command::Watch { offline } => commands::watch(&ctx, offline).await?,
        Command::Reorder { folder, from, to } => commands::reorder(&ctx, &folder, from, to)?,
    };

    Ok(if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
