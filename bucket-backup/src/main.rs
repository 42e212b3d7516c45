//! Bucket Backup - Main entry point
//!
//! Runs one incremental backup of the configured source directory.

use anyhow::{Context, Result};
use bucket_backup::{
    config::{self, Config},
    executor::BackupRun,
    manifest::ManifestStore,
    notify::LogNotifier,
    storage::{FilesystemStore, ObjectStore},
    transfer::progress::format_bytes,
    utils,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, Default)]
enum Command {
    /// Run one backup (default)
    #[default]
    Run,

    /// Check that the bucket is reachable and list a few objects
    Check,

    /// Replace the manifest with its backup copy
    RestoreManifest,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Load `.env` and the config file
    let env_file = config::load_dotenv();
    let config = Config::from_optional_file(args.config.as_deref())?;

    // Initialize logging before environment overrides, so rejected values are reported
    let log_level = args
        .log_level
        .clone()
        .or_else(|| std::env::var("LOG_LEVEL").ok())
        .unwrap_or_else(|| config.log.level.clone());
    utils::logger::init(&log_level)?;

    match env_file {
        Some(path) => tracing::debug!("Loaded environment from {}", path.display()),
        None => tracing::debug!("No .env file found, using process environment only"),
    }
    let config = config.finish(|key| std::env::var(key).ok())?;

    tracing::info!("Starting bucket-backup v{}", env!("CARGO_PKG_VERSION"));

    match args.command.unwrap_or_default() {
        Command::Run => run(&config),
        Command::Check => check(&config),
        Command::RestoreManifest => restore_manifest(&config),
    }
}

fn open_store(config: &Config) -> Result<FilesystemStore> {
    FilesystemStore::new(&config.storage.bucket)
        .with_context(|| format!("cannot open bucket {}", config.storage.bucket.display()))
}

fn run(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let notifier = LogNotifier::new(config.notify.enabled);

    let report = BackupRun::new(config, &store, &notifier).execute()?;
    if !report.success() {
        tracing::error!("Backup finished with {} failures", report.stats.failed);
        std::process::exit(1);
    }
    Ok(())
}

fn check(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let prefix = &config.storage.prefix;

    let objects = store
        .list(prefix)
        .with_context(|| format!("cannot list objects under '{}'", prefix))?;

    println!(
        "Connected to {} store at {}: {} objects under '{}'",
        store.backend_name(),
        store.root().display(),
        objects.len(),
        prefix
    );
    for object in objects.iter().take(5) {
        match store.attributes(object.name()) {
            Ok(attrs) => println!("  {} ({})", object.name(), format_bytes(attrs.size)),
            Err(e) => println!("  {} (attributes unavailable: {})", object.name(), e),
        }
    }
    Ok(())
}

fn restore_manifest(config: &Config) -> Result<()> {
    let manifest_store = ManifestStore::new(&config.sync.state_path);
    if manifest_store.restore()? {
        println!("Manifest restored from {}", manifest_store.backup_path().display());
    } else {
        println!("No manifest backup at {}", manifest_store.backup_path().display());
    }
    Ok(())
}
