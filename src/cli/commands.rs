//! Command handlers for the parallel downloader CLI
//!
//! This module implements the command handlers that connect parsed CLI
//! arguments with the download pipeline.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};
use url::Url;

use crate::app::{
    shutdown_channel, DownloadReport, Downloader, HttpObjectStore, Verification, Verifier,
};
use crate::cli::{ChecksumArgs, ConfigAction, ConfigArgs, FetchArgs, ProgressDisplay};
use crate::config::AppConfig;
use crate::constants::files;
use crate::errors::{AppError, Result};

/// Handle the fetch command
///
/// Loads configuration, applies command line overrides, then downloads the
/// object into the destination with a progress display and Ctrl-C handling.
pub async fn handle_fetch(args: FetchArgs, config_path: Option<PathBuf>) -> Result<()> {
    let mut config = AppConfig::load(config_path).await?;
    args.apply_to(&mut config);
    let (downloader_config, client_config) = config.to_runtime_config();
    downloader_config.validate()?;

    let destination = match &args.output {
        Some(path) => path.clone(),
        None => default_destination(&args.url),
    };
    info!(
        "Fetching {} into {} with parallelism {} ({} policy)",
        args.url,
        destination.display(),
        downloader_config.parallelism,
        downloader_config.policy.name()
    );

    let store = HttpObjectStore::new(client_config)?;
    let (trigger, shutdown_rx) = shutdown_channel();
    let signal_task = trigger.listen_for_signals();

    let (display, progress_tx) = ProgressDisplay::spawn(!args.no_progress && !args.json)?;
    let downloader = Downloader::new(Arc::new(store), downloader_config)
        .with_progress(progress_tx)
        .with_shutdown(shutdown_rx);

    let result = async {
        let job = downloader.prepare(&args.url, &destination).await?;
        let job = match args.expected_crc32c {
            Some(expected) => job.with_expected_crc32c(Some(expected)),
            None => job,
        };
        downloader.run_job(job).await
    }
    .await;

    // Dropping the downloader closes the progress channel
    drop(downloader);
    display.finish().await;
    signal_task.abort();

    let report = result?;
    if args.json {
        let json = serde_json::to_string_pretty(&report)
            .map_err(|e| AppError::generic(format!("Failed to serialize report: {}", e)))?;
        println!("{}", json);
    } else {
        print_summary(&report);
    }
    Ok(())
}

/// Handle the checksum command
pub async fn handle_checksum(args: ChecksumArgs) -> Result<()> {
    let started = Instant::now();
    let crc32c = Verifier::default().checksum_file(&args.file).await?;
    let elapsed = started.elapsed();

    debug!("Checksummed {} in {:?}", args.file.display(), elapsed);
    println!("{}", args.file.display());
    println!("  crc32c (hex):    {}", crc32c.to_hex());
    println!("  crc32c (base64): {}", crc32c.to_base64());
    println!("  computed in:     {:.2?}", elapsed);
    Ok(())
}

/// Handle configuration management commands
pub async fn handle_config(args: ConfigArgs, config_path: Option<PathBuf>) -> Result<()> {
    match args.action {
        ConfigAction::Init { path, force } => {
            let written = AppConfig::initialize(path.or(config_path), force).await?;
            println!("📁 Created configuration file:");
            println!("   {}", written.display());
            println!("   You can customize settings by editing this file.");
        }
        ConfigAction::Show => {
            let source = match &config_path {
                Some(path) => Some(path.clone()),
                None => AppConfig::find_config_file(),
            };
            let config = AppConfig::load(config_path).await?;
            match source {
                Some(path) => println!("# Loaded from {}", path.display()),
                None => println!("# No configuration file found, showing defaults"),
            }
            print!("{}", config.to_toml_string()?);
        }
    }
    Ok(())
}

/// Destination file named after the last URL path segment
pub fn default_destination(object: &str) -> PathBuf {
    let name = match Url::parse(object) {
        Ok(url) => url
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
            .map(str::to_string),
        Err(_) => Path::new(object)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned()),
    };

    PathBuf::from(name.unwrap_or_else(|| files::FALLBACK_OUTPUT_NAME.to_string()))
}

fn print_summary(report: &DownloadReport) {
    println!("\n📊 Download Summary:");
    println!("  Object: {}", report.object);
    println!("  Saved to: {}", report.destination.display());
    println!("  Size: {} bytes", report.size);
    println!(
        "  Batches: {} ({} policy, parallelism {}, peak {})",
        report.batches, report.policy, report.parallelism, report.peak_parallelism
    );
    println!("  Transfer time: {:.2?}", report.transfer_duration);
    println!("  Verify time: {:.2?}", report.verify_duration);
    println!("  Throughput: {:.2} MiB/s", report.throughput_mib_s());
    match report.verification {
        Verification::Verified => println!("  CRC32C: {} ✅ verified", report.crc32c),
        Verification::Unverified => {
            println!("  CRC32C: {} ⚠️  not verified (no expected checksum)", report.crc32c)
        }
    }
}
