//! Parallel Download CLI application
//!
//! Command-line interface for downloading large objects with concurrent
//! range requests and CRC32C verification.

use std::process;

use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

// Import CLI modules through the library (module is public but not re-exported)
use parallel_download::cli::{handle_checksum, handle_config, handle_fetch, Cli, Commands};
use parallel_download::constants::env;
use parallel_download::errors::{AppError, Result};

#[tokio::main]
async fn main() {
    // Initialize program
    let result = run().await;

    // Handle any errors that occurred
    if let Err(e) = result {
        eprintln!("Error: {}", e);
        report_details(&e);
        process::exit(1);
    }
}

/// Main application logic
async fn run() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize logging based on verbosity
    init_logging(&cli);

    info!("Parallel Download v{} starting", env!("CARGO_PKG_VERSION"));

    let config_path = cli.global.config.clone();

    // Execute the appropriate command
    match cli.command {
        Commands::Fetch(args) => {
            info!("Executing fetch command");
            handle_fetch(args, config_path).await
        }
        Commands::Checksum(args) => {
            info!("Executing checksum command");
            handle_checksum(args).await
        }
        Commands::Config(args) => {
            info!("Executing config command");
            handle_config(args, config_path).await
        }
    }
}

/// Print the error kind and the failing byte range, when known
fn report_details(e: &AppError) {
    eprintln!("  kind: {}", e.category());
    if let AppError::Download(download) = e {
        if let Some(range) = download.range() {
            eprintln!("  range: {}", range);
        }
    }
    if e.is_recoverable() {
        eprintln!("  The error may be transient; running the command again can succeed.");
    }
}

/// Initialize logging based on CLI verbosity settings
fn init_logging(cli: &Cli) {
    let log_level = cli.log_level();

    // An explicit filter in the environment wins over the verbosity flags
    let filter = EnvFilter::try_from_env(env::LOG).unwrap_or_else(|_| {
        EnvFilter::new(format!("parallel_download={}", log_level))
    });

    // Initialize subscriber
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_level(cli.global.very_verbose) // Show levels only in very verbose mode
        .init();

    if cli.global.very_verbose {
        info!("Very verbose logging enabled");
    } else if cli.global.verbose {
        info!("Verbose logging enabled");
    }
}
