//! Command-line argument parsing for the parallel downloader
//!
//! This module defines the CLI structure using clap derive macros: fetching
//! an object, checksumming a local file and managing the configuration file.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::app::Crc32c;
use crate::config::{AppConfig, PolicyKind};
use crate::constants::sizes::{GIB, KIB, MIB};

/// Parallel Download - fetch large objects with concurrent range requests
#[derive(Parser, Debug)]
#[command(
    name = "parallel_download",
    version,
    about = "Download large objects using concurrent HTTP range requests",
    long_about = "Downloads a remote object by splitting it into byte ranges, fetching them
in bounded parallel batches straight into their place in the destination
file, and verifying the result against the object's CRC32C checksum."
)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all subcommands
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Very verbose logging (debug level)
    #[arg(long, global = true)]
    pub very_verbose: bool,

    /// Quiet mode - suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download an object
    Fetch(FetchArgs),

    /// Compute the CRC32C of a local file
    Checksum(ChecksumArgs),

    /// Manage the configuration file
    Config(ConfigArgs),
}

/// Chunk policy as named on the command line
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyArg {
    /// Every range has the same size
    Fixed,
    /// Ranges start small and grow after every batch
    Incremental,
}

impl From<PolicyArg> for PolicyKind {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Fixed => PolicyKind::Fixed,
            PolicyArg::Incremental => PolicyKind::Incremental,
        }
    }
}

/// Arguments for the fetch command
#[derive(Args, Debug, Clone)]
pub struct FetchArgs {
    /// Object URL
    #[arg(value_name = "URL")]
    pub url: String,

    /// Destination file (defaults to the last URL path segment)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Maximum number of concurrent range requests
    #[arg(short, long)]
    pub parallelism: Option<usize>,

    /// Range size under the fixed policy (e.g. 50M)
    #[arg(long, value_parser = parse_size, value_name = "BYTES")]
    pub request_size: Option<u64>,

    /// Chunk policy
    #[arg(long, value_enum)]
    pub policy: Option<PolicyArg>,

    /// First range size under the incremental policy (e.g. 8M)
    #[arg(long, value_parser = parse_size, value_name = "BYTES")]
    pub initial_chunk_size: Option<u64>,

    /// Range size multiplier after each batch under the incremental policy
    #[arg(long)]
    pub growth_factor: Option<u64>,

    /// Expected CRC32C in hex, overriding the published checksum
    #[arg(long, value_name = "HEX")]
    pub expected_crc32c: Option<Crc32c>,

    /// Fail when no checksum is available instead of skipping verification
    #[arg(long)]
    pub require_checksum: bool,

    /// Disable the progress bar
    #[arg(long)]
    pub no_progress: bool,

    /// Print the download report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the checksum command
#[derive(Args, Debug, Clone)]
pub struct ChecksumArgs {
    /// File to checksum
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}

/// Arguments for configuration management
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write a default configuration file
    Init {
        /// Target path (defaults to the per-user config file)
        #[arg(value_name = "FILE")]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the logging level based on global arguments
    pub fn log_level(&self) -> tracing::Level {
        if self.global.quiet {
            tracing::Level::ERROR
        } else if self.global.very_verbose {
            tracing::Level::DEBUG
        } else if self.global.verbose {
            tracing::Level::INFO
        } else {
            tracing::Level::WARN
        }
    }
}

impl FetchArgs {
    /// Apply command line overrides on top of file configuration
    pub fn apply_to(&self, config: &mut AppConfig) {
        let downloader = &mut config.downloader;
        if let Some(parallelism) = self.parallelism {
            downloader.parallelism = parallelism;
        }
        if let Some(request_size) = self.request_size {
            downloader.request_size = request_size;
        }
        if let Some(policy) = self.policy {
            downloader.policy = policy.into();
        }
        if let Some(initial) = self.initial_chunk_size {
            downloader.initial_chunk_size = initial;
        }
        if let Some(growth_factor) = self.growth_factor {
            downloader.growth_factor = growth_factor;
        }
        if self.require_checksum {
            downloader.require_checksum = true;
        }
    }
}

/// Parse a byte count with an optional binary suffix (`K`, `M`, `G`)
pub fn parse_size(value: &str) -> Result<u64, String> {
    let trimmed = value.trim();
    let upper = trimmed.to_ascii_uppercase();
    let digits = upper
        .strip_suffix("IB")
        .or_else(|| upper.strip_suffix('B'))
        .unwrap_or(&upper);

    let (number, multiplier) = match digits.chars().last() {
        Some('K') => (&digits[..digits.len() - 1], KIB),
        Some('M') => (&digits[..digits.len() - 1], MIB),
        Some('G') => (&digits[..digits.len() - 1], GIB),
        _ => (digits, 1),
    };

    let number: u64 = number
        .trim()
        .parse()
        .map_err(|_| format!("Invalid size: {}", value))?;
    number
        .checked_mul(multiplier)
        .ok_or_else(|| format!("Size too large: {}", value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetch_args(extra: &[&str]) -> FetchArgs {
        let mut argv = vec!["parallel_download", "fetch", "https://example.com/a.bin"];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Fetch(args) => args,
            other => panic!("Expected fetch command, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("1024"), Ok(1024));
        assert_eq!(parse_size("4K"), Ok(4 * KIB));
        assert_eq!(parse_size("50M"), Ok(50 * MIB));
        assert_eq!(parse_size("8MiB"), Ok(8 * MIB));
        assert_eq!(parse_size("2g"), Ok(2 * GIB));
        assert_eq!(parse_size("16MB"), Ok(16 * MIB));
        assert!(parse_size("").is_err());
        assert!(parse_size("lots").is_err());
        assert!(parse_size("99999999999G").is_err());
    }

    #[test]
    fn test_fetch_overrides_config() {
        let args = fetch_args(&[
            "-p",
            "4",
            "--policy",
            "incremental",
            "--initial-chunk-size",
            "1M",
            "--expected-crc32c",
            "e3069283",
            "--require-checksum",
        ]);
        assert_eq!(args.expected_crc32c, Some(Crc32c::new(0xe306_9283)));

        let mut config = AppConfig::default();
        args.apply_to(&mut config);
        assert_eq!(config.downloader.parallelism, 4);
        assert_eq!(config.downloader.policy, PolicyKind::Incremental);
        assert_eq!(config.downloader.initial_chunk_size, MIB);
        assert!(config.downloader.require_checksum);
    }

    #[test]
    fn test_fetch_without_flags_keeps_config() {
        let args = fetch_args(&[]);
        let mut config = AppConfig::default();
        config.downloader.parallelism = 7;
        args.apply_to(&mut config);
        assert_eq!(config.downloader.parallelism, 7);
        assert!(!config.downloader.require_checksum);
    }

    #[test]
    fn test_invalid_checksum_rejected() {
        let result = Cli::try_parse_from([
            "parallel_download",
            "fetch",
            "https://example.com/a.bin",
            "--expected-crc32c",
            "not-hex",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_log_level() {
        let cli_quiet = Cli::try_parse_from(["parallel_download", "-q", "config", "show"]).unwrap();
        let cli_verbose =
            Cli::try_parse_from(["parallel_download", "checksum", "file.bin", "-v"]).unwrap();

        assert_eq!(cli_quiet.log_level(), tracing::Level::ERROR);
        assert_eq!(cli_verbose.log_level(), tracing::Level::INFO);
    }
}
