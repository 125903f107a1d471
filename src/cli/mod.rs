//! Command-line interface components
//!
//! This module contains CLI-specific code for the parallel downloader,
//! including argument parsing, command handlers and progress display.

pub mod args;
pub mod commands;
pub mod progress;

pub use args::{
    parse_size, ChecksumArgs, Cli, Commands, ConfigAction, ConfigArgs, FetchArgs, GlobalArgs,
    PolicyArg,
};
pub use commands::{default_destination, handle_checksum, handle_config, handle_fetch};
pub use progress::ProgressDisplay;
