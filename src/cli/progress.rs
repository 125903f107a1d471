//! Progress display for the fetch command
//!
//! The downloader reports [`ProgressEvent`]s on a channel; this module drains
//! that channel on a background task and renders a byte progress bar with
//! `indicatif`. When stderr is not a terminal, batch completions are printed
//! as plain lines instead.
//!
//! # Examples
//!
//! ```rust,no_run
//! use parallel_download::cli::ProgressDisplay;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (display, tx) = ProgressDisplay::spawn(true)?;
//! // hand `tx` to Downloader::with_progress, run the job, then:
//! drop(tx);
//! display.finish().await;
//! # Ok(())
//! # }
//! ```

use std::io::IsTerminal;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::app::{JobState, ProgressEvent};
use crate::constants::download;
use crate::errors::{AppError, Result};

/// How events are rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DisplayMode {
    /// Live progress bar on stderr
    Bar,
    /// One line per batch on stderr
    Text,
    /// Events are consumed and dropped
    Silent,
}

/// Background renderer for one download job
#[derive(Debug)]
pub struct ProgressDisplay {
    task: JoinHandle<()>,
}

impl ProgressDisplay {
    /// Start rendering, returning the sender to hand to the downloader
    ///
    /// With `enabled == false` events are still drained so the downloader
    /// never blocks on a full channel.
    pub fn spawn(enabled: bool) -> Result<(Self, mpsc::Sender<ProgressEvent>)> {
        let mode = if !enabled {
            DisplayMode::Silent
        } else if std::io::stderr().is_terminal() {
            DisplayMode::Bar
        } else {
            DisplayMode::Text
        };

        let bar = match mode {
            DisplayMode::Bar => Some(Self::create_bar()?),
            _ => None,
        };

        let (tx, rx) = mpsc::channel(download::PROGRESS_CHANNEL_CAPACITY);
        let task = tokio::spawn(Self::run(rx, mode, bar));
        debug!("Progress display started in {:?} mode", mode);
        Ok((Self { task }, tx))
    }

    /// Wait for the channel to close and the display to settle
    pub async fn finish(self) {
        let _ = self.task.await;
    }

    fn create_bar() -> Result<ProgressBar> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {bytes_per_sec} ({eta}) {msg}",
                )
                .map_err(|e| AppError::generic(format!("Progress bar template error: {}", e)))?
                .progress_chars("##-"),
        );
        Ok(bar)
    }

    async fn run(
        mut rx: mpsc::Receiver<ProgressEvent>,
        mode: DisplayMode,
        bar: Option<ProgressBar>,
    ) {
        while let Some(event) = rx.recv().await {
            match mode {
                DisplayMode::Bar => {
                    if let Some(bar) = &bar {
                        Self::render_bar(bar, &event);
                    }
                }
                DisplayMode::Text => Self::render_text(&event),
                DisplayMode::Silent => {}
            }
        }

        if let Some(bar) = bar {
            if !bar.is_finished() {
                bar.abandon();
            }
        }
        debug!("Progress event channel closed");
    }

    fn render_bar(bar: &ProgressBar, event: &ProgressEvent) {
        match event {
            ProgressEvent::JobStarted {
                object,
                total_bytes,
            } => {
                bar.set_length(*total_bytes);
                bar.set_message(short_name(object));
            }
            ProgressEvent::BatchStarted { index, ranges, .. } => {
                bar.set_message(format!("batch {} ({} ranges)", index, ranges));
            }
            ProgressEvent::BatchCompleted { covered_bytes, .. } => {
                bar.set_position(*covered_bytes);
            }
            ProgressEvent::StateChanged {
                state: JobState::Verifying,
            } => {
                bar.set_message("verifying");
            }
            ProgressEvent::StateChanged { .. } => {}
            ProgressEvent::Finished { .. } => {
                bar.finish_with_message("done");
            }
            ProgressEvent::Failed { kind, .. } => {
                bar.abandon_with_message(format!("failed ({})", kind));
            }
        }
    }

    fn render_text(event: &ProgressEvent) {
        match event {
            ProgressEvent::JobStarted {
                object,
                total_bytes,
            } => eprintln!("Downloading {} ({} bytes)", object, total_bytes),
            ProgressEvent::BatchCompleted {
                index,
                covered_bytes,
                total_bytes,
                ..
            } => {
                let percent = if *total_bytes == 0 {
                    100.0
                } else {
                    *covered_bytes as f64 / *total_bytes as f64 * 100.0
                };
                eprintln!(
                    "Batch {}: {}/{} bytes ({:.1}%)",
                    index, covered_bytes, total_bytes, percent
                );
            }
            ProgressEvent::StateChanged {
                state: JobState::Verifying,
            } => eprintln!("Verifying checksum..."),
            _ => {}
        }
    }
}

/// Last path segment of an object URL, for the progress message
fn short_name(object: &str) -> String {
    object
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or(object)
        .to_string()
}
