//! Progress events emitted while a job runs
//!
//! Events are a side channel: they are offered to a bounded `mpsc` channel
//! without waiting. A full, closed or missing receiver never affects the job;
//! the event is dropped instead.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::debug;

use super::job::JobState;
use crate::app::range::RangeDescriptor;

/// One observable step of a job
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// Metadata fetched, destination about to be prepared
    JobStarted {
        object: String,
        total_bytes: u64,
    },
    /// A batch was dispatched
    BatchStarted {
        index: usize,
        span: Option<RangeDescriptor>,
        ranges: usize,
        chunk_size: u64,
    },
    /// A batch joined successfully
    BatchCompleted {
        index: usize,
        bytes: u64,
        covered_bytes: u64,
        total_bytes: u64,
    },
    /// The job moved to another state
    StateChanged { state: JobState },
    /// The job finished successfully
    Finished { bytes: u64, throughput_bps: f64 },
    /// The job failed
    Failed { kind: &'static str, message: String },
}

/// Sending half used by the downloader
#[derive(Debug, Clone, Default)]
pub struct ProgressSink {
    tx: Option<mpsc::Sender<ProgressEvent>>,
}

impl ProgressSink {
    /// Sink forwarding to `tx`
    pub fn new(tx: mpsc::Sender<ProgressEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Sink discarding every event
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Offer an event to the receiver without blocking the job
    pub fn emit(&self, event: ProgressEvent) {
        let Some(tx) = &self.tx else {
            return;
        };
        if let Err(e) = tx.try_send(event) {
            match e {
                TrySendError::Full(_) => {
                    debug!("Progress channel full, skipping update");
                }
                TrySendError::Closed(_) => {
                    debug!("Progress channel closed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_events_are_forwarded() {
        let (tx, mut rx) = mpsc::channel(4);
        let sink = ProgressSink::new(tx);

        sink.emit(ProgressEvent::StateChanged {
            state: JobState::Downloading,
        });

        assert_eq!(
            rx.recv().await,
            Some(ProgressEvent::StateChanged {
                state: JobState::Downloading
            })
        );
    }

    #[tokio::test]
    async fn test_closed_receiver_is_ignored() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sink = ProgressSink::new(tx);
        sink.emit(ProgressEvent::Finished {
            bytes: 1,
            throughput_bps: 1.0,
        });

        ProgressSink::disabled().emit(ProgressEvent::Finished {
            bytes: 1,
            throughput_bps: 1.0,
        });
    }

    #[test]
    fn test_full_channel_drops_event() {
        let (tx, mut rx) = mpsc::channel(1);
        let sink = ProgressSink::new(tx);

        sink.emit(ProgressEvent::StateChanged {
            state: JobState::Initializing,
        });
        sink.emit(ProgressEvent::StateChanged {
            state: JobState::Downloading,
        });

        assert_eq!(
            rx.try_recv().ok(),
            Some(ProgressEvent::StateChanged {
                state: JobState::Initializing
            })
        );
        assert!(rx.try_recv().is_err());
    }
}
