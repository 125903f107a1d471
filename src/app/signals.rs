//! Signal handling for graceful shutdown
//!
//! A download is only stopped at a batch boundary: the downloader checks the
//! shutdown flag before dispatching each batch, so in-flight ranges always
//! finish and the partial file is left in a consistent state.

use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Sending side of the shutdown flag
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    /// Request shutdown
    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }

    /// New receiver observing this flag
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Watch for CTRL-C and SIGTERM and set the flag when one arrives
    ///
    /// Returns a handle to the background task that monitors for signals.
    pub fn listen_for_signals(&self) -> JoinHandle<()> {
        let tx = self.tx.clone();

        tokio::spawn(async move {
            let ctrl_c = async {
                if let Err(e) = signal::ctrl_c().await {
                    warn!("Failed to install Ctrl+C handler: {}", e);
                    std::future::pending::<()>().await;
                }
            };

            #[cfg(unix)]
            let terminate = async {
                match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(mut stream) => {
                        stream.recv().await;
                    }
                    Err(e) => {
                        warn!("Failed to install SIGTERM handler: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            };

            #[cfg(not(unix))]
            let terminate = std::future::pending::<()>();

            tokio::select! {
                _ = ctrl_c => {
                    info!("Received Ctrl+C, stopping after the current batch");
                },
                _ = terminate => {
                    info!("Received terminate signal, stopping after the current batch");
                },
            }

            let _ = tx.send(true);
        })
    }
}

/// Create a shutdown flag, initially unset
pub fn shutdown_channel() -> (ShutdownTrigger, watch::Receiver<bool>) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, rx)
}

/// Whether shutdown has been requested on `rx`
pub fn is_shutdown_requested(rx: &watch::Receiver<bool>) -> bool {
    *rx.borrow()
}
