//! Shutdown signalling.
//!
//! The server carries two [`ShutdownSignal`]s: `graceful` tells both
//! listeners to stop accepting and drain, `force` tells whatever is still
//! running to give up.
//!
//! ```rust
//! use janus_server::ShutdownSignal;
//!
//! let shutdown = ShutdownSignal::new();
//! let other = shutdown.clone();
//!
//! shutdown.trigger();
//! assert!(other.is_shutdown());
//! ```

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::lifecycle::StopHandle;

/// A one-shot signal that can be triggered and awaited from many tasks.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    triggered: Arc<AtomicBool>,
    sender: broadcast::Sender<()>,
}

impl ShutdownSignal {
    /// Creates an untriggered signal.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1);
        Self {
            triggered: Arc::new(AtomicBool::new(false)),
            sender,
        }
    }

    /// Triggers the signal. Later calls do nothing.
    pub fn trigger(&self) {
        if self
            .triggered
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            // No receivers is fine.
            let _ = self.sender.send(());
        }
    }

    /// Returns `true` once the signal has been triggered.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Completes when the signal is triggered, immediately if it already was.
    pub fn recv(&self) -> impl Future<Output = ()> + Send + 'static {
        // Subscribe before reading the flag so a trigger in between is seen.
        let mut receiver = self.sender.subscribe();
        let triggered = Arc::clone(&self.triggered);
        async move {
            if triggered.load(Ordering::SeqCst) {
                return;
            }
            let _ = receiver.recv().await;
        }
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Stops the server when the process receives SIGTERM or SIGINT.
///
/// Returns the watcher task; dropping the handle leaves it running.
pub fn shutdown_on_signal(handle: StopHandle) -> JoinHandle<()> {
    tokio::spawn(async move {
        if wait_for_os_signal().await {
            handle.stop();
        }
    })
}

/// Returns `false` if no handler could be registered.
async fn wait_for_os_signal() -> bool {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigterm, mut sigint) = match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(term), Ok(int)) => (term, int),
            (Err(e), _) | (_, Err(e)) => {
                tracing::error!(error = %e, "failed to register signal handlers");
                return false;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => tracing::info!("received SIGTERM, initiating graceful shutdown"),
            _ = sigint.recv() => tracing::info!("received SIGINT, initiating graceful shutdown"),
        }
        true
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to wait for Ctrl+C");
            return false;
        }
        tracing::info!("received Ctrl+C, initiating graceful shutdown");
        true
    }
}
