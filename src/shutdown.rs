//! Graceful shutdown handling.
//!
//! The coordinator fans a single shutdown signal out to the reconciliation
//! loop and the `serve` command. [`SignalHandler`] turns OS signals into
//! that shutdown.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

/// Cloneable shutdown flag that tasks can await.
#[derive(Debug, Clone)]
pub struct ShutdownCoordinator {
    trigger: Arc<watch::Sender<bool>>,
    state: watch::Receiver<bool>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        let (trigger, state) = watch::channel(false);
        Self {
            trigger: Arc::new(trigger),
            state,
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.state.borrow()
    }

    /// Initiate shutdown. Later calls are no-ops.
    pub fn shutdown(&self) {
        let started = self.trigger.send_if_modified(|stopping| !std::mem::replace(stopping, true));
        if started {
            info!("Initiating graceful shutdown");
        }
    }

    /// Resolves once shutdown has been initiated, immediately if it already
    /// was.
    pub async fn wait_for_shutdown(&self) {
        let mut state = self.state.clone();
        // The sender lives as long as any clone of this coordinator.
        let _ = state.wait_for(|stopping| *stopping).await;
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Signal handler for graceful shutdown.
pub struct SignalHandler {
    coordinator: ShutdownCoordinator,
}

impl SignalHandler {
    /// Create a new signal handler.
    pub fn new(coordinator: ShutdownCoordinator) -> Self {
        Self { coordinator }
    }

    /// Install signal handlers and wait for one to fire, or for shutdown to
    /// be initiated elsewhere.
    #[cfg(unix)]
    pub async fn run(self) {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(term), Ok(int)) => (term, int),
                (Err(e), _) | (_, Err(e)) => {
                    error!(error = %e, "Failed to install signal handlers");
                    return self.run_ctrl_c().await;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
            _ = self.coordinator.wait_for_shutdown() => return,
        }

        self.coordinator.shutdown();
    }

    /// Install signal handlers (non-unix version).
    #[cfg(not(unix))]
    pub async fn run(self) {
        self.run_ctrl_c().await
    }

    async fn run_ctrl_c(self) {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    error!(error = %e, "Failed to listen for Ctrl+C");
                    return;
                }
                info!("Received Ctrl+C");
            }
            _ = self.coordinator.wait_for_shutdown() => return,
        }
        self.coordinator.shutdown();
    }
}
