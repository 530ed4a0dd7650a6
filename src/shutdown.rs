//! Cooperative shutdown.
//!
//! A single [`CancellationToken`] fans out to every loop in the run. Signal
//! handlers trigger it; the backfill also triggers it itself on fatal
//! startup errors so sibling tasks unwind.

use tokio_util::sync::CancellationToken;
use tracing::info;

/// Owns the run-wide cancellation token.
#[derive(Clone)]
pub struct ShutdownHandle {
    token: CancellationToken,
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn trigger(&self) {
        self.token.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Spawn background tasks that trigger shutdown on SIGINT or SIGTERM.
    pub fn install_signal_handlers(&self) {
        let token = self.token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received interrupt, shutting down");
                token.cancel();
            }
        });

        #[cfg(unix)]
        {
            let token = self.token.clone();
            tokio::spawn(async move {
                let mut sigterm = match tokio::signal::unix::signal(
                    tokio::signal::unix::SignalKind::terminate(),
                ) {
                    Ok(s) => s,
                    Err(_) => return,
                };
                if sigterm.recv().await.is_some() {
                    info!("Received SIGTERM, shutting down");
                    token.cancel();
                }
            });
        }
    }
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}
