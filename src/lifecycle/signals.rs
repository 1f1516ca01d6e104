//! OS signal handling.
//!
//! - SIGINT/SIGTERM trigger graceful shutdown
//! - SIGHUP reloads the config file (unix only)

use std::path::PathBuf;

use tokio::sync::{broadcast, mpsc};

use crate::config::watcher::reload;
use crate::config::GatewayConfig;
use crate::lifecycle::Shutdown;

/// Wait for Ctrl+C or SIGTERM, then trigger `shutdown`.
pub async fn shutdown_on_signal(shutdown: Shutdown) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
    shutdown.trigger();
}

/// Reload the config at `path` on every SIGHUP until shutdown.
#[cfg(unix)]
pub async fn reload_on_sighup(
    path: PathBuf,
    tx: mpsc::UnboundedSender<GatewayConfig>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut hangup = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::hangup()) {
        Ok(sig) => sig,
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for SIGHUP");
            return;
        }
    };

    loop {
        tokio::select! {
            _ = hangup.recv() => {
                tracing::info!(path = ?path, "SIGHUP received, reloading config");
                reload(&path, &tx);
            }
            _ = shutdown.recv() => break,
        }
    }
}

#[cfg(not(unix))]
pub async fn reload_on_sighup(
    _path: PathBuf,
    _tx: mpsc::UnboundedSender<GatewayConfig>,
    _shutdown: broadcast::Receiver<()>,
) {
}
