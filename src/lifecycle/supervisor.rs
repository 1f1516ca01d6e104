//! Supervision of an optional co-located upstream process.
//!
//! The command line from `upstream.exec` is split on whitespace, spawned with
//! inherited stdout/stderr, and restarted whenever it exits until shutdown.

use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::sync::broadcast;

/// Delay before restarting an exited child.
const RESTART_DELAY: Duration = Duration::from_secs(1);

/// Keeps the upstream process running.
pub struct UpstreamSupervisor {
    program: String,
    args: Vec<String>,
    shutdown_rx: broadcast::Receiver<()>,
}

impl UpstreamSupervisor {
    /// Returns `None` for a blank command line.
    pub fn new(command_line: &str, shutdown_rx: broadcast::Receiver<()>) -> Option<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
            shutdown_rx,
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    fn spawn(&self) -> std::io::Result<Child> {
        let child = Command::new(&self.program)
            .args(&self.args)
            .kill_on_drop(true)
            .spawn()?;
        tracing::info!(program = %self.program, pid = child.id().unwrap_or(0), "Started upstream process");
        Ok(child)
    }

    /// Run until shutdown, restarting the child whenever it exits.
    pub async fn supervise(mut self) {
        loop {
            let mut child = match self.spawn() {
                Ok(child) => child,
                Err(e) => {
                    tracing::error!(program = %self.program, error = %e, "Failed to start upstream process");
                    tokio::select! {
                        _ = tokio::time::sleep(RESTART_DELAY) => continue,
                        _ = self.shutdown_rx.recv() => return,
                    }
                }
            };

            tokio::select! {
                status = child.wait() => {
                    match status {
                        Ok(status) => tracing::warn!(%status, "Upstream process exited, restarting"),
                        Err(e) => tracing::warn!(error = %e, "Failed to wait on upstream process, restarting"),
                    }
                    tokio::select! {
                        _ = tokio::time::sleep(RESTART_DELAY) => {}
                        _ = self.shutdown_rx.recv() => return,
                    }
                }
                _ = self.shutdown_rx.recv() => {
                    if let Err(e) = child.kill().await {
                        tracing::warn!(error = %e, "Failed to stop upstream process");
                    }
                    tracing::info!("Upstream process stopped");
                    return;
                }
            }
        }
    }
}
