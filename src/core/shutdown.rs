//! # OS signal handling.
//!
//! [`ShutdownSignals`] installs the termination handlers up front, so a
//! registration failure surfaces before the relay starts instead of being
//! mistaken for a stop request later. [`ShutdownSignals::recv`] then completes
//! when the process receives one of them and reports which.
//!
//! ## Signals
//! **Unix platforms:**
//! - `SIGINT` (Ctrl-C in terminal)
//! - `SIGTERM` (default kill signal, used by systemd)
//! - `SIGQUIT` (quit signal)

use tokio::signal::unix::{Signal, SignalKind, signal};

/// Installed termination signal listeners.
#[derive(Debug)]
pub struct ShutdownSignals {
    sigint: Signal,
    sigterm: Signal,
    sigquit: Signal,
}

impl ShutdownSignals {
    /// Installs listeners for SIGINT, SIGTERM and SIGQUIT.
    ///
    /// Returns `Err` if any of them cannot be registered.
    pub fn register() -> std::io::Result<Self> {
        Ok(Self {
            sigint: signal(SignalKind::interrupt())?,
            sigterm: signal(SignalKind::terminate())?,
            sigquit: signal(SignalKind::quit())?,
        })
    }

    /// Waits for the first termination signal and returns its name.
    pub async fn recv(mut self) -> &'static str {
        tokio::select! {
            _ = self.sigint.recv()  => "SIGINT",
            _ = self.sigterm.recv() => "SIGTERM",
            _ = self.sigquit.recv() => "SIGQUIT",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_recv_reports_delivered_signal() {
        let signals = ShutdownSignals::register().unwrap();
        let status = std::process::Command::new("kill")
            .args(["-QUIT", &std::process::id().to_string()])
            .status()
            .unwrap();
        assert!(status.success());

        let name = tokio::time::timeout(Duration::from_secs(2), signals.recv())
            .await
            .unwrap();
        assert_eq!(name, "SIGQUIT");
    }
}
