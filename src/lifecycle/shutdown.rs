//! Unix signal handling for shutdown and settings reload

use anyhow::{Context, Result};
use tokio::signal::unix::{signal, Signal, SignalKind};
use tracing::debug;

/// What the process was asked to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    /// SIGTERM or SIGINT
    Shutdown,
    /// SIGHUP: re-read the settings file
    Reload,
}

/// Handles shutdown signals (SIGTERM, SIGINT) and reload requests (SIGHUP)
pub struct ShutdownSignal {
    sigterm: Signal,
    sigint: Signal,
    sighup: Signal,
}

impl ShutdownSignal {
    /// Register the signal handlers. Must be called inside a Tokio runtime.
    pub fn new() -> Result<Self> {
        Ok(Self {
            sigterm: signal(SignalKind::terminate())
                .context("failed to register SIGTERM handler")?,
            sigint: signal(SignalKind::interrupt())
                .context("failed to register SIGINT handler")?,
            sighup: signal(SignalKind::hangup())
                .context("failed to register SIGHUP handler")?,
        })
    }

    /// Wait for the next signal
    pub async fn next(&mut self) -> Request {
        tokio::select! {
            _ = self.sigterm.recv() => {
                debug!("received SIGTERM");
                Request::Shutdown
            }
            _ = self.sigint.recv() => {
                debug!("received SIGINT");
                Request::Shutdown
            }
            _ = self.sighup.recv() => {
                debug!("received SIGHUP");
                Request::Reload
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handlers_register() {
        tokio_test::block_on(async {
            assert!(ShutdownSignal::new().is_ok());
        });
    }
}
