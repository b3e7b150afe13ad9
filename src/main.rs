//! hotkey-daemon: global hotkey and text-snippet detection
//!
//! This daemon listens to system-wide keyboard and mouse input and turns it
//! into discrete signals for a text-expander / automation front end:
//! - Keyboard hotkeys in hold or toggle mode
//! - Middle mouse button bindings
//! - Exact-chord text snippets
//!
//! Capture runs on a dedicated listener thread; signals are published on a
//! broadcast channel. This binary subscribes and logs them.

mod config;
mod engine;
mod events;
mod hotkey;
mod lifecycle;
mod settings;

use anyhow::Result;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::events::Signal;
use crate::hotkey::HotkeyListener;
use crate::lifecycle::{Request, ShutdownSignal};
use crate::settings::{HotkeySettings, SharedSettings};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "hotkey-daemon starting"
    );

    // Load configuration
    let config = Config::load()?;
    info!(?config.settings_path, ?config.poll_interval, "configuration loaded");

    let settings = SharedSettings::new(HotkeySettings::load(&config.settings_path)?);

    let mut signals = ShutdownSignal::new()?;

    // Listener thread -> subscribers
    let (signal_tx, mut signal_rx) = broadcast::channel::<Signal>(64);

    let listener = HotkeyListener::new(signal_tx, settings, config.poll_interval);

    // Start the hotkey listener (runs on dedicated thread)
    match listener.start(hotkey::default_source()) {
        Ok(()) => {
            info!("hotkey listener started");
        }
        Err(e) => {
            error!(?e, "failed to start hotkey listener");
        }
    }

    info!("daemon initialized, entering main loop");

    loop {
        tokio::select! {
            received = signal_rx.recv() => match received {
                Ok(Signal::Error { message }) => {
                    warn!(%message, "listener reported an error");
                }
                Ok(signal) => {
                    info!(%signal, "hotkey signal");
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "signal receiver lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    break;
                }
            },

            request = signals.next() => match request {
                Request::Shutdown => {
                    info!("shutdown signal received");
                    break;
                }
                Request::Reload => match HotkeySettings::load(&config.settings_path) {
                    Ok(next) => {
                        listener.update_settings(next);
                        info!("settings reloaded");
                    }
                    Err(e) => {
                        warn!(error = %e, "settings reload failed, keeping current settings");
                    }
                },
            },
        }
    }

    // Cleanup
    info!("shutting down...");

    tokio::task::block_in_place(|| listener.stop());

    info!("hotkey-daemon stopped");

    Ok(())
}
