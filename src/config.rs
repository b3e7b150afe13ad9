//! Configuration loading and management

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::hotkey::MAX_POLL_INTERVAL;

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// JSON file holding hotkey, mouse and snippet definitions
    pub settings_path: PathBuf,

    /// How often the listener thread checks for a stop request
    pub poll_interval: Duration,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        let settings_path = match std::env::var_os("HOTKEY_DAEMON_SETTINGS") {
            Some(path) => PathBuf::from(path),
            None => {
                let home = std::env::var("HOME").context("HOME is not set")?;
                PathBuf::from(home)
                    .join(".config")
                    .join("hotkey-daemon")
                    .join("hotkeys.json")
            }
        };

        let poll_interval = match std::env::var("HOTKEY_DAEMON_POLL_MS") {
            Ok(raw) => parse_poll_interval(&raw)?,
            Err(_) => MAX_POLL_INTERVAL,
        };

        Ok(Self {
            settings_path,
            poll_interval,
        })
    }
}

fn parse_poll_interval(raw: &str) -> Result<Duration> {
    let ms: u64 = raw
        .trim()
        .parse()
        .with_context(|| format!("invalid HOTKEY_DAEMON_POLL_MS: {:?}", raw))?;
    Ok(Duration::from_millis(ms).clamp(MIN_POLL_INTERVAL, MAX_POLL_INTERVAL))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_load() {
        let config = Config::load().unwrap();
        assert!(config.poll_interval <= MAX_POLL_INTERVAL);
        assert!(config.settings_path.to_string_lossy().ends_with(".json"));
    }

    #[test]
    fn test_poll_interval_is_clamped() {
        assert_eq!(parse_poll_interval("1").unwrap(), MIN_POLL_INTERVAL);
        assert_eq!(parse_poll_interval("5000").unwrap(), MAX_POLL_INTERVAL);
        assert_eq!(
            parse_poll_interval(" 50 ").unwrap(),
            Duration::from_millis(50)
        );
        assert!(parse_poll_interval("fast").is_err());
    }
}
