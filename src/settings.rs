//! Hotkey, mouse-button and snippet definitions
//!
//! The engine only reads these. Editing and saving them is the host
//! application's business; the daemon loads them from a JSON file.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::hotkey::{Key, MouseButton};

/// Activation model of a definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Press on match, release when the combination is let go
    #[default]
    Hold,
    /// One toggle per press, nothing on release
    Toggle,
}

fn enabled_by_default() -> bool {
    true
}

/// A keyboard combination
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotkeyDefinition {
    /// Keys that must all be held; extra keys do not block a match
    pub keys: BTreeSet<Key>,
    #[serde(default)]
    pub mode: Mode,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

impl HotkeyDefinition {
    pub fn new<I, K>(keys: I, mode: Mode) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<Key>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
            mode,
            enabled: true,
        }
    }

    /// Keys of the combination that are not modifiers
    pub fn non_modifier_keys(&self) -> impl Iterator<Item = &Key> {
        self.keys.iter().filter(|k| !k.is_modifier())
    }
}

/// A mouse-button binding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MouseHotkeyDefinition {
    pub button: MouseButton,
    #[serde(default)]
    pub mode: Mode,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

impl MouseHotkeyDefinition {
    pub fn new(button: MouseButton, mode: Mode) -> Self {
        Self {
            button,
            mode,
            enabled: true,
        }
    }
}

/// A text snippet fired by an exact key chord
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnippetDefinition {
    /// The pressed set must equal this exactly
    pub keys: BTreeSet<Key>,
    pub text: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

impl SnippetDefinition {
    pub fn new<I, K>(keys: I, text: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<Key>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
            text: text.into(),
            enabled: true,
        }
    }
}

/// Everything the engine matches against, keyed by definition id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HotkeySettings {
    pub keyboard_hotkeys: BTreeMap<String, HotkeyDefinition>,
    pub mouse_hotkeys: BTreeMap<String, MouseHotkeyDefinition>,
    pub text_snippets: BTreeMap<String, SnippetDefinition>,
}

/// Errors while reading a settings file
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to read settings from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl HotkeySettings {
    /// Load settings from a JSON file. A missing file yields empty settings.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(?path, "settings file not found, no hotkeys configured");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(SettingsError::Read {
                    path: path.to_owned(),
                    source,
                })
            }
        };

        let settings = Self::from_json(&raw).map_err(|source| SettingsError::Parse {
            path: path.to_owned(),
            source,
        })?;

        info!(
            keyboard = settings.keyboard_hotkeys.len(),
            mouse = settings.mouse_hotkeys.len(),
            snippets = settings.text_snippets.len(),
            "settings loaded"
        );
        Ok(settings)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let mut settings: Self = serde_json::from_str(raw)?;
        settings.drop_empty_combos();
        Ok(settings)
    }

    /// A definition with no keys would match every event; refuse it.
    fn drop_empty_combos(&mut self) {
        self.keyboard_hotkeys.retain(|id, def| {
            if def.keys.is_empty() {
                warn!(id = %id, "ignoring hotkey with no keys");
            }
            !def.keys.is_empty()
        });
        self.text_snippets.retain(|id, def| {
            if def.keys.is_empty() {
                warn!(id = %id, "ignoring snippet with no keys");
            }
            !def.keys.is_empty()
        });
    }
}

/// Shared handle to the current settings
///
/// The engine keeps a clone and reads through it once per event, so a
/// `replace` from another thread becomes visible at the next event.
#[derive(Debug, Clone, Default)]
pub struct SharedSettings(Arc<RwLock<HotkeySettings>>);

impl SharedSettings {
    pub fn new(settings: HotkeySettings) -> Self {
        Self(Arc::new(RwLock::new(settings)))
    }

    /// Read access for the duration of one event. `None` if a writer panicked.
    pub fn read(&self) -> Option<RwLockReadGuard<'_, HotkeySettings>> {
        self.0.read().ok()
    }

    /// Swap in a new configuration
    pub fn replace(&self, settings: HotkeySettings) {
        match self.0.write() {
            Ok(mut guard) => *guard = settings,
            Err(poisoned) => {
                warn!("settings lock poisoned, overwriting");
                *poisoned.into_inner() = settings;
                self.0.clear_poison();
            }
        }
    }
}
