//! Hotkey activation engine
//!
//! Turns canonical input events into hotkey, mouse and snippet signals.
//! The engine is synchronous and owns all of its state; the listener
//! thread drives it one event at a time.

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use tracing::debug;

use crate::events::{Edge, Signal};
use crate::hotkey::{InputEvent, Key, MouseButton};
use crate::settings::{HotkeyDefinition, HotkeySettings, Mode, SharedSettings};

/// A combination that has fired and not yet been released
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ActiveKey {
    Hotkey(String),
    Snippet(String),
}

impl fmt::Display for ActiveKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActiveKey::Hotkey(id) => write!(f, "{}", id),
            ActiveKey::Snippet(id) => write!(f, "snippet:{}", id),
        }
    }
}

/// Errors for a single event. The engine state is left untouched.
#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("input event carries an empty key name")]
    EmptyKey,

    #[error("modifier report contains non-modifier key `{0}`")]
    NotAModifier(Key),

    #[error("settings lock poisoned")]
    SettingsPoisoned,
}

/// The hotkey activation engine
pub struct Engine {
    settings: SharedSettings,
    keys: super::KeyTracker,
    active: BTreeSet<ActiveKey>,
}

impl Engine {
    /// Create an engine reading definitions from `settings`
    pub fn new(settings: SharedSettings) -> Self {
        Self {
            settings,
            keys: super::KeyTracker::default(),
            active: BTreeSet::new(),
        }
    }

    #[cfg(test)]
    pub fn pressed(&self) -> &HashSet<Key> {
        self.keys.pressed()
    }

    #[cfg(test)]
    pub fn is_active(&self, key: &ActiveKey) -> bool {
        self.active.contains(key)
    }

    /// Forget all pressed keys and active combinations
    pub fn reset(&mut self) {
        if !self.active.is_empty() {
            debug!(active = self.active.len(), "dropping active combinations");
        }
        self.keys.clear();
        self.active.clear();
    }

    /// Process one event and return the signals it produced, in order
    pub fn process(&mut self, event: &InputEvent) -> Result<Vec<Signal>, ProcessingError> {
        validate(event)?;

        let shared = self.settings.clone();
        let settings = shared.read().ok_or(ProcessingError::SettingsPoisoned)?;
        let mut out = Vec::new();

        match event {
            InputEvent::KeyDown(key) => {
                self.keys.press(key.clone());
                fire_hotkeys(&settings, &mut self.active, self.keys.pressed(), &mut out);
                fire_snippets(&settings, &mut self.active, self.keys.pressed(), &mut out);
            }
            InputEvent::KeyUp(key) => {
                // Release handling must see the key as still held
                release_key(&settings, &mut self.active, self.keys.pressed(), key, &mut out);
                self.keys.release(key);
            }
            InputEvent::ModifierChanged(current) => {
                let delta = self.keys.modifier_delta(current);
                for key in &delta.removed {
                    release_key(&settings, &mut self.active, self.keys.pressed(), key, &mut out);
                }

                self.keys.apply_modifiers(current.clone());

                // pressed now includes `added`, so a combo can fire on the
                // last modifier without waiting for another key event
                if !delta.added.is_empty() {
                    fire_hotkeys(&settings, &mut self.active, self.keys.pressed(), &mut out);
                    fire_snippets(&settings, &mut self.active, self.keys.pressed(), &mut out);
                }
            }
            InputEvent::MouseDown(button) => mouse_edge(&settings, *button, true, &mut out),
            InputEvent::MouseUp(button) => mouse_edge(&settings, *button, false, &mut out),
        }

        Ok(out)
    }
}

fn validate(event: &InputEvent) -> Result<(), ProcessingError> {
    match event {
        InputEvent::KeyDown(key) | InputEvent::KeyUp(key) => {
            if key.as_str().trim().is_empty() {
                return Err(ProcessingError::EmptyKey);
            }
        }
        InputEvent::ModifierChanged(modifiers) => {
            for key in modifiers {
                if key.as_str().trim().is_empty() {
                    return Err(ProcessingError::EmptyKey);
                }
                if !key.is_modifier() {
                    return Err(ProcessingError::NotAModifier(key.clone()));
                }
            }
        }
        InputEvent::MouseDown(_) | InputEvent::MouseUp(_) => {}
    }
    Ok(())
}

/// Activate every enabled hotkey whose keys are all held
fn fire_hotkeys(
    settings: &HotkeySettings,
    active: &mut BTreeSet<ActiveKey>,
    pressed: &HashSet<Key>,
    out: &mut Vec<Signal>,
) {
    for (id, def) in &settings.keyboard_hotkeys {
        if !def.enabled || !def.keys.iter().all(|k| pressed.contains(k)) {
            continue;
        }
        // Auto-repeat key downs land here again while the combo is held
        if !active.insert(ActiveKey::Hotkey(id.clone())) {
            continue;
        }

        let edge = match def.mode {
            Mode::Hold => Edge::Press,
            Mode::Toggle => Edge::Toggle,
        };
        debug!(id = %id, %edge, keys = ?def.keys, "hotkey triggered");
        out.push(Signal::hotkey(id.as_str(), edge));
    }
}

/// Trigger snippets whose chord equals the held keys exactly
fn fire_snippets(
    settings: &HotkeySettings,
    active: &mut BTreeSet<ActiveKey>,
    pressed: &HashSet<Key>,
    out: &mut Vec<Signal>,
) {
    for (id, snip) in &settings.text_snippets {
        if !snip.enabled || snip.keys.len() != pressed.len() {
            continue;
        }
        if !snip.keys.iter().all(|k| pressed.contains(k)) {
            continue;
        }
        if !active.insert(ActiveKey::Snippet(id.clone())) {
            continue;
        }

        debug!(id = %id, "snippet triggered");
        out.push(Signal::SnippetTriggered {
            id: id.clone(),
            text: snip.text.clone(),
        });
    }
}

/// Clear active entries affected by releasing `key`
///
/// `pressed` is the state before `key` is removed.
fn release_key(
    settings: &HotkeySettings,
    active: &mut BTreeSet<ActiveKey>,
    pressed: &HashSet<Key>,
    key: &Key,
    out: &mut Vec<Signal>,
) {
    let mut cleared = Vec::new();

    for entry in active.iter() {
        match entry {
            ActiveKey::Hotkey(id) => match settings.keyboard_hotkeys.get(id) {
                // Definition removed while active
                None => cleared.push((entry.clone(), None)),
                Some(def) if def.keys.contains(key) => {
                    if def.mode == Mode::Hold && still_held(def, pressed, key) {
                        debug!(id = %id, released = %key, "hotkey kept by held trigger key");
                        continue;
                    }
                    cleared.push((entry.clone(), Some(def.mode)));
                }
                Some(_) => {}
            },
            ActiveKey::Snippet(id) => match settings.text_snippets.get(id) {
                Some(snip) if !snip.keys.contains(key) => {}
                _ => cleared.push((entry.clone(), None)),
            },
        }
    }

    for (entry, mode) in cleared {
        active.remove(&entry);
        if let (ActiveKey::Hotkey(id), Some(Mode::Hold)) = (&entry, mode) {
            debug!(id = %id, released = %key, "hotkey released");
            out.push(Signal::hotkey(id.as_str(), Edge::Release));
        }
    }
}

/// Whether a hold combo survives releasing `key`
///
/// Combos with a non-modifier key end only once none of those keys is
/// still held, so letting go of shift a moment before x in `ctrl+shift+x`
/// does not end the hold. All-modifier combos end on any release.
fn still_held(def: &HotkeyDefinition, pressed: &HashSet<Key>, key: &Key) -> bool {
    def.non_modifier_keys()
        .any(|k| k != key && pressed.contains(k))
}

fn mouse_edge(settings: &HotkeySettings, button: MouseButton, down: bool, out: &mut Vec<Signal>) {
    if button != MouseButton::Middle {
        return;
    }

    for (id, def) in &settings.mouse_hotkeys {
        if !def.enabled || def.button != button {
            continue;
        }
        let edge = match (def.mode, down) {
            (Mode::Hold, true) => Edge::Press,
            (Mode::Toggle, true) => Edge::Toggle,
            (Mode::Hold, false) => Edge::Release,
            (Mode::Toggle, false) => continue,
        };
        debug!(id = %id, %button, %edge, "mouse hotkey");
        out.push(Signal::mouse(id.as_str(), edge));
    }
}
