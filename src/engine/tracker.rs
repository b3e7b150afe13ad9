//! Pressed-key bookkeeping

use std::collections::{BTreeSet, HashSet};

use crate::hotkey::Key;

/// Modifiers gained and lost between two `ModifierChanged` reports
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ModifierDelta {
    pub added: BTreeSet<Key>,
    pub removed: BTreeSet<Key>,
}

/// Tracks which keys are currently held
#[derive(Debug, Default)]
pub struct KeyTracker {
    pressed: HashSet<Key>,
    /// Last complete modifier set seen in a `ModifierChanged`
    last_modifiers: BTreeSet<Key>,
}

impl KeyTracker {
    pub fn pressed(&self) -> &HashSet<Key> {
        &self.pressed
    }

    #[cfg(test)]
    pub fn is_pressed(&self, key: &Key) -> bool {
        self.pressed.contains(key)
    }

    pub fn press(&mut self, key: Key) {
        self.pressed.insert(key);
    }

    pub fn release(&mut self, key: &Key) {
        self.pressed.remove(key);
    }

    /// Compare a full modifier report against the previous one
    pub fn modifier_delta(&self, current: &BTreeSet<Key>) -> ModifierDelta {
        ModifierDelta {
            added: current.difference(&self.last_modifiers).cloned().collect(),
            removed: self.last_modifiers.difference(current).cloned().collect(),
        }
    }

    /// Replace every modifier in `pressed` with `current`
    ///
    /// One OS flags event may carry several modifier transitions at once,
    /// so the set is reconciled wholesale instead of per key.
    pub fn apply_modifiers(&mut self, current: BTreeSet<Key>) {
        self.pressed.retain(|k| !k.is_modifier());
        self.pressed.extend(current.iter().cloned());
        self.last_modifiers = current;
    }

    pub fn clear(&mut self) {
        self.pressed.clear();
        self.last_modifiers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(names: &[&str]) -> BTreeSet<Key> {
        names.iter().map(|n| Key::from(*n)).collect()
    }

    #[test]
    fn test_press_is_idempotent() {
        let mut tracker = KeyTracker::default();
        tracker.press(Key::from("a"));
        tracker.press(Key::from("a"));
        assert_eq!(tracker.pressed().len(), 1);

        tracker.release(&Key::from("a"));
        assert!(tracker.pressed().is_empty());
    }

    #[test]
    fn test_modifier_burst() {
        let mut tracker = KeyTracker::default();
        tracker.apply_modifiers(keys(&["ctrl", "shift"]));

        let delta = tracker.modifier_delta(&keys(&["alt", "ctrl"]));
        assert_eq!(delta.added, keys(&["alt"]));
        assert_eq!(delta.removed, keys(&["shift"]));
    }

    #[test]
    fn test_apply_modifiers_keeps_regular_keys() {
        let mut tracker = KeyTracker::default();
        tracker.press(Key::from("x"));
        tracker.apply_modifiers(keys(&["ctrl", "shift"]));
        tracker.apply_modifiers(keys(&["ctrl"]));

        assert!(tracker.is_pressed(&Key::from("x")));
        assert!(tracker.is_pressed(&Key::from("ctrl")));
        assert!(!tracker.is_pressed(&Key::from("shift")));
    }

    #[test]
    fn test_clear() {
        let mut tracker = KeyTracker::default();
        tracker.press(Key::from("x"));
        tracker.apply_modifiers(keys(&["ctrl"]));
        tracker.clear();

        assert!(tracker.pressed().is_empty());
        assert_eq!(tracker.modifier_delta(&keys(&["ctrl"])).added, keys(&["ctrl"]));
    }
}
