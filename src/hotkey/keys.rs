//! Canonical key vocabulary
//!
//! Platform adapters translate native key codes into these identifiers
//! before anything reaches the engine. The engine compares keys by exact
//! string and never normalizes them itself.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Modifier identifiers in the canonical vocabulary
pub const MODIFIERS: [&str; 8] = [
    "ctrl",
    "right_ctrl",
    "super",
    "right_super",
    "alt",
    "right_alt",
    "shift",
    "right_shift",
];

/// Canonical identifier of a key or modifier (e.g. `ctrl`, `x`, `f5`)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Key(String);

impl Key {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this key belongs to the modifier vocabulary
    pub fn is_modifier(&self) -> bool {
        is_modifier(&self.0)
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn is_modifier(name: &str) -> bool {
    MODIFIERS.contains(&name)
}

/// Mouse buttons as reported by adapters. Only `Middle` can be bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    /// Any other button, by platform button number
    Other(u8),
}

impl fmt::Display for MouseButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MouseButton::Left => write!(f, "left"),
            MouseButton::Right => write!(f, "right"),
            MouseButton::Middle => write!(f, "middle"),
            MouseButton::Other(n) => write!(f, "button{}", n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modifier_vocabulary() {
        assert!(Key::from("ctrl").is_modifier());
        assert!(Key::from("right_super").is_modifier());
        assert!(!Key::from("x").is_modifier());
        assert!(!Key::from("control").is_modifier());
    }

    #[test]
    fn test_key_is_exact_string() {
        assert_ne!(Key::from("A"), Key::from("a"));
        assert_eq!(Key::from("f5").to_string(), "f5");
    }

    #[test]
    fn test_mouse_button_serialization() {
        let json = serde_json::to_string(&MouseButton::Middle).unwrap();
        assert_eq!(json, "\"middle\"");
        let button: MouseButton = serde_json::from_str("\"middle\"").unwrap();
        assert_eq!(button, MouseButton::Middle);
    }
}
