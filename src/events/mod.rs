//! Signals emitted by the hotkey engine
//!
//! These are the only values that leave the listener thread. Consumers
//! subscribe through a broadcast channel and own whatever state the
//! signals drive (e.g. the on/off state behind a toggle hotkey).

use serde::{Deserialize, Serialize};

/// Which edge of an activation a signal reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Edge {
    /// Hold-mode combination became satisfied
    Press,
    /// Hold-mode combination ended
    Release,
    /// Toggle-mode combination was pressed; the consumer flips its state
    Toggle,
}

impl std::fmt::Display for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Edge::Press => write!(f, "press"),
            Edge::Release => write!(f, "release"),
            Edge::Toggle => write!(f, "toggle"),
        }
    }
}

/// Events emitted by the engine and the listener
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Signal {
    /// A keyboard hotkey changed state
    Hotkey { id: String, edge: Edge },

    /// A mouse-button hotkey changed state
    MouseHotkey { id: String, edge: Edge },

    /// A text snippet chord was pressed
    SnippetTriggered { id: String, text: String },

    /// Non-fatal problem while listening
    Error { message: String },
}

impl Signal {
    pub fn hotkey(id: impl Into<String>, edge: Edge) -> Self {
        Signal::Hotkey { id: id.into(), edge }
    }

    pub fn mouse(id: impl Into<String>, edge: Edge) -> Self {
        Signal::MouseHotkey { id: id.into(), edge }
    }

    pub fn error(message: impl std::fmt::Display) -> Self {
        Signal::Error {
            message: message.to_string(),
        }
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Signal::Hotkey { id, edge } => write!(f, "HOTKEY {} ({})", id, edge),
            Signal::MouseHotkey { id, edge } => write!(f, "MOUSE_HOTKEY {} ({})", id, edge),
            Signal::SnippetTriggered { id, text } => {
                write!(f, "SNIPPET {} ({} chars)", id, text.chars().count())
            }
            Signal::Error { message } => write!(f, "ERROR {}", message),
        }
    }
}
