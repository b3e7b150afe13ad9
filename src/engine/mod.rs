//! Hotkey activation engine
//!
//! One platform-independent implementation of:
//! - pressed-key tracking, including bursty modifier reports
//! - subset matching of keyboard hotkeys (hold and toggle)
//! - the release guard for hold combos
//! - middle-button mouse hotkeys
//! - exact-chord text snippets

mod machine;
mod tracker;

pub use machine::{ActiveKey, Engine, ProcessingError};
pub use tracker::KeyTracker;
