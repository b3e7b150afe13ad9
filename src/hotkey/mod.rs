//! Hotkey module for global keyboard and mouse input
//!
//! Platform adapters normalize OS events into the canonical vocabulary;
//! the listener runs them through the engine on a dedicated thread.

mod input;
mod keys;
mod listener;

#[cfg(target_os = "macos")]
mod macos;
#[cfg(feature = "portable-hook")]
mod portable;

pub use input::{InputEvent, InputSource, SourceError};
#[cfg(test)]
pub use input::ChannelSource;
#[cfg(any(test, all(not(target_os = "macos"), not(feature = "portable-hook"))))]
pub use input::UnsupportedSource;
pub use keys::{Key, MouseButton};
pub use listener::{HotkeyListener, ListenerError, MAX_POLL_INTERVAL};

/// The best input backend for this build
pub fn default_source() -> Box<dyn InputSource> {
    #[cfg(target_os = "macos")]
    return Box::new(macos::MacTapSource::new());
    #[cfg(all(not(target_os = "macos"), feature = "portable-hook"))]
    return Box::new(portable::PortableSource::new());
    #[cfg(all(not(target_os = "macos"), not(feature = "portable-hook")))]
    Box::new(UnsupportedSource)
}
