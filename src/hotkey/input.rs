//! Canonical input events and the adapter seam
//!
//! Every platform adapter implements [`InputSource`]: it installs its OS
//! hook, translates native events into [`InputEvent`]s and pushes them into
//! an ordered channel. The listener thread is the only consumer.

use std::collections::BTreeSet;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};

use super::keys::{Key, MouseButton};

/// A normalized input event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    KeyDown(Key),
    KeyUp(Key),
    /// The complete set of modifiers now held (not a delta)
    ModifierChanged(BTreeSet<Key>),
    MouseDown(MouseButton),
    MouseUp(MouseButton),
}

#[cfg(test)]
impl InputEvent {
    pub fn key_down(name: &str) -> Self {
        InputEvent::KeyDown(Key::from(name))
    }

    pub fn key_up(name: &str) -> Self {
        InputEvent::KeyUp(Key::from(name))
    }

    pub fn modifiers<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        InputEvent::ModifierChanged(names.into_iter().map(Key::from).collect())
    }
}

/// Errors raised while setting up an input source
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("accessibility permission not granted - allow this app under System Settings > Privacy & Security > Accessibility")]
    PermissionDenied,

    #[error("failed to create event tap - check Accessibility permissions")]
    EventTapCreation,

    #[error("failed to create run loop source for event tap")]
    RunLoopSource,

    #[error("global input hook failed: {0}")]
    Listen(String),

    #[error("input source is already started")]
    AlreadyStarted,

    #[error("no input backend available on this platform: {0}")]
    Unsupported(String),
}

/// Produces canonical input events from some backend
pub trait InputSource: Send {
    /// Install the hook and return the receiving end of the event queue
    fn start(&mut self) -> Result<Receiver<InputEvent>, SourceError>;

    /// Detach from the backend. No events are delivered afterwards.
    fn stop(&mut self);

    /// The failure that closed the event queue, if the backend died after
    /// a successful start
    fn take_error(&mut self) -> Option<SourceError> {
        None
    }
}

/// Source fed by hand, so the listener can be driven without OS hooks
#[cfg(test)]
#[derive(Clone, Default)]
pub struct ChannelSource {
    sender: Arc<Mutex<Option<Sender<InputEvent>>>>,
}

#[cfg(test)]
impl ChannelSource {
    /// Create a source that is not started yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Push an event. Returns `false` if the source is not started.
    pub fn inject(&self, event: InputEvent) -> bool {
        let guard = match self.sender.lock() {
            Ok(guard) => guard,
            Err(_) => return false,
        };
        match guard.as_ref() {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }
}

#[cfg(test)]
impl InputSource for ChannelSource {
    fn start(&mut self) -> Result<Receiver<InputEvent>, SourceError> {
        let mut guard = self
            .sender
            .lock()
            .map_err(|_| SourceError::Listen("channel source lock poisoned".into()))?;
        if guard.is_some() {
            return Err(SourceError::AlreadyStarted);
        }
        let (tx, rx) = mpsc::channel();
        *guard = Some(tx);
        Ok(rx)
    }

    fn stop(&mut self) {
        // Dropping the sender closes the queue
        if let Ok(mut guard) = self.sender.lock() {
            guard.take();
        }
    }
}

/// Placeholder used when no backend is compiled in
#[cfg(any(test, all(not(target_os = "macos"), not(feature = "portable-hook"))))]
pub struct UnsupportedSource;

#[cfg(any(test, all(not(target_os = "macos"), not(feature = "portable-hook"))))]
impl InputSource for UnsupportedSource {
    fn start(&mut self) -> Result<Receiver<InputEvent>, SourceError> {
        Err(SourceError::Unsupported(format!(
            "{} (build with the `portable-hook` feature)",
            std::env::consts::OS
        )))
    }

    fn stop(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_source_delivers_in_order() {
        let mut source = ChannelSource::new();
        let handle = source.clone();
        let rx = source.start().unwrap();

        assert!(handle.inject(InputEvent::key_down("a")));
        assert!(handle.inject(InputEvent::key_up("a")));

        assert_eq!(rx.recv().unwrap(), InputEvent::key_down("a"));
        assert_eq!(rx.recv().unwrap(), InputEvent::key_up("a"));
    }

    #[test]
    fn test_channel_source_rejects_double_start() {
        let mut source = ChannelSource::new();
        let _rx = source.start().unwrap();
        assert!(matches!(source.start(), Err(SourceError::AlreadyStarted)));
    }

    #[test]
    fn test_inject_before_start_and_after_stop() {
        let mut source = ChannelSource::new();
        assert!(!source.inject(InputEvent::key_down("a")));

        let rx = source.start().unwrap();
        source.stop();
        assert!(!source.inject(InputEvent::key_down("a")));
        assert!(rx.recv().is_err());
    }

    #[test]
    fn test_unsupported_source() {
        assert!(matches!(
            UnsupportedSource.start(),
            Err(SourceError::Unsupported(_))
        ));
    }
}
