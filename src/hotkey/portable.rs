//! Cross-platform input source using rdev
//!
//! Every key, modifiers included, arrives as a separate press/release, so
//! this source emits only `KeyDown`/`KeyUp` and mouse events. Left and
//! right modifiers keep distinct names (`ctrl` vs `right_ctrl`).
//!
//! `rdev::listen` cannot be cancelled. Stopping the source detaches it by
//! dropping the queue sender; the hook thread stays parked for the rest of
//! the process and is reused if the source is started again. If the hook
//! dies later, the queue is closed and the failure kept for the listener.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use rdev::{Button, EventType};
use tracing::{error, info};

use super::input::{InputEvent, InputSource, SourceError};
use super::keys::{Key, MouseButton};

/// How long to wait for `rdev::listen` to fail before assuming it is running
const SETUP_GRACE: Duration = Duration::from_millis(200);

type SharedSender = Arc<Mutex<Option<Sender<InputEvent>>>>;

/// Input source backed by a global rdev hook
pub struct PortableSource {
    sender: SharedSender,
    /// Why the hook thread exited, once it has
    failure: Arc<Mutex<Option<String>>>,
    hooked: bool,
}

impl PortableSource {
    /// Create a source; the hook is installed on first start
    pub fn new() -> Self {
        Self {
            sender: Arc::new(Mutex::new(None)),
            failure: Arc::new(Mutex::new(None)),
            hooked: false,
        }
    }

    fn install_hook(&mut self) -> Result<(), SourceError> {
        let sender = Arc::clone(&self.sender);
        let failure = Arc::clone(&self.failure);
        let (setup_tx, setup_rx) = mpsc::channel();

        thread::Builder::new()
            .name("hotkey-rdev".to_string())
            .spawn(move || {
                let hook_sender = Arc::clone(&sender);
                let result = rdev::listen(move |event| {
                    let Some(input) = normalize(&event.event_type) else {
                        return;
                    };
                    if let Ok(guard) = hook_sender.lock() {
                        if let Some(tx) = guard.as_ref() {
                            let _ = tx.send(input);
                        }
                    }
                });
                let message = match result {
                    Ok(()) => "rdev listener returned".to_string(),
                    Err(e) => format!("{:?}", e),
                };
                error!(error = %message, "rdev listener failed");

                // Past the setup grace nobody is waiting on setup_rx, so
                // record the failure and close the queue instead
                if let Ok(mut slot) = failure.lock() {
                    *slot = Some(message.clone());
                }
                if let Ok(mut guard) = sender.lock() {
                    guard.take();
                }
                let _ = setup_tx.send(message);
            })
            .map_err(|e| SourceError::Listen(e.to_string()))?;

        match setup_rx.recv_timeout(SETUP_GRACE) {
            Ok(message) => Err(SourceError::Listen(message)),
            Err(RecvTimeoutError::Timeout) => {
                info!("rdev hook installed");
                Ok(())
            }
            Err(RecvTimeoutError::Disconnected) => {
                Err(SourceError::Listen("rdev listener exited".into()))
            }
        }
    }
}

impl Default for PortableSource {
    fn default() -> Self {
        Self::new()
    }
}

impl InputSource for PortableSource {
    fn start(&mut self) -> Result<Receiver<InputEvent>, SourceError> {
        let (tx, rx) = mpsc::channel();
        {
            let mut guard = self
                .sender
                .lock()
                .map_err(|_| SourceError::Listen("sender lock poisoned".into()))?;
            if guard.is_some() {
                return Err(SourceError::AlreadyStarted);
            }
            *guard = Some(tx);
        }

        if !self.hooked {
            if let Err(e) = self.install_hook() {
                self.stop();
                self.take_error();
                return Err(e);
            }
            self.hooked = true;
        }
        Ok(rx)
    }

    fn stop(&mut self) {
        if let Ok(mut guard) = self.sender.lock() {
            guard.take();
        }
    }

    fn take_error(&mut self) -> Option<SourceError> {
        let message = self.failure.lock().ok()?.take()?;
        // The hook thread is gone; install a fresh one on the next start
        self.hooked = false;
        Some(SourceError::Listen(message))
    }
}

fn normalize(event_type: &EventType) -> Option<InputEvent> {
    match event_type {
        EventType::KeyPress(key) => Some(InputEvent::KeyDown(key_name(*key))),
        EventType::KeyRelease(key) => Some(InputEvent::KeyUp(key_name(*key))),
        EventType::ButtonPress(button) => Some(InputEvent::MouseDown(mouse_button(*button))),
        EventType::ButtonRelease(button) => Some(InputEvent::MouseUp(mouse_button(*button))),
        _ => None,
    }
}

fn mouse_button(button: Button) -> MouseButton {
    match button {
        Button::Left => MouseButton::Left,
        Button::Right => MouseButton::Right,
        Button::Middle => MouseButton::Middle,
        Button::Unknown(n) => MouseButton::Other(n),
    }
}

/// rdev key to canonical key name
fn key_name(key: rdev::Key) -> Key {
    use rdev::Key as K;

    let name = match key {
        K::ControlLeft => "ctrl",
        K::ControlRight => "right_ctrl",
        K::MetaLeft => "super",
        K::MetaRight => "right_super",
        K::Alt => "alt",
        K::AltGr => "right_alt",
        K::ShiftLeft => "shift",
        K::ShiftRight => "right_shift",
        K::Space => "space",
        K::Return | K::KpReturn => "enter",
        K::Tab => "tab",
        K::Escape => "esc",
        K::Backspace => "backspace",
        K::Delete => "delete",
        K::Home => "home",
        K::End => "end",
        K::PageUp => "page_up",
        K::PageDown => "page_down",
        K::UpArrow => "up",
        K::DownArrow => "down",
        K::LeftArrow => "left",
        K::RightArrow => "right",
        K::Minus => "-",
        K::Equal => "=",
        K::Unknown(code) => return Key::new(format!("key_{}", code)),
        other => return Key::new(fallback_name(&format!("{:?}", other))),
    };
    Key::from(name)
}

/// `KeyA` -> `a`, `Num1` -> `1`, `F5` -> `f5`, `CapsLock` -> `capslock`
fn fallback_name(debug_name: &str) -> String {
    let stripped = debug_name
        .strip_prefix("Key")
        .or_else(|| debug_name.strip_prefix("Num").filter(|d| d.len() == 1))
        .unwrap_or(debug_name);
    stripped.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modifier_names_keep_sides() {
        assert_eq!(key_name(rdev::Key::ControlLeft), Key::from("ctrl"));
        assert_eq!(key_name(rdev::Key::ControlRight), Key::from("right_ctrl"));
        assert_eq!(key_name(rdev::Key::AltGr), Key::from("right_alt"));
        assert!(key_name(rdev::Key::MetaLeft).is_modifier());
    }

    #[test]
    fn test_character_keys() {
        assert_eq!(key_name(rdev::Key::KeyA), Key::from("a"));
        assert_eq!(key_name(rdev::Key::Num7), Key::from("7"));
        assert_eq!(key_name(rdev::Key::F11), Key::from("f11"));
        assert_eq!(key_name(rdev::Key::Unknown(42)), Key::from("key_42"));
    }

    #[test]
    fn test_middle_button() {
        assert_eq!(
            normalize(&EventType::ButtonPress(Button::Middle)),
            Some(InputEvent::MouseDown(MouseButton::Middle))
        );
        assert_eq!(normalize(&EventType::MouseMove { x: 1.0, y: 2.0 }), None);
    }

    #[test]
    fn test_recorded_failure_is_taken_once() {
        let mut source = PortableSource::new();
        source.hooked = true;
        if let Ok(mut slot) = source.failure.lock() {
            *slot = Some("RecordContextEnablingError".into());
        }

        assert!(matches!(
            source.take_error(),
            Some(SourceError::Listen(m)) if m == "RecordContextEnablingError"
        ));
        assert!(!source.hooked);
        assert!(source.take_error().is_none());
    }
}
