//! macOS input source using CGEventTap
//!
//! Listens to key down/up, modifier flag changes and other-mouse buttons
//! on a dedicated thread with its own CFRunLoop, and translates them into
//! canonical events.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use core_foundation::base::{Boolean, TCFType};
use core_foundation::boolean::CFBoolean;
use core_foundation::dictionary::{CFDictionary, CFDictionaryRef};
use core_foundation::runloop::{kCFRunLoopCommonModes, kCFRunLoopDefaultMode, CFRunLoop};
use core_foundation::string::{CFString, CFStringRef};
use core_graphics::event::{
    CGEvent, CGEventFlags, CGEventTap, CGEventTapLocation, CGEventTapOptions,
    CGEventTapPlacement, CGEventTapProxy, CGEventType, EventField,
};
use tracing::{debug, error, info, warn};

use super::input::{InputEvent, InputSource, SourceError};
use super::keys::{Key, MouseButton};

const RUN_LOOP_SLICE: Duration = Duration::from_millis(100);

/// Other-mouse button number of the middle button
const MIDDLE_BUTTON: i64 = 2;

#[link(name = "ApplicationServices", kind = "framework")]
extern "C" {
    static kAXTrustedCheckOptionPrompt: CFStringRef;
    fn AXIsProcessTrusted() -> Boolean;
    fn AXIsProcessTrustedWithOptions(options: CFDictionaryRef) -> Boolean;
}

/// Whether this process may observe global input
fn accessibility_trusted() -> bool {
    unsafe { AXIsProcessTrusted() != 0 }
}

/// Ask macOS to show the Accessibility permission dialog
fn request_accessibility() -> bool {
    let key = unsafe { CFString::wrap_under_get_rule(kAXTrustedCheckOptionPrompt) };
    let options = CFDictionary::from_CFType_pairs(&[(key, CFBoolean::true_value())]);
    unsafe { AXIsProcessTrustedWithOptions(options.as_concrete_TypeRef()) != 0 }
}

/// Input source backed by a listen-only session event tap
pub struct MacTapSource {
    /// Accessibility grant, checked once when the source is created
    trusted: bool,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl MacTapSource {
    /// Create a tap source, recording the current Accessibility grant
    pub fn new() -> Self {
        let trusted = accessibility_trusted();
        if !trusted {
            warn!("accessibility permission not granted");
        }
        Self {
            trusted,
            running: Arc::new(AtomicBool::new(false)),
            thread: None,
        }
    }
}

impl Default for MacTapSource {
    fn default() -> Self {
        Self::new()
    }
}

impl InputSource for MacTapSource {
    fn start(&mut self) -> Result<Receiver<InputEvent>, SourceError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(SourceError::AlreadyStarted);
        }

        let (event_tx, event_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();
        let running = Arc::clone(&self.running);
        let trusted = self.trusted;

        let handle = thread::Builder::new()
            .name("hotkey-tap".to_string())
            .spawn(move || run_tap(event_tx, ready_tx, running, trusted))
            .map_err(|e| SourceError::Listen(e.to_string()))?;

        // The tap thread reports once the tap exists (or failed to)
        let ready = ready_rx
            .recv()
            .unwrap_or_else(|_| Err(SourceError::Listen("event tap thread exited".into())));
        if let Err(e) = ready {
            self.running.store(false, Ordering::SeqCst);
            let _ = handle.join();
            return Err(e);
        }

        self.thread = Some(handle);
        Ok(event_rx)
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                error!("event tap thread panicked");
            }
        }
    }
}

fn run_tap(
    event_tx: Sender<InputEvent>,
    ready_tx: Sender<Result<(), SourceError>>,
    running: Arc<AtomicBool>,
    trusted: bool,
) {
    let disabled = Arc::new(AtomicBool::new(false));
    let disabled_cb = Arc::clone(&disabled);

    // CGEventTap callback - must be fast and non-blocking
    let callback = move |_proxy: CGEventTapProxy,
                         event_type: CGEventType,
                         event: &CGEvent|
          -> Option<CGEvent> {
        match normalize(event_type, event) {
            Some(input) => {
                let _ = event_tx.send(input);
            }
            None => {
                if matches!(
                    event_type,
                    CGEventType::TapDisabledByTimeout | CGEventType::TapDisabledByUserInput
                ) {
                    disabled_cb.store(true, Ordering::SeqCst);
                }
            }
        }
        None
    };

    let tap = match CGEventTap::new(
        CGEventTapLocation::Session,
        CGEventTapPlacement::HeadInsertEventTap,
        CGEventTapOptions::ListenOnly,
        vec![
            CGEventType::KeyDown,
            CGEventType::KeyUp,
            CGEventType::FlagsChanged,
            CGEventType::OtherMouseDown,
            CGEventType::OtherMouseUp,
        ],
        callback,
    ) {
        Ok(tap) => tap,
        Err(()) => {
            error!("failed to create event tap - is Accessibility permission granted?");
            request_accessibility();
            let err = if trusted {
                SourceError::EventTapCreation
            } else {
                SourceError::PermissionDenied
            };
            let _ = ready_tx.send(Err(err));
            return;
        }
    };

    let source = match tap.mach_port.create_runloop_source(0) {
        Ok(source) => source,
        Err(()) => {
            let _ = ready_tx.send(Err(SourceError::RunLoopSource));
            return;
        }
    };

    let run_loop = CFRunLoop::get_current();
    unsafe {
        run_loop.add_source(&source, kCFRunLoopCommonModes);
    }
    tap.enable();
    let _ = ready_tx.send(Ok(()));

    info!("event tap created and enabled");

    while running.load(Ordering::SeqCst) {
        unsafe {
            CFRunLoop::run_in_mode(kCFRunLoopDefaultMode, RUN_LOOP_SLICE, false);
        }

        if disabled.swap(false, Ordering::SeqCst) {
            warn!("event tap was disabled by the system, re-enabling");
            tap.enable();
        }
    }

    unsafe {
        run_loop.remove_source(&source, kCFRunLoopCommonModes);
    }
    debug!("event tap removed");
}

/// Translate a tapped event into a canonical event
fn normalize(event_type: CGEventType, event: &CGEvent) -> Option<InputEvent> {
    match event_type {
        CGEventType::FlagsChanged => Some(InputEvent::ModifierChanged(modifier_keys(
            event.get_flags(),
        ))),
        CGEventType::KeyDown | CGEventType::KeyUp => {
            let keycode = event.get_integer_value_field(EventField::KEYBOARD_EVENT_KEYCODE);
            let key = Key::from(keycode_to_name(u16::try_from(keycode).ok()?)?);
            if matches!(event_type, CGEventType::KeyDown) {
                Some(InputEvent::KeyDown(key))
            } else {
                Some(InputEvent::KeyUp(key))
            }
        }
        CGEventType::OtherMouseDown | CGEventType::OtherMouseUp => {
            let number = event.get_integer_value_field(EventField::MOUSE_EVENT_BUTTON_NUMBER);
            let button = if number == MIDDLE_BUTTON {
                MouseButton::Middle
            } else {
                MouseButton::Other(u8::try_from(number).unwrap_or(u8::MAX))
            };
            if matches!(event_type, CGEventType::OtherMouseDown) {
                Some(InputEvent::MouseDown(button))
            } else {
                Some(InputEvent::MouseUp(button))
            }
        }
        _ => None,
    }
}

/// Canonical modifiers held according to the event flags
fn modifier_keys(flags: CGEventFlags) -> BTreeSet<Key> {
    [
        (CGEventFlags::CGEventFlagControl, "ctrl"),
        (CGEventFlags::CGEventFlagCommand, "super"),
        (CGEventFlags::CGEventFlagAlternate, "alt"),
        (CGEventFlags::CGEventFlagShift, "shift"),
    ]
    .into_iter()
    .filter(|(flag, _)| flags.contains(*flag))
    .map(|(_, name)| Key::from(name))
    .collect()
}

/// macOS virtual key code (ANSI layout) to canonical key name
fn keycode_to_name(keycode: u16) -> Option<&'static str> {
    let name = match keycode {
        0 => "a",
        1 => "s",
        2 => "d",
        3 => "f",
        4 => "h",
        5 => "g",
        6 => "z",
        7 => "x",
        8 => "c",
        9 => "v",
        11 => "b",
        12 => "q",
        13 => "w",
        14 => "e",
        15 => "r",
        16 => "y",
        17 => "t",
        18 => "1",
        19 => "2",
        20 => "3",
        21 => "4",
        22 => "6",
        23 => "5",
        24 => "=",
        25 => "9",
        26 => "7",
        27 => "-",
        28 => "8",
        29 => "0",
        31 => "o",
        32 => "u",
        34 => "i",
        35 => "p",
        37 => "l",
        38 => "j",
        40 => "k",
        45 => "n",
        46 => "m",
        36 => "enter",
        48 => "tab",
        49 => "space",
        51 => "backspace",
        53 => "esc",
        115 => "home",
        116 => "page_up",
        117 => "delete",
        119 => "end",
        121 => "page_down",
        123 => "left",
        124 => "right",
        125 => "down",
        126 => "up",
        122 => "f1",
        120 => "f2",
        99 => "f3",
        118 => "f4",
        96 => "f5",
        97 => "f6",
        98 => "f7",
        100 => "f8",
        101 => "f9",
        109 => "f10",
        103 => "f11",
        111 => "f12",
        _ => return None,
    };
    Some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keycode_table() {
        assert_eq!(keycode_to_name(0), Some("a"));
        assert_eq!(keycode_to_name(7), Some("x"));
        assert_eq!(keycode_to_name(49), Some("space"));
        assert_eq!(keycode_to_name(122), Some("f1"));
        assert_eq!(keycode_to_name(111), Some("f12"));
        assert_eq!(keycode_to_name(10), None);
    }

    #[test]
    fn test_modifier_flags() {
        let flags = CGEventFlags::CGEventFlagControl | CGEventFlags::CGEventFlagShift;
        let keys = modifier_keys(flags);
        let expected: BTreeSet<Key> = [Key::from("ctrl"), Key::from("shift")].into_iter().collect();
        assert_eq!(keys, expected);

        assert!(modifier_keys(CGEventFlags::CGEventFlagNull).is_empty());
    }
}
