//! Listener worker
//!
//! Owns the engine on a dedicated thread and feeds it from an input
//! source. The thread wakes at least every poll interval to check the
//! stop flag, and never dispatches an event once stop has been observed.
//! The engine is handed back when the thread exits and reset before the
//! next session, so keys held across a restart cannot leave stale state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use super::input::{InputEvent, InputSource};
use crate::engine::Engine;
use crate::events::Signal;
use crate::settings::{HotkeySettings, SharedSettings};

/// Upper bound on how long the worker sleeps between stop-flag checks
pub const MAX_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Runs the hotkey engine against an input source
pub struct HotkeyListener {
    signal_tx: broadcast::Sender<Signal>,
    settings: SharedSettings,
    poll_interval: Duration,
    running: Arc<AtomicBool>,
    /// Engine parked between sessions
    engine: Mutex<Option<Engine>>,
    worker: Mutex<Option<JoinHandle<Engine>>>,
}

impl HotkeyListener {
    /// Create a new hotkey listener
    pub fn new(
        signal_tx: broadcast::Sender<Signal>,
        settings: SharedSettings,
        poll_interval: Duration,
    ) -> Self {
        Self {
            signal_tx,
            settings,
            poll_interval: poll_interval.min(MAX_POLL_INTERVAL),
            running: Arc::new(AtomicBool::new(false)),
            engine: Mutex::new(None),
            worker: Mutex::new(None),
        }
    }

    /// Start listening on `source`
    ///
    /// Setup failures of the source are not returned here; they are
    /// published once as [`Signal::Error`] and end the session.
    pub fn start(&self, source: Box<dyn InputSource>) -> Result<(), ListenerError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(ListenerError::AlreadyRunning);
        }

        let mut engine = self
            .reclaim_engine()
            .unwrap_or_else(|| Engine::new(self.settings.clone()));
        engine.reset();

        let signal_tx = self.signal_tx.clone();
        let running = Arc::clone(&self.running);
        let poll_interval = self.poll_interval;

        let handle = thread::Builder::new()
            .name("hotkey-listener".to_string())
            .spawn(move || {
                info!("hotkey listener thread started");
                run_session(source, &mut engine, &signal_tx, &running, poll_interval);
                running.store(false, Ordering::SeqCst);
                info!("hotkey listener thread stopped");
                engine
            })
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                ListenerError::ThreadSpawn(e.to_string())
            })?;

        if let Ok(mut worker) = self.worker.lock() {
            *worker = Some(handle);
        }
        Ok(())
    }

    /// Stop the listener and wait for the worker to detach from its source
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);

        if let Some(engine) = self.join_worker() {
            if let Ok(mut slot) = self.engine.lock() {
                *slot = Some(engine);
            }
        }
    }

    /// Check if the listener is currently running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Replace the hotkey definitions; applies from the next event on
    pub fn update_settings(&self, settings: HotkeySettings) {
        self.settings.replace(settings);
        debug!("hotkey settings replaced");
    }

    /// Wait for the worker, if any, and take back its engine
    fn join_worker(&self) -> Option<Engine> {
        let handle = self.worker.lock().ok().and_then(|mut w| w.take())?;
        match handle.join() {
            Ok(engine) => Some(engine),
            Err(_) => {
                error!("hotkey listener thread panicked");
                None
            }
        }
    }

    /// Engine left by the previous session, including one that ended on its own
    fn reclaim_engine(&self) -> Option<Engine> {
        self.join_worker()
            .or_else(|| self.engine.lock().ok().and_then(|mut slot| slot.take()))
    }
}

impl Drop for HotkeyListener {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Errors that can occur in the hotkey listener
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("hotkey listener is already running")]
    AlreadyRunning,

    #[error("failed to spawn listener thread: {0}")]
    ThreadSpawn(String),
}

/// One listening session: set up the source, pump events, detach
fn run_session(
    mut source: Box<dyn InputSource>,
    engine: &mut Engine,
    signal_tx: &broadcast::Sender<Signal>,
    running: &AtomicBool,
    poll_interval: Duration,
) {
    let events = match source.start() {
        Ok(rx) => rx,
        Err(e) => {
            error!(error = %e, "failed to start input source");
            let _ = signal_tx.send(Signal::error(e));
            return;
        }
    };

    info!("input source attached");
    let exit = pump(&events, engine, signal_tx, running, poll_interval);

    if exit == PumpExit::Disconnected {
        if let Some(e) = source.take_error() {
            error!(error = %e, "input source failed");
            let _ = signal_tx.send(Signal::error(e));
        }
    }

    source.stop();
    info!("input source detached");
}

#[derive(Debug, PartialEq, Eq)]
enum PumpExit {
    Stopped,
    Disconnected,
}

fn pump(
    events: &Receiver<InputEvent>,
    engine: &mut Engine,
    signal_tx: &broadcast::Sender<Signal>,
    running: &AtomicBool,
    poll_interval: Duration,
) -> PumpExit {
    while running.load(Ordering::SeqCst) {
        let event = match events.recv_timeout(poll_interval) {
            Ok(event) => event,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                warn!("input source closed its event queue");
                return PumpExit::Disconnected;
            }
        };

        // Stop may have been requested while we were blocked
        if !running.load(Ordering::SeqCst) {
            break;
        }

        match engine.process(&event) {
            Ok(signals) => {
                for signal in signals {
                    debug!(%signal, "emitting signal");
                    // No subscribers is fine; the send never blocks
                    let _ = signal_tx.send(signal);
                }
            }
            Err(e) => {
                warn!(error = %e, ?event, "failed to process input event");
                let _ = signal_tx.send(Signal::error(e));
            }
        }
    }
    PumpExit::Stopped
}
