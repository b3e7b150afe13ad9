//! Process lifecycle

mod shutdown;

pub use shutdown::{Request, ShutdownSignal};
