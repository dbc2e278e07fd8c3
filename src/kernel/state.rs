use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// The one piece of state shared between the simulation loop (reader) and
/// the notification dispatcher (writer).
///
/// Last write wins. Redundant writes are no-ops.
#[derive(Debug, Clone, Default)]
pub struct ConnectionState {
    connected: Arc<AtomicBool>,
}

impl ConnectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Returns true when the stored value actually changed.
    pub fn set(&self, connected: bool) -> bool {
        self.connected.swap(connected, Ordering::AcqRel) != connected
    }
}
