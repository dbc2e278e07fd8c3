use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::kernel::event::AttendanceAction;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TelemetryEvent {
    Published { action: AttendanceAction, known_badge: bool },
    PublishFailed,
    /// Publish skipped because the device was offline.
    DroppedOffline,
    ConnectionChanged { connected: bool },
    CommandReceived,
    MalformedCommand,
    LoopError,
    Heartbeat { delivered: bool },
}

/// Emitted once, when the device shuts down.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub uptime_secs: u64,
    pub published: u64,
    pub failed: u64,
    pub dropped_offline: u64,
    pub commands: u64,
    pub reconnects: u64,
}
