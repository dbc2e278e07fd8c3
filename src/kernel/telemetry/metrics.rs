use std::collections::VecDeque;

use super::event::TelemetryEvent;
use crate::kernel::event::AttendanceAction;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TelemetrySnapshot {
    pub publish_stats: PublishStats,
    pub connection_stats: ConnectionStats,
    pub command_stats: CommandStats,
    pub heartbeat_stats: HeartbeatStats,
    pub loop_errors: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishStats {
    pub published: u64,
    pub check_ins: u64,
    pub check_outs: u64,
    pub unknown_badges: u64,
    pub failed: u64,
    pub dropped_offline: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionStats {
    pub connects: u64,
    pub disconnects: u64,
}

impl ConnectionStats {
    /// Every connect after the first one.
    pub fn reconnects(&self) -> u64 {
        self.connects.saturating_sub(1)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandStats {
    pub received: u64,
    pub malformed: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeartbeatStats {
    pub sent: u64,
    pub failed: u64,
}

impl TelemetrySnapshot {
    /// Folds one event into the counters.
    pub fn apply(&mut self, event: &TelemetryEvent) {
        match event {
            TelemetryEvent::Published { action, known_badge } => {
                self.publish_stats.published += 1;
                match action {
                    AttendanceAction::CheckIn => self.publish_stats.check_ins += 1,
                    AttendanceAction::CheckOut => self.publish_stats.check_outs += 1,
                }
                if !known_badge {
                    self.publish_stats.unknown_badges += 1;
                }
            }
            TelemetryEvent::PublishFailed => self.publish_stats.failed += 1,
            TelemetryEvent::DroppedOffline => self.publish_stats.dropped_offline += 1,
            TelemetryEvent::ConnectionChanged { connected: true } => {
                self.connection_stats.connects += 1
            }
            TelemetryEvent::ConnectionChanged { connected: false } => {
                self.connection_stats.disconnects += 1
            }
            TelemetryEvent::CommandReceived => self.command_stats.received += 1,
            TelemetryEvent::MalformedCommand => self.command_stats.malformed += 1,
            TelemetryEvent::LoopError => self.loop_errors += 1,
            TelemetryEvent::Heartbeat { delivered: true } => self.heartbeat_stats.sent += 1,
            TelemetryEvent::Heartbeat { delivered: false } => self.heartbeat_stats.failed += 1,
        }
    }
}

pub fn compute_snapshot(events: &VecDeque<TelemetryEvent>) -> TelemetrySnapshot {
    let mut snap = TelemetrySnapshot::default();
    for event in events {
        snap.apply(event);
    }
    snap
}
