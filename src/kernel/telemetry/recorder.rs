use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::time::Instant;
use uuid::Uuid;

use super::event::{SessionSummary, TelemetryEvent};
use super::metrics::{compute_snapshot, TelemetrySnapshot};

const MAX_EVENTS: usize = 10_000;

/// Keeps lifetime counters plus a bounded ring of the most recent events.
#[derive(Debug)]
pub struct TelemetryRecorder {
    buffer: VecDeque<TelemetryEvent>,
    totals: TelemetrySnapshot,
    session_id: Uuid,
    started: Instant,
}

impl TelemetryRecorder {
    pub fn new() -> Self {
        Self {
            buffer: VecDeque::with_capacity(MAX_EVENTS),
            totals: TelemetrySnapshot::default(),
            session_id: Uuid::new_v4(),
            started: Instant::now(),
        }
    }

    pub fn record(&mut self, event: TelemetryEvent) {
        self.totals.apply(&event);
        if self.buffer.len() >= MAX_EVENTS {
            self.buffer.pop_front();
        }
        self.buffer.push_back(event);
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Counters over the whole session, unaffected by ring eviction.
    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.totals.clone()
    }

    /// Counters over the events still held in the ring.
    pub fn recent_snapshot(&self) -> TelemetrySnapshot {
        compute_snapshot(&self.buffer)
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    pub fn aggregate_session(&self) -> SessionSummary {
        let snap = &self.totals;
        SessionSummary {
            session_id: self.session_id,
            uptime_secs: self.uptime_secs(),
            published: snap.publish_stats.published,
            failed: snap.publish_stats.failed,
            dropped_offline: snap.publish_stats.dropped_offline,
            commands: snap.command_stats.received,
            reconnects: snap.connection_stats.reconnects(),
        }
    }
}

impl Default for TelemetryRecorder {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloneable handle shared by the loop, the dispatcher and the heartbeat.
#[derive(Debug, Clone, Default)]
pub struct TelemetryHandle {
    inner: Arc<Mutex<TelemetryRecorder>>,
}

impl TelemetryHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: TelemetryEvent) {
        // A poisoned lock only means another thread panicked mid-record;
        // the ring itself is still usable.
        let mut recorder = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        recorder.record(event);
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.inner.lock().unwrap_or_else(|p| p.into_inner()).snapshot()
    }

    pub fn recent_snapshot(&self) -> TelemetrySnapshot {
        self.inner.lock().unwrap_or_else(|p| p.into_inner()).recent_snapshot()
    }

    pub fn uptime_secs(&self) -> u64 {
        self.inner.lock().unwrap_or_else(|p| p.into_inner()).uptime_secs()
    }

    pub fn aggregate_session(&self) -> SessionSummary {
        self.inner
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .aggregate_session()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::event::AttendanceAction;

    fn published(action: AttendanceAction) -> TelemetryEvent {
        TelemetryEvent::Published { action, known_badge: true }
    }

    #[test]
    fn ring_is_bounded() {
        let mut recorder = TelemetryRecorder::new();
        for _ in 0..MAX_EVENTS + 10 {
            recorder.record(TelemetryEvent::PublishFailed);
        }
        assert_eq!(recorder.len(), MAX_EVENTS);
    }

    #[test]
    fn summary_counts_reconnects() {
        let handle = TelemetryHandle::new();
        handle.record(TelemetryEvent::ConnectionChanged { connected: true });
        handle.record(published(AttendanceAction::CheckIn));
        handle.record(TelemetryEvent::ConnectionChanged { connected: false });
        handle.record(TelemetryEvent::ConnectionChanged { connected: true });
        handle.record(TelemetryEvent::DroppedOffline);

        let summary = handle.aggregate_session();
        assert_eq!(summary.published, 1);
        assert_eq!(summary.dropped_offline, 1);
        assert_eq!(summary.reconnects, 1);
    }

    #[test]
    fn totals_survive_ring_eviction() {
        let handle = TelemetryHandle::new();
        for _ in 0..12_000 {
            handle.record(published(AttendanceAction::CheckOut));
        }

        assert_eq!(handle.aggregate_session().published, 12_000);
        assert_eq!(handle.snapshot().publish_stats.check_outs, 12_000);
        assert_eq!(handle.recent_snapshot().publish_stats.published, MAX_EVENTS as u64);
    }

    #[test]
    fn heartbeats_do_not_erase_published_total() {
        let mut recorder = TelemetryRecorder::new();
        for _ in 0..5 {
            recorder.record(published(AttendanceAction::CheckIn));
        }
        recorder.record(TelemetryEvent::ConnectionChanged { connected: true });
        for _ in 0..MAX_EVENTS {
            recorder.record(TelemetryEvent::Heartbeat { delivered: true });
        }

        let summary = recorder.aggregate_session();
        assert_eq!(summary.published, 5);
        assert_eq!(summary.reconnects, 0);
        assert_eq!(recorder.snapshot().heartbeat_stats.sent, MAX_EVENTS as u64);
        let recent = recorder.recent_snapshot();
        assert_eq!(recent.publish_stats.published, 0);
        assert_eq!(recent.connection_stats.connects, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn uptime_follows_the_runtime_clock() {
        let recorder = TelemetryRecorder::new();
        tokio::time::advance(std::time::Duration::from_secs(90)).await;
        assert_eq!(recorder.uptime_secs(), 90);
    }
}
