use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::event::{Heartbeat, HEARTBEAT_TOPIC};
use super::state::ConnectionState;
use super::telemetry::{TelemetryEvent, TelemetryHandle};
use super::time::Clock;
use crate::services::mqtt::BrokerLink;

pub struct HeartbeatTask<L> {
    pub device_id: String,
    pub link: Arc<L>,
    pub state: ConnectionState,
    pub clock: Arc<dyn Clock>,
    pub telemetry: TelemetryHandle,
}

impl<L: BrokerLink + 'static> HeartbeatTask<L> {
    pub fn spawn(self, every: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(every, cancel))
    }

    async fn run(self, every: Duration, cancel: CancellationToken) {
        let mut cadence = tokio::time::interval(every);
        cadence.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick fires immediately; the first beat goes out one period in.
        cadence.tick().await;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = cadence.tick() => {}
            }

            // Offline beats are skipped, not queued.
            if !self.state.is_connected() {
                continue;
            }
            self.beat().await;
        }
        debug!(device_id = %self.device_id, "Heartbeat stopped");
    }

    async fn beat(&self) {
        let heartbeat = Heartbeat::online(
            &self.device_id,
            self.clock.timestamp(),
            self.telemetry.uptime_secs(),
        );
        let payload = match serde_json::to_vec(&heartbeat) {
            Ok(p) => p,
            Err(e) => {
                warn!("Failed to encode heartbeat: {}", e);
                return;
            }
        };

        match self.link.publish(HEARTBEAT_TOPIC, payload).await {
            Ok(()) => {
                debug!(device_id = %self.device_id, "Heartbeat sent");
                self.telemetry
                    .record(TelemetryEvent::Heartbeat { delivered: true });
            }
            Err(e) => {
                warn!(device_id = %self.device_id, "Heartbeat failed: {}", e);
                self.telemetry
                    .record(TelemetryEvent::Heartbeat { delivered: false });
            }
        }
    }
}
