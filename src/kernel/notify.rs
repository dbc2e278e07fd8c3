use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::event::{BrokerEvent, COMMAND_TOPIC};
use super::state::ConnectionState;
use super::telemetry::{TelemetryEvent, TelemetryHandle};
use crate::error::DeviceError;
use crate::services::mqtt::BrokerLink;

/// Receives everything the messaging layer reports outside the simulation
/// loop. Only writes the connected flag; inbound commands are logged and
/// otherwise ignored.
pub struct NotificationHandler<L> {
    device_id: String,
    state: ConnectionState,
    telemetry: TelemetryHandle,
    link: Arc<L>,
}

impl<L: BrokerLink> NotificationHandler<L> {
    pub fn new(
        device_id: impl Into<String>,
        state: ConnectionState,
        telemetry: TelemetryHandle,
        link: Arc<L>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            state,
            telemetry,
            link,
        }
    }

    pub async fn handle(&self, event: BrokerEvent) {
        match event {
            BrokerEvent::Connected => self.on_connect().await,
            BrokerEvent::Disconnected { reason } => self.on_disconnect(&reason),
            BrokerEvent::Inbound { topic, payload } => {
                // Failures are logged inside; nothing else to do with them.
                let _ = self.on_inbound_message(&topic, &payload);
            }
        }
    }

    /// Marks the device online and (re)subscribes to the command topic.
    /// A redundant ack changes nothing.
    pub async fn on_connect(&self) {
        if !self.state.set(true) {
            debug!(device_id = %self.device_id, "Redundant connect notification ignored");
            return;
        }
        self.telemetry
            .record(TelemetryEvent::ConnectionChanged { connected: true });
        info!(device_id = %self.device_id, "Device connected to MQTT broker");

        if let Err(e) = self.link.subscribe(COMMAND_TOPIC).await {
            warn!(device_id = %self.device_id, topic = COMMAND_TOPIC, "Subscribe failed: {}", e);
        }
    }

    pub fn on_disconnect(&self, reason: &str) {
        if !self.state.set(false) {
            debug!(device_id = %self.device_id, "Redundant disconnect notification ignored");
            return;
        }
        self.telemetry
            .record(TelemetryEvent::ConnectionChanged { connected: false });
        warn!(device_id = %self.device_id, reason, "Device disconnected from MQTT broker");
    }

    pub fn on_inbound_message(
        &self,
        topic: &str,
        payload: &[u8],
    ) -> Result<serde_json::Value, DeviceError> {
        match inspect_command(payload) {
            Ok(command) => {
                self.telemetry.record(TelemetryEvent::CommandReceived);
                match command_name(&command) {
                    Some(name) => info!(topic, command = name, "Command received: {}", command),
                    None => info!(topic, "Command received: {}", command),
                }
                Ok(command)
            }
            Err(e) => {
                self.telemetry.record(TelemetryEvent::MalformedCommand);
                error!(topic, "Failed to process command: {}", e);
                Err(e)
            }
        }
    }
}

/// Decodes an inbound payload. Nothing is ever executed.
pub fn inspect_command(payload: &[u8]) -> Result<serde_json::Value, DeviceError> {
    serde_json::from_slice(payload).map_err(DeviceError::MalformedCommand)
}

/// The `command` (or `cmd`) field of a decoded command, if it is a string.
pub fn command_name(command: &serde_json::Value) -> Option<&str> {
    command
        .get("command")
        .or_else(|| command.get("cmd"))
        .and_then(|v| v.as_str())
}

/// Feeds notifications to `handler` in arrival order until the channel
/// closes or `cancel` fires.
pub async fn dispatch<L: BrokerLink>(
    handler: NotificationHandler<L>,
    mut events: mpsc::Receiver<BrokerEvent>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            next = events.recv() => match next {
                Some(event) => handler.handle(event).await,
                None => break,
            }
        }
    }
    debug!(device_id = %handler.device_id, "Notification dispatcher stopped");
}
