use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::event::{AttendanceAction, AttendanceEvent, ATTENDANCE_TOPIC, DEFAULT_LOCATION};
use super::heartbeat::HeartbeatTask;
use super::notify::{dispatch, NotificationHandler};
use super::registry::BadgeRegistry;
use super::sampler::{RandomSource, SamplingPolicy, ThreadRandom};
use super::state::ConnectionState;
use super::telemetry::{SessionSummary, TelemetryEvent, TelemetryHandle, TelemetrySnapshot};
use super::time::{to_seconds, Clock, SystemClock};
use crate::config::DeviceConfig;
use crate::error::DeviceError;
use crate::services::mqtt::{BrokerLink, BrokerSettings, Connection, Connector};

const DEFAULT_ERROR_PAUSE: Duration = Duration::from_secs(5);
const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// What a successful publish produced, plus the line it was logged as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedEvent {
    pub event: AttendanceEvent,
    pub display_name: String,
    pub log_line: String,
}

/// `CHECK_IN: João Silva (RFID001) at 2025-10-29T07:58:01`
pub fn attendance_line(
    action: AttendanceAction,
    name: &str,
    badge_id: &str,
    timestamp: &str,
) -> String {
    format!("{}: {} ({}) at {}", action, name, badge_id, to_seconds(timestamp))
}

/// A single attendance terminal: one broker session, one simulation loop.
pub struct SimulatedDevice<C: Connector> {
    device_id: String,
    location: String,
    settings: BrokerSettings,
    connector: C,
    registry: Arc<BadgeRegistry>,
    state: ConnectionState,
    clock: Arc<dyn Clock>,
    random: Box<dyn RandomSource>,
    policy: SamplingPolicy,
    error_pause: Duration,
    shutdown_grace: Duration,
    heartbeat_interval: Option<Duration>,
    telemetry: TelemetryHandle,

    link: Option<Arc<C::Link>>,
    dispatcher: Option<JoinHandle<()>>,
    heartbeat: Option<JoinHandle<()>>,
    background: CancellationToken,
}

impl<C: Connector> SimulatedDevice<C> {
    /// Never fails; nothing touches the network until [`connect`](Self::connect).
    pub fn new(device_id: impl Into<String>, settings: BrokerSettings, connector: C) -> Self {
        Self {
            device_id: device_id.into(),
            location: DEFAULT_LOCATION.to_string(),
            settings,
            connector,
            registry: Arc::new(BadgeRegistry::demo()),
            state: ConnectionState::new(),
            clock: Arc::new(SystemClock),
            random: Box::new(ThreadRandom::new()),
            policy: SamplingPolicy::default(),
            error_pause: DEFAULT_ERROR_PAUSE,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            heartbeat_interval: None,
            telemetry: TelemetryHandle::new(),
            link: None,
            dispatcher: None,
            heartbeat: None,
            background: CancellationToken::new(),
        }
    }

    pub fn from_config(device_id: impl Into<String>, config: &DeviceConfig, connector: C) -> Self {
        let mut device = Self::new(device_id, config.broker.clone(), connector)
            .with_policy(config.sampling)
            .with_error_pause(config.error_pause())
            .with_shutdown_grace(config.shutdown_grace())
            .with_heartbeat(config.heartbeat_interval());
        device.location = config.location.clone();
        device
    }

    pub fn with_registry(mut self, registry: BadgeRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn with_random(mut self, random: impl RandomSource + 'static) -> Self {
        self.random = Box::new(random);
        self
    }

    pub fn with_policy(mut self, policy: SamplingPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_error_pause(mut self, pause: Duration) -> Self {
        self.error_pause = pause;
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub fn with_heartbeat(mut self, every: Option<Duration>) -> Self {
        self.heartbeat_interval = every;
        self
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn registry(&self) -> &BadgeRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &BrokerSettings {
        &self.settings
    }

    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    /// Handle on the connected flag, e.g. for observers.
    pub fn connection_state(&self) -> ConnectionState {
        self.state.clone()
    }

    pub fn telemetry(&self) -> TelemetrySnapshot {
        self.telemetry.snapshot()
    }

    /// Counters over the most recent activity only.
    pub fn recent_activity(&self) -> TelemetrySnapshot {
        self.telemetry.recent_snapshot()
    }

    pub fn session_summary(&self) -> SessionSummary {
        self.telemetry.aggregate_session()
    }

    /// Logs who this terminal is and which badges it knows.
    pub fn announce(&self) {
        info!(device_id = %self.device_id, "PontualIoT simulated attendance terminal");
        info!("MQTT broker: {}", self.settings.address());
        info!("Location: {}", self.location);
        for (badge, name) in self.registry.iter() {
            info!("Registered badge {}: {}", badge, name);
        }
    }

    /// One attempt, no retry. On success the device is marked connected,
    /// subscribed to the command topic, and background delivery is running.
    pub async fn connect(&mut self) -> Result<(), DeviceError> {
        if self.link.is_some() {
            debug!(device_id = %self.device_id, "Already connected");
            return Ok(());
        }

        // Fresh token: a previous shutdown cancelled the old one.
        self.background = CancellationToken::new();

        let connection = self
            .connector
            .connect(&self.device_id, &self.settings, self.background.child_token())
            .await;

        let Connection { link, events } = match connection {
            Ok(c) => c,
            Err(source) => {
                self.state.set(false);
                error!(
                    device_id = %self.device_id,
                    "Error connecting to {}: {}",
                    self.settings.address(),
                    source
                );
                return Err(DeviceError::Connection {
                    host: self.settings.host.clone(),
                    port: self.settings.port,
                    source,
                });
            }
        };

        let link = Arc::new(link);
        let handler = NotificationHandler::new(
            self.device_id.clone(),
            self.state.clone(),
            self.telemetry.clone(),
            link.clone(),
        );

        // The connector already waited for the ack; apply it before anything
        // the broker sends afterwards.
        handler.on_connect().await;
        self.dispatcher = Some(tokio::spawn(dispatch(
            handler,
            events,
            self.background.child_token(),
        )));

        if let Some(every) = self.heartbeat_interval {
            let task = HeartbeatTask {
                device_id: self.device_id.clone(),
                link: link.clone(),
                state: self.state.clone(),
                clock: self.clock.clone(),
                telemetry: self.telemetry.clone(),
            };
            self.heartbeat = Some(task.spawn(every, self.background.child_token()));
        }

        self.link = Some(link);
        Ok(())
    }

    /// Publishes one attendance reading to `pontualiot/attendance`.
    ///
    /// Fails fast with [`DeviceError::NotConnected`] while offline, without
    /// touching the network. The event is dropped on any failure.
    pub async fn publish_event(
        &self,
        badge_id: &str,
        action: AttendanceAction,
    ) -> Result<PublishedEvent, DeviceError> {
        let link = match &self.link {
            Some(link) if self.state.is_connected() => link,
            _ => {
                warn!(
                    device_id = %self.device_id,
                    rfid_tag = badge_id,
                    "Device not connected to MQTT, event dropped"
                );
                self.telemetry.record(TelemetryEvent::DroppedOffline);
                return Err(DeviceError::NotConnected);
            }
        };

        if badge_id.is_empty() {
            return Err(DeviceError::EmptyBadge);
        }

        let event = AttendanceEvent {
            rfid_tag: badge_id.to_string(),
            action,
            timestamp: self.clock.timestamp(),
            device_id: self.device_id.clone(),
            location: self.location.clone(),
        };
        let payload = event.to_json().map_err(DeviceError::Encode)?;

        match link.publish(ATTENDANCE_TOPIC, payload).await {
            Ok(()) => {
                let display_name = self.registry.display_name(badge_id).to_string();
                let log_line = attendance_line(action, &display_name, badge_id, &event.timestamp);
                info!(
                    device_id = %self.device_id,
                    rfid_tag = badge_id,
                    action = %action,
                    "{}",
                    log_line
                );
                self.telemetry.record(TelemetryEvent::Published {
                    action,
                    known_badge: self.registry.contains(badge_id),
                });
                Ok(PublishedEvent {
                    event,
                    display_name,
                    log_line,
                })
            }
            Err(source) => {
                error!(
                    device_id = %self.device_id,
                    rfid_tag = badge_id,
                    "Failed to send attendance: {}",
                    source
                );
                self.telemetry.record(TelemetryEvent::PublishFailed);
                Err(DeviceError::Publish {
                    topic: ATTENDANCE_TOPIC.to_string(),
                    source,
                })
            }
        }
    }

    /// One loop iteration after the pause: a random badge scan if online,
    /// a waiting notice otherwise.
    pub async fn simulate_scan(&mut self) -> Result<Option<PublishedEvent>, DeviceError> {
        if !self.state.is_connected() {
            info!(device_id = %self.device_id, "Waiting for MQTT connection...");
            return Ok(None);
        }
        if self.registry.is_empty() {
            return Err(DeviceError::EmptyRegistry);
        }

        let index = self.random.pick_index(self.registry.len());
        let badge = self
            .registry
            .badge_at(index)
            .ok_or(DeviceError::EmptyRegistry)?
            .to_string();
        let action = AttendanceAction::ALL
            .get(self.random.pick_index(AttendanceAction::ALL.len()))
            .copied()
            .unwrap_or(AttendanceAction::CheckIn);

        self.publish_event(&badge, action).await.map(Some)
    }

    /// Sleeps a random 5..=15 s, scans, repeats, until `cancel` fires.
    ///
    /// Publish failures are already logged by [`publish_event`](Self::publish_event)
    /// and the loop moves on. Anything else pauses the loop for the error
    /// pause before resuming.
    pub async fn run_simulation(&mut self, cancel: &CancellationToken) {
        info!(device_id = %self.device_id, "Waiting for RFID badges...");

        loop {
            let pause = self.policy.next_interval(self.random.as_mut());
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = sleep(pause) => {}
            }

            match self.simulate_scan().await {
                Ok(_) => {}
                Err(e) if e.is_publish_path() => {}
                Err(e) => {
                    error!(device_id = %self.device_id, "Simulation error: {}", e);
                    self.telemetry.record(TelemetryEvent::LoopError);
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        _ = sleep(self.error_pause) => {}
                    }
                }
            }
        }

        info!(device_id = %self.device_id, "Simulation interrupted");
    }

    /// Disconnects and stops background work. Safe to call at any time, any
    /// number of times. Returns the session summary when a live session was
    /// actually torn down.
    pub async fn shutdown(&mut self) -> Option<SessionSummary> {
        let link = self.link.take();
        let had_session = link.is_some() || self.dispatcher.is_some();

        if let Some(link) = link {
            match tokio::time::timeout(self.shutdown_grace, link.disconnect()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(device_id = %self.device_id, "Disconnect failed: {}", e),
                Err(_) => warn!(device_id = %self.device_id, "Disconnect timed out"),
            }
        }

        // Let the dispatcher apply the final disconnect notification.
        if let Some(mut dispatcher) = self.dispatcher.take() {
            if tokio::time::timeout(self.shutdown_grace, &mut dispatcher).await.is_err() {
                dispatcher.abort();
            }
        }

        self.background.cancel();
        if let Some(heartbeat) = self.heartbeat.take() {
            let _ = heartbeat.await;
        }

        if self.state.set(false) {
            self.telemetry
                .record(TelemetryEvent::ConnectionChanged { connected: false });
        }

        if !had_session {
            return None;
        }

        let summary = self.telemetry.aggregate_session();
        info!(
            device_id = %self.device_id,
            session_id = %summary.session_id,
            published = summary.published,
            failed = summary.failed,
            "Device disconnected, {} events published",
            summary.published
        );
        Some(summary)
    }
}
