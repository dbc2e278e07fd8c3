use async_trait::async_trait;
use rumqttc::{
    AsyncClient, ConnectReturnCode, ConnectionError, Event, EventLoop, MqttOptions, Outgoing,
    Packet, QoS,
};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{BrokerLink, BrokerSettings, Connection, Connector, TransportError};
use crate::kernel::event::BrokerEvent;

const REQUEST_CAPACITY: usize = 10;
const NOTIFY_CAPACITY: usize = 64;
/// Pause between polls after a connection error; the event loop reconnects
/// on the next poll.
const RECONNECT_PAUSE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct MqttConnector {
    request_capacity: usize,
}

impl Default for MqttConnector {
    fn default() -> Self {
        Self {
            request_capacity: REQUEST_CAPACITY,
        }
    }
}

impl MqttConnector {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Connector for MqttConnector {
    type Link = MqttLink;

    async fn connect(
        &self,
        client_id: &str,
        settings: &BrokerSettings,
        cancel: CancellationToken,
    ) -> Result<Connection<MqttLink>, TransportError> {
        let mut opts = MqttOptions::new(client_id, settings.host.clone(), settings.port);
        opts.set_keep_alive(settings.keep_alive());
        opts.set_clean_session(true);

        let (client, mut event_loop) = AsyncClient::new(opts, self.request_capacity);

        let timeout = settings.connect_timeout();
        match tokio::time::timeout(timeout, wait_for_connack(&mut event_loop)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(TransportError::Timeout(timeout)),
        }

        let (tx, rx) = mpsc::channel(NOTIFY_CAPACITY);
        tokio::spawn(drive_event_loop(event_loop, tx, cancel));

        Ok(Connection {
            link: MqttLink { client },
            events: rx,
        })
    }
}

async fn wait_for_connack(event_loop: &mut EventLoop) -> Result<(), TransportError> {
    loop {
        if let Some(outcome) = handshake_outcome(event_loop.poll().await) {
            return outcome;
        }
    }
}

/// `None` until the poll settles the handshake one way or the other.
fn handshake_outcome(
    polled: Result<Event, ConnectionError>,
) -> Option<Result<(), TransportError>> {
    match polled {
        Ok(Event::Incoming(Packet::ConnAck(ack))) if ack.code == ConnectReturnCode::Success => {
            Some(Ok(()))
        }
        Ok(Event::Incoming(Packet::ConnAck(ack))) => {
            Some(Err(TransportError::Refused(format!("{:?}", ack.code))))
        }
        Ok(_) => None,
        Err(ConnectionError::ConnectionRefused(code)) => {
            Some(Err(TransportError::Refused(format!("{:?}", code))))
        }
        Err(e) => Some(Err(TransportError::Connect(e.to_string()))),
    }
}

/// What one poll means for the driver.
#[derive(Debug, PartialEq)]
enum Step {
    Notify(BrokerEvent),
    Idle,
    /// Connection error. Carries the loss notification only on the first
    /// error after being online.
    Lost(Option<BrokerEvent>),
    /// Client-side disconnect: last notification, then stop.
    Stop(BrokerEvent),
}

fn classify(online: &mut bool, polled: Result<Event, ConnectionError>) -> Step {
    match polled {
        Ok(Event::Incoming(Packet::ConnAck(ack))) if ack.code == ConnectReturnCode::Success => {
            *online = true;
            Step::Notify(BrokerEvent::Connected)
        }
        Ok(Event::Incoming(Packet::Publish(p))) => {
            Step::Notify(BrokerEvent::inbound(&p.topic, p.payload.to_vec()))
        }
        Ok(Event::Outgoing(Outgoing::Disconnect)) => {
            *online = false;
            Step::Stop(BrokerEvent::disconnected("closed by client"))
        }
        Ok(_) => Step::Idle,
        Err(e) => {
            warn!("MQTT poll error: {}", e);
            let lost = online.then(|| BrokerEvent::disconnected(e.to_string()));
            *online = false;
            Step::Lost(lost)
        }
    }
}

/// Keeps the client's network I/O going and turns what it sees into
/// [`BrokerEvent`]s. Exits on cancellation, on a client-side disconnect, or
/// when nobody listens any more.
async fn drive_event_loop(
    mut event_loop: EventLoop,
    tx: mpsc::Sender<BrokerEvent>,
    cancel: CancellationToken,
) {
    let mut online = true;

    loop {
        let step = tokio::select! {
            _ = cancel.cancelled() => break,
            polled = event_loop.poll() => classify(&mut online, polled),
        };

        match step {
            Step::Notify(event) => {
                if tx.send(event).await.is_err() {
                    break;
                }
            }
            Step::Idle => {}
            Step::Stop(event) => {
                let _ = tx.send(event).await;
                break;
            }
            Step::Lost(lost) => {
                if let Some(event) = lost {
                    if tx.send(event).await.is_err() {
                        break;
                    }
                }
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(RECONNECT_PAUSE) => {}
                }
            }
        }
    }

    debug!("MQTT event loop stopped");
}

pub struct MqttLink {
    client: AsyncClient,
}

#[async_trait]
impl BrokerLink for MqttLink {
    /// Called from the dispatcher while the event loop may itself be
    /// waiting on the dispatcher, so this never waits for request capacity.
    async fn subscribe(&self, topic: &str) -> Result<(), TransportError> {
        self.client.try_subscribe(topic, QoS::AtMostOnce)?;
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        self.client
            .publish(topic, QoS::AtMostOnce, false, payload)
            .await?;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.client.disconnect().await?;
        Ok(())
    }
}
