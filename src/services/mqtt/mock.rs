//! In-process broker stand-in. Records every network call the device makes
//! and lets the caller push notifications as if the messaging layer had
//! raised them.

use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{BrokerLink, BrokerSettings, Connection, Connector, TransportError};
use crate::kernel::event::BrokerEvent;

const NOTIFY_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkCall {
    Connect { client_id: String },
    Subscribe { topic: String },
    Publish { topic: String, payload: Vec<u8> },
    Disconnect,
}

#[derive(Debug, Default)]
struct MockState {
    calls: Vec<NetworkCall>,
    delivered: Vec<(String, Vec<u8>)>,
    refuse_connect: bool,
    fail_publish: bool,
    notifier: Option<mpsc::Sender<BrokerEvent>>,
}

#[derive(Debug, Clone, Default)]
pub struct MockBroker {
    inner: Arc<Mutex<MockState>>,
}

impl MockBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// A broker that turns every connect attempt down.
    pub fn refusing() -> Self {
        let broker = Self::new();
        broker.lock().refuse_connect = true;
        broker
    }

    pub fn connector(&self) -> MockConnector {
        MockConnector {
            broker: self.clone(),
        }
    }

    pub fn set_fail_publish(&self, fail: bool) {
        self.lock().fail_publish = fail;
    }

    pub fn calls(&self) -> Vec<NetworkCall> {
        self.lock().calls.clone()
    }

    pub fn network_calls(&self) -> usize {
        self.lock().calls.len()
    }

    /// Accepted publishes, in order.
    pub fn published(&self) -> Vec<(String, Vec<u8>)> {
        self.lock().delivered.clone()
    }

    pub fn published_on(&self, topic: &str) -> Vec<Vec<u8>> {
        self.lock()
            .delivered
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, p)| p.clone())
            .collect()
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                NetworkCall::Subscribe { topic } => Some(topic.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn is_session_open(&self) -> bool {
        self.lock().notifier.is_some()
    }

    /// Delivers a notification to the connected device. Returns false when
    /// no session is open.
    pub async fn notify(&self, event: BrokerEvent) -> bool {
        let sender = self.lock().notifier.clone();
        match sender {
            Some(tx) => tx.send(event).await.is_ok(),
            None => false,
        }
    }

    fn record(&self, call: NetworkCall) {
        self.lock().calls.push(call);
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[derive(Debug, Clone)]
pub struct MockConnector {
    broker: MockBroker,
}

#[async_trait]
impl Connector for MockConnector {
    type Link = MockLink;

    async fn connect(
        &self,
        client_id: &str,
        _settings: &BrokerSettings,
        _cancel: CancellationToken,
    ) -> Result<Connection<MockLink>, TransportError> {
        self.broker.record(NetworkCall::Connect {
            client_id: client_id.to_string(),
        });

        let mut state = self.broker.lock();
        if state.refuse_connect {
            return Err(TransportError::Refused("mock broker refused".to_string()));
        }

        let (tx, rx) = mpsc::channel(NOTIFY_CAPACITY);
        state.notifier = Some(tx);

        Ok(Connection {
            link: MockLink {
                broker: self.broker.clone(),
            },
            events: rx,
        })
    }
}

#[derive(Debug, Clone)]
pub struct MockLink {
    broker: MockBroker,
}

#[async_trait]
impl BrokerLink for MockLink {
    async fn subscribe(&self, topic: &str) -> Result<(), TransportError> {
        self.broker.record(NetworkCall::Subscribe {
            topic: topic.to_string(),
        });
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        self.broker.record(NetworkCall::Publish {
            topic: topic.to_string(),
            payload: payload.clone(),
        });

        let mut state = self.broker.lock();
        if state.fail_publish {
            return Err(TransportError::Rejected("mock broker rejected publish".to_string()));
        }
        state.delivered.push((topic.to_string(), payload));
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.broker.record(NetworkCall::Disconnect);

        // Dropping the sender closes the notification channel, the same way
        // the real event loop ends after a client-side disconnect.
        let sender = self.broker.lock().notifier.take();
        if let Some(tx) = sender {
            let _ = tx.send(BrokerEvent::disconnected("closed by client")).await;
        }
        Ok(())
    }
}
