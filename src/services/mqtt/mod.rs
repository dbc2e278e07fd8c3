//! Messaging layer seam.
//!
//! The device only ever talks to a [`BrokerLink`] obtained from a
//! [`Connector`]. Notifications (connect ack, disconnect, inbound messages)
//! come back on a channel rather than through callbacks, so the core can be
//! driven without a network stack.

pub mod client;
pub mod mock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::kernel::event::BrokerEvent;

pub use client::{MqttConnector, MqttLink};
pub use mock::{MockBroker, MockConnector, MockLink, NetworkCall};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("broker refused the connection: {0}")]
    Refused(String),

    #[error("no answer from broker within {0:?}")]
    Timeout(Duration),

    #[error("request rejected by client: {0}")]
    Request(#[from] rumqttc::ClientError),

    #[error("broker rejected the message: {0}")]
    Rejected(String),

    #[error("connection is closed")]
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerSettings {
    pub host: String,
    pub port: u16,
    pub keep_alive_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            keep_alive_secs: 60,
            connect_timeout_secs: 10,
        }
    }
}

impl BrokerSettings {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// An established broker session.
#[async_trait]
pub trait BrokerLink: Send + Sync {
    async fn subscribe(&self, topic: &str) -> Result<(), TransportError>;

    /// Fire and forget. `Ok` means the messaging layer accepted the request,
    /// not that anyone received it.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError>;

    async fn disconnect(&self) -> Result<(), TransportError>;
}

pub struct Connection<L> {
    pub link: L,
    pub events: mpsc::Receiver<BrokerEvent>,
}

#[async_trait]
pub trait Connector: Send + Sync {
    type Link: BrokerLink + 'static;

    /// Resolves once the broker acknowledged the session. Background work
    /// started here must stop when `cancel` fires.
    async fn connect(
        &self,
        client_id: &str,
        settings: &BrokerSettings,
        cancel: CancellationToken,
    ) -> Result<Connection<Self::Link>, TransportError>;
}
