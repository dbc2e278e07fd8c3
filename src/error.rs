use thiserror::Error;

use crate::services::mqtt::TransportError;

/// Failure modes of the simulated device.
///
/// None of these are fatal to the process: the simulation loop logs
/// them and keeps going.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// Broker unreachable or handshake refused at connect time.
    #[error("could not connect to broker {host}:{port}")]
    Connection {
        host: String,
        port: u16,
        #[source]
        source: TransportError,
    },

    /// Publish attempted while the connected flag is false.
    #[error("device is not connected to the broker")]
    NotConnected,

    /// The messaging layer rejected the publish request.
    #[error("publish to '{topic}' failed")]
    Publish {
        topic: String,
        #[source]
        source: TransportError,
    },

    /// Inbound command payload is not JSON.
    #[error("malformed command payload: {0}")]
    MalformedCommand(#[source] serde_json::Error),

    #[error("badge registry is empty, nothing to simulate")]
    EmptyRegistry,

    #[error("badge id must not be empty")]
    EmptyBadge,

    #[error("failed to encode payload: {0}")]
    Encode(#[source] serde_json::Error),
}

impl DeviceError {
    /// Errors raised on the publish path are logged where they happen and
    /// never pause the simulation loop.
    pub fn is_publish_path(&self) -> bool {
        matches!(self, DeviceError::NotConnected | DeviceError::Publish { .. })
    }
}
