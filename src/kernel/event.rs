use serde::{Deserialize, Serialize};
use std::fmt;

/// Outbound topic for attendance readings.
pub const ATTENDANCE_TOPIC: &str = "pontualiot/attendance";
/// Inbound topic the device listens on. Observation only.
pub const COMMAND_TOPIC: &str = "pontualiot/commands";
/// Liveness topic.
pub const HEARTBEAT_TOPIC: &str = "pontualiot/heartbeat";

pub const DEFAULT_LOCATION: &str = "Entrada Principal";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttendanceAction {
    CheckIn,
    CheckOut,
}

impl AttendanceAction {
    pub const ALL: [AttendanceAction; 2] = [AttendanceAction::CheckIn, AttendanceAction::CheckOut];

    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceAction::CheckIn => "CHECK_IN",
            AttendanceAction::CheckOut => "CHECK_OUT",
        }
    }
}

impl fmt::Display for AttendanceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One-shot attendance reading. Built right before it is published and
/// never kept afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceEvent {
    pub rfid_tag: String,
    pub action: AttendanceAction,
    pub timestamp: String,
    pub device_id: String,
    pub location: String,
}

impl AttendanceEvent {
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Heartbeat {
    pub device_id: String,
    pub status: String,
    pub timestamp: String,
    pub uptime_secs: u64,
}

impl Heartbeat {
    pub fn online(device_id: &str, timestamp: String, uptime_secs: u64) -> Self {
        Self {
            device_id: device_id.to_string(),
            status: "online".to_string(),
            timestamp,
            uptime_secs,
        }
    }
}

/// Notifications raised by the messaging layer, outside the simulation loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerEvent {
    /// Connection acknowledged (initial connect or automatic reconnect).
    Connected,
    /// Connection lost or closed.
    Disconnected { reason: String },
    /// Message arrived on a subscribed topic.
    Inbound { topic: String, payload: Vec<u8> },
}

impl BrokerEvent {
    pub fn inbound(topic: &str, payload: impl Into<Vec<u8>>) -> Self {
        BrokerEvent::Inbound {
            topic: topic.to_string(),
            payload: payload.into(),
        }
    }

    pub fn disconnected(reason: impl Into<String>) -> Self {
        BrokerEvent::Disconnected { reason: reason.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_serializes_as_wire_name() {
        assert_eq!(serde_json::to_string(&AttendanceAction::CheckIn).unwrap(), "\"CHECK_IN\"");
        assert_eq!(serde_json::to_string(&AttendanceAction::CheckOut).unwrap(), "\"CHECK_OUT\"");
        assert_eq!(AttendanceAction::CheckOut.to_string(), "CHECK_OUT");
    }

    #[test]
    fn event_uses_camel_case_fields() {
        let event = AttendanceEvent {
            rfid_tag: "RFID001".into(),
            action: AttendanceAction::CheckIn,
            timestamp: "2025-01-01T08:00:00.000000".into(),
            device_id: "DEVICE_123".into(),
            location: DEFAULT_LOCATION.into(),
        };
        let value: serde_json::Value = serde_json::from_slice(&event.to_json().unwrap()).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.len(), 5);
        for key in ["rfidTag", "action", "timestamp", "deviceId", "location"] {
            assert!(obj.contains_key(key), "missing {key}");
        }
    }

    #[test]
    fn heartbeat_is_online() {
        let hb = Heartbeat::online("DEVICE_1", "t".into(), 30);
        let value = serde_json::to_value(&hb).unwrap();
        assert_eq!(value["status"], "online");
        assert_eq!(value["uptimeSecs"], 30);
    }
}
