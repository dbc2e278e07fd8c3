use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::kernel::event::DEFAULT_LOCATION;
use crate::kernel::sampler::SamplingPolicy;
use crate::services::mqtt::BrokerSettings;

pub const ENV_DEVICE_ID: &str = "PONTUAL_DEVICE_ID";
pub const ENV_MQTT_HOST: &str = "PONTUAL_MQTT_HOST";
pub const ENV_MQTT_PORT: &str = "PONTUAL_MQTT_PORT";
pub const ENV_MQTT_KEEPALIVE: &str = "PONTUAL_MQTT_KEEPALIVE_SECS";
pub const ENV_HEARTBEAT: &str = "PONTUAL_HEARTBEAT_SECS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// `None` means a random `DEVICE_nnn` id is generated at startup.
    pub device_id: Option<String>,
    pub broker: BrokerSettings,
    pub location: String,
    pub sampling: SamplingPolicy,
    pub error_pause_secs: u64,
    pub startup_delay_secs: u64,
    /// 0 disables the heartbeat.
    pub heartbeat_secs: u64,
    pub shutdown_grace_secs: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            device_id: None,
            broker: BrokerSettings::default(),
            location: DEFAULT_LOCATION.to_string(),
            sampling: SamplingPolicy::default(),
            error_pause_secs: 5,
            startup_delay_secs: 2,
            heartbeat_secs: 30,
            shutdown_grace_secs: 2,
        }
    }
}

impl DeviceConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Overrides fields from `lookup`. Unparseable values keep the default.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(id) = lookup(ENV_DEVICE_ID).filter(|s| !s.trim().is_empty()) {
            self.device_id = Some(id.trim().to_string());
        }
        if let Some(host) = lookup(ENV_MQTT_HOST).filter(|s| !s.trim().is_empty()) {
            self.broker.host = host.trim().to_string();
        }
        override_parsed(&lookup, ENV_MQTT_PORT, &mut self.broker.port);
        override_parsed(&lookup, ENV_MQTT_KEEPALIVE, &mut self.broker.keep_alive_secs);
        override_parsed(&lookup, ENV_HEARTBEAT, &mut self.heartbeat_secs);
    }

    pub fn error_pause(&self) -> Duration {
        Duration::from_secs(self.error_pause_secs)
    }

    pub fn startup_delay(&self) -> Duration {
        Duration::from_secs(self.startup_delay_secs)
    }

    pub fn heartbeat_interval(&self) -> Option<Duration> {
        (self.heartbeat_secs > 0).then(|| Duration::from_secs(self.heartbeat_secs))
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

fn override_parsed<F, T>(lookup: &F, key: &str, slot: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + std::fmt::Display,
{
    let Some(raw) = lookup(key) else { return };
    match raw.trim().parse::<T>() {
        Ok(value) => *slot = value,
        Err(_) => warn!("Ignoring {}={:?}, keeping {}", key, raw, slot),
    }
}
