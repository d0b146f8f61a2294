//! Device configuration, loadable from TOML.

use std::time::Duration;

use anyhow::Context;
use awsiot_mqtt::{MqttConfig, QoS, qos_from_level};
use serde::Deserialize;

/// Top-level configuration for the device runtime.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    /// MQTT connection settings. `mqtt.client_id` is the thing name.
    pub mqtt: MqttConfig,
    /// Topic to subscribe to and greet on. The device policy must allow it.
    #[serde(default = "default_topic")]
    pub topic: String,
    /// QoS level (0 or 1) for `topic`.
    #[serde(default = "default_qos")]
    pub qos: u8,
    /// Message published to `topic` once the subscription is acknowledged.
    #[serde(default = "default_greeting")]
    pub greeting: String,
    /// Fetch the shadow document right after connecting.
    #[serde(default = "default_shadow_get_on_connect")]
    pub shadow_get_on_connect: bool,
    /// Shadow report interval in seconds. 0 disables reporting.
    #[serde(default = "default_shadow_report_interval")]
    pub shadow_report_interval_secs: u64,
    /// Upper bound on a single network pump, in milliseconds. Must be non-zero.
    #[serde(default = "default_pump_timeout_ms")]
    pub pump_timeout_ms: u64,
}

fn default_topic() -> String {
    "sdk/test/rust".to_string()
}

fn default_qos() -> u8 {
    1
}

fn default_greeting() -> String {
    "Hello from AWS IoT Rust".to_string()
}

fn default_shadow_get_on_connect() -> bool {
    true
}

fn default_shadow_report_interval() -> u64 {
    60
}

fn default_pump_timeout_ms() -> u64 {
    1000
}

impl DeviceConfig {
    /// Load config from a TOML file path.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config '{path}'"))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.mqtt.validate()?;
        config.topic_qos()?;
        awsiot_protocol::validate_topic(&config.topic)?;
        anyhow::ensure!(config.pump_timeout_ms > 0, "pump_timeout_ms must be at least 1");
        Ok(config)
    }

    pub fn topic_qos(&self) -> anyhow::Result<QoS> {
        Ok(qos_from_level(self.qos)?)
    }

    pub fn shadow_report_interval(&self) -> Option<Duration> {
        (self.shadow_report_interval_secs > 0)
            .then(|| Duration::from_secs(self.shadow_report_interval_secs))
    }

    pub fn pump_timeout(&self) -> Duration {
        Duration::from_millis(self.pump_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_minimal_config() {
        let toml = r#"
[mqtt]
broker_host = "a1b2c3-ats.iot.us-east-1.amazonaws.com"
client_id = "mydevice"
client_cert_path = "/etc/awsiot/cert.pem"
client_key_path = "/etc/awsiot/key.pem"
ca_cert_path = "/etc/awsiot/AmazonRootCA1.pem"
"#;
        let config = DeviceConfig::from_toml(toml).unwrap();
        assert_eq!(config.mqtt.client_id, "mydevice");
        assert_eq!(config.mqtt.broker_port, 8883); // default
        assert_eq!(config.mqtt.keepalive_secs, 30); // default
        assert!(config.mqtt.use_tls);
        assert!(config.mqtt.clean_session);
        assert_eq!(config.topic, "sdk/test/rust");
        assert_eq!(config.topic_qos().unwrap(), QoS::AtLeastOnce);
        assert!(config.shadow_get_on_connect);
        assert_eq!(
            config.shadow_report_interval(),
            Some(Duration::from_secs(60))
        );
    }

    #[test]
    fn deserialize_full_config() {
        let toml = r#"
topic = "devices/telemetry"
qos = 0
greeting = "hi"
shadow_get_on_connect = false
shadow_report_interval_secs = 0
pump_timeout_ms = 250

[mqtt]
broker_host = "localhost"
broker_port = 1883
client_id = "sbc-042"
use_tls = false
keepalive_secs = 120
clean_session = false
event_capacity = 16
"#;
        let config = DeviceConfig::from_toml(toml).unwrap();
        assert_eq!(config.topic_qos().unwrap(), QoS::AtMostOnce);
        assert_eq!(config.greeting, "hi");
        assert!(!config.shadow_get_on_connect);
        assert!(config.shadow_report_interval().is_none());
        assert_eq!(config.pump_timeout(), Duration::from_millis(250));
        assert!(!config.mqtt.use_tls);
        assert_eq!(config.mqtt.keepalive_secs, 120);
        assert_eq!(config.mqtt.event_capacity, 16);
    }

    #[test]
    fn qos_two_rejected() {
        let toml = r#"
qos = 2

[mqtt]
broker_host = "localhost"
client_id = "mydevice"
"#;
        let err = DeviceConfig::from_toml(toml).unwrap_err();
        assert!(err.to_string().contains("QoS 2"), "{err}");
    }

    #[test]
    fn invalid_topic_rejected() {
        let toml = r#"
topic = "a/b/c/d/e/f/g/h/i"

[mqtt]
broker_host = "localhost"
client_id = "mydevice"
"#;
        assert!(DeviceConfig::from_toml(toml).is_err());
    }

    #[test]
    fn zero_pump_timeout_rejected() {
        let toml = r#"
pump_timeout_ms = 0

[mqtt]
broker_host = "localhost"
client_id = "mydevice"
"#;
        let err = DeviceConfig::from_toml(toml).unwrap_err();
        assert!(err.to_string().contains("pump_timeout_ms"), "{err}");
    }

    #[test]
    fn zero_event_capacity_rejected() {
        let toml = r#"
[mqtt]
broker_host = "localhost"
client_id = "mydevice"
event_capacity = 0
"#;
        let err = DeviceConfig::from_toml(toml).unwrap_err();
        assert!(err.to_string().contains("event_capacity"), "{err}");
    }

    #[test]
    fn missing_file_mentions_path() {
        let err = DeviceConfig::from_file("/nonexistent/device.toml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/device.toml"));
    }
}
