use awsiot_protocol::{validate_client_id, validate_keep_alive};
use serde::Deserialize;

use crate::error::{MqttError, MqttResult};

/// MQTT connection configuration, loadable from TOML or environment.
#[derive(Debug, Clone, Deserialize)]
pub struct MqttConfig {
    /// AWS IoT endpoint (e.g., `abc123-ats.iot.us-east-1.amazonaws.com`).
    pub broker_host: String,
    /// MQTT broker port (default 8883 for TLS).
    #[serde(default = "default_port")]
    pub broker_port: u16,
    /// MQTT client ID. AWS IoT uses it as the thing name for shadow topics.
    pub client_id: String,
    /// Enable TLS (mTLS). When false, connects plaintext (local dev).
    #[serde(default = "default_use_tls")]
    pub use_tls: bool,
    /// Path to device X.509 certificate (PEM).
    #[serde(default)]
    pub client_cert_path: String,
    /// Path to device private key (PEM).
    #[serde(default)]
    pub client_key_path: String,
    /// Path to CA certificate (e.g., AmazonRootCA1.pem).
    #[serde(default)]
    pub ca_cert_path: String,
    /// Keep-alive interval in seconds. AWS IoT accepts 30..=1200.
    #[serde(default = "default_keepalive")]
    pub keepalive_secs: u16,
    /// Start a clean session on connect.
    #[serde(default = "default_clean_session")]
    pub clean_session: bool,
    /// Capacity of the request channel between client and event loop.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_use_tls() -> bool {
    true
}

fn default_port() -> u16 {
    8883
}

fn default_keepalive() -> u16 {
    awsiot_protocol::DEFAULT_KEEP_ALIVE_SECS
}

fn default_clean_session() -> bool {
    true
}

fn default_event_capacity() -> usize {
    64
}

impl MqttConfig {
    /// Check the values serde cannot: thing name, keep-alive range and a
    /// non-zero request channel.
    pub fn validate(&self) -> MqttResult<()> {
        validate_client_id(&self.client_id)?;
        validate_keep_alive(self.keepalive_secs)?;
        if self.event_capacity == 0 {
            return Err(MqttError::Config(
                "event_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
