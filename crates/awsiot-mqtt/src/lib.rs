//! AWS IoT Core client wrapper over an MQTT transport.
//!
//! Adds the AWS IoT conventions on top of a generic MQTT client:
//! - `Transport` trait for the wrapped client (mockable in tests)
//! - `RumqttTransport` backed by `rumqttc` with mTLS for production
//! - `MockTransport` for testing without a broker
//! - `AwsIotClient` with topic/QoS validation, typed callbacks and
//!   device shadow helpers
//! - `IncomingMessage` classification for shadow responses

pub mod callbacks;
pub mod client;
pub mod config;
pub mod error;
pub mod handler;
pub mod mock;
pub mod rumqtt;
pub mod shadows;
pub mod tls;
pub mod transport;

// Re-exports for convenience.
pub use callbacks::{CallbackContext, Callbacks};
pub use client::{AwsIotClient, ConnectionState};
pub use config::MqttConfig;
pub use error::{MqttError, MqttResult, TransportError, TransportResult};
pub use handler::{IncomingMessage, classify};
pub use mock::{MockCall, MockOp, MockTransport, PublishedMessage};
pub use rumqtt::RumqttTransport;
pub use rumqttc::QoS;
pub use transport::{Connack, DisconnectCause, Transport, TransportEvent, qos_from_level, qos_level};
