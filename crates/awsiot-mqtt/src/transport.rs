//! Abstraction over the wrapped MQTT client.
//!
//! `Transport` is the capability set the AWS IoT wrapper needs from an
//! MQTT client. Two impls:
//! - `RumqttTransport`: `rumqttc` async client and event loop (in `rumqtt.rs`)
//! - `MockTransport`: records calls and replays scripted events (in `mock.rs`)

use std::time::Duration;

use async_trait::async_trait;
use awsiot_protocol::{ValidationResult, validate_qos};
use rumqttc::{ConnectReturnCode, QoS};

use crate::error::TransportResult;

/// Broker acknowledgement of a CONNECT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connack {
    pub session_present: bool,
    pub code: ConnectReturnCode,
}

impl Connack {
    pub fn accepted(session_present: bool) -> Self {
        Self {
            session_present,
            code: ConnectReturnCode::Success,
        }
    }
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectCause {
    /// The client asked to disconnect.
    Requested,
    /// The broker sent DISCONNECT.
    Broker,
}

/// An event surfaced by one poll of the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Connected(Connack),
    Disconnected(DisconnectCause),
    Message { topic: String, payload: Vec<u8> },
    /// SUBACK for `topic`; `granted` is `None` when the broker refused it.
    Subscribed { topic: String, granted: Option<QoS> },
    Unsubscribed { topic: String, pkid: u16 },
}

/// Capabilities the AWS IoT wrapper needs from an MQTT client.
#[async_trait]
pub trait Transport: Send {
    /// Client identifier the transport connects with.
    fn client_id(&self) -> &str;

    /// Applies to the next (re)connect.
    fn set_keep_alive(&mut self, keep_alive: Duration);

    async fn connect(&mut self, clean_session: bool) -> TransportResult<Connack>;

    async fn disconnect(&mut self) -> TransportResult<()>;

    /// Drop the current network connection and open a new one.
    async fn reconnect(&mut self) -> TransportResult<Connack>;

    async fn subscribe(&mut self, filter: &str, qos: QoS) -> TransportResult<()>;

    async fn unsubscribe(&mut self, filter: &str) -> TransportResult<()>;

    async fn publish(&mut self, topic: &str, payload: &[u8], qos: QoS) -> TransportResult<()>;

    /// Process pending network traffic once.
    ///
    /// Returns `None` when the traffic produced nothing the wrapper
    /// dispatches (pings, acks for publishes, ...).
    async fn poll(&mut self) -> TransportResult<Option<TransportEvent>>;
}

/// Numeric MQTT level of a `QoS`.
pub fn qos_level(qos: QoS) -> u8 {
    match qos {
        QoS::AtMostOnce => 0,
        QoS::AtLeastOnce => 1,
        QoS::ExactlyOnce => 2,
    }
}

/// Map a configured QoS level to `QoS`, rejecting levels AWS IoT refuses.
pub fn qos_from_level(level: u8) -> ValidationResult<QoS> {
    validate_qos(level)?;
    Ok(if level == 0 {
        QoS::AtMostOnce
    } else {
        QoS::AtLeastOnce
    })
}

pub(crate) fn ensure_supported_qos(qos: QoS) -> ValidationResult<()> {
    validate_qos(qos_level(qos))
}
