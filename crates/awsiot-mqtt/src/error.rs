//! AWS IoT client error types.

use awsiot_protocol::ValidationError;
use thiserror::Error;

/// Failures reported by the wrapped MQTT transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("not connected")]
    NotConnected,

    /// The request channel to the event loop is full. Pump to drain it.
    #[error("request queue full, pump the client before sending more")]
    QueueFull,

    #[error("client request failed: {0}")]
    Client(#[from] rumqttc::ClientError),

    #[error("connection error: {0}")]
    Connection(#[from] rumqttc::ConnectionError),

    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Map a non-blocking request failure, splitting out a full queue.
    pub(crate) fn from_try_request(err: rumqttc::ClientError) -> Self {
        match err {
            rumqttc::ClientError::TryRequest(_) => Self::QueueFull,
            other => Self::Client(other),
        }
    }
}

/// Convenience alias for transport results.
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors that can occur during AWS IoT operations.
#[derive(Debug, Error)]
pub enum MqttError {
    /// A precondition was violated before anything reached the transport.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Connect, disconnect or reconnect failed in the transport.
    #[error("error {action} with AWS IoT: {source}")]
    Broker {
        action: &'static str,
        #[source]
        source: TransportError,
    },

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl MqttError {
    pub(crate) fn broker(action: &'static str) -> impl FnOnce(TransportError) -> Self {
        move |source| Self::Broker { action, source }
    }
}

/// Convenience alias for AWS IoT client results.
pub type MqttResult<T> = Result<T, MqttError>;
