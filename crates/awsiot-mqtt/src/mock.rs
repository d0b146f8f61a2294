//! Mock MQTT transport for testing without a real broker.
//!
//! Records every call in order, replays scripted events from `poll()`
//! and can be told to fail the next call of a given kind.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::QoS;

use crate::error::{TransportError, TransportResult};
use crate::transport::{Connack, Transport, TransportEvent};

/// A recorded publish call.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
}

impl PublishedMessage {
    pub fn payload_str(&self) -> &str {
        std::str::from_utf8(&self.payload).unwrap_or("<binary>")
    }
}

/// A call that reached the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    SetKeepAlive(Duration),
    Connect { clean_session: bool },
    Disconnect,
    Reconnect,
    Subscribe { filter: String, qos: QoS },
    Unsubscribe { filter: String },
    Publish(PublishedMessage),
    Poll,
}

/// Operation kinds for failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    Connect,
    Disconnect,
    Reconnect,
    Subscribe,
    Unsubscribe,
    Publish,
    Poll,
}

/// Mock implementation of the `Transport` trait.
pub struct MockTransport {
    client_id: String,
    connack: Connack,
    calls: Vec<MockCall>,
    events: VecDeque<TransportEvent>,
    failures: HashMap<MockOp, String>,
}

impl MockTransport {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            connack: Connack::accepted(false),
            calls: Vec::new(),
            events: VecDeque::new(),
            failures: HashMap::new(),
        }
    }

    /// CONNACK returned by `connect` and `reconnect`.
    pub fn set_connack(&mut self, connack: Connack) {
        self.connack = connack;
    }

    /// Queue an event for a later `poll()`.
    pub fn push_event(&mut self, event: TransportEvent) {
        self.events.push_back(event);
    }

    /// Queue an incoming publish for a later `poll()`.
    pub fn push_message(&mut self, topic: &str, payload: &[u8]) {
        self.push_event(TransportEvent::Message {
            topic: topic.to_string(),
            payload: payload.to_vec(),
        });
    }

    /// Make the next call of kind `op` fail with `reason`.
    pub fn fail_next(&mut self, op: MockOp, reason: impl Into<String>) {
        self.failures.insert(op, reason.into());
    }

    /// All calls in the order they were made.
    pub fn calls(&self) -> &[MockCall] {
        &self.calls
    }

    /// Get all published messages.
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                MockCall::Publish(m) => Some(m.clone()),
                _ => None,
            })
            .collect()
    }

    /// Get all subscription filters.
    pub fn subscriptions(&self) -> Vec<(String, QoS)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                MockCall::Subscribe { filter, qos } => Some((filter.clone(), *qos)),
                _ => None,
            })
            .collect()
    }

    /// Get the last published message.
    pub fn last_published(&self) -> Option<PublishedMessage> {
        self.published().pop()
    }

    /// Get published messages for a specific topic.
    pub fn published_to(&self, topic: &str) -> Vec<PublishedMessage> {
        self.published()
            .into_iter()
            .filter(|m| m.topic == topic)
            .collect()
    }

    /// Check whether a subscription was made to the given filter.
    pub fn is_subscribed_to(&self, filter: &str) -> bool {
        self.subscriptions().iter().any(|(f, _)| f == filter)
    }

    /// Number of `poll()` calls that reached the transport.
    pub fn poll_count(&self) -> usize {
        self.calls.iter().filter(|c| **c == MockCall::Poll).count()
    }

    /// Clear recorded calls and queued events.
    pub fn reset(&mut self) {
        self.calls.clear();
        self.events.clear();
        self.failures.clear();
    }

    fn record(&mut self, op: MockOp, call: MockCall) -> TransportResult<()> {
        self.calls.push(call);
        match self.failures.remove(&op) {
            Some(reason) => Err(TransportError::Other(reason)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn client_id(&self) -> &str {
        &self.client_id
    }

    fn set_keep_alive(&mut self, keep_alive: Duration) {
        self.calls.push(MockCall::SetKeepAlive(keep_alive));
    }

    async fn connect(&mut self, clean_session: bool) -> TransportResult<Connack> {
        self.record(MockOp::Connect, MockCall::Connect { clean_session })?;
        Ok(self.connack)
    }

    async fn disconnect(&mut self) -> TransportResult<()> {
        self.record(MockOp::Disconnect, MockCall::Disconnect)
    }

    async fn reconnect(&mut self) -> TransportResult<Connack> {
        self.record(MockOp::Reconnect, MockCall::Reconnect)?;
        Ok(self.connack)
    }

    async fn subscribe(&mut self, filter: &str, qos: QoS) -> TransportResult<()> {
        self.record(
            MockOp::Subscribe,
            MockCall::Subscribe {
                filter: filter.to_string(),
                qos,
            },
        )
    }

    async fn unsubscribe(&mut self, filter: &str) -> TransportResult<()> {
        self.record(
            MockOp::Unsubscribe,
            MockCall::Unsubscribe {
                filter: filter.to_string(),
            },
        )
    }

    async fn publish(&mut self, topic: &str, payload: &[u8], qos: QoS) -> TransportResult<()> {
        self.record(
            MockOp::Publish,
            MockCall::Publish(PublishedMessage {
                topic: topic.to_string(),
                payload: payload.to_vec(),
                qos,
            }),
        )
    }

    async fn poll(&mut self) -> TransportResult<Option<TransportEvent>> {
        self.record(MockOp::Poll, MockCall::Poll)?;
        Ok(self.events.pop_front())
    }
}
