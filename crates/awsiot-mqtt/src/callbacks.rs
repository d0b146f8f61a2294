//! User callback slots and the context handed to them.
//!
//! Five optional, typed slots: connect, disconnect, message, subscribe and
//! unsubscribe. Callbacks run synchronously inside the pump. They cannot
//! borrow the client, so pub/sub calls made from a callback go through
//! `CallbackContext`, which validates them immediately and queues them for
//! the client to send once the callback returns.

use std::fmt;

use awsiot_protocol::{ShadowTopics, validate_topic};
use rumqttc::QoS;

use crate::client::ConnectionState;
use crate::error::MqttResult;
use crate::transport::{Connack, DisconnectCause, TransportEvent, ensure_supported_qos};

pub type ConnectCallback = Box<dyn FnMut(&mut CallbackContext<'_>, &Connack) + Send>;
pub type DisconnectCallback = Box<dyn FnMut(&mut CallbackContext<'_>, DisconnectCause) + Send>;
pub type MessageCallback = Box<dyn FnMut(&mut CallbackContext<'_>, &str, &[u8]) + Send>;
pub type SubscribeCallback = Box<dyn FnMut(&mut CallbackContext<'_>, &str, Option<QoS>) + Send>;
pub type UnsubscribeCallback = Box<dyn FnMut(&mut CallbackContext<'_>, &str, u16) + Send>;

/// The five user callback slots.
#[derive(Default)]
pub struct Callbacks {
    on_connect: Option<ConnectCallback>,
    on_disconnect: Option<DisconnectCallback>,
    on_message: Option<MessageCallback>,
    on_subscribe: Option<SubscribeCallback>,
    on_unsubscribe: Option<UnsubscribeCallback>,
}

impl Callbacks {
    pub fn set_connect<F>(&mut self, callback: F)
    where
        F: FnMut(&mut CallbackContext<'_>, &Connack) + Send + 'static,
    {
        self.on_connect = Some(Box::new(callback));
    }

    pub fn set_disconnect<F>(&mut self, callback: F)
    where
        F: FnMut(&mut CallbackContext<'_>, DisconnectCause) + Send + 'static,
    {
        self.on_disconnect = Some(Box::new(callback));
    }

    pub fn set_message<F>(&mut self, callback: F)
    where
        F: FnMut(&mut CallbackContext<'_>, &str, &[u8]) + Send + 'static,
    {
        self.on_message = Some(Box::new(callback));
    }

    pub fn set_subscribe<F>(&mut self, callback: F)
    where
        F: FnMut(&mut CallbackContext<'_>, &str, Option<QoS>) + Send + 'static,
    {
        self.on_subscribe = Some(Box::new(callback));
    }

    pub fn set_unsubscribe<F>(&mut self, callback: F)
    where
        F: FnMut(&mut CallbackContext<'_>, &str, u16) + Send + 'static,
    {
        self.on_unsubscribe = Some(Box::new(callback));
    }

    pub fn has_connect(&self) -> bool {
        self.on_connect.is_some()
    }

    pub fn has_disconnect(&self) -> bool {
        self.on_disconnect.is_some()
    }

    pub fn has_message(&self) -> bool {
        self.on_message.is_some()
    }

    pub fn has_subscribe(&self) -> bool {
        self.on_subscribe.is_some()
    }

    pub fn has_unsubscribe(&self) -> bool {
        self.on_unsubscribe.is_some()
    }

    /// True when no slot is set.
    pub fn is_empty(&self) -> bool {
        !(self.has_connect()
            || self.has_disconnect()
            || self.has_message()
            || self.has_subscribe()
            || self.has_unsubscribe())
    }

    /// Unset every slot.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Invoke the slot matching `event`, if set. Unset slots are a no-op.
    pub(crate) fn dispatch(&mut self, ctx: &mut CallbackContext<'_>, event: &TransportEvent) {
        match event {
            TransportEvent::Connected(connack) => {
                if let Some(cb) = self.on_connect.as_mut() {
                    cb(ctx, connack);
                }
            }
            TransportEvent::Disconnected(cause) => {
                if let Some(cb) = self.on_disconnect.as_mut() {
                    cb(ctx, *cause);
                }
            }
            TransportEvent::Message { topic, payload } => {
                if let Some(cb) = self.on_message.as_mut() {
                    cb(ctx, topic, payload);
                }
            }
            TransportEvent::Subscribed { topic, granted } => {
                if let Some(cb) = self.on_subscribe.as_mut() {
                    cb(ctx, topic, *granted);
                }
            }
            TransportEvent::Unsubscribed { topic, pkid } => {
                if let Some(cb) = self.on_unsubscribe.as_mut() {
                    cb(ctx, topic, *pkid);
                }
            }
        }
    }
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_connect", &self.has_connect())
            .field("on_disconnect", &self.has_disconnect())
            .field("on_message", &self.has_message())
            .field("on_subscribe", &self.has_subscribe())
            .field("on_unsubscribe", &self.has_unsubscribe())
            .finish()
    }
}

/// A pub/sub call queued from inside a callback.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Request {
    Subscribe {
        filter: String,
        qos: QoS,
    },
    Unsubscribe {
        filter: String,
    },
    Publish {
        topic: String,
        payload: Vec<u8>,
        qos: QoS,
    },
}

/// What a callback can see and do while it runs.
pub struct CallbackContext<'a> {
    client_id: &'a str,
    shadow: &'a ShadowTopics,
    state: ConnectionState,
    requests: Vec<Request>,
}

impl<'a> CallbackContext<'a> {
    pub(crate) fn new(client_id: &'a str, shadow: &'a ShadowTopics, state: ConnectionState) -> Self {
        Self {
            client_id,
            shadow,
            state,
            requests: Vec::new(),
        }
    }

    pub fn client_id(&self) -> &str {
        self.client_id
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn shadow_topics(&self) -> &ShadowTopics {
        self.shadow
    }

    /// Queue a subscription, sent after the callback returns.
    pub fn subscribe(&mut self, topic: &str, qos: QoS) -> MqttResult<()> {
        ensure_supported_qos(qos)?;
        validate_topic(topic)?;
        self.requests.push(Request::Subscribe {
            filter: topic.to_string(),
            qos,
        });
        Ok(())
    }

    /// Queue an unsubscribe, sent after the callback returns.
    pub fn unsubscribe(&mut self, topic: &str) -> MqttResult<()> {
        validate_topic(topic)?;
        self.requests.push(Request::Unsubscribe {
            filter: topic.to_string(),
        });
        Ok(())
    }

    /// Queue a publish, sent after the callback returns.
    pub fn publish(&mut self, topic: &str, payload: impl AsRef<[u8]>, qos: QoS) -> MqttResult<()> {
        ensure_supported_qos(qos)?;
        validate_topic(topic)?;
        self.requests.push(Request::Publish {
            topic: topic.to_string(),
            payload: payload.as_ref().to_vec(),
            qos,
        });
        Ok(())
    }

    pub(crate) fn into_requests(self) -> Vec<Request> {
        self.requests
    }
}
