//! AWS IoT client: validation and callback dispatch over a `Transport`.
//!
//! The client owns the transport and drives it cooperatively: nothing
//! happens on the network unless the caller awaits an operation or pumps
//! the event loop with `pump()` / `run_forever()`.

use std::time::Duration;

use awsiot_protocol::{
    DEFAULT_KEEP_ALIVE_SECS, ShadowTopics, validate_client_id, validate_keep_alive,
    validate_topic,
};
use rumqttc::QoS;
use serde::Serialize;

use crate::callbacks::{CallbackContext, Callbacks, Request};
use crate::error::{MqttError, MqttResult};
use crate::transport::{
    Connack, DisconnectCause, Transport, TransportEvent, ensure_supported_qos,
};

/// Whether the client believes it is connected to the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connected,
}

/// Client for the AWS IoT Core MQTT broker.
///
/// Wraps a pre-configured transport whose client ID is the device's thing
/// name. Topics and QoS are checked against the AWS IoT limits before
/// anything is forwarded.
pub struct AwsIotClient<T: Transport> {
    pub(crate) transport: T,
    client_id: String,
    pub(crate) shadow: ShadowTopics,
    keep_alive: u16,
    state: ConnectionState,
    callbacks: Callbacks,
}

impl<T: Transport> AwsIotClient<T> {
    /// Wrap `transport`, applying `keep_alive_secs` (30..=1200) to it.
    pub fn new(mut transport: T, keep_alive_secs: u16) -> MqttResult<Self> {
        let client_id = transport.client_id().to_string();
        validate_client_id(&client_id)?;
        validate_keep_alive(keep_alive_secs)?;

        transport.set_keep_alive(Duration::from_secs(keep_alive_secs.into()));
        let shadow = ShadowTopics::new(&client_id);

        Ok(Self {
            transport,
            client_id,
            shadow,
            keep_alive: keep_alive_secs,
            state: ConnectionState::Disconnected,
            callbacks: Callbacks::default(),
        })
    }

    pub fn with_default_keep_alive(transport: T) -> MqttResult<Self> {
        Self::new(transport, DEFAULT_KEEP_ALIVE_SECS)
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn keep_alive(&self) -> u16 {
        self.keep_alive
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn shadow_topics(&self) -> &ShadowTopics {
        &self.shadow
    }

    pub fn callbacks(&self) -> &Callbacks {
        &self.callbacks
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    // ── Callback slots ────────────────────────────────────────

    pub fn on_connect<F>(&mut self, callback: F)
    where
        F: FnMut(&mut CallbackContext<'_>, &Connack) + Send + 'static,
    {
        self.callbacks.set_connect(callback);
    }

    pub fn on_disconnect<F>(&mut self, callback: F)
    where
        F: FnMut(&mut CallbackContext<'_>, DisconnectCause) + Send + 'static,
    {
        self.callbacks.set_disconnect(callback);
    }

    pub fn on_message<F>(&mut self, callback: F)
    where
        F: FnMut(&mut CallbackContext<'_>, &str, &[u8]) + Send + 'static,
    {
        self.callbacks.set_message(callback);
    }

    pub fn on_subscribe<F>(&mut self, callback: F)
    where
        F: FnMut(&mut CallbackContext<'_>, &str, Option<QoS>) + Send + 'static,
    {
        self.callbacks.set_subscribe(callback);
    }

    pub fn on_unsubscribe<F>(&mut self, callback: F)
    where
        F: FnMut(&mut CallbackContext<'_>, &str, u16) + Send + 'static,
    {
        self.callbacks.set_unsubscribe(callback);
    }

    // ── Connection lifecycle ──────────────────────────────────

    /// Connect to the broker, optionally with a clean session.
    pub async fn connect(&mut self, clean_session: bool) -> MqttResult<()> {
        tracing::info!(client_id = %self.client_id, clean_session, "connecting to AWS IoT");
        let connack = self
            .transport
            .connect(clean_session)
            .await
            .map_err(MqttError::broker("connecting"))?;
        self.dispatch(TransportEvent::Connected(connack)).await;
        Ok(())
    }

    /// Disconnect from the broker and unset every callback.
    pub async fn disconnect(&mut self) -> MqttResult<()> {
        tracing::info!(client_id = %self.client_id, "disconnecting from AWS IoT");
        self.transport
            .disconnect()
            .await
            .map_err(MqttError::broker("disconnecting"))?;

        self.dispatch(TransportEvent::Disconnected(DisconnectCause::Requested))
            .await;
        self.callbacks.clear();
        Ok(())
    }

    pub async fn reconnect(&mut self) -> MqttResult<()> {
        tracing::info!(client_id = %self.client_id, "reconnecting to AWS IoT");
        let connack = self
            .transport
            .reconnect()
            .await
            .map_err(MqttError::broker("re-connecting"))?;
        self.dispatch(TransportEvent::Connected(connack)).await;
        Ok(())
    }

    // ── Pub/sub ───────────────────────────────────────────────

    pub async fn subscribe(&mut self, topic: &str, qos: QoS) -> MqttResult<()> {
        ensure_supported_qos(qos)?;
        validate_topic(topic)?;
        tracing::debug!(topic, ?qos, "subscribing");
        self.transport.subscribe(topic, qos).await?;
        Ok(())
    }

    pub async fn unsubscribe(&mut self, topic: &str) -> MqttResult<()> {
        validate_topic(topic)?;
        tracing::debug!(topic, "unsubscribing");
        self.transport.unsubscribe(topic).await?;
        Ok(())
    }

    pub async fn publish(
        &mut self,
        topic: &str,
        payload: impl AsRef<[u8]>,
        qos: QoS,
    ) -> MqttResult<()> {
        ensure_supported_qos(qos)?;
        validate_topic(topic)?;
        let payload = payload.as_ref();
        tracing::debug!(topic, bytes = payload.len(), ?qos, "publishing");
        self.transport.publish(topic, payload, qos).await?;
        Ok(())
    }

    /// Serialize `payload` as JSON and publish it.
    pub async fn publish_json<P: Serialize>(
        &mut self,
        topic: &str,
        payload: &P,
        qos: QoS,
    ) -> MqttResult<()> {
        let bytes =
            serde_json::to_vec(payload).map_err(|e| MqttError::Serialization(e.to_string()))?;
        self.publish(topic, bytes, qos).await
    }

    // ── Network pump ──────────────────────────────────────────

    /// Process network traffic once and dispatch what it produced.
    ///
    /// Does nothing while disconnected. Must be called within the
    /// keep-alive interval to hold the connection open.
    pub async fn pump(&mut self) -> MqttResult<()> {
        if !self.is_connected() {
            return Ok(());
        }
        if let Some(event) = self.transport.poll().await? {
            self.dispatch(event).await;
        }
        Ok(())
    }

    /// Like [`pump`](Self::pump), but gives up after `timeout`.
    ///
    /// Returns `true` if the transport was polled to completion.
    pub async fn pump_timeout(&mut self, timeout: Duration) -> MqttResult<bool> {
        if !self.is_connected() {
            return Ok(false);
        }
        match tokio::time::timeout(timeout, self.transport.poll()).await {
            Ok(polled) => {
                if let Some(event) = polled? {
                    self.dispatch(event).await;
                }
                Ok(true)
            }
            Err(_) => Ok(false),
        }
    }

    /// Pump until the connection ends. Transport errors are returned to the
    /// caller, who decides whether to `reconnect()`.
    pub async fn run_forever(&mut self) -> MqttResult<()> {
        while self.is_connected() {
            self.pump().await?;
        }
        Ok(())
    }

    // ── Internal helpers ──────────────────────────────────────

    /// Update state, run the matching callback, then send what it queued.
    ///
    /// A failed deferred request is logged and the rest still run; the
    /// caller's result reflects only the operation it asked for.
    async fn dispatch(&mut self, event: TransportEvent) {
        match &event {
            TransportEvent::Connected(connack) => {
                tracing::info!(
                    client_id = %self.client_id,
                    session_present = connack.session_present,
                    "connected to AWS IoT"
                );
                self.state = ConnectionState::Connected;
            }
            TransportEvent::Disconnected(cause) => {
                tracing::info!(client_id = %self.client_id, ?cause, "disconnected from AWS IoT");
                self.state = ConnectionState::Disconnected;
            }
            _ => {}
        }

        let mut ctx = CallbackContext::new(&self.client_id, &self.shadow, self.state);
        self.callbacks.dispatch(&mut ctx, &event);
        let requests = ctx.into_requests();

        if !requests.is_empty() && !self.is_connected() {
            tracing::warn!(
                dropped = requests.len(),
                "callback requests dropped, client is disconnected"
            );
            return;
        }

        for request in requests {
            if let Err(e) = self.execute(&request).await {
                tracing::warn!(error = %e, ?request, "deferred callback request failed");
            }
        }
    }

    async fn execute(&mut self, request: &Request) -> MqttResult<()> {
        match request {
            Request::Subscribe { filter, qos } => {
                tracing::debug!(topic = %filter, ?qos, "subscribing from callback");
                self.transport.subscribe(filter, *qos).await?;
            }
            Request::Unsubscribe { filter } => {
                tracing::debug!(topic = %filter, "unsubscribing from callback");
                self.transport.unsubscribe(filter).await?;
            }
            Request::Publish {
                topic,
                payload,
                qos,
            } => {
                tracing::debug!(%topic, bytes = payload.len(), "publishing from callback");
                self.transport.publish(topic, payload, *qos).await?;
            }
        }
        Ok(())
    }
}
