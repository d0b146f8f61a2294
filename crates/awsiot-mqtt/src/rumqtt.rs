//! `Transport` backed by `rumqttc`.
//!
//! A fresh `AsyncClient`/`EventLoop` pair is built on every (re)connect
//! from the stored `MqttOptions`. The event loop is only driven from
//! `poll()`, so the caller keeps the cooperative pump model. Requests go
//! through the bounded channel without waiting: when it is full the call
//! fails with `TransportError::QueueFull` until the next pump drains it.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{
    AsyncClient, ClientError, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS,
    SubscribeReasonCode,
};

use crate::config::MqttConfig;
use crate::error::{MqttResult, TransportError, TransportResult};
use crate::tls;
use crate::transport::{Connack, DisconnectCause, Transport, TransportEvent};

/// Default capacity of the request channel between client and event loop.
const DEFAULT_CAPACITY: usize = 64;

/// MQTT transport over `rumqttc`.
pub struct RumqttTransport {
    options: MqttOptions,
    client_id: String,
    capacity: usize,
    clean_session: bool,
    session: Option<Session>,
}

/// One live network session.
struct Session {
    client: AsyncClient,
    eventloop: EventLoop,
    /// Filters requested but not yet assigned a packet id, in request order.
    queued_subscribes: VecDeque<String>,
    queued_unsubscribes: VecDeque<String>,
    /// Filters awaiting SUBACK/UNSUBACK, by packet id.
    subscribes_in_flight: HashMap<u16, String>,
    unsubscribes_in_flight: HashMap<u16, String>,
}

impl RumqttTransport {
    /// Wrap pre-built options. The client ID is taken from `options`.
    pub fn new(options: MqttOptions) -> Self {
        Self::with_capacity(options, DEFAULT_CAPACITY)
    }

    /// `capacity` bounds the requests queued between pumps (at least 1).
    pub fn with_capacity(options: MqttOptions, capacity: usize) -> Self {
        let client_id = options.client_id();
        let clean_session = options.clean_session();
        Self {
            options,
            client_id,
            capacity: capacity.max(1),
            clean_session,
            session: None,
        }
    }

    /// Build a transport from config, with mTLS when `use_tls` is set.
    pub fn from_config(config: &MqttConfig) -> MqttResult<Self> {
        config.validate()?;
        let mut options =
            MqttOptions::new(&config.client_id, &config.broker_host, config.broker_port);
        options.set_keep_alive(Duration::from_secs(config.keepalive_secs.into()));

        let transport = if config.use_tls {
            tls::load_tls_transport(config)?
        } else {
            tls::plaintext_transport()
        };
        options.set_transport(transport);

        Ok(Self::with_capacity(options, config.event_capacity))
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    fn session_mut(&mut self) -> TransportResult<&mut Session> {
        self.session.as_mut().ok_or(TransportError::NotConnected)
    }

    /// Open a fresh network session and wait for its CONNACK. Any current
    /// session is left alone.
    async fn open_session(&mut self, clean_session: bool) -> TransportResult<(Session, Connack)> {
        self.options.set_clean_session(clean_session);
        let (client, mut eventloop) = AsyncClient::new(self.options.clone(), self.capacity);

        // rumqttc reports refused CONNACKs as a `ConnectionError`.
        loop {
            match eventloop.poll().await? {
                Event::Incoming(Packet::ConnAck(ack)) => {
                    tracing::debug!(
                        client_id = %self.client_id,
                        session_present = ack.session_present,
                        "CONNACK received"
                    );
                    let connack = Connack {
                        session_present: ack.session_present,
                        code: ack.code,
                    };
                    return Ok((Session::new(client, eventloop), connack));
                }
                event => tracing::trace!(?event, "waiting for CONNACK"),
            }
        }
    }
}

#[async_trait]
impl Transport for RumqttTransport {
    fn client_id(&self) -> &str {
        &self.client_id
    }

    fn set_keep_alive(&mut self, keep_alive: Duration) {
        self.options.set_keep_alive(keep_alive);
    }

    async fn connect(&mut self, clean_session: bool) -> TransportResult<Connack> {
        let (session, connack) = self.open_session(clean_session).await?;
        self.clean_session = clean_session;
        self.session = Some(session);
        Ok(connack)
    }

    async fn disconnect(&mut self) -> TransportResult<()> {
        // The session is only released once DISCONNECT is queued, so a
        // failure here leaves it usable.
        self.session_mut()?.queue_disconnect().await?;
        let Some(mut session) = self.session.take() else {
            return Ok(());
        };
        session.flush_until_disconnect().await;
        Ok(())
    }

    /// The current session stays open until the new one is acknowledged.
    async fn reconnect(&mut self) -> TransportResult<Connack> {
        let (session, connack) = self.open_session(self.clean_session).await?;
        // Replacing the old session drops its event loop, closing the socket.
        self.session = Some(session);
        Ok(connack)
    }

    async fn subscribe(&mut self, filter: &str, qos: QoS) -> TransportResult<()> {
        let session = self.session_mut()?;
        session
            .client
            .try_subscribe(filter, qos)
            .map_err(TransportError::from_try_request)?;
        session.queued_subscribes.push_back(filter.to_string());
        Ok(())
    }

    async fn unsubscribe(&mut self, filter: &str) -> TransportResult<()> {
        let session = self.session_mut()?;
        session
            .client
            .try_unsubscribe(filter)
            .map_err(TransportError::from_try_request)?;
        session.queued_unsubscribes.push_back(filter.to_string());
        Ok(())
    }

    async fn publish(&mut self, topic: &str, payload: &[u8], qos: QoS) -> TransportResult<()> {
        let session = self.session_mut()?;
        session
            .client
            .try_publish(topic, qos, false, payload.to_vec())
            .map_err(TransportError::from_try_request)?;
        Ok(())
    }

    async fn poll(&mut self) -> TransportResult<Option<TransportEvent>> {
        let session = self.session_mut()?;
        let event = session.eventloop.poll().await?;
        Ok(session.translate(event))
    }
}

impl Session {
    fn new(client: AsyncClient, eventloop: EventLoop) -> Self {
        Self {
            client,
            eventloop,
            queued_subscribes: VecDeque::new(),
            queued_unsubscribes: VecDeque::new(),
            subscribes_in_flight: HashMap::new(),
            unsubscribes_in_flight: HashMap::new(),
        }
    }

    /// Queue DISCONNECT, polling the event loop to make room while the
    /// request channel is full.
    async fn queue_disconnect(&mut self) -> TransportResult<()> {
        loop {
            match self.client.try_disconnect() {
                Ok(()) => return Ok(()),
                Err(ClientError::TryRequest(_)) => {
                    let event = self.eventloop.poll().await?;
                    if let Some(event) = self.translate(event) {
                        tracing::debug!(?event, "dropping event while disconnecting");
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Drive the loop until the DISCONNECT packet has been written.
    async fn flush_until_disconnect(&mut self) {
        loop {
            match self.eventloop.poll().await {
                Ok(Event::Outgoing(Outgoing::Disconnect)) => break,
                Ok(_) => continue,
                Err(e) => {
                    tracing::debug!(error = %e, "connection closed while disconnecting");
                    break;
                }
            }
        }
    }

    fn translate(&mut self, event: Event) -> Option<TransportEvent> {
        match event {
            Event::Incoming(Packet::ConnAck(ack)) => Some(TransportEvent::Connected(Connack {
                session_present: ack.session_present,
                code: ack.code,
            })),
            Event::Incoming(Packet::Publish(publish)) => Some(TransportEvent::Message {
                topic: publish.topic,
                payload: publish.payload.to_vec(),
            }),
            Event::Incoming(Packet::SubAck(ack)) => {
                let Some(topic) = self.subscribes_in_flight.remove(&ack.pkid) else {
                    tracing::warn!(pkid = ack.pkid, "SUBACK for unknown packet id");
                    return None;
                };
                let granted = match ack.return_codes.first() {
                    Some(SubscribeReasonCode::Success(qos)) => Some(*qos),
                    _ => None,
                };
                Some(TransportEvent::Subscribed { topic, granted })
            }
            Event::Incoming(Packet::UnsubAck(ack)) => {
                let Some(topic) = self.unsubscribes_in_flight.remove(&ack.pkid) else {
                    tracing::warn!(pkid = ack.pkid, "UNSUBACK for unknown packet id");
                    return None;
                };
                Some(TransportEvent::Unsubscribed {
                    topic,
                    pkid: ack.pkid,
                })
            }
            Event::Incoming(Packet::Disconnect) => {
                Some(TransportEvent::Disconnected(DisconnectCause::Broker))
            }
            Event::Outgoing(Outgoing::Subscribe(pkid)) => {
                if let Some(filter) = self.queued_subscribes.pop_front() {
                    self.subscribes_in_flight.insert(pkid, filter);
                }
                None
            }
            Event::Outgoing(Outgoing::Unsubscribe(pkid)) => {
                if let Some(filter) = self.queued_unsubscribes.pop_front() {
                    self.unsubscribes_in_flight.insert(pkid, filter);
                }
                None
            }
            other => {
                tracing::trace!(event = ?other, "ignoring MQTT event");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::AwsIotClient;
    use crate::error::MqttError;
    use rumqttc::{ConnAck, ConnectReturnCode, Publish, SubAck, UnsubAck};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const CONNACK_ACCEPTED: [u8; 4] = [0x20, 0x02, 0x00, 0x00];
    const CONNACK_NOT_AUTHORIZED: [u8; 4] = [0x20, 0x02, 0x00, 0x05];
    const STEP: Duration = Duration::from_secs(2);

    fn session() -> Session {
        let options = MqttOptions::new("mydevice", "localhost", 1883);
        let (client, eventloop) = AsyncClient::new(options, 8);
        Session::new(client, eventloop)
    }

    #[test]
    fn transport_takes_client_id_from_options() {
        let options = MqttOptions::new("mydevice", "localhost", 1883);
        let transport = RumqttTransport::new(options);
        assert_eq!(transport.client_id(), "mydevice");
        assert!(!transport.is_open());
    }

    #[test]
    fn plaintext_config_builds_transport() {
        let config = MqttConfig {
            broker_host: "localhost".into(),
            broker_port: 1883,
            client_id: "rpi-001".into(),
            use_tls: false,
            client_cert_path: String::new(),
            client_key_path: String::new(),
            ca_cert_path: String::new(),
            keepalive_secs: 60,
            clean_session: true,
            event_capacity: 16,
        };
        let transport = RumqttTransport::from_config(&config).unwrap();
        assert_eq!(transport.client_id(), "rpi-001");
        assert_eq!(transport.capacity, 16);
    }

    #[tokio::test]
    async fn suback_maps_back_to_filter() {
        let mut session = session();
        session.queued_subscribes.push_back("sdk/test/rust".into());

        assert!(session.translate(Event::Outgoing(Outgoing::Subscribe(7))).is_none());

        let ack = SubAck::new(7, vec![SubscribeReasonCode::Success(QoS::AtLeastOnce)]);
        let event = session.translate(Event::Incoming(Packet::SubAck(ack)));
        assert_eq!(
            event,
            Some(TransportEvent::Subscribed {
                topic: "sdk/test/rust".into(),
                granted: Some(QoS::AtLeastOnce),
            })
        );
        assert!(session.subscribes_in_flight.is_empty());
    }

    #[tokio::test]
    async fn refused_subscription_has_no_granted_qos() {
        let mut session = session();
        session.queued_subscribes.push_back("not/allowed".into());
        session.translate(Event::Outgoing(Outgoing::Subscribe(3)));

        let ack = SubAck::new(3, vec![SubscribeReasonCode::Failure]);
        let event = session.translate(Event::Incoming(Packet::SubAck(ack)));
        assert!(matches!(
            event,
            Some(TransportEvent::Subscribed { granted: None, .. })
        ));
    }

    #[tokio::test]
    async fn unsuback_maps_back_to_filter() {
        let mut session = session();
        session.queued_unsubscribes.push_back("sdk/test/rust".into());
        session.translate(Event::Outgoing(Outgoing::Unsubscribe(9)));

        let event = session.translate(Event::Incoming(Packet::UnsubAck(UnsubAck::new(9))));
        assert_eq!(
            event,
            Some(TransportEvent::Unsubscribed {
                topic: "sdk/test/rust".into(),
                pkid: 9,
            })
        );
    }

    #[tokio::test]
    async fn unknown_suback_is_dropped() {
        let mut session = session();
        let ack = SubAck::new(42, vec![SubscribeReasonCode::Success(QoS::AtMostOnce)]);
        assert!(session.translate(Event::Incoming(Packet::SubAck(ack))).is_none());
    }

    #[tokio::test]
    async fn publish_and_connack_translate() {
        let mut session = session();

        let publish = Publish::new("sdk/test/rust", QoS::AtLeastOnce, b"hello".to_vec());
        assert_eq!(
            session.translate(Event::Incoming(Packet::Publish(publish))),
            Some(TransportEvent::Message {
                topic: "sdk/test/rust".into(),
                payload: b"hello".to_vec(),
            })
        );

        let ack = ConnAck::new(ConnectReturnCode::Success, true);
        assert_eq!(
            session.translate(Event::Incoming(Packet::ConnAck(ack))),
            Some(TransportEvent::Connected(Connack::accepted(true)))
        );

        assert_eq!(
            session.translate(Event::Incoming(Packet::Disconnect)),
            Some(TransportEvent::Disconnected(DisconnectCause::Broker))
        );
        assert!(session.translate(Event::Outgoing(Outgoing::PingReq)).is_none());
    }

    /// Loopback broker: answers the n-th connection's CONNECT with
    /// `connacks[n]`, then reads and discards whatever the client sends.
    async fn loopback_broker(connacks: Vec<[u8; 4]>) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            for connack in connacks {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                tokio::spawn(async move {
                    let mut buf = [0u8; 4096];
                    if socket.read(&mut buf).await.unwrap_or(0) == 0 {
                        return;
                    }
                    if socket.write_all(&connack).await.is_err() {
                        return;
                    }
                    while matches!(socket.read(&mut buf).await, Ok(n) if n > 0) {}
                });
            }
        });
        port
    }

    fn loopback_client(port: u16, capacity: usize) -> AwsIotClient<RumqttTransport> {
        let options = MqttOptions::new("mydevice", "127.0.0.1", port);
        let transport = RumqttTransport::with_capacity(options, capacity);
        AwsIotClient::with_default_keep_alive(transport).unwrap()
    }

    async fn fill_queue(client: &mut AwsIotClient<RumqttTransport>) -> (usize, MqttError) {
        let mut sent = 0;
        loop {
            let publish = client.publish("sdk/test/rust", b"x", QoS::AtMostOnce);
            match tokio::time::timeout(STEP, publish)
                .await
                .expect("publish blocked on a full queue")
            {
                Ok(()) => sent += 1,
                Err(e) => return (sent, e),
            }
            assert!(sent <= 64, "queue never filled");
        }
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let options = MqttOptions::new("mydevice", "localhost", 1883);
        assert_eq!(RumqttTransport::with_capacity(options, 0).capacity, 1);
    }

    #[test]
    fn from_config_rejects_zero_capacity() {
        let config = MqttConfig {
            broker_host: "localhost".into(),
            broker_port: 1883,
            client_id: "mydevice".into(),
            use_tls: false,
            client_cert_path: String::new(),
            client_key_path: String::new(),
            ca_cert_path: String::new(),
            keepalive_secs: 30,
            clean_session: true,
            event_capacity: 0,
        };
        assert!(matches!(
            RumqttTransport::from_config(&config),
            Err(MqttError::Config(_))
        ));
    }

    #[tokio::test]
    async fn full_queue_fails_fast_until_pumped() {
        let port = loopback_broker(vec![CONNACK_ACCEPTED]).await;
        let mut client = loopback_client(port, 4);
        client.connect(true).await.unwrap();

        let (sent, err) = fill_queue(&mut client).await;
        assert_eq!(sent, 4);
        assert!(matches!(
            err,
            MqttError::Transport(TransportError::QueueFull)
        ));

        // Pumping moves queued requests onto the wire and frees room.
        let mut accepted = false;
        for _ in 0..10 {
            client.pump_timeout(Duration::from_millis(200)).await.unwrap();
            if client
                .publish("sdk/test/rust", b"y", QoS::AtMostOnce)
                .await
                .is_ok()
            {
                accepted = true;
                break;
            }
        }
        assert!(accepted);
        assert!(client.is_connected());
    }

    #[tokio::test]
    async fn disconnect_after_burst_completes() {
        let port = loopback_broker(vec![CONNACK_ACCEPTED]).await;
        let mut client = loopback_client(port, 4);
        client.connect(true).await.unwrap();
        fill_queue(&mut client).await;

        tokio::time::timeout(STEP, client.disconnect())
            .await
            .expect("disconnect blocked on a full queue")
            .unwrap();
        assert!(!client.is_connected());
        assert!(!client.transport().is_open());
    }

    #[tokio::test]
    async fn refused_reconnect_keeps_current_session() {
        let port = loopback_broker(vec![CONNACK_ACCEPTED, CONNACK_NOT_AUTHORIZED]).await;
        let mut client = loopback_client(port, 4);
        client.connect(true).await.unwrap();

        let err = tokio::time::timeout(STEP, client.reconnect())
            .await
            .expect("reconnect hung")
            .unwrap_err();
        assert!(matches!(err, MqttError::Broker { action: "re-connecting", .. }));

        assert!(client.is_connected());
        assert!(client.transport().is_open());
        client
            .publish("sdk/test/rust", b"still here", QoS::AtMostOnce)
            .await
            .unwrap();
        client.pump_timeout(Duration::from_millis(200)).await.unwrap();
    }
}
