//! Callback wiring and the device's network loop.
//!
//! Installs the device's handlers on an `AwsIotClient`, then pumps the
//! client until the broker drops the connection or shutdown is requested.

use std::future::Future;
use std::sync::atomic::Ordering;

use awsiot_mqtt::{
    AwsIotClient, CallbackContext, IncomingMessage, MqttResult, QoS, Transport, classify,
};
use awsiot_protocol::{ShadowDocument, ShadowResponse};

use crate::config::DeviceConfig;
use crate::shadow_sync::{MessageCounter, ShadowReporter};

/// Install the device's five callbacks.
///
/// On connect the device subscribes to `config.topic`. Once the broker
/// acknowledges that subscription it publishes `config.greeting` there.
/// Every incoming message is classified and counted in `messages`.
pub fn install_handlers<T: Transport>(
    client: &mut AwsIotClient<T>,
    config: &DeviceConfig,
    messages: MessageCounter,
) -> anyhow::Result<()> {
    let qos = config.topic_qos()?;

    let topic = config.topic.clone();
    client.on_connect(move |ctx, connack| {
        tracing::info!(
            session_present = connack.session_present,
            %topic,
            "connected, subscribing"
        );
        if let Err(e) = ctx.subscribe(&topic, qos) {
            tracing::error!(error = %e, %topic, "failed to subscribe");
        }
    });

    let topic = config.topic.clone();
    let greeting = config.greeting.clone();
    client.on_subscribe(move |ctx, filter, granted| {
        let Some(granted) = granted else {
            tracing::warn!(topic = filter, "subscription refused by broker");
            return;
        };
        tracing::info!(topic = filter, ?granted, "subscribed");
        if filter != topic {
            return;
        }
        let body = serde_json::json!({
            "message": greeting,
            "client_id": ctx.client_id(),
        });
        if let Err(e) = ctx.publish(&topic, body.to_string(), granted) {
            tracing::warn!(error = %e, "failed to queue greeting");
        }
    });

    client.on_message(move |ctx, topic, payload| {
        messages.fetch_add(1, Ordering::Relaxed);
        handle_message(ctx, classify(topic, payload));
    });

    client.on_unsubscribe(|_, filter, pkid| {
        tracing::info!(topic = filter, pkid, "unsubscribed");
    });

    client.on_disconnect(|_, cause| {
        tracing::info!(?cause, "disconnected");
    });

    Ok(())
}

fn handle_message(ctx: &mut CallbackContext<'_>, msg: IncomingMessage) {
    match msg {
        IncomingMessage::ShadowAccepted {
            action, response, ..
        } => {
            tracing::info!(
                ?action,
                version = response.version,
                state = %response.state,
                "shadow request accepted"
            );
        }
        IncomingMessage::ShadowRejected { action, error, .. } => {
            tracing::warn!(
                ?action,
                code = error.code,
                reason = %error.message,
                "shadow request rejected"
            );
        }
        IncomingMessage::ShadowDelta { response, .. } => {
            acknowledge_delta(ctx, response);
        }
        IncomingMessage::ShadowDocuments { documents, .. } => {
            tracing::debug!(%documents, "shadow documents updated");
        }
        IncomingMessage::Unknown { topic, payload } => {
            tracing::info!(
                %topic,
                payload = %String::from_utf8_lossy(&payload),
                "message received"
            );
        }
    }
}

/// Acknowledge a delta by reporting the desired values as our reported state.
fn acknowledge_delta(ctx: &mut CallbackContext<'_>, delta: ShadowResponse) {
    if let Some(obj) = delta.state.as_object() {
        let keys: Vec<&str> = obj.keys().map(|k| k.as_str()).collect();
        tracing::info!(version = delta.version, keys = ?keys, "applying shadow delta");
    }

    let document = ShadowDocument::reported(delta.state).with_version(delta.version);
    let bytes = match serde_json::to_vec(&document) {
        Ok(b) => b,
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize delta acknowledgement");
            return;
        }
    };
    let topic = ctx.shadow_topics().update();
    if let Err(e) = ctx.publish(&topic, bytes, QoS::AtMostOnce) {
        tracing::warn!(error = %e, "failed to acknowledge shadow delta");
    }
}

/// Subscribe to shadow responses and request the current document.
pub async fn sync_shadow<T: Transport>(client: &mut AwsIotClient<T>) -> MqttResult<()> {
    client.shadow_get_subscribe(QoS::AtLeastOnce).await?;
    client.shadow_subscribe(QoS::AtLeastOnce).await?;
    client.shadow_get().await
}

/// Pump the client until the connection ends or `shutdown` resolves.
///
/// Reports shadow state between pumps when a reporter is given. On
/// shutdown the client disconnects cleanly.
pub async fn run<T, F>(
    client: &mut AwsIotClient<T>,
    config: &DeviceConfig,
    mut reporter: Option<ShadowReporter>,
    shutdown: F,
) -> MqttResult<()>
where
    T: Transport,
    F: Future<Output = ()>,
{
    let mut shutdown = std::pin::pin!(shutdown);
    let pump_timeout = config.pump_timeout();

    while client.is_connected() {
        tokio::select! {
            biased;
            () = &mut shutdown => {
                tracing::info!("shutdown signal received");
                break;
            }
            polled = client.pump_timeout(pump_timeout) => {
                polled?;
            }
        }

        if let Some(reporter) = reporter.as_mut() {
            if client.is_connected() {
                reporter.tick(client).await;
            }
        }
    }

    if client.is_connected() {
        client.disconnect().await?;
    }
    Ok(())
}
