//! AWS IoT Device Shadow MQTT operations.
//!
//! Publish and subscribe helpers for the thing's classic shadow. Topics
//! are built from the client ID, so they skip user topic validation.

use awsiot_protocol::{SHADOW_DELETE_BODY, SHADOW_GET_BODY, ShadowDocument};
use rumqttc::QoS;
use serde::Serialize;

use crate::client::AwsIotClient;
use crate::error::{MqttError, MqttResult};
use crate::transport::{Transport, ensure_supported_qos};

/// Shadow requests go out at the wrapped client's default QoS.
const SHADOW_PUBLISH_QOS: QoS = QoS::AtMostOnce;

impl<T: Transport> AwsIotClient<T> {
    /// Subscribe to the responses of shadow get requests.
    pub async fn shadow_get_subscribe(&mut self, qos: QoS) -> MqttResult<()> {
        ensure_supported_qos(qos)?;
        let topic = self.shadow.get_all();
        tracing::debug!(%topic, "subscribing to shadow get responses");
        self.transport.subscribe(&topic, qos).await?;
        Ok(())
    }

    /// Subscribe to all notifications on the shadow update topic.
    pub async fn shadow_subscribe(&mut self, qos: QoS) -> MqttResult<()> {
        ensure_supported_qos(qos)?;
        let topic = self.shadow.update_all();
        tracing::debug!(%topic, "subscribing to shadow updates");
        self.transport.subscribe(&topic, qos).await?;
        Ok(())
    }

    /// Publish a JSON state document to update the shadow.
    pub async fn shadow_update(&mut self, document: &str) -> MqttResult<()> {
        let topic = self.shadow.update();
        self.shadow_publish(&topic, document.as_bytes()).await
    }

    /// Request the current shadow document. The answer arrives on
    /// `shadow/get/accepted` or `shadow/get/rejected`.
    pub async fn shadow_get(&mut self) -> MqttResult<()> {
        let topic = self.shadow.get();
        self.shadow_publish(&topic, SHADOW_GET_BODY.as_bytes()).await
    }

    /// Delete the thing's shadow.
    pub async fn shadow_delete(&mut self) -> MqttResult<()> {
        let topic = self.shadow.delete();
        self.shadow_publish(&topic, SHADOW_DELETE_BODY.as_bytes())
            .await
    }

    /// Report device state: `{"state":{"reported": state}}`.
    pub async fn shadow_report<S: Serialize>(&mut self, state: &S) -> MqttResult<()> {
        let value = to_value(state)?;
        self.shadow_document(&ShadowDocument::reported(value)).await
    }

    /// Request a desired state: `{"state":{"desired": state}}`.
    pub async fn shadow_desire<S: Serialize>(&mut self, state: &S) -> MqttResult<()> {
        let value = to_value(state)?;
        self.shadow_document(&ShadowDocument::desired(value)).await
    }

    pub async fn shadow_document(&mut self, document: &ShadowDocument) -> MqttResult<()> {
        let bytes =
            serde_json::to_vec(document).map_err(|e| MqttError::Serialization(e.to_string()))?;
        let topic = self.shadow.update();
        self.shadow_publish(&topic, &bytes).await
    }

    async fn shadow_publish(&mut self, topic: &str, payload: &[u8]) -> MqttResult<()> {
        tracing::debug!(topic, bytes = payload.len(), "publishing shadow request");
        self.transport
            .publish(topic, payload, SHADOW_PUBLISH_QOS)
            .await?;
        Ok(())
    }
}

fn to_value<S: Serialize>(state: &S) -> MqttResult<serde_json::Value> {
    serde_json::to_value(state).map_err(|e| MqttError::Serialization(e.to_string()))
}
