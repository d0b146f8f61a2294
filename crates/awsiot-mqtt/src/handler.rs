//! Incoming message classification for shadow responses.
//!
//! Parses raw publishes into typed `IncomingMessage` variants so a
//! message callback can dispatch them without topic string matching.

use awsiot_protocol::{
    ShadowAction, ShadowError, ShadowResponse, ShadowResponseKind, parse_shadow_topic,
};

/// A classified incoming MQTT message.
#[derive(Debug)]
pub enum IncomingMessage {
    /// The shadow service accepted a get/update/delete request.
    ShadowAccepted {
        thing: String,
        action: ShadowAction,
        response: ShadowResponse,
    },
    /// The shadow service rejected a request.
    ShadowRejected {
        thing: String,
        action: ShadowAction,
        error: ShadowError,
    },
    /// Desired state diverged from reported.
    ShadowDelta {
        thing: String,
        response: ShadowResponse,
    },
    /// Previous and current documents after an update.
    ShadowDocuments {
        thing: String,
        documents: serde_json::Value,
    },
    /// Not a shadow response, or an unparseable payload.
    Unknown { topic: String, payload: Vec<u8> },
}

/// Classify a raw publish into a typed message.
pub fn classify(topic: &str, payload: &[u8]) -> IncomingMessage {
    let unknown = || IncomingMessage::Unknown {
        topic: topic.to_string(),
        payload: payload.to_vec(),
    };

    let Some(parsed) = parse_shadow_topic(topic) else {
        return unknown();
    };
    let Some(kind) = parsed.response else {
        return unknown();
    };

    let thing = parsed.thing;
    match kind {
        ShadowResponseKind::Accepted => match serde_json::from_slice(payload) {
            Ok(response) => IncomingMessage::ShadowAccepted {
                thing,
                action: parsed.action,
                response,
            },
            Err(_) => unknown(),
        },
        ShadowResponseKind::Rejected => match serde_json::from_slice(payload) {
            Ok(error) => IncomingMessage::ShadowRejected {
                thing,
                action: parsed.action,
                error,
            },
            Err(_) => unknown(),
        },
        ShadowResponseKind::Delta => match serde_json::from_slice(payload) {
            Ok(response) => IncomingMessage::ShadowDelta { thing, response },
            Err(_) => unknown(),
        },
        ShadowResponseKind::Documents => match serde_json::from_slice(payload) {
            Ok(documents) => IncomingMessage::ShadowDocuments { thing, documents },
            Err(_) => unknown(),
        },
    }
}
