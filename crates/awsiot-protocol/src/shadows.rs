use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Body published to the shadow `get` topic. The broker ignores it.
pub const SHADOW_GET_BODY: &str = r#"{"message": "ignore"}"#;

/// Body published to the shadow `delete` topic.
pub const SHADOW_DELETE_BODY: &str = r#"{"message": "delete"}"#;

/// Shadow state section: what the device reports and what the cloud desires.
///
/// Absent sections are omitted so an update only touches what it names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShadowState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reported: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desired: Option<serde_json::Value>,
}

/// Request document published to `$aws/things/{thing}/shadow/update`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShadowDocument {
    pub state: ShadowState,
    /// Optimistic-locking version; the broker rejects stale versions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    #[serde(
        rename = "clientToken",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub client_token: Option<String>,
}

impl ShadowDocument {
    pub fn reported(state: serde_json::Value) -> Self {
        Self {
            state: ShadowState {
                reported: Some(state),
                desired: None,
            },
            ..Default::default()
        }
    }

    pub fn desired(state: serde_json::Value) -> Self {
        Self {
            state: ShadowState {
                reported: None,
                desired: Some(state),
            },
            ..Default::default()
        }
    }

    pub fn with_version(mut self, version: u64) -> Self {
        self.version = Some(version);
        self
    }
}

/// Payload of an `accepted` or `delta` response from the shadow service.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ShadowResponse {
    #[serde(default)]
    pub state: serde_json::Value,
    pub version: u64,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "clientToken", default)]
    pub client_token: Option<String>,
}

/// Payload of a `rejected` response from the shadow service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ShadowError {
    pub code: u16,
    pub message: String,
    #[serde(rename = "clientToken", default)]
    pub client_token: Option<String>,
}
