//! Periodic shadow state reporter.
//!
//! Reports the device's current state as a shadow update at a configurable
//! interval, allowing the cloud to maintain an up-to-date view of the device.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use awsiot_mqtt::{AwsIotClient, Transport};
use awsiot_protocol::ShadowDocument;
use serde::Serialize;
use tokio::time::Instant;

/// Device-side shadow state reported to the cloud.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceShadowState {
    pub agent_version: String,
    pub client_id: String,
    pub uptime_secs: u64,
    pub messages_received: u64,
    pub reported_at: String,
}

/// Message counter shared with the message callback.
pub type MessageCounter = Arc<AtomicU64>;

/// Tracks when the next report is due.
#[derive(Debug)]
pub struct ShadowReporter {
    interval: Duration,
    start_time: Instant,
    next_due: Instant,
    messages: MessageCounter,
}

impl ShadowReporter {
    /// Reports immediately on first poll, then every `interval`.
    pub fn new(interval: Duration, messages: MessageCounter) -> Self {
        let now = Instant::now();
        Self {
            interval,
            start_time: now,
            next_due: now,
            messages,
        }
    }

    pub fn is_due(&self) -> bool {
        Instant::now() >= self.next_due
    }

    pub fn snapshot(&self, client_id: &str) -> DeviceShadowState {
        DeviceShadowState {
            agent_version: env!("CARGO_PKG_VERSION").to_string(),
            client_id: client_id.to_string(),
            uptime_secs: self.start_time.elapsed().as_secs(),
            messages_received: self.messages.load(Ordering::Relaxed),
            reported_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Publish a report if one is due. Publish failures are logged, not
    /// returned, so a flaky report never tears down the session.
    pub async fn tick<T: Transport>(&mut self, client: &mut AwsIotClient<T>) {
        if !self.is_due() {
            return;
        }
        self.next_due = Instant::now() + self.interval;
        self.report(client).await;
    }

    async fn report<T: Transport>(&self, client: &mut AwsIotClient<T>) {
        let state = self.snapshot(client.client_id());
        let reported = match serde_json::to_value(&state) {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize shadow state");
                return;
            }
        };

        let document = ShadowDocument::reported(reported);
        if let Err(e) = client.shadow_document(&document).await {
            tracing::warn!(error = %e, "failed to publish shadow update");
        } else {
            tracing::debug!(uptime_secs = state.uptime_secs, "shadow state reported");
        }
    }
}
