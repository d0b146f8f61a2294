//! AWS IoT service limits for topics, client IDs, keep-alive and QoS.
//!
//! See <https://docs.aws.amazon.com/general/latest/gr/iot-core.html#limits_iot>.

use crate::error::{ValidationError, ValidationResult};

/// Topics must be strictly shorter than this many bytes.
pub const MAX_TOPIC_BYTES: usize = 256;

/// Maximum number of `/` separators in a topic or filter.
pub const MAX_TOPIC_SLASHES: usize = 7;

pub const MIN_KEEP_ALIVE_SECS: u16 = 30;
pub const MAX_KEEP_ALIVE_SECS: u16 = 1200;
pub const DEFAULT_KEEP_ALIVE_SECS: u16 = 30;

/// Highest QoS level the AWS IoT broker accepts.
pub const MAX_QOS_LEVEL: u8 = 1;

/// Check a publish topic or subscription filter against the AWS IoT limits.
pub fn validate_topic(topic: &str) -> ValidationResult<()> {
    if topic.is_empty() {
        return Err(ValidationError::EmptyTopic);
    }

    if topic.len() >= MAX_TOPIC_BYTES {
        return Err(ValidationError::TopicTooLong {
            len: topic.len(),
            max: MAX_TOPIC_BYTES,
        });
    }

    let slashes = topic.bytes().filter(|b| *b == b'/').count();
    if slashes > MAX_TOPIC_SLASHES {
        return Err(ValidationError::TooManyLevels {
            slashes,
            max: MAX_TOPIC_SLASHES,
        });
    }

    Ok(())
}

/// The client ID doubles as the thing name, so it must not use the
/// broker's reserved `$` prefix.
pub fn validate_client_id(client_id: &str) -> ValidationResult<()> {
    if client_id.is_empty() {
        return Err(ValidationError::EmptyClientId);
    }
    if client_id.starts_with('$') {
        return Err(ValidationError::ReservedClientId(client_id.to_string()));
    }
    Ok(())
}

pub fn validate_keep_alive(secs: u16) -> ValidationResult<()> {
    if !(MIN_KEEP_ALIVE_SECS..=MAX_KEEP_ALIVE_SECS).contains(&secs) {
        return Err(ValidationError::KeepAliveOutOfRange {
            secs,
            min: MIN_KEEP_ALIVE_SECS,
            max: MAX_KEEP_ALIVE_SECS,
        });
    }
    Ok(())
}

/// AWS IoT does not support QoS 2 for either publish or subscribe.
pub fn validate_qos(level: u8) -> ValidationResult<()> {
    if level > MAX_QOS_LEVEL {
        return Err(ValidationError::UnsupportedQos(level));
    }
    Ok(())
}
