//! Validation error types.

use thiserror::Error;

/// An AWS IoT service limit or naming rule was violated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("topic must not be empty")]
    EmptyTopic,

    #[error("topic is {len} bytes, must be less than {max} bytes")]
    TopicTooLong { len: usize, max: usize },

    #[error("topic has {slashes} forward slashes, AWS IoT allows at most {max}")]
    TooManyLevels { slashes: usize, max: usize },

    #[error("client ID must not be empty")]
    EmptyClientId,

    #[error("client ID '{0}' starts with the reserved prefix '$'")]
    ReservedClientId(String),

    #[error("keep-alive of {secs}s is outside the allowed range {min}..={max}s")]
    KeepAliveOutOfRange { secs: u16, min: u16, max: u16 },

    #[error("QoS {0} is not supported by AWS IoT")]
    UnsupportedQos(u8),
}

/// Convenience alias for validation results.
pub type ValidationResult<T> = Result<T, ValidationError>;
