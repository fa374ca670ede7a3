//! Error types for producer, transport and configuration operations.

use crate::transport::BatchResultErrorEntry;
use std::fmt;
use thiserror::Error;

/// Errors surfaced by [`SqsProducer`](crate::producer::SqsProducer) operations.
///
/// Every variant is returned directly to the caller. The producer never
/// retries; [`ProducerError::is_transient`] lets an outer layer decide.
#[derive(Debug, Error)]
pub enum ProducerError {
    #[error("The destination must be an instance of {expected} but got {actual}.")]
    InvalidDestination { expected: String, actual: String },

    #[error("{message}")]
    InvalidMessage { message: String },

    #[error("The provider does not support {capability} feature")]
    UnsupportedCapability { capability: Capability },

    #[error("Message was not sent")]
    SendFailed {
        #[source]
        source: Option<TransportError>,
    },

    #[error("Messages were not sent: {}", render_failed_entries(.failed))]
    BatchPartialFailure { failed: Vec<BatchResultErrorEntry> },

    #[error("Batch size {size} exceeds maximum {max_size}")]
    BatchTooLarge { size: usize, max_size: usize },

    #[error("Queue URL resolution failed: {0}")]
    Resolution(#[from] ResolutionError),
}

impl ProducerError {
    /// Build an [`ProducerError::InvalidMessage`] from any message text.
    pub fn invalid_message(message: impl Into<String>) -> Self {
        Self::InvalidMessage {
            message: message.into(),
        }
    }

    /// Check if the failure could succeed when the same call is repeated.
    ///
    /// Caller bugs (invalid destination/message, unsupported capabilities,
    /// oversized batches) are never transient. A batch failure is transient
    /// only when none of the failed entries were the sender's fault.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::InvalidDestination { .. } => false,
            Self::InvalidMessage { .. } => false,
            Self::UnsupportedCapability { .. } => false,
            Self::SendFailed { source } => source.as_ref().is_some_and(|e| e.is_transient()),
            Self::BatchPartialFailure { failed } => failed.iter().all(|entry| !entry.sender_fault),
            Self::BatchTooLarge { .. } => false,
            Self::Resolution(e) => e.is_transient(),
        }
    }
}

fn render_failed_entries(failed: &[BatchResultErrorEntry]) -> String {
    serde_json::to_string(failed).unwrap_or_else(|_| format!("{} failed entries", failed.len()))
}

/// Producer features the queue service has no concept of
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Priority,
    TimeToLive,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Priority => write!(f, "priority"),
            Self::TimeToLive => write!(f, "time to live"),
        }
    }
}

/// Failures while mapping a destination to its queue URL
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("Queue name must not be empty")]
    EmptyQueueName,

    #[error("Queue '{queue_name}' could not be resolved: {source}")]
    Transport {
        queue_name: String,
        #[source]
        source: TransportError,
    },
}

impl ResolutionError {
    /// Check if error is transient and should be retried
    pub fn is_transient(&self) -> bool {
        match self {
            Self::EmptyQueueName => false,
            Self::Transport { source, .. } => source.is_transient(),
        }
    }
}

/// Errors raised by an [`SqsTransport`](crate::transport::SqsTransport)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("SQS service error: {code} - {message}")]
    Service { code: String, message: String },

    #[error("Queue not found: {0}")]
    QueueNotFound(String),

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl TransportError {
    /// Check if error is transient and should be retried
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Authentication(_) => false,
            Self::Network(_) => true,
            Self::Service { .. } => true, // Most SQS errors are transient
            Self::QueueNotFound(_) => false,
            Self::Configuration(_) => false,
            Self::Serialization(_) => false,
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("The given scheme protocol \"{scheme}\" is not supported. It must be \"sqs\"")]
    UnsupportedScheme { scheme: String },

    #[error("The DSN is invalid.")]
    InvalidDsn,

    #[error("Configuration loading failed: {0}")]
    Load(#[from] config::ConfigError),
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
