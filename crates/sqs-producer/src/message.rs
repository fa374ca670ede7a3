//! Destination and message value types, plus provider-assigned identifiers.

use crate::error::ProducerError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::str::FromStr;

/// Caller-defined metadata attached to a message (headers or properties)
pub type AttributeMap = BTreeMap<String, Value>;

// ============================================================================
// Destination
// ============================================================================

/// A named SQS queue that messages are sent to.
///
/// The queue URL is normally resolved lazily by
/// [`SqsContext`](crate::context::SqsContext) and cached there. A URL that is
/// already known can be attached with [`SqsDestination::with_queue_url`] to
/// skip resolution entirely.
///
/// An empty name is accepted here and rejected only when a queue URL has to
/// be resolved for it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SqsDestination {
    name: String,
    region: Option<String>,
    queue_url: Option<String>,
}

impl SqsDestination {
    /// Create destination for a queue name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            region: None,
            queue_url: None,
        }
    }

    /// Route calls for this queue to a specific region
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Attach a pre-resolved queue URL
    pub fn with_queue_url(mut self, queue_url: impl Into<String>) -> Self {
        self.queue_url = Some(queue_url.into());
        self
    }

    /// Get queue name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get region override, if any
    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    /// Get pre-resolved queue URL, if any
    pub fn queue_url(&self) -> Option<&str> {
        self.queue_url.as_deref()
    }

    /// Check if this is a FIFO queue
    pub fn is_fifo(&self) -> bool {
        self.name.ends_with(".fifo")
    }
}

impl std::fmt::Display for SqsDestination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

// ============================================================================
// Message
// ============================================================================

/// A message to be sent to an SQS queue.
///
/// Headers carry transport-level metadata, properties carry application-level
/// metadata. Both travel together in a single `Headers` message attribute.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SqsMessage {
    body: String,
    #[serde(default)]
    headers: AttributeMap,
    #[serde(default)]
    properties: AttributeMap,
    delay_seconds: Option<u32>,
    message_deduplication_id: Option<String>,
    message_group_id: Option<String>,
    message_id: Option<String>,
}

impl SqsMessage {
    /// Create new message with body
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            ..Self::default()
        }
    }

    /// Replace all headers
    pub fn with_headers(mut self, headers: AttributeMap) -> Self {
        self.headers = headers;
        self
    }

    /// Add a single header
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Replace all properties
    pub fn with_properties(mut self, properties: AttributeMap) -> Self {
        self.properties = properties;
        self
    }

    /// Add a single property
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Delay delivery of this message, overriding the producer default
    pub fn with_delay_seconds(mut self, delay_seconds: u32) -> Self {
        self.delay_seconds = Some(delay_seconds);
        self
    }

    /// Set deduplication ID (FIFO queues)
    pub fn with_message_deduplication_id(mut self, id: impl Into<String>) -> Self {
        self.message_deduplication_id = Some(id.into());
        self
    }

    /// Set message group ID (FIFO queues)
    pub fn with_message_group_id(mut self, id: impl Into<String>) -> Self {
        self.message_group_id = Some(id.into());
        self
    }

    /// Set correlation ID used for this message inside a batch request
    pub fn with_message_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = Some(id.into());
        self
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn headers(&self) -> &AttributeMap {
        &self.headers
    }

    pub fn properties(&self) -> &AttributeMap {
        &self.properties
    }

    pub fn delay_seconds(&self) -> Option<u32> {
        self.delay_seconds
    }

    pub fn message_deduplication_id(&self) -> Option<&str> {
        self.message_deduplication_id.as_deref()
    }

    pub fn message_group_id(&self) -> Option<&str> {
        self.message_group_id.as_deref()
    }

    pub fn message_id(&self) -> Option<&str> {
        self.message_id.as_deref()
    }
}

// ============================================================================
// Send Results
// ============================================================================

/// Identifier assigned to a message by the queue service
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(String);

impl MessageId {
    /// Get message ID as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MessageId {
    type Err = ProducerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ProducerError::SendFailed { source: None });
        }

        Ok(Self(s.to_string()))
    }
}

/// Outcome of a successful single send
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentMessage {
    pub message_id: MessageId,
    /// Present for FIFO queues only
    pub sequence_number: Option<String>,
}

/// Outcome of one successful entry in a batch send
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchEntrySent {
    /// Correlation ID of the entry in the batch request
    pub id: String,
    pub message_id: MessageId,
    pub sequence_number: Option<String>,
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
