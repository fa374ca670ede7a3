//! Translation of messages into SQS request arguments.
//!
//! The functions here are pure: they validate a message, apply the
//! delivery-delay precedence rule and produce the argument structures the
//! transport sends. Serialized with `serde_json`, the argument structures have
//! exactly the shape of the SQS JSON API requests:
//!
//! ```text
//! {
//!   "QueueUrl": "...",
//!   "MessageBody": "...",
//!   "MessageAttributes": { "Headers": { "DataType": "String", "StringValue": "[{..},{..}]" } },
//!   "DelaySeconds": 5,                 // optional
//!   "MessageDeduplicationId": "...",   // optional
//!   "MessageGroupId": "..."            // optional
//! }
//! ```
//!
//! ## Delivery delay precedence
//!
//! 1. A message-level `delay_seconds` that is present and non-zero wins.
//! 2. Otherwise a producer default (milliseconds) contributes
//!    `floor(default / 1000)`, including `0` when the default is below one
//!    second.
//! 3. Otherwise `DelaySeconds` is omitted.
//!
//! ## Headers attribute
//!
//! Headers and properties travel as one string attribute named `Headers`
//! holding the JSON array `[headers, properties]`. Receivers decode it with
//! [`decode_headers_attribute`].

use crate::error::ProducerError;
use crate::message::{AttributeMap, SqsDestination, SqsMessage};
use serde::de::Error as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[cfg(test)]
#[path = "arguments_tests.rs"]
mod tests;

/// Name of the message attribute carrying headers and properties
pub const HEADERS_ATTRIBUTE: &str = "Headers";

/// Maximum number of entries SQS accepts in one `SendMessageBatch` call
pub const MAX_BATCH_SIZE: usize = 10;

const EMPTY_BODY_MESSAGE: &str = "The message body must be a non-empty string.";

// ============================================================================
// Wire Argument Types
// ============================================================================

/// Typed value of a message attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MessageAttributeValue {
    pub data_type: String,
    pub string_value: String,
}

impl MessageAttributeValue {
    /// Create a `String` attribute
    pub fn string(value: impl Into<String>) -> Self {
        Self {
            data_type: "String".to_string(),
            string_value: value.into(),
        }
    }
}

/// Per-message part of a send request, shared by single and batch sends
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MessageArguments {
    pub message_body: String,
    pub message_attributes: BTreeMap<String, MessageAttributeValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_deduplication_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_group_id: Option<String>,
}

/// Arguments for the `SendMessage` call.
///
/// `region` is a routing directive for the transport and is never serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SendMessageArgs {
    pub queue_url: String,
    #[serde(flatten)]
    pub message: MessageArguments,
    #[serde(skip)]
    pub region: Option<String>,
}

/// One entry of a `SendMessageBatch` call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SendMessageBatchRequestEntry {
    pub id: String,
    #[serde(flatten)]
    pub message: MessageArguments,
}

/// Arguments for the `SendMessageBatch` call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SendMessageBatchArgs {
    pub queue_url: String,
    pub entries: Vec<SendMessageBatchRequestEntry>,
    #[serde(skip)]
    pub region: Option<String>,
}

// ============================================================================
// Builders
// ============================================================================

/// Reject messages that cannot be sent
pub fn validate_message(message: &SqsMessage) -> Result<(), ProducerError> {
    if message.body().is_empty() {
        return Err(ProducerError::invalid_message(EMPTY_BODY_MESSAGE));
    }

    Ok(())
}

/// Apply the delivery delay precedence rule
pub fn resolve_delay_seconds(
    message_delay_seconds: Option<u32>,
    default_delivery_delay_ms: Option<u64>,
) -> Option<u64> {
    match message_delay_seconds {
        Some(seconds) if seconds > 0 => Some(u64::from(seconds)),
        _ => default_delivery_delay_ms.map(|ms| ms / 1000),
    }
}

/// Encode headers and properties as the `[headers, properties]` JSON text
pub fn encode_headers_attribute(
    headers: &AttributeMap,
    properties: &AttributeMap,
) -> Result<String, ProducerError> {
    serde_json::to_string(&(headers, properties)).map_err(|e| {
        ProducerError::invalid_message(format!("Message headers could not be encoded: {}", e))
    })
}

/// Decode the `[headers, properties]` JSON text produced by
/// [`encode_headers_attribute`].
///
/// An empty JSON array is accepted in place of an empty object in either slot.
pub fn decode_headers_attribute(
    value: &str,
) -> Result<(AttributeMap, AttributeMap), serde_json::Error> {
    let (headers, properties): (Slot, Slot) = serde_json::from_str(value)?;
    Ok((headers.into_map()?, properties.into_map()?))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Slot {
    Map(AttributeMap),
    List(Vec<Value>),
}

impl Slot {
    fn into_map(self) -> Result<AttributeMap, serde_json::Error> {
        match self {
            Self::Map(map) => Ok(map),
            Self::List(list) if list.is_empty() => Ok(AttributeMap::new()),
            Self::List(_) => Err(serde_json::Error::custom(
                "headers attribute slot must be an object",
            )),
        }
    }
}

/// Build the per-message arguments shared by single and batch sends
pub fn build_message_arguments(
    message: &SqsMessage,
    default_delivery_delay_ms: Option<u64>,
) -> Result<MessageArguments, ProducerError> {
    validate_message(message)?;

    let headers = encode_headers_attribute(message.headers(), message.properties())?;
    let mut message_attributes = BTreeMap::new();
    message_attributes.insert(
        HEADERS_ATTRIBUTE.to_string(),
        MessageAttributeValue::string(headers),
    );

    Ok(MessageArguments {
        message_body: message.body().to_string(),
        message_attributes,
        delay_seconds: resolve_delay_seconds(message.delay_seconds(), default_delivery_delay_ms),
        message_deduplication_id: non_empty(message.message_deduplication_id()),
        message_group_id: non_empty(message.message_group_id()),
    })
}

/// Build the arguments of a `SendMessage` call
pub fn build_send_arguments(
    destination: &SqsDestination,
    queue_url: String,
    message: &SqsMessage,
    default_delivery_delay_ms: Option<u64>,
) -> Result<SendMessageArgs, ProducerError> {
    Ok(SendMessageArgs {
        queue_url,
        message: build_message_arguments(message, default_delivery_delay_ms)?,
        region: destination.region().map(str::to_string),
    })
}

/// Build the arguments of a `SendMessageBatch` call.
///
/// Each entry is correlated by the message's own `message_id`, or by
/// `msg-{index}` when the message has none.
pub fn build_batch_arguments(
    destination: &SqsDestination,
    queue_url: String,
    messages: &[&SqsMessage],
    default_delivery_delay_ms: Option<u64>,
) -> Result<SendMessageBatchArgs, ProducerError> {
    let entries = messages
        .iter()
        .enumerate()
        .map(|(index, message)| {
            Ok(SendMessageBatchRequestEntry {
                id: batch_entry_id(index, message),
                message: build_message_arguments(message, default_delivery_delay_ms)?,
            })
        })
        .collect::<Result<Vec<_>, ProducerError>>()?;

    Ok(SendMessageBatchArgs {
        queue_url,
        entries,
        region: destination.region().map(str::to_string),
    })
}

/// Correlation ID of a message inside a batch request
pub fn batch_entry_id(index: usize, message: &SqsMessage) -> String {
    non_empty(message.message_id()).unwrap_or_else(|| format!("msg-{}", index))
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}
