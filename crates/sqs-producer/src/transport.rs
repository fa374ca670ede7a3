//! Transport trait for the SQS API calls the producer issues, and the
//! structured results those calls return.

use crate::arguments::{SendMessageArgs, SendMessageBatchArgs};
use crate::error::TransportError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Interface implemented by SQS transports (HTTP, in-memory, ...)
///
/// Implementations perform exactly one remote call per method. Retry and
/// timeout policy, if any, belongs to the implementation.
#[async_trait]
pub trait SqsTransport: Send + Sync {
    /// Resolve a queue name to its URL
    async fn get_queue_url(&self, args: &GetQueueUrlArgs) -> Result<String, TransportError>;

    /// Send single message
    async fn send_message(&self, args: &SendMessageArgs)
        -> Result<SendMessageOutput, TransportError>;

    /// Send up to 10 messages in one call
    async fn send_message_batch(
        &self,
        args: &SendMessageBatchArgs,
    ) -> Result<SendMessageBatchOutput, TransportError>;
}

/// Arguments for the `GetQueueUrl` call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetQueueUrlArgs {
    pub queue_name: String,
    #[serde(skip)]
    pub region: Option<String>,
}

/// Result of a `SendMessage` call.
///
/// `message_id` is the success marker: a result without it means the message
/// was not accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SendMessageOutput {
    pub message_id: Option<String>,
    #[serde(rename = "MD5OfMessageBody")]
    pub md5_of_message_body: Option<String>,
    #[serde(rename = "MD5OfMessageAttributes")]
    pub md5_of_message_attributes: Option<String>,
    pub sequence_number: Option<String>,
}

/// Result of a `SendMessageBatch` call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SendMessageBatchOutput {
    #[serde(default)]
    pub successful: Vec<BatchResultEntry>,
    #[serde(default)]
    pub failed: Vec<BatchResultErrorEntry>,
}

/// One accepted entry of a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BatchResultEntry {
    pub id: String,
    pub message_id: String,
    #[serde(rename = "MD5OfMessageBody", default)]
    pub md5_of_message_body: Option<String>,
    #[serde(rename = "MD5OfMessageAttributes", default)]
    pub md5_of_message_attributes: Option<String>,
    #[serde(default)]
    pub sequence_number: Option<String>,
}

/// One rejected entry of a batch.
///
/// Field order is the order in which entries are rendered in
/// [`ProducerError::BatchPartialFailure`](crate::error::ProducerError).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BatchResultErrorEntry {
    pub code: String,
    pub id: String,
    #[serde(default)]
    pub message: String,
    pub sender_fault: bool,
}
