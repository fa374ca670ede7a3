//! Producer sending messages to SQS queues.
//!
//! [`SqsProducer`] validates messages, builds request arguments through the
//! [`arguments`](crate::arguments) module, issues exactly one transport call
//! per operation and interprets the structured result.
//!
//! ## Failure semantics
//!
//! - Single send: a transport error and a result without a `MessageId` both
//!   surface as [`ProducerError::SendFailed`].
//! - Batch send is **all-or-nothing**: any failed entry turns the whole call
//!   into [`ProducerError::BatchPartialFailure`], listing every failed entry
//!   (code, id, message, sender fault) in the order of the caller's
//!   messages. No identifiers are returned for the entries that did succeed.
//!
//! Nothing is retried here.

use crate::arguments::{
    build_batch_arguments, build_send_arguments, validate_message, SendMessageBatchRequestEntry,
    MAX_BATCH_SIZE,
};
use crate::context::SqsContext;
use crate::error::{Capability, ProducerError};
use crate::message::{BatchEntrySent, MessageId, SentMessage, SqsDestination, SqsMessage};
use crate::transport::{BatchResultEntry, BatchResultErrorEntry};
use std::collections::HashMap;
use tracing::{debug, error, info, instrument, warn};

#[cfg(test)]
#[path = "producer_tests.rs"]
mod tests;

/// Sends messages to SQS queues through an [`SqsContext`].
///
/// The only state is the producer-wide delivery delay. Changing it needs
/// `&mut self`; a producer shared between concurrent senders must be wrapped
/// in the caller's own lock, and each send observes whatever value was set
/// last.
#[derive(Debug, Clone)]
pub struct SqsProducer {
    context: SqsContext,
    delivery_delay: Option<u64>,
}

impl SqsProducer {
    /// Create producer bound to a context
    pub fn new(context: SqsContext) -> Self {
        Self {
            context,
            delivery_delay: None,
        }
    }

    pub fn context(&self) -> &SqsContext {
        &self.context
    }

    /// Send a single message.
    ///
    /// Returns the identifier the queue service assigned to the message.
    ///
    /// # Errors
    ///
    /// - [`ProducerError::InvalidMessage`] if the body is empty (no remote call is made)
    /// - [`ProducerError::Resolution`] if the queue URL cannot be resolved
    /// - [`ProducerError::SendFailed`] if the call fails or the result has no `MessageId`
    #[instrument(skip(self, destination, message), fields(queue = %destination.name()))]
    pub async fn send(
        &self,
        destination: &SqsDestination,
        message: &SqsMessage,
    ) -> Result<SentMessage, ProducerError> {
        validate_message(message)?;
        warn_on_missing_group_id(destination, message);

        let queue_url = self.context.queue_url(destination).await?;
        let args = build_send_arguments(destination, queue_url, message, self.delivery_delay)?;

        debug!(
            delay_seconds = ?args.message.delay_seconds,
            "Sending message"
        );

        let output = self
            .context
            .transport()
            .send_message(&args)
            .await
            .map_err(|e| {
                error!(error = %e, "SendMessage call failed");
                ProducerError::SendFailed { source: Some(e) }
            })?;

        let message_id: MessageId = output
            .message_id
            .as_deref()
            .unwrap_or_default()
            .parse()
            .map_err(|e| {
                error!("SendMessage result carries no MessageId");
                e
            })?;

        info!(message_id = %message_id, "Message sent");

        Ok(SentMessage {
            message_id,
            sequence_number: output.sequence_number,
        })
    }

    /// Send several messages in one batch call.
    ///
    /// Every message is validated before anything is sent. Entries are
    /// correlated by each message's `message_id`, or `msg-{index}` when it
    /// has none, and the returned entries follow the order of `messages`.
    /// An empty slice returns an empty vector without a remote call.
    ///
    /// # Errors
    ///
    /// - [`ProducerError::InvalidMessage`] if any body is empty
    /// - [`ProducerError::BatchTooLarge`] for more than 10 messages
    /// - [`ProducerError::Resolution`] if the queue URL cannot be resolved
    /// - [`ProducerError::SendFailed`] if the call fails or an entry is unaccounted for
    /// - [`ProducerError::BatchPartialFailure`] if any entry was rejected; the
    ///   failed entries are listed in the order of `messages`
    pub async fn send_all(
        &self,
        destination: &SqsDestination,
        messages: &[SqsMessage],
    ) -> Result<Vec<BatchEntrySent>, ProducerError> {
        let messages: Vec<&SqsMessage> = messages.iter().collect();
        self.send_batch(destination, &messages).await
    }

    #[instrument(skip(self, destination, messages), fields(queue = %destination.name(), count = messages.len()))]
    pub(crate) async fn send_batch(
        &self,
        destination: &SqsDestination,
        messages: &[&SqsMessage],
    ) -> Result<Vec<BatchEntrySent>, ProducerError> {
        for message in messages {
            validate_message(message)?;
            warn_on_missing_group_id(destination, message);
        }

        if messages.is_empty() {
            return Ok(Vec::new());
        }

        if messages.len() > MAX_BATCH_SIZE {
            return Err(ProducerError::BatchTooLarge {
                size: messages.len(),
                max_size: MAX_BATCH_SIZE,
            });
        }

        let queue_url = self.context.queue_url(destination).await?;
        let args = build_batch_arguments(destination, queue_url, messages, self.delivery_delay)?;

        let output = self
            .context
            .transport()
            .send_message_batch(&args)
            .await
            .map_err(|e| {
                error!(error = %e, "SendMessageBatch call failed");
                ProducerError::SendFailed { source: Some(e) }
            })?;

        if !output.failed.is_empty() {
            error!(
                failed = output.failed.len(),
                successful = output.successful.len(),
                "Batch contained failed entries"
            );
            return Err(ProducerError::BatchPartialFailure {
                failed: in_request_order(&args.entries, output.failed),
            });
        }

        let mut successful: HashMap<String, BatchResultEntry> = output
            .successful
            .into_iter()
            .map(|entry| (entry.id.clone(), entry))
            .collect();

        let mut sent = Vec::with_capacity(args.entries.len());
        for entry in &args.entries {
            let result = successful.remove(&entry.id).ok_or_else(|| {
                error!(entry_id = %entry.id, "Batch result does not account for entry");
                ProducerError::SendFailed { source: None }
            })?;

            sent.push(BatchEntrySent {
                message_id: result.message_id.parse()?,
                id: result.id,
                sequence_number: result.sequence_number,
            });
        }

        info!(count = sent.len(), "Batch sent");

        Ok(sent)
    }

    /// Set the producer-wide delivery delay in milliseconds; `None` clears it
    pub fn set_delivery_delay(&mut self, delivery_delay: Option<u64>) -> &mut Self {
        self.delivery_delay = delivery_delay;
        self
    }

    pub fn delivery_delay(&self) -> Option<u64> {
        self.delivery_delay
    }

    /// SQS has no message priority; only `None` is accepted
    ///
    /// # Errors
    ///
    /// Returns [`ProducerError::UnsupportedCapability`] for any `Some` value.
    pub fn set_priority(&mut self, priority: Option<u8>) -> Result<&mut Self, ProducerError> {
        match priority {
            None => Ok(self),
            Some(_) => Err(ProducerError::UnsupportedCapability {
                capability: Capability::Priority,
            }),
        }
    }

    pub fn priority(&self) -> Option<u8> {
        None
    }

    /// SQS has no per-message time to live; only `None` is accepted
    ///
    /// # Errors
    ///
    /// Returns [`ProducerError::UnsupportedCapability`] for any `Some` value.
    pub fn set_time_to_live(
        &mut self,
        time_to_live: Option<u64>,
    ) -> Result<&mut Self, ProducerError> {
        match time_to_live {
            None => Ok(self),
            Some(_) => Err(ProducerError::UnsupportedCapability {
                capability: Capability::TimeToLive,
            }),
        }
    }

    pub fn time_to_live(&self) -> Option<u64> {
        None
    }
}

/// Order failed entries like the request entries they belong to.
///
/// Entries with an unknown id go last, in the order they were returned.
fn in_request_order(
    entries: &[SendMessageBatchRequestEntry],
    mut failed: Vec<BatchResultErrorEntry>,
) -> Vec<BatchResultErrorEntry> {
    let positions: HashMap<&str, usize> = entries
        .iter()
        .enumerate()
        .map(|(index, entry)| (entry.id.as_str(), index))
        .collect();

    failed.sort_by_key(|entry| {
        positions
            .get(entry.id.as_str())
            .copied()
            .unwrap_or(usize::MAX)
    });
    failed
}

/// FIFO queues reject messages without a group id
fn is_missing_group_id(destination: &SqsDestination, message: &SqsMessage) -> bool {
    destination.is_fifo() && message.message_group_id().unwrap_or_default().is_empty()
}

fn warn_on_missing_group_id(destination: &SqsDestination, message: &SqsMessage) {
    if is_missing_group_id(destination, message) {
        warn!(
            queue = %destination.name(),
            "FIFO queue message has no MessageGroupId; the service will reject it"
        );
    }
}
