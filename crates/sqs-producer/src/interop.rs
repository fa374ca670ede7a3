//! Provider-neutral producer interface.
//!
//! Code that works with several queue providers holds destinations and
//! messages as trait objects. This is the only place a runtime kind check
//! happens: [`SqsProducer`]'s implementation of [`Producer`] accepts only
//! [`SqsDestination`] and [`SqsMessage`] values and rejects anything else
//! before a remote call is made. Code that already has the concrete types
//! should call the inherent [`SqsProducer`] methods instead.

use crate::error::ProducerError;
use crate::message::{BatchEntrySent, SentMessage, SqsDestination, SqsMessage};
use crate::producer::SqsProducer;
use async_trait::async_trait;
use std::any::Any;
use std::fmt::Debug;

#[cfg(test)]
#[path = "interop_tests.rs"]
mod tests;

/// An addressable queue target of some provider
pub trait Destination: Any + Debug + Send + Sync {
    /// Short name of the concrete destination type, used in error messages
    fn kind(&self) -> &'static str;

    fn as_any(&self) -> &dyn Any;
}

/// A unit of payload of some provider
pub trait QueueMessage: Any + Debug + Send + Sync {
    /// Short name of the concrete message type, used in error messages
    fn kind(&self) -> &'static str;

    fn as_any(&self) -> &dyn Any;
}

impl Destination for SqsDestination {
    fn kind(&self) -> &'static str {
        "SqsDestination"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl QueueMessage for SqsMessage {
    fn kind(&self) -> &'static str {
        "SqsMessage"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Interface implemented by provider producers
#[async_trait]
pub trait Producer: Send + Sync {
    /// Send single message
    async fn send(
        &self,
        destination: &dyn Destination,
        message: &dyn QueueMessage,
    ) -> Result<SentMessage, ProducerError>;

    /// Send multiple messages in one call
    async fn send_all(
        &self,
        destination: &dyn Destination,
        messages: &[&dyn QueueMessage],
    ) -> Result<Vec<BatchEntrySent>, ProducerError>;

    /// Set the default delivery delay in milliseconds
    fn set_delivery_delay(&mut self, delivery_delay: Option<u64>);

    fn delivery_delay(&self) -> Option<u64>;

    /// Set message priority
    fn set_priority(&mut self, priority: Option<u8>) -> Result<(), ProducerError>;

    fn priority(&self) -> Option<u8>;

    /// Set message time to live in milliseconds
    fn set_time_to_live(&mut self, time_to_live: Option<u64>) -> Result<(), ProducerError>;

    fn time_to_live(&self) -> Option<u64>;
}

/// Narrow a provider-neutral destination to an SQS destination
///
/// # Errors
///
/// Returns [`ProducerError::InvalidDestination`] for any other kind.
pub fn sqs_destination(destination: &dyn Destination) -> Result<&SqsDestination, ProducerError> {
    destination
        .as_any()
        .downcast_ref::<SqsDestination>()
        .ok_or_else(|| ProducerError::InvalidDestination {
            expected: "SqsDestination".to_string(),
            actual: destination.kind().to_string(),
        })
}

/// Narrow a provider-neutral message to an SQS message
///
/// # Errors
///
/// Returns [`ProducerError::InvalidMessage`] for any other kind.
pub fn sqs_message(message: &dyn QueueMessage) -> Result<&SqsMessage, ProducerError> {
    message
        .as_any()
        .downcast_ref::<SqsMessage>()
        .ok_or_else(|| {
            ProducerError::invalid_message(format!(
                "The message must be an instance of SqsMessage but got {}.",
                message.kind()
            ))
        })
}

#[async_trait]
impl Producer for SqsProducer {
    async fn send(
        &self,
        destination: &dyn Destination,
        message: &dyn QueueMessage,
    ) -> Result<SentMessage, ProducerError> {
        let destination = sqs_destination(destination)?;
        let message = sqs_message(message)?;
        SqsProducer::send(self, destination, message).await
    }

    async fn send_all(
        &self,
        destination: &dyn Destination,
        messages: &[&dyn QueueMessage],
    ) -> Result<Vec<BatchEntrySent>, ProducerError> {
        let destination = sqs_destination(destination)?;
        let messages = messages
            .iter()
            .map(|message| sqs_message(*message))
            .collect::<Result<Vec<_>, _>>()?;
        self.send_batch(destination, &messages).await
    }

    fn set_delivery_delay(&mut self, delivery_delay: Option<u64>) {
        SqsProducer::set_delivery_delay(self, delivery_delay);
    }

    fn delivery_delay(&self) -> Option<u64> {
        SqsProducer::delivery_delay(self)
    }

    fn set_priority(&mut self, priority: Option<u8>) -> Result<(), ProducerError> {
        SqsProducer::set_priority(self, priority).map(|_| ())
    }

    fn priority(&self) -> Option<u8> {
        SqsProducer::priority(self)
    }

    fn set_time_to_live(&mut self, time_to_live: Option<u64>) -> Result<(), ProducerError> {
        SqsProducer::set_time_to_live(self, time_to_live).map(|_| ())
    }

    fn time_to_live(&self) -> Option<u64> {
        SqsProducer::time_to_live(self)
    }
}
