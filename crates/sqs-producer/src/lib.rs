//! # SQS Producer
//!
//! Producer adapter that sends messages to Amazon SQS queues.
//!
//! This library provides:
//! - Translation of a message into `SendMessage` / `SendMessageBatch` arguments
//! - Delivery delay precedence between the message and the producer default
//! - Single send and all-or-nothing batch send semantics
//! - Queue URL resolution with per-context caching
//! - An HTTP transport for the SQS query API and an in-memory transport
//!
//! ## Module Organization
//!
//! - [`message`] - Destinations, messages and send results
//! - [`arguments`] - Wire argument construction
//! - [`producer`] - Send operations
//! - [`context`] - Transport handle and queue URL resolution
//! - [`transport`] - Transport trait and result types
//! - [`providers`] - HTTP and in-memory transports
//! - [`config`] - Connection configuration
//! - [`interop`] - Provider-neutral producer interface
//! - [`error`] - Error types
//!
//! ## Example
//!
//! ```no_run
//! use sqs_producer::{SqsConnectionConfig, SqsContext};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SqsConnectionConfig::from_dsn("sqs:?key=AKIA&secret=s3cr3t&region=eu-west-1")?;
//! let context = SqsContext::from_config(config)?;
//!
//! let mut producer = context.create_producer();
//! producer.set_delivery_delay(Some(5000));
//!
//! let queue = context.create_queue("orders");
//! let message = context
//!     .create_message("{\"order\":42}")
//!     .with_header("content-type", "application/json");
//!
//! let sent = producer.send(&queue, &message).await?;
//! println!("sent {}", sent.message_id);
//! # Ok(())
//! # }
//! ```

// Module declarations
pub mod arguments;
pub mod config;
pub mod context;
pub mod error;
pub mod interop;
pub mod message;
pub mod producer;
pub mod providers;
pub mod transport;

// Re-export commonly used types at crate root for convenience
pub use arguments::{
    MessageArguments, MessageAttributeValue, SendMessageArgs, SendMessageBatchArgs,
    SendMessageBatchRequestEntry, HEADERS_ATTRIBUTE, MAX_BATCH_SIZE,
};
pub use config::SqsConnectionConfig;
pub use context::SqsContext;
pub use error::{Capability, ConfigurationError, ProducerError, ResolutionError, TransportError};
pub use interop::{Destination, Producer, QueueMessage};
pub use message::{AttributeMap, BatchEntrySent, MessageId, SentMessage, SqsDestination, SqsMessage};
pub use producer::SqsProducer;
pub use providers::{HttpSqsTransport, InMemoryTransport};
pub use transport::{
    BatchResultEntry, BatchResultErrorEntry, GetQueueUrlArgs, SendMessageBatchOutput,
    SendMessageOutput, SqsTransport,
};
