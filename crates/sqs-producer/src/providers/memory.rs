//! In-memory transport for testing and development.
//!
//! This transport:
//! - Resolves queue URLs from an explicit registry of queues
//! - Records every request it receives, in order
//! - Accepts every message by default, assigning random message IDs
//! - Replays scripted results or errors when queued with `push_*`
//!
//! It is intended for unit tests of code built on the producer and for
//! running without AWS infrastructure.

use crate::arguments::{SendMessageArgs, SendMessageBatchArgs};
use crate::error::TransportError;
use crate::transport::{
    BatchResultEntry, GetQueueUrlArgs, SendMessageBatchOutput, SendMessageOutput, SqsTransport,
};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};
use tracing::warn;

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;

/// Thread-safe state for the in-memory transport
#[derive(Default)]
struct TransportState {
    /// Queue name to queue URL
    queues: HashMap<String, String>,
    queue_url_requests: Vec<GetQueueUrlArgs>,
    sent_messages: Vec<SendMessageArgs>,
    sent_batches: Vec<SendMessageBatchArgs>,
    send_results: VecDeque<Result<SendMessageOutput, TransportError>>,
    batch_results: VecDeque<Result<SendMessageBatchOutput, TransportError>>,
}

/// In-memory [`SqsTransport`]
///
/// Clones share state, so a test can keep one clone for inspection while a
/// context owns another.
#[derive(Clone, Default)]
pub struct InMemoryTransport {
    state: Arc<RwLock<TransportState>>,
}

impl InMemoryTransport {
    /// Create transport with no registered queues
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a queue so its URL can be resolved
    pub fn with_queue(self, name: impl Into<String>, queue_url: impl Into<String>) -> Self {
        let (name, queue_url) = (name.into(), queue_url.into());
        self.update("with_queue", |state| {
            state.queues.insert(name, queue_url);
        });
        self
    }

    /// Queue the result of the next `send_message` call
    pub fn push_send_result(&self, result: Result<SendMessageOutput, TransportError>) {
        self.update("push_send_result", |state| state.send_results.push_back(result));
    }

    /// Queue the result of the next `send_message_batch` call
    pub fn push_batch_result(&self, result: Result<SendMessageBatchOutput, TransportError>) {
        self.update("push_batch_result", |state| state.batch_results.push_back(result));
    }

    /// All `get_queue_url` requests received so far
    pub fn queue_url_requests(&self) -> Vec<GetQueueUrlArgs> {
        self.read(|state| state.queue_url_requests.clone())
    }

    /// All `send_message` requests received so far
    pub fn sent_messages(&self) -> Vec<SendMessageArgs> {
        self.read(|state| state.sent_messages.clone())
    }

    /// All `send_message_batch` requests received so far
    pub fn sent_batches(&self) -> Vec<SendMessageBatchArgs> {
        self.read(|state| state.sent_batches.clone())
    }

    /// Total number of remote calls received
    pub fn call_count(&self) -> usize {
        self.read(|state| {
            state.queue_url_requests.len() + state.sent_messages.len() + state.sent_batches.len()
        })
    }

    fn read<T: Default>(&self, f: impl FnOnce(&TransportState) -> T) -> T {
        self.state.read().map(|state| f(&state)).unwrap_or_default()
    }

    /// Apply a setup change; a poisoned lock drops the change with a warning
    fn update(&self, operation: &str, f: impl FnOnce(&mut TransportState)) {
        match self.state.write() {
            Ok(mut state) => f(&mut state),
            Err(_) => warn!(operation = operation, "Transport state lock poisoned; change dropped"),
        }
    }

    fn write<T>(
        &self,
        f: impl FnOnce(&mut TransportState) -> Result<T, TransportError>,
    ) -> Result<T, TransportError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| TransportError::Network("transport state lock poisoned".to_string()))?;
        f(&mut state)
    }
}

#[async_trait]
impl SqsTransport for InMemoryTransport {
    async fn get_queue_url(&self, args: &GetQueueUrlArgs) -> Result<String, TransportError> {
        self.write(|state| {
            state.queue_url_requests.push(args.clone());
            state
                .queues
                .get(&args.queue_name)
                .cloned()
                .ok_or_else(|| TransportError::QueueNotFound(args.queue_name.clone()))
        })
    }

    async fn send_message(
        &self,
        args: &SendMessageArgs,
    ) -> Result<SendMessageOutput, TransportError> {
        self.write(|state| {
            state.sent_messages.push(args.clone());
            state.send_results.pop_front().unwrap_or_else(|| {
                Ok(SendMessageOutput {
                    message_id: Some(uuid::Uuid::new_v4().to_string()),
                    ..SendMessageOutput::default()
                })
            })
        })
    }

    async fn send_message_batch(
        &self,
        args: &SendMessageBatchArgs,
    ) -> Result<SendMessageBatchOutput, TransportError> {
        self.write(|state| {
            state.sent_batches.push(args.clone());
            state.batch_results.pop_front().unwrap_or_else(|| {
                Ok(SendMessageBatchOutput {
                    successful: args
                        .entries
                        .iter()
                        .map(|entry| BatchResultEntry {
                            id: entry.id.clone(),
                            message_id: uuid::Uuid::new_v4().to_string(),
                            md5_of_message_body: None,
                            md5_of_message_attributes: None,
                            sequence_number: None,
                        })
                        .collect(),
                    failed: Vec::new(),
                })
            })
        })
    }
}
