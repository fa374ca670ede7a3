//! Connection context: a transport handle plus queue URL resolution.

use crate::config::SqsConnectionConfig;
use crate::error::{ResolutionError, TransportError};
use crate::message::{SqsDestination, SqsMessage};
use crate::producer::SqsProducer;
use crate::providers::HttpSqsTransport;
use crate::transport::{GetQueueUrlArgs, SqsTransport};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;

type CacheKey = (String, Option<String>);

/// Shared handle to an SQS transport.
///
/// Cloning is cheap; clones share the transport and the queue URL cache.
///
/// ## Thread Safety
///
/// The queue URL cache is protected by a `RwLock`, so a context can be shared
/// across async tasks.
#[derive(Clone)]
pub struct SqsContext {
    transport: Arc<dyn SqsTransport>,
    queue_url_cache: Arc<RwLock<HashMap<CacheKey, String>>>,
}

impl SqsContext {
    /// Create context over an existing transport
    pub fn new(transport: Arc<dyn SqsTransport>) -> Self {
        Self {
            transport,
            queue_url_cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Create context backed by the HTTP transport
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be created.
    pub fn from_config(config: SqsConnectionConfig) -> Result<Self, TransportError> {
        let transport = HttpSqsTransport::new(config)?;
        Ok(Self::new(Arc::new(transport)))
    }

    /// Get the underlying transport
    pub fn transport(&self) -> &dyn SqsTransport {
        self.transport.as_ref()
    }

    /// Create a producer bound to this context
    pub fn create_producer(&self) -> SqsProducer {
        SqsProducer::new(self.clone())
    }

    /// Create a destination for a queue name
    pub fn create_queue(&self, name: impl Into<String>) -> SqsDestination {
        SqsDestination::new(name)
    }

    /// Create a message with a body
    pub fn create_message(&self, body: impl Into<String>) -> SqsMessage {
        SqsMessage::new(body)
    }

    /// Resolve the queue URL for a destination, with caching
    ///
    /// A URL attached to the destination wins. Otherwise the URL is looked up
    /// once per (name, region) pair and cached.
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError::EmptyQueueName`] for a destination without
    /// a name, and [`ResolutionError::Transport`] if the lookup call fails.
    pub async fn queue_url(&self, destination: &SqsDestination) -> Result<String, ResolutionError> {
        if let Some(url) = destination.queue_url() {
            return Ok(url.to_string());
        }

        if destination.name().is_empty() {
            return Err(ResolutionError::EmptyQueueName);
        }

        let key = (
            destination.name().to_string(),
            destination.region().map(str::to_string),
        );

        // Check cache first
        {
            let cache = self.queue_url_cache.read().await;
            if let Some(url) = cache.get(&key) {
                return Ok(url.clone());
            }
        }

        let args = GetQueueUrlArgs {
            queue_name: key.0.clone(),
            region: key.1.clone(),
        };
        let queue_url = self
            .transport
            .get_queue_url(&args)
            .await
            .map_err(|source| ResolutionError::Transport {
                queue_name: destination.name().to_string(),
                source,
            })?;

        debug!(queue = %destination.name(), queue_url = %queue_url, "Resolved queue URL");

        let mut cache = self.queue_url_cache.write().await;
        cache.insert(key, queue_url.clone());

        Ok(queue_url)
    }
}

impl fmt::Debug for SqsContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqsContext")
            .field("queue_url_cache_size", &"<redacted>")
            .finish()
    }
}
