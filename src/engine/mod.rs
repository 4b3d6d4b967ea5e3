//! Queue engine: send, receive and stats over a shared [`Store`].
//!
//! Producers and workers in any number of processes coordinate only
//! through the store's atomic operations; the engine holds no locks of its
//! own.

mod failure;
mod receive;
mod stats;
mod worker;

use std::sync::Arc;
use std::time::Duration;

use opentelemetry::KeyValue;
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::Message;
use crate::store::{Store, keys};
use crate::telemetry::metrics;

/// Tunables for the engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Longest single wait of a dequeue attempt. Cancellation is checked
    /// between attempts, so this bounds how long a cancelled worker may
    /// take to stop.
    pub poll_timeout: Duration,
    /// Number of most recent failure records returned by stats.
    pub failed_window: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_secs(1),
            failed_window: 21,
        }
    }
}

/// The queue engine. Cheap to clone; clones share the same store.
pub struct Engine<S> {
    store: Arc<S>,
    config: EngineConfig,
}

impl<S> Clone for Engine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config.clone(),
        }
    }
}

impl<S: Store> Engine<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, EngineConfig::default())
    }

    pub fn with_config(store: S, config: EngineConfig) -> Self {
        Self {
            store: Arc::new(store),
            config,
        }
    }

    /// Health check against the store.
    pub async fn ping(&self) -> Result<()> {
        self.store.ping().await
    }

    /// Register `queue` and append a new message carrying `payload`.
    ///
    /// Registration is a set-add, so concurrent senders to a new queue
    /// leave exactly one registry entry.
    pub async fn send(&self, queue: &str, payload: &str) -> Result<()> {
        self.send_message(&Message::new(queue, payload)).await
    }

    async fn send_message(&self, message: &Message) -> Result<()> {
        let queue = message.queue.as_deref().unwrap_or_default();
        if queue.is_empty() {
            return Err(Error::InvalidArgument(
                "queue name must not be empty".to_string(),
            ));
        }
        let raw = message.to_json()?;

        self.store.set_add(keys::QUEUES, queue).await?;
        let depth = self.store.list_push(&keys::queue(queue), &raw).await?;

        metrics::messages_sent().add(1, &[KeyValue::new("queue", queue.to_string())]);
        debug!(queue, depth, "message sent");
        Ok(())
    }
}
