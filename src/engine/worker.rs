//! Worker registry: identity, liveness registration and per-worker keys.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use opentelemetry::KeyValue;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::store::{Store, keys};
use crate::telemetry::metrics;

/// Last timestamp handed out, so identities made in the same nanosecond
/// by one process still differ.
static LAST_STAMP: AtomicI64 = AtomicI64::new(0);

fn next_stamp() -> i64 {
    let now = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    match LAST_STAMP.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
        Some(now.max(last + 1))
    }) {
        Ok(prev) | Err(prev) => now.max(prev + 1),
    }
}

/// `{hostname}:{pid}:{queue}:{stamp}`.
pub(crate) fn worker_id(queue: &str) -> String {
    let host = hostname::get()
        .map_or_else(|_| "unknown".into(), |h| h.to_string_lossy().to_string());
    format!("{host}:{}:{queue}:{}", std::process::id(), next_stamp())
}

/// A registered worker.
///
/// Call [`Worker::deregister`] when done. If a `Worker` is dropped without
/// it (the owning future was dropped mid-flight), the same cleanup is
/// spawned on the current runtime.
pub(crate) struct Worker<S: Store> {
    id: String,
    queue: String,
    processing: String,
    counters: String,
    store: Arc<S>,
    released: bool,
}

impl<S: Store> Worker<S> {
    /// Add a fresh identity to the worker set.
    pub(crate) async fn register(store: Arc<S>, queue: &str) -> Result<Self> {
        let id = worker_id(queue);
        let added = store.set_add(keys::WORKERS, &id).await?;
        if added != 1 {
            return Err(Error::Consistency {
                what: "worker identity added",
                expected: 1,
                got: added,
            });
        }
        metrics::workers_registered().add(1, &[KeyValue::new("queue", queue.to_string())]);
        Ok(Self {
            processing: keys::processing(&id),
            counters: keys::worker(&id),
            queue: queue.to_string(),
            id,
            store,
            released: false,
        })
    }

    pub(crate) fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn processing_key(&self) -> &str {
        &self.processing
    }

    /// Increment `field` on both the global and this worker's counters.
    pub(crate) async fn count(&self, field: &str) -> Result<()> {
        self.store.hash_incr(keys::STATS, field, 1).await?;
        self.store.hash_incr(&self.counters, field, 1).await?;
        Ok(())
    }

    /// Remove the identity and delete the worker's keys. Never fails;
    /// problems are logged.
    pub(crate) async fn deregister(mut self) {
        self.released = true;
        release(self.store.as_ref(), &self.id, &self.queue).await;
    }
}

impl<S: Store> Drop for Worker<S> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(worker = %self.id, "worker dropped outside a runtime, keys left behind");
            return;
        };
        let store = Arc::clone(&self.store);
        let id = std::mem::take(&mut self.id);
        let queue = std::mem::take(&mut self.queue);
        handle.spawn(async move {
            release(store.as_ref(), &id, &queue).await;
        });
    }
}

async fn release<S: Store>(store: &S, id: &str, queue: &str) {
    match store.set_remove(keys::WORKERS, id).await {
        Ok(1) => {}
        Ok(n) => warn!(worker = id, removed = n, "expected 1 worker identity to be removed"),
        Err(e) => warn!(worker = id, "failed to remove worker identity: {e}"),
    }
    let worker_keys = [keys::processing(id), keys::worker(id)];
    if let Err(e) = store.delete(&worker_keys).await {
        warn!(worker = id, "failed to delete worker keys: {e}");
    }
    metrics::workers_registered().add(-1, &[KeyValue::new("queue", queue.to_string())]);
    debug!(worker = id, "worker deregistered");
}
