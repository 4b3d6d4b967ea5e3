//! Stats aggregation.

use tracing::warn;

use super::Engine;
use crate::error::Result;
use crate::model::{Counters, Message, Stats};
use crate::store::{Store, keys};

impl<S: Store> Engine<S> {
    /// Snapshot of queue depths, counters, workers and recent failures.
    ///
    /// Each part is read separately, so the result is approximate: a worker
    /// may finish a message between two reads. Any store error discards the
    /// whole snapshot.
    pub async fn stats(&self) -> Result<Stats> {
        let mut stats = Stats::default();

        for name in self.store.set_members(keys::QUEUES).await? {
            let depth = self.store.list_len(&keys::queue(&name)).await?;
            stats.queues.insert(name, depth);
        }

        stats.stats = self.counters(keys::STATS).await?;

        for id in self.store.set_members(keys::WORKERS).await? {
            let counters = self.counters(&keys::worker(&id)).await?;
            stats.workers.insert(id, counters);
        }

        let window = self.config.failed_window.max(1);
        for raw in self.store.list_range(keys::FAILED, 0, window - 1).await? {
            match Message::from_json(&raw) {
                Ok(record) => stats.failed.push(record),
                Err(e) => warn!("skipping undecodable failure record: {e}"),
            }
        }

        Ok(stats)
    }

    async fn counters(&self, key: &str) -> Result<Counters> {
        let fields = self.store.hash_get_all(key).await?;
        Ok(Counters::from_fields(
            fields.iter().map(|(f, v)| (f.as_str(), v.as_str())),
        ))
    }
}
