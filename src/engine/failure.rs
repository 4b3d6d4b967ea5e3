//! Failure sink and retry of failed messages.

use tracing::info;

use super::Engine;
use super::worker::Worker;
use crate::error::{Error, Result};
use crate::handler::HandlerError;
use crate::model::{FAILED, Message};
use crate::store::{Store, keys};

/// Append a failure record for `message` and bump the failure counters.
pub(crate) async fn record_failure<S: Store>(
    store: &S,
    worker: &Worker<S>,
    message: &Message,
    err: &HandlerError,
) -> Result<Message> {
    let record = message.failed(err.detail());
    store.list_push(keys::FAILED, &record.to_json()?).await?;
    worker.count(FAILED).await?;
    Ok(record)
}

impl<S: Store> Engine<S> {
    /// Send the failure record at `index` (0 = newest) back to its queue,
    /// then drop it from the failure list.
    ///
    /// The message is re-sent before the record is removed, so a store
    /// error in between can leave a duplicate but never loses the message.
    pub async fn retry(&self, index: i64) -> Result<Message> {
        let raw = self
            .store
            .list_index(keys::FAILED, index)
            .await?
            .ok_or_else(|| Error::NotFound(format!("no failed message at index {index}")))?;
        let record = Message::from_json(&raw)?;
        let queue = record.queue.clone().ok_or_else(|| {
            Error::InvalidArgument(format!("failed message at index {index} has no queue"))
        })?;

        let message = Message::new(queue, record.payload);
        self.send_message(&message).await?;

        let removed = self.store.list_remove(keys::FAILED, 1, &raw).await?;
        if removed != 1 {
            return Err(Error::Consistency {
                what: "failure record removed",
                expected: 1,
                got: removed,
            });
        }
        info!(queue = message.queue.as_deref(), index, "failed message retried");
        Ok(message)
    }
}
