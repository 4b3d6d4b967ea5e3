//! The worker loop: dequeue, handle, account.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures_util::FutureExt as _;
use opentelemetry::KeyValue;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, warn};

use super::Engine;
use super::failure::record_failure;
use super::worker::Worker;
use crate::error::{Error, Result};
use crate::handler::{Handler, HandlerError};
use crate::model::{Message, PROCESSED};
use crate::store::{Store, keys};
use crate::telemetry::message::{record_outcome, start_message_span};
use crate::telemetry::metrics;

impl<S: Store> Engine<S> {
    /// Register a worker on `queue` and handle messages until `cancel` fires.
    ///
    /// Returns `Ok(())` on cancellation. Store errors and consistency
    /// violations end the loop with an error. Handler errors never do; they
    /// land in the failure list. The worker is deregistered on every exit.
    ///
    /// Cancellation is checked before each dequeue attempt, and an attempt
    /// waits at most [`EngineConfig::poll_timeout`](super::EngineConfig), so
    /// an idle worker stops within one poll timeout. A running handler is
    /// never interrupted; it receives `cancel` and may watch it itself.
    pub async fn receive<H: Handler>(
        &self,
        cancel: &CancellationToken,
        queue: &str,
        handler: H,
    ) -> Result<()> {
        if queue.is_empty() {
            return Err(Error::InvalidArgument(
                "queue name must not be empty".to_string(),
            ));
        }

        let worker = Worker::register(Arc::clone(&self.store), queue).await?;
        info!(worker = worker.id(), queue, "worker registered");

        let result = self.work(&worker, cancel, queue, &handler).await;

        match &result {
            Ok(()) => info!(worker = worker.id(), queue, "worker stopped"),
            Err(e) => error!(worker = worker.id(), queue, "worker loop failed: {e}"),
        }
        worker.deregister().await;
        result
    }

    async fn work<H: Handler>(
        &self,
        worker: &Worker<S>,
        cancel: &CancellationToken,
        queue: &str,
        handler: &H,
    ) -> Result<()> {
        let source = keys::queue(queue);
        loop {
            if cancel.is_cancelled() {
                return Ok(());
            }
            let moved = self
                .store
                .list_move_blocking(&source, worker.processing_key(), self.config.poll_timeout)
                .await?;
            if let Some(raw) = moved {
                self.process(worker, cancel, queue, handler, &raw).await?;
            }
        }
    }

    /// Handle one in-flight message and settle its accounting.
    async fn process<H: Handler>(
        &self,
        worker: &Worker<S>,
        cancel: &CancellationToken,
        queue: &str,
        handler: &H,
        raw: &str,
    ) -> Result<()> {
        let message = Message::from_json(raw)?.started();
        let span = start_message_span(queue, worker.id());

        let started = Instant::now();
        let outcome = AssertUnwindSafe(handler.handle(cancel.clone(), message.payload.clone()))
            .catch_unwind()
            .instrument(span.clone())
            .await
            .unwrap_or_else(|panic| {
                Err(HandlerError::new(format!(
                    "handler panicked: {}",
                    panic_message(panic.as_ref())
                )))
            });
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        metrics::handler_duration_ms().record(elapsed_ms, &[KeyValue::new("queue", queue.to_string())]);

        let label = match &outcome {
            Ok(()) => {
                record_outcome(&span, "ok");
                debug!(worker = worker.id(), queue, elapsed_ms, "message handled");
                "ok"
            }
            Err(err) => {
                record_outcome(&span, "failed");
                warn!(worker = worker.id(), queue, elapsed_ms, error = %err, "handler failed");
                record_failure(self.store.as_ref(), worker, &message, err).await?;
                "failed"
            }
        };

        let removed = self
            .store
            .list_remove(worker.processing_key(), 1, raw)
            .await?;
        if removed != 1 {
            return Err(Error::Consistency {
                what: "in-flight message removed",
                expected: 1,
                got: removed,
            });
        }

        // Every attempt counts as processed, failed or not.
        worker.count(PROCESSED).await?;
        metrics::messages_processed().add(
            1,
            &[
                KeyValue::new("queue", queue.to_string()),
                KeyValue::new("outcome", label),
            ],
        );
        Ok(())
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}
