//! Message handling span helpers.
//!
//! One span per dequeued message, covering the handler call and the
//! bookkeeping that follows it.

use tracing::Span;

/// Start a span for handling one message on `queue` by `worker`.
///
/// The `message.outcome` field is declared empty and filled in by
/// [`record_outcome`].
pub fn start_message_span(queue: &str, worker: &str) -> Span {
    tracing::info_span!(
        "message.handle",
        "messaging.destination.name" = queue,
        "q.worker" = worker,
        "message.outcome" = tracing::field::Empty,
    )
}

/// Record how handling ended ("ok" or "failed") on the span.
pub fn record_outcome(span: &Span, outcome: &str) {
    span.record("message.outcome", outcome);
}
