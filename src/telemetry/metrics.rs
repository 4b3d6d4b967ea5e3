//! Metric instrument factories for q-rs.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! All instruments are created lazily from the `"q-rs"` meter.

use opentelemetry::metrics::{Counter, Histogram, Meter, UpDownCounter};

fn meter() -> Meter {
    opentelemetry::global::meter("q-rs")
}

/// Counter: messages sent.
/// Labels: `queue`.
pub fn messages_sent() -> Counter<u64> {
    meter()
        .u64_counter("q.messages.sent")
        .with_description("Number of messages sent to a queue")
        .build()
}

/// Counter: messages taken off a queue and handled.
/// Labels: `queue`, `outcome` ("ok" | "failed").
pub fn messages_processed() -> Counter<u64> {
    meter()
        .u64_counter("q.messages.processed")
        .with_description("Number of handler attempts completed")
        .build()
}

/// Histogram: handler duration in milliseconds.
/// Labels: `queue`.
pub fn handler_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("q.handler.duration_ms")
        .with_description("Handler duration in milliseconds")
        .with_unit("ms")
        .build()
}

/// Up/down counter: workers registered by this process.
/// Labels: `queue`.
pub fn workers_registered() -> UpDownCounter<i64> {
    meter()
        .i64_up_down_counter("q.workers.registered")
        .with_description("Workers currently registered by this process")
        .build()
}
