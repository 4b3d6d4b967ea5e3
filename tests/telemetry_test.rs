//! Integration tests for telemetry initialization and span helpers.

#[test]
fn telemetry_initializes_without_endpoint() {
    // A global subscriber can only be set once per process; another test
    // may already have done it, so an Err here is acceptable.
    let _guard = q_rs::telemetry::init_telemetry(q_rs::telemetry::TelemetryConfig {
        endpoint: None,
        service_name: "q-test".to_string(),
        default_filter: "debug".to_string(),
    });
}

#[test]
fn message_span_records_outcome() {
    let span = q_rs::telemetry::message::start_message_span("jobs", "host:1:jobs:2");
    q_rs::telemetry::message::record_outcome(&span, "failed");
}

#[test]
fn metric_instruments_build_without_provider() {
    use opentelemetry::KeyValue;

    let queue = [KeyValue::new("queue", "jobs")];
    q_rs::telemetry::metrics::messages_sent().add(1, &queue);
    q_rs::telemetry::metrics::handler_duration_ms().record(1.5, &queue);
    q_rs::telemetry::metrics::workers_registered().add(-1, &queue);
}
