//! Key-space layout in the shared store.
//!
//! Every key lives under the `q:` namespace so several engines (and other
//! tooling) can share one Redis database.

/// Set of registered queue names.
pub const QUEUES: &str = "q:queues";

/// Set of active worker identities.
pub const WORKERS: &str = "q:workers";

/// Hash of global `{processed, failed}` counters.
pub const STATS: &str = "q:stats";

/// List of failure records, newest first.
pub const FAILED: &str = "q:failed";

/// Pending messages for a queue: `q:queue:{name}`.
pub fn queue(name: &str) -> String {
    format!("q:queue:{name}")
}

/// Per-worker counters hash: `q:worker:{id}`.
pub fn worker(id: &str) -> String {
    format!("q:worker:{id}")
}

/// Per-worker in-flight list: `q:processing:{id}`.
pub fn processing(id: &str) -> String {
    format!("q:processing:{id}")
}
