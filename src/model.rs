//! Core data model.
//!
//! A message is a payload travelling through a named queue. Every stage of
//! its life (pending, in flight, failed) stores a fresh JSON copy; stored
//! copies are never rewritten in place.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A unit of work as stored in the queue, in-flight and failure lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Opaque payload handed to the handler.
    pub payload: String,

    /// Queue the message was sent to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue: Option<String>,

    pub created_at: DateTime<Utc>,

    /// Set when a worker dequeued the message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_at: Option<DateTime<Utc>>,

    /// Set only on failure records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Message {
    /// A freshly sent message.
    pub fn new(queue: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
            queue: Some(queue.into()),
            created_at: Utc::now(),
            run_at: None,
            failed_at: None,
            error: None,
        }
    }

    /// Copy of this message stamped as dequeued now.
    pub fn started(&self) -> Self {
        Self {
            run_at: Some(Utc::now()),
            ..self.clone()
        }
    }

    /// Copy of this message turned into a failure record.
    pub fn failed(&self, error: impl Into<String>) -> Self {
        Self {
            failed_at: Some(Utc::now()),
            error: Some(error.into()),
            ..self.clone()
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

// ---------------------------------------------------------------------------
// Counters + Stats
// ---------------------------------------------------------------------------

/// Hash field names shared by `q:stats` and `q:worker:<id>`.
pub const PROCESSED: &str = "processed";
pub const FAILED: &str = "failed";

/// Processed/failed counters. `processed` counts completed attempts,
/// successful or not.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    pub processed: i64,
    pub failed: i64,
}

impl Counters {
    /// Build from a hash read. Missing or unparsable fields count as zero.
    pub fn from_fields<'a>(fields: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut counters = Self::default();
        for (field, value) in fields {
            let n = value.parse().unwrap_or(0);
            match field {
                PROCESSED => counters.processed = n,
                FAILED => counters.failed = n,
                _ => {}
            }
        }
        counters
    }
}

/// Point-in-time, non-transactional snapshot of the whole queue system.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    /// Pending message count per registered queue.
    pub queues: BTreeMap<String, i64>,
    /// Global counters.
    pub stats: Counters,
    /// Counters per active worker.
    pub workers: BTreeMap<String, Counters>,
    /// Most recent failure records, newest first.
    pub failed: Vec<Message>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_fields_are_omitted_not_null() {
        let msg = Message::new("jobs", "hello");
        let json = msg.to_json().unwrap();
        assert!(json.contains(r#""payload":"hello""#));
        assert!(json.contains(r#""queue":"jobs""#));
        assert!(json.contains("created_at"));
        assert!(!json.contains("run_at"));
        assert!(!json.contains("failed_at"));
        assert!(!json.contains("error"));
        assert!(!json.contains("null"));
    }

    #[test]
    fn decodes_message_without_queue() {
        let raw = r#"{"payload":"x","created_at":"2024-01-02T03:04:05Z"}"#;
        let msg = Message::from_json(raw).unwrap();
        assert_eq!(msg.payload, "x");
        assert!(msg.queue.is_none());
        assert!(msg.run_at.is_none());
    }

    #[test]
    fn failed_copy_keeps_original_fields() {
        let msg = Message::new("jobs", "bad").started();
        let failed = msg.failed("boom");
        assert_eq!(failed.payload, "bad");
        assert_eq!(failed.created_at, msg.created_at);
        assert_eq!(failed.run_at, msg.run_at);
        assert!(failed.failed_at.is_some());
        assert_eq!(failed.error.as_deref(), Some("boom"));
        assert!(msg.failed_at.is_none());
    }

    #[test]
    fn counters_ignore_unknown_and_missing_fields() {
        let c = Counters::from_fields([("processed", "7"), ("other", "3")]);
        assert_eq!(c, Counters { processed: 7, failed: 0 });
    }
}
