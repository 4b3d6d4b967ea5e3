//! # q-rs
//!
//! Job queue on top of a shared Redis instance.
//!
//! Producers [`send`](engine::Engine::send) payloads to named queues;
//! workers [`receive`](engine::Engine::receive) them one at a time with an
//! atomic move into a per-worker in-flight list, run a [`Handler`], and
//! record the outcome in shared counters and a failure list.
//! [`stats`](engine::Engine::stats) reads it all back for dashboards.
//!
//! Delivery is at-least-once while a worker stays alive. Messages held by a
//! worker that crashes stay in its in-flight list; nothing reclaims them.

pub mod config;
pub mod engine;
pub mod error;
pub mod handler;
pub mod model;
pub mod store;
pub mod telemetry;

pub use engine::{Engine, EngineConfig};
pub use error::{Error, Result};
pub use handler::{Handler, HandlerError};
pub use model::{Counters, Message, Stats};
pub use store::{MemoryStore, RedisStore, Store};
