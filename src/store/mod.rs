//! Store adapter: the handful of key-value primitives the engine needs.
//!
//! The engine never talks to Redis directly; it is generic over [`Store`]
//! so the same queue logic runs against [`RedisStore`] in production and
//! [`MemoryStore`] in tests.

pub mod keys;
mod memory;
mod redis;

use std::future::Future;
use std::time::Duration;

use crate::error::Result;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

/// Primitive operations of the shared store. Implementations must be
/// safe to call from many tasks at once; every method is a single atomic
/// store operation.
///
/// Lists follow Redis orientation: [`Store::list_push`] inserts at the
/// head, [`Store::list_move_blocking`] takes from the tail.
pub trait Store: Send + Sync + 'static {
    /// Round-trip to the store.
    fn ping(&self) -> impl Future<Output = Result<()>> + Send;

    /// Add `member` to a set. Returns the number of members added (0 or 1).
    fn set_add(&self, key: &str, member: &str) -> impl Future<Output = Result<i64>> + Send;

    /// Remove `member` from a set. Returns the number removed (0 or 1).
    fn set_remove(&self, key: &str, member: &str) -> impl Future<Output = Result<i64>> + Send;

    fn set_members(&self, key: &str) -> impl Future<Output = Result<Vec<String>>> + Send;

    /// Insert at the head of a list. Returns the new length.
    fn list_push(&self, key: &str, value: &str) -> impl Future<Output = Result<i64>> + Send;

    /// Atomically pop the tail of `src` and push it onto the head of
    /// `dst`, waiting up to `timeout` for `src` to become non-empty.
    /// A zero timeout waits indefinitely. Returns `None` on timeout.
    fn list_move_blocking(
        &self,
        src: &str,
        dst: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<Option<String>>> + Send;

    /// Remove up to `count` occurrences of `value`, scanning from the
    /// head. Returns the number removed.
    fn list_remove(
        &self,
        key: &str,
        count: i64,
        value: &str,
    ) -> impl Future<Output = Result<i64>> + Send;

    fn list_len(&self, key: &str) -> impl Future<Output = Result<i64>> + Send;

    /// Inclusive range; negative indexes count from the tail.
    fn list_range(
        &self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> impl Future<Output = Result<Vec<String>>> + Send;

    fn list_index(&self, key: &str, index: i64)
    -> impl Future<Output = Result<Option<String>>> + Send;

    /// Increment a hash field. Returns the new value.
    fn hash_incr(
        &self,
        key: &str,
        field: &str,
        delta: i64,
    ) -> impl Future<Output = Result<i64>> + Send;

    fn hash_get_all(&self, key: &str) -> impl Future<Output = Result<Vec<(String, String)>>> + Send;

    /// Delete keys. Returns how many existed.
    fn delete(&self, keys: &[String]) -> impl Future<Output = Result<i64>> + Send;
}
