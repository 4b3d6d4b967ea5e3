//! In-memory store for tests and single-process use.
//!
//! Mirrors the Redis semantics the engine relies on: lists are pushed at
//! the head and moved from the tail, empty collections disappear, and a
//! key holding one type rejects operations for another.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

use crate::error::{Error, Result};

#[derive(Debug)]
enum Value {
    List(VecDeque<String>),
    Set(BTreeSet<String>),
    Hash(HashMap<String, i64>),
}

impl Value {
    fn is_empty(&self) -> bool {
        match self {
            Value::List(l) => l.is_empty(),
            Value::Set(s) => s.is_empty(),
            Value::Hash(h) => h.is_empty(),
        }
    }
}

fn wrong_type(key: &str) -> Error {
    Error::Other(format!(
        "WRONGTYPE operation against key {key} holding the wrong kind of value"
    ))
}

/// Shared in-memory key space.
///
/// Cloning creates a new handle to the **same** key space, so a test can
/// keep one handle for inspection while the engine owns another.
#[derive(Clone, Default)]
pub struct MemoryStore {
    data: Arc<Mutex<HashMap<String, Value>>>,
    pushed: Arc<Notify>,
    offline: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate losing the connection: every operation fails with
    /// [`Error::Unavailable`] until set back to `false`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
        // Wake blocked movers so they observe the outage.
        self.pushed.notify_waiters();
    }

    /// Whether `key` currently exists.
    pub async fn exists(&self, key: &str) -> bool {
        self.data.lock().await.contains_key(key)
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Unavailable("memory store is offline".to_string()));
        }
        Ok(())
    }

    async fn try_move(&self, src: &str, dst: &str) -> Result<Option<String>> {
        self.check_online()?;
        let mut data = self.data.lock().await;
        if matches!(data.get(dst), Some(v) if !matches!(v, Value::List(_))) {
            return Err(wrong_type(dst));
        }
        let value = match data.get_mut(src) {
            None => return Ok(None),
            Some(Value::List(list)) => list.pop_back(),
            Some(_) => return Err(wrong_type(src)),
        };
        let Some(value) = value else {
            return Ok(None);
        };
        if data.get(src).is_some_and(Value::is_empty) {
            data.remove(src);
        }
        match data
            .entry(dst.to_string())
            .or_insert_with(|| Value::List(VecDeque::new()))
        {
            Value::List(list) => list.push_front(value.clone()),
            _ => return Err(wrong_type(dst)),
        }
        Ok(Some(value))
    }
}

/// Resolve a Redis-style inclusive range against a list of `len` items.
fn resolve_range(len: usize, start: i64, stop: i64) -> Option<(usize, usize)> {
    let len = len as i64;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if len == 0 || start > stop || start >= len {
        return None;
    }
    Some((start as usize, stop as usize))
}

impl super::Store for MemoryStore {
    async fn ping(&self) -> Result<()> {
        self.check_online()
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<i64> {
        self.check_online()?;
        let mut data = self.data.lock().await;
        match data
            .entry(key.to_string())
            .or_insert_with(|| Value::Set(BTreeSet::new()))
        {
            Value::Set(set) => Ok(i64::from(set.insert(member.to_string()))),
            _ => Err(wrong_type(key)),
        }
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<i64> {
        self.check_online()?;
        let mut data = self.data.lock().await;
        let removed = match data.get_mut(key) {
            None => return Ok(0),
            Some(Value::Set(set)) => set.remove(member),
            Some(_) => return Err(wrong_type(key)),
        };
        if data.get(key).is_some_and(Value::is_empty) {
            data.remove(key);
        }
        Ok(i64::from(removed))
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>> {
        self.check_online()?;
        match self.data.lock().await.get(key) {
            None => Ok(Vec::new()),
            Some(Value::Set(set)) => Ok(set.iter().cloned().collect()),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn list_push(&self, key: &str, value: &str) -> Result<i64> {
        self.check_online()?;
        let len = {
            let mut data = self.data.lock().await;
            match data
                .entry(key.to_string())
                .or_insert_with(|| Value::List(VecDeque::new()))
            {
                Value::List(list) => {
                    list.push_front(value.to_string());
                    list.len() as i64
                }
                _ => return Err(wrong_type(key)),
            }
        };
        self.pushed.notify_waiters();
        Ok(len)
    }

    async fn list_move_blocking(
        &self,
        src: &str,
        dst: &str,
        timeout: Duration,
    ) -> Result<Option<String>> {
        let deadline = (!timeout.is_zero()).then(|| Instant::now() + timeout);
        loop {
            // Register for wakeups before looking, so a push between the
            // check and the wait is not missed.
            let notified = self.pushed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(value) = self.try_move(src, dst).await? {
                return Ok(Some(value));
            }

            match deadline {
                Some(deadline) => {
                    if tokio::time::timeout_at(deadline, notified).await.is_err() {
                        return Ok(None);
                    }
                }
                None => notified.await,
            }
        }
    }

    async fn list_remove(&self, key: &str, count: i64, value: &str) -> Result<i64> {
        self.check_online()?;
        let mut data = self.data.lock().await;
        let removed = match data.get_mut(key) {
            None => return Ok(0),
            Some(Value::List(list)) => {
                let limit = if count == 0 {
                    usize::MAX
                } else {
                    count.unsigned_abs() as usize
                };
                let mut removed = 0;
                if count >= 0 {
                    let mut i = 0;
                    while i < list.len() && removed < limit {
                        if list[i] == value {
                            list.remove(i);
                            removed += 1;
                        } else {
                            i += 1;
                        }
                    }
                } else {
                    let mut i = list.len();
                    while i > 0 && removed < limit {
                        i -= 1;
                        if list[i] == value {
                            list.remove(i);
                            removed += 1;
                        }
                    }
                }
                removed as i64
            }
            Some(_) => return Err(wrong_type(key)),
        };
        if data.get(key).is_some_and(Value::is_empty) {
            data.remove(key);
        }
        Ok(removed)
    }

    async fn list_len(&self, key: &str) -> Result<i64> {
        self.check_online()?;
        match self.data.lock().await.get(key) {
            None => Ok(0),
            Some(Value::List(list)) => Ok(list.len() as i64),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn list_range(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>> {
        self.check_online()?;
        match self.data.lock().await.get(key) {
            None => Ok(Vec::new()),
            Some(Value::List(list)) => Ok(match resolve_range(list.len(), start, stop) {
                Some((start, stop)) => list.range(start..=stop).cloned().collect(),
                None => Vec::new(),
            }),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn list_index(&self, key: &str, index: i64) -> Result<Option<String>> {
        self.check_online()?;
        match self.data.lock().await.get(key) {
            None => Ok(None),
            Some(Value::List(list)) => {
                let len = list.len() as i64;
                let index = if index < 0 { len + index } else { index };
                if index < 0 || index >= len {
                    return Ok(None);
                }
                Ok(list.get(index as usize).cloned())
            }
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn hash_incr(&self, key: &str, field: &str, delta: i64) -> Result<i64> {
        self.check_online()?;
        let mut data = self.data.lock().await;
        match data
            .entry(key.to_string())
            .or_insert_with(|| Value::Hash(HashMap::new()))
        {
            Value::Hash(hash) => {
                let n = hash.entry(field.to_string()).or_insert(0);
                *n += delta;
                Ok(*n)
            }
            _ => Err(wrong_type(key)),
        }
    }

    async fn hash_get_all(&self, key: &str) -> Result<Vec<(String, String)>> {
        self.check_online()?;
        match self.data.lock().await.get(key) {
            None => Ok(Vec::new()),
            Some(Value::Hash(hash)) => Ok(hash
                .iter()
                .map(|(field, n)| (field.clone(), n.to_string()))
                .collect()),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn delete(&self, keys: &[String]) -> Result<i64> {
        self.check_online()?;
        let mut data = self.data.lock().await;
        Ok(keys.iter().filter(|key| data.remove(*key).is_some()).count() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    #[tokio::test]
    async fn push_then_move_is_fifo() {
        let store = MemoryStore::new();
        store.list_push("src", "a").await.unwrap();
        store.list_push("src", "b").await.unwrap();

        let timeout = Duration::from_millis(10);
        assert_eq!(
            store.list_move_blocking("src", "dst", timeout).await.unwrap(),
            Some("a".to_string())
        );
        assert_eq!(
            store.list_move_blocking("src", "dst", timeout).await.unwrap(),
            Some("b".to_string())
        );
        assert_eq!(store.list_move_blocking("src", "dst", timeout).await.unwrap(), None);
        assert!(!store.exists("src").await);
        assert_eq!(store.list_range("dst", 0, -1).await.unwrap(), vec!["b", "a"]);
    }

    #[tokio::test]
    async fn blocked_move_wakes_on_push() {
        let store = MemoryStore::new();
        let mover = {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .list_move_blocking("src", "dst", Duration::from_secs(5))
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        store.list_push("src", "late").await.unwrap();
        let moved = mover.await.unwrap().unwrap();
        assert_eq!(moved.as_deref(), Some("late"));
    }

    #[tokio::test]
    async fn set_add_reports_new_members_only() {
        let store = MemoryStore::new();
        assert_eq!(store.set_add("s", "x").await.unwrap(), 1);
        assert_eq!(store.set_add("s", "x").await.unwrap(), 0);
        assert_eq!(store.set_remove("s", "x").await.unwrap(), 1);
        assert_eq!(store.set_remove("s", "x").await.unwrap(), 0);
        assert!(!store.exists("s").await);
    }

    #[tokio::test]
    async fn list_remove_counts_from_head() {
        let store = MemoryStore::new();
        for v in ["a", "b", "a", "a"] {
            store.list_push("l", v).await.unwrap();
        }
        assert_eq!(store.list_remove("l", 2, "a").await.unwrap(), 2);
        assert_eq!(store.list_range("l", 0, -1).await.unwrap(), vec!["b", "a"]);
        assert_eq!(store.list_remove("l", 1, "missing").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn range_and_index_clamp_like_redis() {
        let store = MemoryStore::new();
        for v in ["c", "b", "a"] {
            store.list_push("l", v).await.unwrap();
        }
        assert_eq!(store.list_range("l", 0, 20).await.unwrap(), vec!["a", "b", "c"]);
        assert_eq!(store.list_range("l", -2, -1).await.unwrap(), vec!["b", "c"]);
        assert!(store.list_range("l", 5, 10).await.unwrap().is_empty());
        assert_eq!(store.list_index("l", -1).await.unwrap().as_deref(), Some("c"));
        assert_eq!(store.list_index("l", 3).await.unwrap(), None);
    }

    #[tokio::test]
    async fn wrong_type_is_rejected() {
        let store = MemoryStore::new();
        store.set_add("k", "x").await.unwrap();
        assert!(store.list_push("k", "v").await.is_err());
        assert!(store.hash_incr("k", "f", 1).await.is_err());
    }

    #[tokio::test]
    async fn offline_store_fails_every_call() {
        let store = MemoryStore::new();
        store.set_offline(true);
        let err = store.ping().await.unwrap_err();
        assert!(err.is_connectivity());
        assert!(store.list_push("l", "v").await.is_err());
        store.set_offline(false);
        assert!(store.ping().await.is_ok());
    }
}
