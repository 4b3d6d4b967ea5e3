//! Redis-backed store.
//!
//! Ordinary commands share one auto-reconnecting multiplexed connection.
//! Blocking moves get a dedicated connection each, drawn from a small
//! free-list, because a blocked command would otherwise stall every other
//! request pipelined behind it on the shared connection.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use ::redis::AsyncCommands;
use ::redis::aio::{ConnectionManager, MultiplexedConnection};
use tracing::debug;

use crate::error::Result;

/// Store backed by a Redis server (>= 6.0, for fractional blocking timeouts).
pub struct RedisStore {
    client: ::redis::Client,
    conn: ConnectionManager,
    blocking: Mutex<Vec<MultiplexedConnection>>,
    max_idle_blocking: usize,
}

impl RedisStore {
    /// Connect and verify the server answers.
    ///
    /// `max_idle_blocking` caps how many dedicated blocking connections are
    /// kept around between moves; extra ones are dropped after use.
    pub async fn connect(url: &str, max_idle_blocking: usize) -> Result<Self> {
        let client = ::redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        let store = Self {
            client,
            conn,
            blocking: Mutex::new(Vec::new()),
            max_idle_blocking,
        };
        super::Store::ping(&store).await?;
        Ok(store)
    }

    async fn take_blocking(&self) -> Result<MultiplexedConnection> {
        let idle = self
            .blocking
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop();
        match idle {
            Some(conn) => Ok(conn),
            None => {
                debug!("opening dedicated blocking connection");
                Ok(self.client.get_multiplexed_async_connection().await?)
            }
        }
    }

    fn give_back_blocking(&self, conn: MultiplexedConnection) {
        let mut idle = self
            .blocking
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if idle.len() < self.max_idle_blocking {
            idle.push(conn);
        }
    }
}

impl super::Store for RedisStore {
    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: String = ::redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<i64> {
        let mut conn = self.conn.clone();
        Ok(conn.sadd(key, member).await?)
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<i64> {
        let mut conn = self.conn.clone();
        Ok(conn.srem(key, member).await?)
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        Ok(conn.smembers(key).await?)
    }

    async fn list_push(&self, key: &str, value: &str) -> Result<i64> {
        let mut conn = self.conn.clone();
        Ok(conn.lpush(key, value).await?)
    }

    async fn list_move_blocking(
        &self,
        src: &str,
        dst: &str,
        timeout: Duration,
    ) -> Result<Option<String>> {
        let mut conn = self.take_blocking().await?;
        // On error the connection is dropped rather than reused.
        let moved: Option<String> = ::redis::cmd("BRPOPLPUSH")
            .arg(src)
            .arg(dst)
            .arg(timeout.as_secs_f64())
            .query_async(&mut conn)
            .await?;
        self.give_back_blocking(conn);
        Ok(moved)
    }

    async fn list_remove(&self, key: &str, count: i64, value: &str) -> Result<i64> {
        let mut conn = self.conn.clone();
        Ok(conn.lrem(key, count as isize, value).await?)
    }

    async fn list_len(&self, key: &str) -> Result<i64> {
        let mut conn = self.conn.clone();
        Ok(conn.llen(key).await?)
    }

    async fn list_range(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        Ok(conn.lrange(key, start as isize, stop as isize).await?)
    }

    async fn list_index(&self, key: &str, index: i64) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        Ok(conn.lindex(key, index as isize).await?)
    }

    async fn hash_incr(&self, key: &str, field: &str, delta: i64) -> Result<i64> {
        let mut conn = self.conn.clone();
        Ok(conn.hincr(key, field, delta).await?)
    }

    async fn hash_get_all(&self, key: &str) -> Result<Vec<(String, String)>> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> = conn.hgetall(key).await?;
        Ok(fields.into_iter().collect())
    }

    async fn delete(&self, keys: &[String]) -> Result<i64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.clone();
        Ok(conn.del(keys.to_vec()).await?)
    }
}
