//! Engine tests against a real Redis.
//!
//! Run with a local server:
//! ```sh
//! REDIS_URL=redis://127.0.0.1:6379 cargo test --test redis_test -- --ignored
//! ```

use std::time::Duration;

use q_rs::store::keys;
use q_rs::{Engine, EngineConfig, HandlerError, RedisStore, Store};
use tokio_util::sync::CancellationToken;

async fn test_engine() -> Engine<RedisStore> {
    let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
    let store = RedisStore::connect(&url, 2).await.unwrap();
    Engine::with_config(
        store,
        EngineConfig {
            poll_timeout: Duration::from_millis(100),
            ..EngineConfig::default()
        },
    )
}

/// Unique per run so repeated runs against one server don't interfere.
fn unique_queue() -> String {
    format!("test-{}", uuid::Uuid::new_v4())
}

#[tokio::test]
#[ignore] // Requires running Redis
async fn connects_and_pings() {
    let engine = test_engine().await;
    assert!(engine.ping().await.is_ok());
}

#[tokio::test]
#[ignore] // Requires running Redis
async fn send_receive_and_account() {
    let engine = test_engine().await;
    let queue = unique_queue();
    let before = engine.stats().await.unwrap().stats;

    engine.send(&queue, "good").await.unwrap();
    engine.send(&queue, "bad").await.unwrap();
    assert_eq!(engine.stats().await.unwrap().queues[&queue], 2);

    let cancel = CancellationToken::new();
    let worker = {
        let engine = engine.clone();
        let cancel = cancel.clone();
        let queue = queue.clone();
        tokio::spawn(async move {
            let handler = |_cancel: CancellationToken, payload: String| async move {
                if payload == "bad" {
                    Err(HandlerError::new("boom"))
                } else {
                    Ok(())
                }
            };
            engine.receive(&cancel, &queue, handler).await
        })
    };

    for _ in 0..100 {
        if engine.stats().await.unwrap().queues[&queue] == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    tokio::time::sleep(Duration::from_millis(200)).await;
    cancel.cancel();
    worker.await.unwrap().unwrap();

    // Other processes may share the server, so compare deltas as lower bounds.
    let after = engine.stats().await.unwrap();
    assert!(after.stats.processed - before.processed >= 2);
    assert!(after.stats.failed - before.failed >= 1);
    assert!(
        after
            .failed
            .iter()
            .any(|m| m.queue.as_deref() == Some(queue.as_str()) && m.payload == "bad")
    );
}

#[tokio::test]
#[ignore] // Requires running Redis
async fn blocking_move_times_out_on_empty_queue() {
    let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
    let store = RedisStore::connect(&url, 1).await.unwrap();
    let queue = keys::queue(&unique_queue());
    let moved = store
        .list_move_blocking(&queue, &format!("{queue}:dst"), Duration::from_millis(100))
        .await
        .unwrap();
    assert!(moved.is_none());
}
