//! Serialization of concurrent callers against one store instance.

use std::sync::Arc;

use docvault::{Phase, Store, StoreConfig, StoreError, WrappingKey};
use serde_json::{json, Number};
use tempfile::tempdir;

fn store_at(path: &std::path::Path) -> Store {
    Store::new(StoreConfig::new(path, WrappingKey::from_bytes([0x17; 32])))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_increments_do_not_lose_updates() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("secure.db");
    let store = Arc::new(store_at(&path));

    let mut tasks = Vec::new();
    for _ in 0..32 {
        let store = Arc::clone(&store);
        tasks.push(tokio::spawn(async move {
            store.add("analytics.requests.all", 1).await.unwrap();
            store.push("logs", json!("hit")).await.unwrap();
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(store.get("analytics.requests.all").await.unwrap(), Some(json!(32)));
    let logs = store.get("logs").await.unwrap().unwrap();
    assert_eq!(logs.as_array().unwrap().len(), 32);

    // And the file agrees with memory.
    drop(store);
    let reopened = store_at(&path);
    assert_eq!(reopened.get("analytics.requests.all").await.unwrap(), Some(json!(32)));
}

#[tokio::test]
async fn test_calls_during_loading_resolve_in_issue_order() {
    let dir = tempdir().unwrap();
    let store = store_at(&dir.path().join("secure.db"));
    assert_eq!(store.phase(), Phase::Uninitialized);

    // Polled together, the first call performs the load and the rest queue
    // behind it.
    let (a, b, c, d) = tokio::join!(
        store.add("n", 1),
        store.add("n", 10),
        store.subtract("n", 100),
        store.get("n"),
    );

    assert_eq!(a.unwrap(), Number::from(1));
    assert_eq!(b.unwrap(), Number::from(11));
    assert_eq!(c.unwrap(), Number::from(-89));
    assert_eq!(d.unwrap(), Some(json!(-89)));
    assert_eq!(store.phase(), Phase::Ready);
}

#[tokio::test]
async fn test_phase_watchers_see_readiness() {
    let dir = tempdir().unwrap();
    let store = Arc::new(store_at(&dir.path().join("secure.db")));
    let mut phases = store.watch_phase();

    let loader = {
        let store = Arc::clone(&store);
        tokio::spawn(async move { store.ready().await })
    };

    phases
        .wait_for(|phase| matches!(phase, Phase::Ready | Phase::Fault))
        .await
        .unwrap();
    loader.await.unwrap().unwrap();
    assert_eq!(store.phase(), Phase::Ready);
}

#[tokio::test]
async fn test_queued_calls_all_see_the_fault() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("secure.db");
    std::fs::write(&path, br#"{ "_meta": { "key": "AAAA" }, "payload": "AAAA" }"#).unwrap();
    let store = store_at(&path);

    let (a, b) = tokio::join!(store.get("x"), store.set("x", json!(1)));
    assert!(matches!(a, Err(StoreError::Integrity(_))));
    assert!(matches!(b, Err(StoreError::Integrity(_))));
    assert_eq!(store.phase(), Phase::Fault);

    // The damaged file is left as it was.
    let raw = std::fs::read_to_string(&path).unwrap();
    assert!(raw.contains("AAAA"));
}
