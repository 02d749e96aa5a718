//! Integration tests for `ContinuationStore` under concurrent async use.

use std::sync::Arc;
use std::time::Duration;

use huginn::{Admission, CacheConfig, CacheKey, Continuation, ContinuationStore, StyleParams};

fn key(choice: &str) -> CacheKey {
    CacheKey::compute(&["The ship left port."], choice, &StyleParams::default())
}

fn continuation(text: &str) -> Continuation {
    Continuation::new(text, vec!["sail on".into(), "turn back".into()])
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_reservations_have_one_winner_per_key() {
    let store = Arc::new(ContinuationStore::new(CacheConfig::default()));

    let mut handles = Vec::new();
    for i in 0..32 {
        let store = Arc::clone(&store);
        let choice = if i % 2 == 0 { "north" } else { "south" };
        handles.push(tokio::spawn(async move {
            store.reserve(key(choice)).map(|slot| {
                slot.complete(continuation(choice));
            })
        }));
    }

    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap().is_some() {
            winners += 1;
        }
    }
    assert_eq!(winners, 2);
    assert_eq!(store.ready_count(), 2);
}

#[tokio::test]
async fn aborted_task_releases_its_slot() {
    let store = Arc::new(ContinuationStore::new(CacheConfig::default()));
    let slot = store.reserve(key("north")).expect("admitted");

    let task = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        slot.complete(continuation("never"));
    });
    tokio::task::yield_now().await;
    assert!(store.is_pending(&key("north")));

    task.abort();
    assert!(task.await.unwrap_err().is_cancelled());
    assert!(!store.is_pending(&key("north")));
    assert_eq!(store.begin_pending(&key("north")), Admission::Admitted);
}

#[tokio::test]
async fn panicking_task_releases_its_slot() {
    let store = Arc::new(ContinuationStore::new(CacheConfig::default()));
    let slot = store.reserve(key("north")).expect("admitted");

    let task = tokio::spawn(async move {
        let _slot = slot;
        panic!("provider exploded");
    });
    assert!(task.await.unwrap_err().is_panic());
    assert!(store.is_empty());
}

#[tokio::test(start_paused = true)]
async fn ready_entry_is_served_until_ttl() {
    let store = ContinuationStore::new(CacheConfig::new().ttl(Duration::from_secs(600)));
    assert!(store.try_begin_pending(&key("north")));
    assert!(store.complete(&key("north"), continuation("fair winds")));

    tokio::time::advance(Duration::from_secs(599)).await;
    assert_eq!(store.get(&key("north")), Some(continuation("fair winds")));

    tokio::time::advance(Duration::from_secs(2)).await;
    assert_eq!(store.get(&key("north")), None);
    assert!(store.is_empty());
}

#[test]
fn many_distinct_entries_stay_within_capacity() {
    let store = ContinuationStore::new(CacheConfig::new().max_entries(10));
    for i in 0..100 {
        let k = key(&format!("heading {i}"));
        assert!(store.try_begin_pending(&k));
        assert!(store.complete(&k, continuation("ok")));
        assert!(store.len() <= 10);
    }
    assert_eq!(store.ready_count(), 10);
}
