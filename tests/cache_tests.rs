// Cache store behaviour through the public API
// Author: wiredFRONT contributors

mod common;

use chrono::Duration;
use common::*;
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use wiredcache::cache::{optimize_messages, CacheConfig, CacheStatus, CACHE_VERSION};
use wiredcache::config::StaleReadPolicy;
use wiredcache::metrics::MAX_ERROR_ENTRIES;
use wiredcache::storage::{DurableStore, FileStore, MemoryStore, Table};

#[tokio::test]
async fn test_cache_stats_initialization() {
    let h = harness();
    let stats = h.ctx.metrics().get_metrics().await.unwrap();

    assert_eq!(stats.cache_hits, 0);
    assert_eq!(stats.cache_misses, 0);
    assert_eq!(stats.sync_attempts, 0);
    assert!(stats.errors.is_empty());
}

#[test]
fn test_cache_config_defaults() {
    let config = CacheConfig::default();

    assert_eq!(config.ttl, Duration::hours(24));
    assert_eq!(config.max_messages, 1000);
    assert_eq!(config.batch_size, 50);
    assert_eq!(config.stale_reads, StaleReadPolicy::Miss);
}

#[tokio::test]
async fn test_sixty_messages_single_call() {
    let h = harness();
    let batch = messages("s1", "m", 60);

    h.ctx.cache().cache_messages("s1", &batch).await.unwrap();

    let record = h.ctx.cache().get_cached_record("s1").await.unwrap().unwrap();
    assert_eq!(record.messages.len(), 60);
    assert_eq!(record.metadata.size, 60);
    assert_eq!(record.metadata.version, CACHE_VERSION);
    assert_eq!(record.status(), CacheStatus::Valid);

    let read = h.ctx.cache().get_cached_messages("s1").await.unwrap();
    assert_eq!(read.len(), 60);

    let stats = h.ctx.metrics().get_metrics().await.unwrap();
    assert_eq!(stats.cache_hits, 1);
    assert_eq!(stats.cache_misses, 0);
    assert_eq!(stats.sync_attempts, 1);
    assert_eq!(stats.sync_successes, 1);
}

#[tokio::test]
async fn test_read_returns_superset_of_written_batch() {
    let h = harness();
    let cache = h.ctx.cache();
    cache.cache_messages("s1", &messages("s1", "old", 10)).await.unwrap();
    let batch = messages("s1", "new", 5);
    cache.cache_messages("s1", &batch).await.unwrap();

    let read: HashSet<String> = ids(&cache.get_cached_messages("s1").await.unwrap())
        .into_iter()
        .collect();
    for id in ids(&batch) {
        assert!(read.contains(&id));
    }
    assert_eq!(read.len(), 15);
}

#[tokio::test]
async fn test_new_batch_goes_first() {
    let h = harness();
    let cache = h.ctx.cache();
    cache.cache_messages("s1", &[message("s1", "a", 1)]).await.unwrap();
    cache.cache_messages("s1", &[message("s1", "b", 2)]).await.unwrap();

    let read = cache.get_cached_messages("s1").await.unwrap();
    assert_eq!(ids(&read), vec!["b", "a"]);
}

#[tokio::test]
async fn test_record_capped_at_max_messages() {
    let h = harness();
    let cache = h.ctx.cache();
    cache.cache_messages("s1", &messages("s1", "a", 600)).await.unwrap();
    cache.cache_messages("s1", &messages("s1", "b", 600)).await.unwrap();

    let record = cache.get_cached_record("s1").await.unwrap().unwrap();
    assert_eq!(record.messages.len(), 1000);
    // every message of the latest write survives the cap
    let kept: HashSet<String> = ids(&record.messages).into_iter().collect();
    assert!(ids(&messages("s1", "b", 600)).iter().all(|id| kept.contains(id)));
}

#[tokio::test]
async fn test_expired_record_is_miss_and_marked_stale() {
    let h = harness();
    let cache = h.ctx.cache();
    cache.cache_messages("s1", &messages("s1", "m", 3)).await.unwrap();

    h.clock.advance(Duration::hours(24));
    assert!(cache.get_cached_messages("s1").await.is_some());

    h.clock.advance(Duration::seconds(1));
    assert!(cache.get_cached_messages("s1").await.is_none());

    let record = cache.get_cached_record("s1").await.unwrap().unwrap();
    assert_eq!(record.status(), CacheStatus::Stale);
    assert_eq!(record.messages.len(), 3);

    let stats = h.ctx.metrics().get_metrics().await.unwrap();
    assert_eq!(stats.cache_hits, 1);
    assert_eq!(stats.cache_misses, 1);
}

#[tokio::test]
async fn test_write_after_expiry_makes_record_valid_again() {
    let h = harness();
    let cache = h.ctx.cache();
    cache.cache_messages("s1", &[message("s1", "a", 1)]).await.unwrap();
    h.clock.advance(Duration::hours(30));
    assert!(cache.get_cached_messages("s1").await.is_none());

    cache.cache_messages("s1", &[message("s1", "b", 2)]).await.unwrap();
    let read = cache.get_cached_messages("s1").await.unwrap();
    assert_eq!(ids(&read), vec!["b", "a"]);
}

#[tokio::test]
async fn test_invalidate_then_read_with_miss_policy() {
    let h = harness();
    let cache = h.ctx.cache();
    cache.cache_messages("s1", &messages("s1", "m", 2)).await.unwrap();

    assert!(cache.invalidate_cache("s1").await.unwrap());
    assert!(cache.get_cached_messages("s1").await.is_none());

    let record = cache.get_cached_record("s1").await.unwrap().unwrap();
    assert_eq!(record.status(), CacheStatus::Stale);
    // soft invalidation keeps the data
    assert_eq!(record.messages.len(), 2);
}

#[tokio::test]
async fn test_invalidate_then_read_with_serve_policy() {
    let config = CacheConfig {
        stale_reads: StaleReadPolicy::Serve,
        ..CacheConfig::default()
    };
    let h = harness_with(config, Arc::new(MemoryStore::default()));
    let cache = h.ctx.cache();
    cache.cache_messages("s1", &messages("s1", "m", 2)).await.unwrap();

    cache.invalidate_cache("s1").await.unwrap();
    let read = cache.get_cached_messages("s1").await;
    assert_eq!(read.map(|m| m.len()), Some(2));

    // TTL still applies to stale records
    h.clock.advance(Duration::hours(25));
    assert!(cache.get_cached_messages("s1").await.is_none());
}

#[tokio::test]
async fn test_invalidate_missing_session() {
    let h = harness();
    assert!(!h.ctx.cache().invalidate_cache("nope").await.unwrap());
}

#[tokio::test]
async fn test_clear_cache_and_clear_all() {
    let h = harness();
    let cache = h.ctx.cache();
    cache.cache_messages("s1", &messages("s1", "m", 1)).await.unwrap();
    cache.cache_messages("s2", &messages("s2", "m", 1)).await.unwrap();
    cache.cache_messages("s3", &messages("s3", "m", 1)).await.unwrap();

    cache.clear_cache("s1").await.unwrap();
    assert!(cache.get_cached_record("s1").await.unwrap().is_none());
    assert_eq!(cache.record_count().await.unwrap(), 2);

    cache.clear_all_cache().await.unwrap();
    assert_eq!(cache.record_count().await.unwrap(), 0);
    // metrics live in their own table and survive
    assert_eq!(h.ctx.metrics().get_metrics().await.unwrap().sync_successes, 3);
}

#[tokio::test]
async fn test_hit_miss_counters_track_reads() {
    let h = harness();
    let cache = h.ctx.cache();
    cache.cache_messages("s1", &messages("s1", "m", 1)).await.unwrap();

    let mut last = (0, 0);
    let plan = ["s1", "missing", "s1", "s1", "missing"];
    for session in plan {
        cache.get_cached_messages(session).await;
        let stats = h.ctx.metrics().get_metrics().await.unwrap();
        assert!(stats.cache_hits >= last.0 && stats.cache_misses >= last.1);
        last = (stats.cache_hits, stats.cache_misses);
    }
    assert_eq!(last, (3, 2));
}

#[tokio::test]
async fn test_optimize_dedupes_sorts_and_is_idempotent() {
    let h = harness();
    let cache = h.ctx.cache();
    cache
        .cache_messages("s1", &[message("s1", "a", 1), message("s1", "b", 5)])
        .await
        .unwrap();
    cache
        .cache_messages("s1", &[message("s1", "c", 3), message("s1", "a", 1)])
        .await
        .unwrap();
    assert_eq!(cache.get_cached_record("s1").await.unwrap().unwrap().messages.len(), 4);

    assert_eq!(cache.optimize_cache("s1").await.unwrap(), Some(3));
    let first = cache.get_cached_record("s1").await.unwrap().unwrap().messages;
    assert_eq!(ids(&first), vec!["b", "c", "a"]);

    assert_eq!(cache.optimize_cache("s1").await.unwrap(), Some(3));
    let second = cache.get_cached_record("s1").await.unwrap().unwrap().messages;
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_optimize_skips_missing_and_invalidated() {
    let h = harness();
    let cache = h.ctx.cache();
    assert_eq!(cache.optimize_cache("none").await.unwrap(), None);

    cache.cache_messages("s1", &messages("s1", "m", 2)).await.unwrap();
    cache.invalidate_cache("s1").await.unwrap();
    assert_eq!(cache.optimize_cache("s1").await.unwrap(), None);
    let record = cache.get_cached_record("s1").await.unwrap().unwrap();
    assert_eq!(record.status(), CacheStatus::Stale);
}

#[tokio::test]
async fn test_write_failure_records_error_and_returns_it() {
    let store = Arc::new(FlakyStore::default());
    let h = harness_with(CacheConfig::default(), store.clone());
    store.fail_writes.store(true, Ordering::SeqCst);

    let result = h.ctx.cache().cache_messages("s1", &messages("s1", "m", 1)).await;
    assert!(result.is_err());

    let stats = h.ctx.metrics().get_metrics().await.unwrap();
    assert_eq!(stats.sync_attempts, 1);
    assert_eq!(stats.sync_successes, 0);
    assert_eq!(stats.errors.len(), 1);
    assert!(stats.errors[0].error.contains("injected failure"));
}

#[tokio::test]
async fn test_read_failure_degrades_to_miss() {
    let store = Arc::new(FlakyStore::default());
    let h = harness_with(CacheConfig::default(), store.clone());
    h.ctx.cache().cache_messages("s1", &messages("s1", "m", 1)).await.unwrap();
    store.fail_reads.store(true, Ordering::SeqCst);

    assert!(h.ctx.cache().get_cached_messages("s1").await.is_none());

    let stats = h.ctx.metrics().get_metrics().await.unwrap();
    assert_eq!(stats.cache_misses, 1);
    assert_eq!(stats.errors.len(), 1);
}

#[tokio::test]
async fn test_error_log_bounded_through_cache() {
    let store = Arc::new(FlakyStore::default());
    let h = harness_with(CacheConfig::default(), store.clone());
    store.fail_writes.store(true, Ordering::SeqCst);

    for i in 0..(MAX_ERROR_ENTRIES + 10) {
        let session = format!("s{}", i);
        let _ = h.ctx.cache().cache_messages(&session, &messages(&session, "m", 1)).await;
    }

    let stats = h.ctx.metrics().get_metrics().await.unwrap();
    assert_eq!(stats.errors.len(), MAX_ERROR_ENTRIES);
    let newest = format!("cache_messages(s{})", MAX_ERROR_ENTRIES + 9);
    assert!(stats.errors[0].error.starts_with(&newest));
}

#[tokio::test]
async fn test_concurrent_writes_do_not_lose_messages() {
    let h = harness();
    let cache = h.ctx.cache().clone();

    let mut handles = Vec::new();
    for i in 0..25 {
        let cache = cache.clone();
        handles.push(tokio::spawn(async move {
            let msg = message("s1", &format!("m{}", i), i);
            cache.cache_messages("s1", &[msg]).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let record = cache.get_cached_record("s1").await.unwrap().unwrap();
    assert_eq!(record.messages.len(), 25);
}

#[tokio::test]
async fn test_write_during_optimize_is_kept() {
    let slow = Arc::new(SlowStore::default());
    let h = harness_with(CacheConfig::default(), slow.clone());
    let cache = h.ctx.cache().clone();
    cache.cache_messages("s1", &[message("s1", "a", 0)]).await.unwrap();

    slow.slow_reads.store(true, Ordering::SeqCst);
    let optimizing = {
        let cache = cache.clone();
        tokio::spawn(async move { cache.optimize_cache("s1").await })
    };
    // let the optimize take its read first
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    cache.cache_messages("s1", &[message("s1", "b", 1)]).await.unwrap();
    assert_eq!(optimizing.await.unwrap().unwrap(), Some(1));

    let record = cache.get_cached_record("s1").await.unwrap().unwrap();
    let stored: HashSet<String> = ids(&record.messages).into_iter().collect();
    assert_eq!(stored, HashSet::from(["a".to_string(), "b".to_string()]));
}

#[tokio::test]
async fn test_unreadable_record_is_overwritten_by_next_write() {
    let store = Arc::new(MemoryStore::default());
    let h = harness_with(CacheConfig::default(), store.clone());
    let cache = h.ctx.cache();
    store
        .put(Table::MessageCache, "s1", serde_json::json!({ "garbage": true }))
        .await
        .unwrap();

    cache.cache_messages("s1", &[message("s1", "m0", 0)]).await.unwrap();
    cache.cache_messages("s1", &[message("s1", "m1", 1)]).await.unwrap();

    let record = cache.get_cached_record("s1").await.unwrap().unwrap();
    assert_eq!(ids(&record.messages), vec!["m1", "m0"]);
    let stats = h.ctx.metrics().get_metrics().await.unwrap();
    assert_eq!(stats.errors.len(), 1);
    assert!(stats.errors[0].error.contains("unreadable record"));
    assert_eq!(stats.sync_successes, 2);
}

#[tokio::test]
async fn test_append_only_touches_servable_records() {
    let h = harness();
    let cache = h.ctx.cache();
    assert!(!cache.append_to_cached("s1", &[message("s1", "a", 0)]).await.unwrap());
    assert!(cache.get_cached_record("s1").await.unwrap().is_none());

    cache.cache_messages("s1", &[message("s1", "a", 0)]).await.unwrap();
    assert!(cache.append_to_cached("s1", &[message("s1", "b", 1)]).await.unwrap());
    assert_eq!(cache.get_cached_messages("s1").await.unwrap().len(), 2);

    h.clock.advance(Duration::hours(25));
    assert!(!cache.append_to_cached("s1", &[message("s1", "c", 2)]).await.unwrap());
}

#[tokio::test]
async fn test_expired_sessions_and_prune() {
    let h = harness();
    let cache = h.ctx.cache();
    cache.cache_messages("old", &messages("old", "m", 1)).await.unwrap();
    h.clock.advance(Duration::hours(20));
    cache.cache_messages("recent", &messages("recent", "m", 1)).await.unwrap();
    h.clock.advance(Duration::hours(5));

    assert_eq!(cache.expired_sessions().await.unwrap(), vec!["old".to_string()]);
    assert_eq!(
        cache.sessions_with_status(CacheStatus::Valid).await.unwrap().len(),
        2
    );

    assert_eq!(cache.prune_expired().await.unwrap(), 1);
    assert!(cache.get_cached_record("old").await.unwrap().is_none());
    assert!(cache.get_cached_record("recent").await.unwrap().is_some());
}

#[tokio::test]
async fn test_file_backed_cache_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = FileStore::open(dir.path(), CACHE_VERSION, |_| {}).await.unwrap();
        let h = harness_with(CacheConfig::default(), Arc::new(store));
        h.ctx.cache().cache_messages("s1", &messages("s1", "m", 4)).await.unwrap();
        h.ctx.cache().get_cached_messages("s1").await.unwrap();
    }

    let store = FileStore::open(dir.path(), CACHE_VERSION, |_| {}).await.unwrap();
    let h = harness_with(CacheConfig::default(), Arc::new(store));
    let read = h.ctx.cache().get_cached_messages("s1").await.unwrap();
    assert_eq!(read.len(), 4);

    let stats = h.ctx.metrics().get_metrics().await.unwrap();
    assert_eq!(stats.cache_hits, 2);
}

fn arb_messages() -> impl Strategy<Value = Vec<wiredcache::models::Message>> {
    prop::collection::vec((0u8..20, 0i64..50), 0..80).prop_map(|pairs| {
        pairs
            .into_iter()
            .map(|(id, minute)| message("s", &format!("id{}", id), minute))
            .collect()
    })
}

proptest! {
    #[test]
    fn optimize_is_idempotent(input in arb_messages(), max in 1usize..30) {
        let once = optimize_messages(input, max);
        let twice = optimize_messages(once.clone(), max);
        prop_assert_eq!(&once, &twice);

        let unique: HashSet<&str> = once.iter().map(|m| m.id.as_str()).collect();
        prop_assert_eq!(unique.len(), once.len());
        prop_assert!(once.windows(2).all(|w| w[0].created_at >= w[1].created_at));
        prop_assert!(once.len() <= max);
    }
}
