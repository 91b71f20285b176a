//! Integration Tests for the Bucket Cache
//!
//! Exercises the public facade end to end: TTL behavior, conditional
//! writes, numeric mutation, eviction callbacks, sweeps and snapshots.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::sleep;
use std::time::Duration;

use bucket_cache::cache::{SeedOrigin, SeedSource};
use bucket_cache::tasks::JanitorState;
use bucket_cache::{BucketCache, CacheError, ShardedCache, Ttl, Value};

// == Helper Functions ==

fn create_test_cache(shards: usize) -> BucketCache {
    BucketCache::new(shards, None, Duration::ZERO).unwrap()
}

fn record_evictions(cache: &BucketCache) -> Arc<Mutex<Vec<(String, Value)>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    cache.on_evicted(move |key, value| {
        sink.lock().unwrap().push((key.to_string(), value));
    });
    seen
}

// == TTL ==

#[test]
fn test_never_expiring_item_survives() {
    let cache = BucketCache::new(4, Some(Duration::from_millis(5)), Duration::ZERO).unwrap();

    cache.set("k", "v", Ttl::Never);
    sleep(Duration::from_millis(20));

    assert_eq!(cache.get("k"), Some(Value::from("v")));
}

#[test]
fn test_lazy_expiry_before_sweep() {
    let cache = create_test_cache(4);

    cache.set("k", "v", Ttl::After(Duration::from_millis(10)));
    sleep(Duration::from_millis(20));

    assert_eq!(cache.get("k"), None);
    assert_eq!(cache.len(), 1, "Expired item stays until swept");
}

// == Conditional Writes ==

#[test]
fn test_add_twice_keeps_first_value() {
    let cache = create_test_cache(4);

    cache.add("k", "v1", Ttl::Default).unwrap();
    let result = cache.add("k", "v2", Ttl::Default);

    assert!(matches!(result, Err(CacheError::AlreadyExists(_))));
    assert_eq!(cache.get("k"), Some(Value::from("v1")));
}

#[test]
fn test_replace_absent_key() {
    let cache = create_test_cache(4);

    let result = cache.replace("missing", "v", Ttl::Default);

    assert!(matches!(result, Err(CacheError::NotFound(_))));
    assert!(cache.is_empty());
}

// == Numeric Mutation ==

#[test]
fn test_increment_int_and_wrong_type() {
    let cache = create_test_cache(4);

    cache.set("n", 10i64, Ttl::Never);
    cache.increment("n", 5).unwrap();
    assert_eq!(cache.get("n"), Some(Value::I64(15)));

    cache.set("s", "text", Ttl::Never);
    assert!(matches!(
        cache.increment("s", 5),
        Err(CacheError::WrongType { .. })
    ));
}

#[test]
fn test_typed_counters_read_back() {
    let cache = create_test_cache(8);

    cache.set("hits", 0u64, Ttl::Never);
    cache.set("ratio", 0.5f64, Ttl::Never);

    assert_eq!(cache.increment_by("hits", 3u64).unwrap(), 3);
    assert_eq!(cache.increment_by("ratio", 0.25f64).unwrap(), 0.75);
    assert_eq!(cache.decrement_by("hits", 1u64).unwrap(), 2);
    cache.decrement_float("ratio", 0.5).unwrap();
    assert_eq!(cache.get("ratio"), Some(Value::F64(0.25)));
}

// == Eviction Callback ==

#[test]
fn test_delete_fires_callback_overwrite_does_not() {
    let cache = create_test_cache(4);
    let seen = record_evictions(&cache);

    cache.set("k", "v1", Ttl::Never);
    cache.set("k", "v2", Ttl::Never);
    assert!(seen.lock().unwrap().is_empty());

    cache.delete("k");
    assert_eq!(
        seen.lock().unwrap().as_slice(),
        &[("k".to_string(), Value::from("v2"))]
    );
}

#[test]
fn test_sweep_removes_only_expired() {
    let cache = create_test_cache(4);
    let seen = record_evictions(&cache);

    for i in 0..10 {
        cache.set(format!("short{}", i), i as i64, Ttl::After(Duration::from_millis(5)));
        cache.set(format!("long{}", i), i as i64, Ttl::Never);
    }
    sleep(Duration::from_millis(15));

    assert_eq!(cache.len(), 20);
    assert_eq!(cache.sweep_expired(), 10);
    assert_eq!(cache.len(), 10);
    assert_eq!(seen.lock().unwrap().len(), 10);
    assert!((0..10).all(|i| cache.get(&format!("long{}", i)).is_some()));
}

#[test]
fn test_flush_skips_callback() {
    let cache = create_test_cache(4);
    let evictions = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&evictions);
    cache.on_evicted(move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    cache.set("a", 1i64, Ttl::Never);
    cache.set("b", 2i64, Ttl::Never);
    cache.flush();

    assert!(cache.is_empty());
    assert_eq!(evictions.load(Ordering::SeqCst), 0);
}

// == Sharding ==

#[test]
fn test_thousand_keys_across_four_shards() {
    let cache = create_test_cache(4);

    for i in 0..1000 {
        cache.set(format!("key-{}", i), i as i64, Ttl::Default);
    }

    assert_eq!(cache.count_all().len(), 4);
    assert_eq!(cache.count_all().iter().sum::<usize>(), 1000);
    for i in 0..1000 {
        assert_eq!(cache.get(&format!("key-{}", i)), Some(Value::I64(i)));
    }
}

#[test]
fn test_insecure_seed_fallback_still_builds() {
    struct Unavailable;

    impl SeedSource for Unavailable {
        fn secure_seed(&self) -> Result<u32, getrandom::Error> {
            Err(getrandom::Error::UNSUPPORTED)
        }
    }

    let sharded = ShardedCache::with_seed_source(4, None, &Unavailable);
    assert_eq!(sharded.seed_origin(), SeedOrigin::Insecure);

    let cache = BucketCache::with_cache(sharded, Duration::ZERO).unwrap();
    cache.set("k", 1i64, Ttl::Never);
    assert_eq!(cache.get("k"), Some(Value::I64(1)));
}

// == Snapshots ==

#[test]
fn test_save_and_restore_shard_files() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("cache.snap");

    let source = create_test_cache(4);
    for i in 0..100 {
        source.set(format!("k{}", i), i as i64, Ttl::Never);
    }
    source.set("gone", "x", Ttl::After(Duration::from_millis(5)));
    sleep(Duration::from_millis(15));

    assert_eq!(source.save_to_file(&base).unwrap(), 101);
    for index in 0..4 {
        assert!(dir.path().join(format!("cache.snap_{}", index)).exists());
    }

    // A different shard count still restores every live key
    let target = create_test_cache(3);
    assert_eq!(target.load_shard_files(&base).unwrap(), 100);
    assert!(target.get("gone").is_none());
    for i in 0..100 {
        assert_eq!(target.get(&format!("k{}", i)), Some(Value::I64(i)));
    }
}

#[test]
fn test_load_from_single_file() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("one");

    let source = create_test_cache(1);
    source.set("a", "alpha", Ttl::After(Duration::from_secs(60)));
    source.save_to_file(&base).unwrap();

    let target = create_test_cache(4);
    assert_eq!(target.load_from_file(dir.path().join("one_0")).unwrap(), 1);
    let (value, expires) = target.get_with_expiration("a").unwrap();
    assert_eq!(value, Value::from("alpha"));
    assert!(expires.is_some());
}

#[test]
fn test_load_missing_file_is_serialization_error() {
    let cache = create_test_cache(2);
    let result = cache.load_from_file("/nonexistent/bucket-cache/snapshot");
    assert!(matches!(result, Err(CacheError::Serialization(_))));
}

// == Janitor ==

#[tokio::test]
async fn test_janitor_sweeps_in_background() {
    let cache = BucketCache::new(4, None, Duration::from_millis(20)).unwrap();
    let seen = record_evictions(&cache);

    cache.set("short", 1i64, Ttl::After(Duration::from_millis(10)));
    cache.set("long", 2i64, Ttl::Never);

    tokio::time::sleep(Duration::from_millis(150)).await;

    assert_eq!(cache.len(), 1);
    assert_eq!(
        seen.lock().unwrap().as_slice(),
        &[("short".to_string(), Value::I64(1))]
    );

    cache.shutdown().await;
    assert_eq!(cache.janitor_state(), Some(JanitorState::Stopped));
}
