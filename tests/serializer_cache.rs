//! Concurrency guarantees and health-report thresholds for `SerializerCache`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ksql_entities::serializer_cache::{Codec, Role, SerializerCache, Severity};

fn dummy_codec() -> Codec {
    Codec::from_schema_text(1, "\"string\"").unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_first_requests_construct_exactly_once() {
    let cache = Arc::new(SerializerCache::new());
    let construction_count = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..32 {
        let cache = Arc::clone(&cache);
        let construction_count = Arc::clone(&construction_count);
        handles.push(tokio::spawn(async move {
            cache
                .get_for_serialize("Trade", Role::Value, 1, || async move {
                    construction_count.fetch_add(1, Ordering::SeqCst);
                    tokio::task::yield_now().await;
                    Ok(dummy_codec())
                })
                .await
                .unwrap()
        }));
    }

    let mut codecs = Vec::new();
    for handle in handles {
        codecs.push(handle.await.unwrap());
    }

    assert_eq!(construction_count.load(Ordering::SeqCst), 1);
    let first = &codecs[0];
    for codec in &codecs {
        assert!(Arc::ptr_eq(first, codec));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn hit_and_miss_counters_are_consistent_under_concurrency() {
    let cache = Arc::new(SerializerCache::new());

    let mut handles = Vec::new();
    for _ in 0..16 {
        let cache = Arc::clone(&cache);
        handles.push(tokio::spawn(async move {
            cache
                .get_for_serialize("Trade", Role::Key, 7, || async move { Ok(dummy_codec()) })
                .await
                .unwrap()
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let stats = cache.stats();
    assert_eq!(stats.total_requests, 16);
    assert_eq!(stats.hits + stats.misses, 16);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 15);

    let entity_stats = cache.entity_stats("Trade");
    assert_eq!(entity_stats.key_ser_misses, 1);
    assert_eq!(entity_stats.key_ser_hits, 15);
}

#[tokio::test]
async fn clear_forces_observable_reconstruction() {
    let cache = SerializerCache::new();
    let construction_count = AtomicUsize::new(0);

    cache
        .get_for_serialize("Trade", Role::Value, 1, || async {
            construction_count.fetch_add(1, Ordering::SeqCst);
            Ok(dummy_codec())
        })
        .await
        .unwrap();
    assert_eq!(construction_count.load(Ordering::SeqCst), 1);

    cache
        .get_for_serialize("Trade", Role::Value, 1, || async {
            construction_count.fetch_add(1, Ordering::SeqCst);
            Ok(dummy_codec())
        })
        .await
        .unwrap();
    assert_eq!(construction_count.load(Ordering::SeqCst), 1, "second request should hit");

    cache.clear();

    cache
        .get_for_serialize("Trade", Role::Value, 1, || async {
            construction_count.fetch_add(1, Ordering::SeqCst);
            Ok(dummy_codec())
        })
        .await
        .unwrap();
    assert_eq!(construction_count.load(Ordering::SeqCst), 2, "clear() should force reconstruction");
}

#[tokio::test]
async fn clear_for_entity_only_evicts_the_named_entity() {
    let cache = SerializerCache::new();

    cache
        .get_for_serialize("Trade", Role::Value, 1, || async { Ok(dummy_codec()) })
        .await
        .unwrap();
    cache
        .get_for_serialize("Order", Role::Value, 1, || async { Ok(dummy_codec()) })
        .await
        .unwrap();
    assert_eq!(cache.stats().cached_item_count, 2);

    cache.clear_for_entity("Trade");
    assert_eq!(cache.stats().cached_item_count, 1);

    let reconstructed = AtomicUsize::new(0);
    cache
        .get_for_serialize("Trade", Role::Value, 1, || async {
            reconstructed.fetch_add(1, Ordering::SeqCst);
            Ok(dummy_codec())
        })
        .await
        .unwrap();
    assert_eq!(reconstructed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn health_report_is_critical_for_an_empty_cache() {
    let cache = SerializerCache::new();
    let report = cache.health_report();
    assert_eq!(report.severity, Severity::Critical);
    assert_eq!(report.hit_rate, 0.0);
}

#[tokio::test]
async fn health_report_flags_entities_below_the_fifty_percent_hit_rate_threshold() {
    let cache = SerializerCache::new();

    // One miss, zero hits for "ColdEntity": hit rate 0.0, below the 0.50 per-entity threshold.
    cache
        .get_for_serialize("ColdEntity", Role::Value, 1, || async { Ok(dummy_codec()) })
        .await
        .unwrap();

    // One miss, several hits for "HotEntity": hit rate well above 0.50.
    for _ in 0..5 {
        cache
            .get_for_serialize("HotEntity", Role::Value, 1, || async { Ok(dummy_codec()) })
            .await
            .unwrap();
    }

    let report = cache.health_report();
    assert!(report
        .issues
        .iter()
        .any(|issue| issue.entity_type_id == "ColdEntity"));
    assert!(!report
        .issues
        .iter()
        .any(|issue| issue.entity_type_id == "HotEntity"));
    assert!(report
        .recommendations
        .iter()
        .any(|r| r.contains("ColdEntity")));
}

#[tokio::test]
async fn health_report_is_healthy_once_hit_rate_clears_ninety_percent() {
    let cache = SerializerCache::new();
    for _ in 0..20 {
        cache
            .get_for_serialize("Trade", Role::Value, 1, || async { Ok(dummy_codec()) })
            .await
            .unwrap();
    }
    let report = cache.health_report();
    assert_eq!(report.severity, Severity::Healthy);
    assert!(report.recommendations.is_empty());
}
