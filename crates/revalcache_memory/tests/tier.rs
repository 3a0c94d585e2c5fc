// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for the in-memory tiers.

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::{Duration, SystemTime},
};

use revalcache_memory::{InMemoryBackingTier, InMemoryTier};
use revalcache_tier::{BackingTier, ClockControl, Entry, Error, Lifetimes, LocalTier, Payload};

fn block_on<F: std::future::Future>(f: F) -> F::Output {
    futures::executor::block_on(f)
}

fn entry(key: &str, value: i32) -> Arc<Entry> {
    entry_at(key, value, SystemTime::now())
}

fn entry_at(key: &str, value: i32, created: SystemTime) -> Arc<Entry> {
    let lifetimes = Lifetimes::new(Duration::from_secs(1), Duration::from_secs(3)).unwrap();
    Arc::new(Entry::new(key, Payload::encode(&value).unwrap(), created, lifetimes))
}

#[test]
fn new_tier_is_empty() {
    let tier = InMemoryTier::new();
    assert_eq!(tier.len(), Some(0));
    assert_eq!(tier.is_empty(), Some(true));
    assert_eq!(tier.max_capacity(), None);
}

#[test]
fn with_capacity_sets_bound() {
    let tier = InMemoryTier::with_capacity(100);
    assert_eq!(tier.max_capacity(), Some(100));
}

#[test]
fn set_then_get_after_wait() {
    block_on(async {
        let tier = InMemoryTier::new();
        tier.set_with_ttl(entry("k", 42), Duration::from_secs(60)).await;
        tier.wait().await;

        let cached = tier.get("k").await.expect("entry should exist");
        assert_eq!(cached.value().decode::<i32>().unwrap(), 42);
        assert_eq!(tier.len(), Some(1));
    });
}

#[test]
fn set_overwrites_existing_entry() {
    block_on(async {
        let tier = InMemoryTier::new();
        tier.set_with_ttl(entry("k", 1), Duration::from_secs(60)).await;
        tier.set_with_ttl(entry("k", 2), Duration::from_secs(60)).await;
        tier.wait().await;

        let cached = tier.get("k").await.unwrap();
        assert_eq!(cached.value().decode::<i32>().unwrap(), 2);
        assert_eq!(tier.len(), Some(1));
    });
}

#[test]
fn invalidate_removes_entry() {
    block_on(async {
        let tier = InMemoryTier::new();
        tier.set_with_ttl(entry("k", 1), Duration::from_secs(60)).await;
        tier.invalidate("k").await;
        tier.wait().await;

        assert!(tier.get("k").await.is_none());
        assert_eq!(tier.len(), Some(0));
    });
}

#[tokio::test]
async fn entries_are_dropped_after_their_ttl() {
    let tier = InMemoryTier::new();
    tier.set_with_ttl(entry("short", 1), Duration::from_millis(50)).await;
    tier.set_with_ttl(entry("long", 2), Duration::from_secs(60)).await;
    tier.wait().await;

    tokio::time::sleep(Duration::from_millis(150)).await;

    assert!(tier.get("short").await.is_none());
    assert!(tier.get("long").await.is_some());
}

#[tokio::test]
async fn capacity_is_enforced_after_wait() {
    let tier = InMemoryTier::with_capacity(10);
    for i in 0..100 {
        tier.set_with_ttl(entry(&format!("k{i}"), i), Duration::from_secs(60)).await;
    }
    tier.wait().await;

    assert!(tier.len().unwrap() <= 10);
}

#[test]
fn clones_share_storage() {
    block_on(async {
        let tier = InMemoryTier::new();
        let clone = tier.clone();
        tier.set_with_ttl(entry("k", 7), Duration::from_secs(60)).await;

        assert!(clone.get("k").await.is_some());
    });
}

#[tokio::test]
async fn backing_tier_computes_once_until_expiry() {
    let control = ClockControl::new_at(SystemTime::UNIX_EPOCH + Duration::from_secs(1_000));
    let clock = control.to_clock();
    let tier = InMemoryBackingTier::with_store(InMemoryTier::new(), clock.clone());
    let computes = Arc::new(AtomicUsize::new(0));

    let compute = |value: i32| {
        let computes = Arc::clone(&computes);
        let created = clock.system_time();
        async move {
            computes.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::unwrap_or_clone(entry_at("k", value, created)))
        }
    };

    let first = tier.fetch_or_compute("k", Duration::from_secs(60), compute(1)).await.unwrap();
    let second = tier.fetch_or_compute("k", Duration::from_secs(60), compute(2)).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(computes.load(Ordering::SeqCst), 1);

    control.advance(Duration::from_secs(3));

    let third = tier.fetch_or_compute("k", Duration::from_secs(60), compute(3)).await.unwrap();
    assert_eq!(third.value().decode::<i32>().unwrap(), 3);
    assert_eq!(computes.load(Ordering::SeqCst), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn backing_tier_coalesces_concurrent_computes() {
    let tier = InMemoryBackingTier::new();
    let computes = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let tier = tier.clone();
            let computes = Arc::clone(&computes);
            tokio::spawn(async move {
                tier.fetch_or_compute("k", Duration::from_secs(60), async move {
                    computes.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok(Arc::unwrap_or_clone(entry("k", 5)))
                })
                .await
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap().value().decode::<i32>().unwrap(), 5);
    }
    assert_eq!(computes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn backing_tier_does_not_store_failures() {
    let tier = InMemoryBackingTier::new();

    let err = tier
        .fetch_or_compute("k", Duration::from_secs(60), async { Err(Error::loader("down")) })
        .await
        .unwrap_err();
    assert!(err.is_loader());

    let retried = tier
        .fetch_or_compute("k", Duration::from_secs(60), async { Ok(Arc::unwrap_or_clone(entry("k", 1))) })
        .await
        .unwrap();
    assert_eq!(retried.value().decode::<i32>().unwrap(), 1);
}

#[tokio::test]
async fn backing_store_replaces_entry() {
    let tier = InMemoryBackingTier::new();
    tier.store(&entry("k", 1), Duration::from_secs(60)).await.unwrap();
    tier.store(&entry("k", 2), Duration::from_secs(60)).await.unwrap();

    let fetched = tier
        .fetch_or_compute("k", Duration::from_secs(60), async { Err(Error::loader("should not run")) })
        .await
        .unwrap();
    assert_eq!(fetched.value().decode::<i32>().unwrap(), 2);
}

#[tokio::test]
async fn abandoned_computes_do_not_strand_later_callers() {
    let tier = InMemoryBackingTier::new();

    let abandoned = tier.fetch_or_compute("k", Duration::from_secs(60), std::future::pending());
    let timed_out = tokio::time::timeout(Duration::from_millis(20), abandoned).await;
    assert!(timed_out.is_err());

    let fetched = tokio::time::timeout(
        Duration::from_secs(5),
        tier.fetch_or_compute("k", Duration::from_secs(60), async { Ok(Arc::unwrap_or_clone(entry("k", 9))) }),
    )
    .await
    .expect("a dropped caller must not hold the key")
    .unwrap();
    assert_eq!(fetched.value().decode::<i32>().unwrap(), 9);
}
