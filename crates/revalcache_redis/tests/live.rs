// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Tests against a running Redis. Run with `cargo test -- --ignored` and `REDIS_URL` set.

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::{Duration, SystemTime},
};

use revalcache_redis::{DEFAULT_URL, RedisBackingTier, RedisConfig};
use revalcache_tier::{BackingTier, Entry, Error, Lifetimes, Payload};

async fn connect(prefix: &str) -> RedisBackingTier {
    let url = std::env::var("REDIS_URL").unwrap_or_else(|_| DEFAULT_URL.to_owned());
    let unique = SystemTime::now().duration_since(SystemTime::UNIX_EPOCH).unwrap().as_nanos();
    RedisBackingTier::connect(&RedisConfig::single(url).with_key_prefix(format!("revalcache-test:{prefix}:{unique}:")))
        .await
        .expect("redis should be reachable")
}

fn entry(key: &str, value: &str) -> Entry {
    let lifetimes = Lifetimes::new(Duration::from_secs(1), Duration::from_secs(3)).unwrap();
    Entry::new(key, Payload::encode(value).unwrap(), SystemTime::now(), lifetimes)
}

#[tokio::test]
async fn malformed_url_is_a_config_error() {
    let err = RedisBackingTier::connect(&RedisConfig::single("not a url")).await.unwrap_err();
    assert!(matches!(err, Error::Config(_)), "unexpected error: {err:?}");
}

#[tokio::test]
async fn empty_cluster_is_a_config_error() {
    let err = RedisBackingTier::connect(&RedisConfig::cluster(Vec::<String>::new()))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[tokio::test]
#[ignore = "needs a running redis"]
async fn miss_computes_and_stores() {
    let tier = connect("miss").await;
    let computes = Arc::new(AtomicUsize::new(0));

    for _ in 0..2 {
        let computes = Arc::clone(&computes);
        let fetched = tier
            .fetch_or_compute("1", Duration::from_secs(3), async move {
                computes.fetch_add(1, Ordering::SeqCst);
                Ok(entry("1", "Named"))
            })
            .await
            .unwrap();
        assert_eq!(fetched.value().decode::<String>().unwrap(), "Named");
    }

    assert_eq!(computes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
#[ignore = "needs a running redis"]
async fn store_overwrites() {
    let tier = connect("store").await;
    tier.store(&entry("1", "old"), Duration::from_secs(3)).await.unwrap();
    tier.store(&entry("1", "new"), Duration::from_secs(3)).await.unwrap();

    let fetched = tier
        .fetch_or_compute("1", Duration::from_secs(3), async { Err(Error::loader("should not run")) })
        .await
        .unwrap();
    assert_eq!(fetched.value().decode::<String>().unwrap(), "new");
}

#[tokio::test]
#[ignore = "needs a running redis"]
async fn entries_vanish_after_ttl() {
    let tier = connect("ttl").await;
    tier.store(&entry("1", "short"), Duration::from_millis(100)).await.unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;

    let fetched = tier
        .fetch_or_compute("1", Duration::from_secs(3), async { Ok(entry("1", "reloaded")) })
        .await
        .unwrap();
    assert_eq!(fetched.value().decode::<String>().unwrap(), "reloaded");
}

#[tokio::test]
#[ignore = "needs a running redis"]
async fn failed_compute_is_not_stored() {
    let tier = connect("fail").await;

    let err = tier
        .fetch_or_compute("1", Duration::from_secs(3), async { Err(Error::loader("boom")) })
        .await
        .unwrap_err();
    assert!(err.is_loader());

    let fetched = tier
        .fetch_or_compute("1", Duration::from_secs(3), async { Ok(entry("1", "second")) })
        .await
        .unwrap();
    assert_eq!(fetched.value().decode::<String>().unwrap(), "second");
}
