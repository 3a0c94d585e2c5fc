// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Two caches sharing a Redis backing tier, as two processes would.
//!
//! Needs a reachable server. Set `REDIS_URL` to override the default
//! `redis://127.0.0.1:6379/`.

use std::time::Duration;

use revalcache::{Cache, InMemoryTier, ItemRequest};
use revalcache_redis::{DEFAULT_URL, RedisBackingTier, RedisConfig};

#[tokio::main]
async fn main() -> revalcache::Result<()> {
    tracing_subscriber::fmt().init();

    let url = std::env::var("REDIS_URL").unwrap_or_else(|_| DEFAULT_URL.to_owned());
    let config = RedisConfig::single(url).with_key_prefix("revalcache-example:");

    let first = build("first", &config).await?;
    let second = build("second", &config).await?;

    let load = |key: String| async move {
        println!("loading {key}");
        Ok::<_, std::io::Error>(format!("value of {key}"))
    };

    let a: String = first.get(ItemRequest::new("greeting", load)).await?;
    // Answered by Redis; the loader does not run again.
    let b: String = second.get(ItemRequest::new("greeting", load)).await?;
    println!("{a} / {b}");

    Ok(())
}

async fn build(name: &str, config: &RedisConfig) -> revalcache::Result<Cache<InMemoryTier, RedisBackingTier>> {
    Cache::builder()
        .name(name)
        .default_ttl(Duration::from_secs(30))
        .default_revalidate_ttl(Duration::from_secs(10))
        .memory()
        .backing(RedisBackingTier::connect(config).await?)
        .build()
}
