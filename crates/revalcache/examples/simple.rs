// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Stale-while-revalidate with the in-memory tiers.
//!
//! Run with `cargo run --example simple` and watch the emitted events.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use revalcache::{Cache, ItemRequest};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
struct Quote {
    symbol: String,
    price: u32,
}

#[tokio::main]
async fn main() -> revalcache::Result<()> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).init();

    let cache = Cache::builder()
        .name("quotes")
        .default_ttl(Duration::from_secs(3))
        .default_revalidate_ttl(Duration::from_secs(1))
        .memory()
        .build()?;

    // Every load returns a higher price, so refreshed values are easy to spot.
    let ticks = Arc::new(AtomicU32::new(100));
    let load = move |symbol: String| {
        let price = ticks.fetch_add(1, Ordering::SeqCst);
        async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok::<_, std::io::Error>(Quote { symbol, price })
        }
    };

    for second in 0..5 {
        let quote: Quote = cache.get(ItemRequest::new("MSFT", load.clone())).await?;
        println!("t={second}s: {quote:?}");
        tokio::time::sleep(Duration::from_secs(1)).await;
    }

    Ok(())
}
