// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{sync::Arc, time::Duration};

use revalcache_tier::{BackingTier, Clock, Entry, Error, LocalTier, system_clock};
use uniflight::UniFlight;

use crate::tier::InMemoryTier;

/// A process-local backing tier.
///
/// Stands in for a shared store when a cache runs in a single process, or in tests.
/// Concurrent fetches for the same key run their compute once. Stored entries are
/// served until their own expiry as judged by the tier's clock.
///
/// # Examples
///
/// ```
/// use std::time::{Duration, SystemTime};
///
/// use revalcache_memory::InMemoryBackingTier;
/// use revalcache_tier::{BackingTier, Entry, Lifetimes, Payload};
///
/// # futures::executor::block_on(async {
/// let tier = InMemoryBackingTier::new();
/// let lifetimes = Lifetimes::new(Duration::from_secs(1), Duration::from_secs(3)).unwrap();
///
/// let entry = tier
///     .fetch_or_compute("k", Duration::from_secs(3), async move {
///         Ok(Entry::new("k", Payload::encode(&1)?, SystemTime::now(), lifetimes))
///     })
///     .await
///     .unwrap();
/// assert_eq!(entry.value().decode::<i32>().unwrap(), 1);
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct InMemoryBackingTier {
    store: InMemoryTier,
    flights: Arc<UniFlight<String, Result<Entry, Error>>>,
    clock: Clock,
}

impl Default for InMemoryBackingTier {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBackingTier {
    /// Creates an unbounded tier on the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_store(InMemoryTier::new(), system_clock())
    }

    /// Creates a tier over `store` that judges expiry with `clock`.
    #[must_use]
    pub fn with_store(store: InMemoryTier, clock: Clock) -> Self {
        Self {
            store,
            flights: Arc::default(),
            clock,
        }
    }

    async fn live_entry(&self, key: &str) -> Option<Entry> {
        let now = self.clock.system_time();
        self.store
            .get(key)
            .await
            .filter(|entry| entry.expires_at() > now)
            .map(Arc::unwrap_or_clone)
    }
}

impl BackingTier for InMemoryBackingTier {
    async fn fetch_or_compute<F>(&self, key: &str, ttl: Duration, compute: F) -> Result<Entry, Error>
    where
        F: Future<Output = Result<Entry, Error>> + Send + 'static,
    {
        if let Some(entry) = self.live_entry(key).await {
            return Ok(entry);
        }

        let store = self.store.clone();
        self.flights
            .work(key.to_owned(), move || async move {
                let entry = compute.await?;
                store.set_with_ttl(Arc::new(entry.clone()), ttl).await;
                Ok(entry)
            })
            .await
    }

    async fn store(&self, entry: &Entry, ttl: Duration) -> Result<(), Error> {
        self.store.set_with_ttl(Arc::new(entry.clone()), ttl).await;
        Ok(())
    }
}
