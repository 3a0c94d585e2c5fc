// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Local tier implementation using moka.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use moka::{Expiry, future::Cache};
use revalcache_tier::{Entry, LocalTier};

use crate::builder::InMemoryTierBuilder;

#[derive(Debug, Clone)]
struct Slot {
    entry: Arc<Entry>,
    ttl: Duration,
}

/// Expires each slot after the TTL it was written with.
struct PerEntryTtl;

impl Expiry<String, Slot> for PerEntryTtl {
    fn expire_after_create(&self, _key: &String, slot: &Slot, _created_at: Instant) -> Option<Duration> {
        Some(slot.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        slot: &Slot,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(slot.ttl)
    }
}

/// A size-bounded, process-local tier backed by moka.
///
/// Each entry is evicted after the TTL it was stored with, or earlier under capacity
/// pressure. Writes are buffered by moka; [`wait`](LocalTier::wait) flushes them so
/// that capacity accounting and evictions are up to date.
///
/// Cloning is cheap and clones share storage.
///
/// # Examples
///
/// ```
/// use revalcache_memory::InMemoryTier;
/// use revalcache_tier::LocalTier;
/// # futures::executor::block_on(async {
///
/// let tier = InMemoryTier::new();
/// assert!(tier.get("missing").await.is_none());
/// assert_eq!(tier.len(), Some(0));
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct InMemoryTier {
    inner: Cache<String, Slot>,
}

impl Default for InMemoryTier {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryTier {
    /// Creates a new unbounded tier.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates a new tier holding at most `max_capacity` entries.
    #[must_use]
    pub fn with_capacity(max_capacity: u64) -> Self {
        Self::builder().max_capacity(max_capacity).build()
    }

    /// Creates a new builder.
    #[must_use]
    pub fn builder() -> InMemoryTierBuilder {
        InMemoryTierBuilder::new()
    }

    /// The configured capacity bound, if any.
    #[must_use]
    pub fn max_capacity(&self) -> Option<u64> {
        self.inner.policy().max_capacity()
    }

    pub(crate) fn from_builder(builder: &InMemoryTierBuilder) -> Self {
        let mut moka_builder = Cache::builder().expire_after(PerEntryTtl);

        if let Some(capacity) = builder.max_capacity {
            moka_builder = moka_builder.max_capacity(capacity);
        }

        if let Some(capacity) = builder.initial_capacity {
            moka_builder = moka_builder.initial_capacity(capacity);
        }

        if let Some(name) = builder.name.as_deref() {
            moka_builder = moka_builder.name(name);
        }

        Self {
            inner: moka_builder.build(),
        }
    }
}

impl LocalTier for InMemoryTier {
    async fn get(&self, key: &str) -> Option<Arc<Entry>> {
        self.inner.get(key).await.map(|slot| slot.entry)
    }

    async fn set_with_ttl(&self, entry: Arc<Entry>, ttl: Duration) {
        let key = entry.key().to_owned();
        self.inner.insert(key, Slot { entry, ttl }).await;
    }

    async fn wait(&self) {
        self.inner.run_pending_tasks().await;
    }

    async fn invalidate(&self, key: &str) {
        self.inner.invalidate(key).await;
    }

    fn len(&self) -> Option<u64> {
        Some(self.inner.entry_count())
    }
}
