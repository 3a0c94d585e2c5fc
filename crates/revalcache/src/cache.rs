// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The cache coordinator.
//!
//! A lookup takes its shard's lock only to read the local tier, classify the entry and
//! (for stale entries) register a refresh. Synchronous reloads run outside the lock and
//! are coalesced per key, so a slow load never blocks unrelated keys on the same shard.

use std::{
    any::Any,
    collections::HashSet,
    fmt::Debug,
    future::Future,
    panic::AssertUnwindSafe,
    sync::Arc,
    time::{Duration, Instant},
};

use futures::FutureExt as _;
use revalcache_memory::{InMemoryBackingTier, InMemoryTier};
use revalcache_tier::{BackingTier, Clock, Entry, Error, Freshness, Lifetimes, LocalTier, Result};
use serde::de::DeserializeOwned;
use tick::FutureExt as _;
use uniflight::UniFlight;

use crate::{
    builder::CacheBuilder,
    loader::{ItemRequest, Loader, SharedLoader, share},
    refresh::RevalidationScheduler,
    shard::ShardRouter,
    telemetry::{CacheActivity, CacheOperation, CacheTelemetry},
};

/// Longest key accepted, in bytes.
pub const MAX_KEY_LEN: usize = 1024;

/// A sharded two-tier read-through cache with stale-while-revalidate.
///
/// Each lookup is answered according to the freshness of the locally cached entry:
///
/// - **fresh**: served from the local tier;
/// - **stale**: served from the local tier while a background task reloads it;
/// - **expired** or **missing**: loaded through the backing tier, which runs the loader
///   at most once per key across concurrent callers, then stored locally and served.
///
/// Cloning is cheap; clones share all state.
///
/// # Examples
///
/// ```
/// use revalcache::{Cache, ItemRequest};
/// use serde::{Deserialize, Serialize};
/// use std::time::Duration;
///
/// #[derive(Serialize, Deserialize, Debug, PartialEq)]
/// struct User {
///     id: String,
///     name: String,
/// }
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> revalcache::Result<()> {
/// let cache = Cache::builder()
///     .default_ttl(Duration::from_secs(3))
///     .default_revalidate_ttl(Duration::from_secs(1))
///     .memory()
///     .build()?;
///
/// let user: User = cache
///     .get(ItemRequest::new("1", |id: String| async move {
///         Ok::<_, std::io::Error>(User { id, name: "Named".into() })
///     }))
///     .await?;
///
/// assert_eq!(user.name, "Named");
/// # Ok(())
/// # }
/// ```
pub struct Cache<L = InMemoryTier, B = InMemoryBackingTier> {
    inner: Arc<CacheInner<L, B>>,
}

impl<L, B> Clone for Cache<L, B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<L, B> Debug for Cache<L, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("name", &self.inner.telemetry.name())
            .field("shards", &self.inner.shards.len())
            .field("defaults", &self.inner.defaults)
            .field("load_timeout", &self.inner.load_timeout)
            .finish_non_exhaustive()
    }
}

impl Cache {
    /// Creates a builder.
    ///
    /// Choose a local tier with [`memory`](CacheBuilder::memory),
    /// [`memory_with`](CacheBuilder::memory_with) or
    /// [`local_tiers`](CacheBuilder::local_tiers) before building.
    #[must_use]
    pub fn builder() -> CacheBuilder<(), InMemoryBackingTier> {
        CacheBuilder::new()
    }
}

impl<L, B> Cache<L, B>
where
    L: LocalTier,
    B: BackingTier,
{
    pub(crate) fn from_inner(inner: CacheInner<L, B>) -> Self {
        Self { inner: Arc::new(inner) }
    }

    /// Looks up `request.key()` and decodes the value into `T`.
    ///
    /// `T` only needs to match the stored value by field name; it may be a narrower view
    /// of what the loader produced.
    ///
    /// # Errors
    ///
    /// - [`Error::KeyEmpty`], [`Error::KeyNotSupported`] or [`Error::InvalidLifetimes`]
    ///   before any tier is touched;
    /// - the loader's own error as [`Error::Loader`], or [`Error::ValueNotSupported`]
    ///   if its value cannot be stored;
    /// - [`Error::Backing`] if the backing tier is unreachable;
    /// - [`Error::Timeout`] if a configured load timeout elapses;
    /// - [`Error::Decode`] if the value does not fit `T`. The entry is cached regardless.
    pub async fn get<T, Ld>(&self, request: ItemRequest<Ld>) -> Result<T>
    where
        T: DeserializeOwned,
        Ld: Loader,
    {
        let entry = self.inner.resolve(request).await?;
        entry.value().decode()
    }

    /// Like [`get`](Self::get), but writes into `destination`.
    ///
    /// `destination` is only overwritten on success.
    ///
    /// # Errors
    ///
    /// As for [`get`](Self::get).
    pub async fn get_into<T, Ld>(&self, destination: &mut T, request: ItemRequest<Ld>) -> Result<()>
    where
        T: DeserializeOwned,
        Ld: Loader,
    {
        *destination = self.get(request).await?;
        Ok(())
    }

    /// Removes `key` from its shard's local tier. The backing tier is left untouched.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `key` is empty or unsupported.
    pub async fn invalidate(&self, key: &str) -> Result<()> {
        validate_key(key)?;
        let shard = self.inner.shards.lock(self.inner.shards.index_of(key)).await;
        shard.local.invalidate(key).await;
        shard.local.wait().await;
        Ok(())
    }

    /// The name given at build time.
    #[must_use]
    pub fn name(&self) -> &str {
        self.inner.telemetry.name()
    }

    /// Number of shards.
    #[must_use]
    pub fn shard_count(&self) -> usize {
        self.inner.shards.len()
    }

    /// The shard `key` maps to.
    #[must_use]
    pub fn shard_of(&self, key: &str) -> usize {
        self.inner.shards.index_of(key)
    }

    /// Number of background refreshes that have not finished yet.
    #[must_use]
    pub fn refreshes_in_flight(&self) -> usize {
        self.inner.scheduler.in_flight()
    }

    /// The clock used for timestamps and freshness.
    #[must_use]
    pub fn clock(&self) -> &Clock {
        &self.inner.clock
    }
}

pub(crate) struct CacheInner<L, B> {
    telemetry: CacheTelemetry,
    shards: ShardRouter<L>,
    backing: B,
    defaults: Lifetimes,
    load_timeout: Option<Duration>,
    clock: Clock,
    reloads: UniFlight<String, Result<Arc<Entry>>>,
    scheduler: RevalidationScheduler,
}

impl<L, B> CacheInner<L, B>
where
    L: LocalTier,
    B: BackingTier,
{
    pub(crate) fn new(
        telemetry: CacheTelemetry,
        shards: ShardRouter<L>,
        backing: B,
        defaults: Lifetimes,
        load_timeout: Option<Duration>,
        clock: Clock,
    ) -> Self {
        Self {
            telemetry,
            shards,
            backing,
            defaults,
            load_timeout,
            clock,
            reloads: UniFlight::new(),
            scheduler: RevalidationScheduler::new(),
        }
    }

    async fn resolve<Ld>(self: &Arc<Self>, request: ItemRequest<Ld>) -> Result<Arc<Entry>>
    where
        Ld: Loader,
    {
        let ItemRequest {
            key,
            loader,
            ttl,
            ttl_revalidate,
        } = request;

        validate_key(&key)?;
        let lifetimes = self.defaults.with_overrides(ttl_revalidate, ttl)?;
        let loader = share(loader);
        let index = self.shards.index_of(&key);
        let started = Instant::now();

        {
            let mut shard = self.shards.lock(index).await;
            let cached = shard.local.get(&key).await;

            match (Freshness::of(cached.as_deref(), self.clock.system_time()), cached) {
                (Freshness::Fresh, Some(entry)) => {
                    self.telemetry
                        .record(CacheOperation::Get, CacheActivity::Hit, Some(started.elapsed()));
                    return Ok(entry);
                }
                (Freshness::Stale, Some(entry)) => {
                    self.telemetry
                        .record(CacheOperation::Get, CacheActivity::Stale, Some(started.elapsed()));

                    if !self.register_refresh(&mut shard.refreshing, index, &key, loader, lifetimes) {
                        self.telemetry
                            .record(CacheOperation::Refresh, CacheActivity::RefreshSkipped, None);
                    }
                    return Ok(entry);
                }
                (Freshness::Expired, _) => {
                    self.telemetry
                        .record(CacheOperation::Get, CacheActivity::Expired, Some(started.elapsed()));
                }
                _ => {
                    self.telemetry
                        .record(CacheOperation::Get, CacheActivity::Miss, Some(started.elapsed()));
                }
            }
        }

        self.reload(index, key, loader, lifetimes).await
    }

    /// Loads `key` through the backing tier and stores the result locally.
    ///
    /// Concurrent reloads of the same key share one execution. If the caller running it
    /// is dropped, a waiting caller takes over.
    async fn reload(self: &Arc<Self>, index: usize, key: String, loader: SharedLoader, lifetimes: Lifetimes) -> Result<Arc<Entry>> {
        self.reloads
            .work(key.clone(), || async {
                let started = Instant::now();
                let result = self.bounded(self.fetch_and_fill(index, &key, loader, lifetimes)).await;
                match &result {
                    Ok(_) => self
                        .telemetry
                        .record(CacheOperation::Load, CacheActivity::Loaded, Some(started.elapsed())),
                    Err(error) => self
                        .telemetry
                        .record_error(CacheOperation::Load, error, Some(started.elapsed())),
                }
                result
            })
            .await
    }

    async fn fetch_and_fill(self: &Arc<Self>, index: usize, key: &str, loader: SharedLoader, lifetimes: Lifetimes) -> Result<Arc<Entry>> {
        let clock = self.clock.clone();
        let compute_key = key.to_owned();
        let compute_loader = Arc::clone(&loader);
        let compute = async move {
            let value = compute_loader.load(&compute_key).await?;
            let created_at = clock.system_time();
            Ok(Entry::new(compute_key, value, created_at, lifetimes))
        };

        let fetched = Arc::new(self.backing.fetch_or_compute(key, lifetimes.expire(), compute).await?);

        let mut shard = self.shards.lock(index).await;

        // A refresh may have stored a newer entry while the backing tier was answering.
        let entry = match shard.local.get(key).await {
            Some(current) if current.created_at() > fetched.created_at() => current,
            _ => {
                let ttl = fetched.time_to_expiry(self.clock.system_time());
                shard.local.set_with_ttl(Arc::clone(&fetched), ttl).await;
                shard.local.wait().await;
                fetched
            }
        };

        // The backing tier can hand back an entry another process created a while ago.
        if entry.freshness(self.clock.system_time()) == Freshness::Stale {
            self.telemetry.record(CacheOperation::Load, CacheActivity::Stale, None);
            self.register_refresh(&mut shard.refreshing, index, key, loader, lifetimes);
        }

        Ok(entry)
    }

    /// Marks `key` as refreshing and starts a detached refresh for it.
    ///
    /// Returns `false` if a refresh for `key` is already running. When no runtime is
    /// available nothing is started and the mark is dropped again.
    fn register_refresh(
        self: &Arc<Self>,
        refreshing: &mut HashSet<String>,
        index: usize,
        key: &str,
        loader: SharedLoader,
        lifetimes: Lifetimes,
    ) -> bool {
        if !refreshing.insert(key.to_owned()) {
            return false;
        }

        let inner = Arc::clone(self);
        let owned_key = key.to_owned();
        if !self
            .scheduler
            .spawn(async move { inner.refresh(index, owned_key, loader, lifetimes).await })
        {
            refreshing.remove(key);
        }
        true
    }

    async fn refresh(&self, index: usize, key: String, loader: SharedLoader, lifetimes: Lifetimes) {
        let started = Instant::now();

        let outcome = AssertUnwindSafe(self.bounded(self.refresh_entry(index, &key, &loader, lifetimes)))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(Error::loader(panic_message(&*panic))));

        match outcome {
            Ok(()) => self
                .telemetry
                .record(CacheOperation::Refresh, CacheActivity::Refreshed, Some(started.elapsed())),
            // The stale entry stays in place and the next read schedules another attempt.
            Err(error) => self
                .telemetry
                .record_error(CacheOperation::Refresh, &error, Some(started.elapsed())),
        }

        self.shards.lock(index).await.refreshing.remove(&key);
        self.scheduler.finish();
    }

    /// Applies the load timeout, if any, measured on the cache's clock.
    async fn bounded<T, F>(&self, work: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match self.load_timeout {
            Some(limit) => work
                .timeout(limit, &self.clock)
                .await
                .unwrap_or_else(|_| Err(Error::Timeout(limit))),
            None => work.await,
        }
    }

    async fn refresh_entry(&self, index: usize, key: &str, loader: &SharedLoader, lifetimes: Lifetimes) -> Result<()> {
        let value = loader.load(key).await?;
        let entry = Arc::new(Entry::new(key, value, self.clock.system_time(), lifetimes));

        {
            let shard = self.shards.lock(index).await;
            shard.local.set_with_ttl(Arc::clone(&entry), lifetimes.expire()).await;
            shard.local.wait().await;
        }

        self.backing.store(&entry, lifetimes.expire()).await
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    let detail = panic
        .downcast_ref::<&str>()
        .map(|message| (*message).to_owned())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown cause".to_owned());
    format!("loader panicked: {detail}")
}

pub(crate) fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::KeyEmpty);
    }
    if key.len() > MAX_KEY_LEN {
        return Err(Error::KeyNotSupported {
            reason: "longer than 1024 bytes",
        });
    }
    if key.bytes().any(|b| b.is_ascii_control()) {
        return Err(Error::KeyNotSupported {
            reason: "contains control characters",
        });
    }
    Ok(())
}
