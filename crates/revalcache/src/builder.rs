// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Cache builder.

use std::{fmt::Debug, sync::Arc, time::Duration};

#[cfg(any(feature = "metrics", test))]
use opentelemetry::metrics::{Meter, MeterProvider};
use revalcache_memory::{InMemoryBackingTier, InMemoryTier, InMemoryTierBuilder};
use revalcache_tier::{BackingTier, Clock, Error, Lifetimes, LocalTier, system_clock};

use crate::{
    Cache, CacheConfig,
    cache::CacheInner,
    shard::{MAX_SHARDS, ShardRouter},
    telemetry::CacheTelemetry,
};

pub(crate) const DEFAULT_NAME: &str = "revalcache";
pub(crate) const DEFAULT_SHARDS: usize = 16;
pub(crate) const DEFAULT_TTL: Duration = Duration::from_secs(300);
pub(crate) const DEFAULT_REVALIDATE_TTL: Duration = Duration::from_secs(30);

type LocalFactory<L> = Box<dyn FnOnce(usize) -> Vec<L> + Send>;
type BackingFactory<B> = Box<dyn FnOnce(&Clock) -> B + Send>;

/// Builder for a [`Cache`].
///
/// Created by [`Cache::builder`]. A local tier must be chosen before building; the
/// backing tier defaults to [`InMemoryBackingTier`], which coalesces loads within
/// this process only.
///
/// # Examples
///
/// ```
/// use revalcache::Cache;
/// use std::time::Duration;
///
/// let cache = Cache::builder()
///     .name("users")
///     .shards(32)
///     .default_ttl(Duration::from_secs(60))
///     .default_revalidate_ttl(Duration::from_secs(10))
///     .memory()
///     .build()
///     .unwrap();
///
/// assert_eq!(cache.shard_count(), 32);
/// ```
pub struct CacheBuilder<L = InMemoryTier, B = InMemoryBackingTier> {
    name: String,
    shards: usize,
    default_ttl: Duration,
    default_revalidate_ttl: Duration,
    load_timeout: Option<Duration>,
    clock: Option<Clock>,
    logging: bool,
    #[cfg(any(feature = "metrics", test))]
    meter: Option<Meter>,
    local: Option<LocalFactory<L>>,
    backing: BackingFactory<B>,
}

impl<L, B> Debug for CacheBuilder<L, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheBuilder")
            .field("name", &self.name)
            .field("shards", &self.shards)
            .field("default_ttl", &self.default_ttl)
            .field("default_revalidate_ttl", &self.default_revalidate_ttl)
            .field("load_timeout", &self.load_timeout)
            .field("logging", &self.logging)
            .field("local", &self.local.is_some())
            .finish_non_exhaustive()
    }
}

impl CacheBuilder<(), InMemoryBackingTier> {
    pub(crate) fn new() -> Self {
        Self {
            name: DEFAULT_NAME.to_owned(),
            shards: DEFAULT_SHARDS,
            default_ttl: DEFAULT_TTL,
            default_revalidate_ttl: DEFAULT_REVALIDATE_TTL,
            load_timeout: None,
            clock: None,
            logging: true,
            #[cfg(any(feature = "metrics", test))]
            meter: None,
            local: None,
            backing: Box::new(|clock: &Clock| InMemoryBackingTier::with_store(InMemoryTier::new(), clock.clone())),
        }
    }

    /// Creates a builder from configuration, with in-memory local tiers sized by
    /// `config.local`.
    ///
    /// The result can still be adjusted, for example to add a shared backing tier.
    ///
    /// # Examples
    ///
    /// ```
    /// use revalcache::{Cache, CacheBuilder, CacheConfig};
    ///
    /// let config: CacheConfig = serde_json::from_str(r#"{ "name": "auth", "shard_count": 4 }"#).unwrap();
    /// let cache = CacheBuilder::from_config(&config).build().unwrap();
    ///
    /// assert_eq!(cache.name(), "auth");
    /// assert_eq!(cache.shard_count(), 4);
    /// ```
    #[must_use]
    pub fn from_config(config: &CacheConfig) -> CacheBuilder<InMemoryTier, InMemoryBackingTier> {
        let builder = Self::new()
            .name(config.name.clone())
            .shards(config.shard_count)
            .default_ttl(config.default_ttl())
            .default_revalidate_ttl(config.default_revalidate_ttl());
        let builder = match config.load_timeout() {
            Some(timeout) => builder.load_timeout(timeout),
            None => builder,
        };
        builder.memory_with(config.local.to_builder(&config.name))
    }
}

impl<L, B> CacheBuilder<L, B>
where
    L: 'static,
    B: 'static,
{
    /// Sets the name that appears on every emitted event.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the number of shards. Must be between 1 and 1024.
    ///
    /// Each shard owns a local tier instance and a lock. More shards mean less
    /// contention between unrelated keys.
    #[must_use]
    pub fn shards(mut self, shards: usize) -> Self {
        self.shards = shards;
        self
    }

    /// Sets how long a new entry is usable at all.
    #[must_use]
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Sets how long a new entry stays fresh. Must be shorter than the TTL.
    #[must_use]
    pub fn default_revalidate_ttl(mut self, ttl: Duration) -> Self {
        self.default_revalidate_ttl = ttl;
        self
    }

    /// Bounds how long a load may take before the caller gets [`Error::Timeout`].
    ///
    /// Background refreshes are bounded by the same limit.
    #[must_use]
    pub fn load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout = Some(timeout);
        self
    }

    /// Sets the clock used for entry timestamps, freshness checks and load timeouts.
    ///
    /// Defaults to [`system_clock`], taken when the cache is built. Build inside a
    /// Tokio runtime for the load timeout to be enforced.
    #[must_use]
    pub fn clock(mut self, clock: Clock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Enables or disables event logging. Enabled by default.
    #[must_use]
    pub fn logging(mut self, enabled: bool) -> Self {
        self.logging = enabled;
        self
    }

    /// Records every cache event as OpenTelemetry metrics on a meter from `provider`.
    ///
    /// Events are counted in `cache.event.count` and load and refresh durations are
    /// recorded in the `cache.operation.duration` histogram, both with the
    /// `cache.name`, `cache.operation` and `cache.activity` attributes. Metrics are
    /// recorded whether or not logging is enabled.
    #[cfg(any(feature = "metrics", test))]
    #[cfg_attr(docsrs, doc(cfg(feature = "metrics")))]
    #[must_use]
    pub fn metrics(mut self, provider: &dyn MeterProvider) -> Self {
        self.meter = Some(crate::telemetry::metrics::create_meter(provider));
        self
    }

    /// Uses unbounded in-memory local tiers.
    #[must_use]
    pub fn memory(self) -> CacheBuilder<InMemoryTier, B> {
        self.memory_with(InMemoryTierBuilder::new())
    }

    /// Uses in-memory local tiers configured by `builder`.
    ///
    /// Capacities are for the whole cache and are split evenly across shards.
    #[must_use]
    pub fn memory_with(self, builder: InMemoryTierBuilder) -> CacheBuilder<InMemoryTier, B> {
        self.with_local(Box::new(move |shards: usize| builder.build_shards(shards)))
    }

    /// Uses custom local tiers; `factory` is called once per shard with its index.
    #[must_use]
    pub fn local_tiers<L2, F>(self, mut factory: F) -> CacheBuilder<L2, B>
    where
        L2: 'static,
        F: FnMut(usize) -> L2 + Send + 'static,
    {
        self.with_local(Box::new(move |shards: usize| (0..shards).map(&mut factory).collect()))
    }

    /// Uses `backing` as the shared tier for every shard.
    #[must_use]
    pub fn backing<B2>(self, backing: B2) -> CacheBuilder<L, B2>
    where
        B2: BackingTier + Send,
    {
        CacheBuilder {
            name: self.name,
            shards: self.shards,
            default_ttl: self.default_ttl,
            default_revalidate_ttl: self.default_revalidate_ttl,
            load_timeout: self.load_timeout,
            clock: self.clock,
            logging: self.logging,
            #[cfg(any(feature = "metrics", test))]
            meter: self.meter,
            local: self.local,
            backing: Box::new(move |_: &Clock| backing),
        }
    }

    fn with_local<L2: 'static>(self, local: LocalFactory<L2>) -> CacheBuilder<L2, B> {
        CacheBuilder {
            name: self.name,
            shards: self.shards,
            default_ttl: self.default_ttl,
            default_revalidate_ttl: self.default_revalidate_ttl,
            load_timeout: self.load_timeout,
            clock: self.clock,
            logging: self.logging,
            #[cfg(any(feature = "metrics", test))]
            meter: self.meter,
            local: Some(local),
            backing: self.backing,
        }
    }
}

impl<L, B> CacheBuilder<L, B>
where
    L: LocalTier,
    B: BackingTier,
{
    /// Builds the cache.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the shard count or load timeout is out of range,
    /// and [`Error::InvalidLifetimes`] if the default revalidate window is not
    /// shorter than the default TTL.
    pub fn build(self) -> Result<Cache<L, B>, Error> {
        if !(1..=MAX_SHARDS).contains(&self.shards) {
            return Err(Error::Config(format!(
                "shard count must be between 1 and {MAX_SHARDS}, got {}",
                self.shards
            )));
        }
        if self.load_timeout.is_some_and(|timeout| timeout.is_zero()) {
            return Err(Error::Config("load timeout must be non-zero".to_owned()));
        }
        let defaults = Lifetimes::new(self.default_revalidate_ttl, self.default_ttl)?;

        let factory = self
            .local
            .ok_or_else(|| Error::Config("no local tier configured".to_owned()))?;
        let locals = factory(self.shards);
        if locals.len() != self.shards {
            return Err(Error::Config(format!(
                "expected {} local tiers, got {}",
                self.shards,
                locals.len()
            )));
        }

        let clock = self.clock.unwrap_or_else(system_clock);
        let backing = (self.backing)(&clock);

        let telemetry = CacheTelemetry::new(Arc::from(self.name), self.logging);
        #[cfg(any(feature = "metrics", test))]
        let telemetry = match &self.meter {
            Some(meter) => telemetry.with_meter(meter),
            None => telemetry,
        };

        let inner = CacheInner::new(
            telemetry,
            ShardRouter::new(locals),
            backing,
            defaults,
            self.load_timeout,
            clock,
        );

        Ok(Cache::from_inner(inner))
    }
}
