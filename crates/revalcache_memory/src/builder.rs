// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Builder for configuring in-memory tiers.
//!
//! This module provides a builder API for [`InMemoryTier`] that abstracts the underlying
//! moka configuration, providing a stable API surface without exposing moka's types.

use crate::tier::InMemoryTier;

/// Builder for configuring an [`InMemoryTier`].
///
/// There is no tier-wide TTL: each entry is stored with its own.
///
/// # Examples
///
/// ```
/// use revalcache_memory::InMemoryTier;
///
/// let tier = InMemoryTier::builder()
///     .max_capacity(1000)
///     .initial_capacity(100)
///     .name("users")
///     .build();
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryTierBuilder {
    pub(crate) max_capacity: Option<u64>,
    pub(crate) initial_capacity: Option<usize>,
    pub(crate) name: Option<String>,
}

impl InMemoryTierBuilder {
    /// Creates a new builder for an unbounded tier.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of entries.
    ///
    /// Once reached, entries are evicted using the `TinyLFU` policy (LRU eviction with
    /// LFU admission). Eviction is approximate and happens as pending tasks run.
    ///
    /// If not set, the tier is unbounded.
    #[must_use]
    pub fn max_capacity(mut self, capacity: u64) -> Self {
        self.max_capacity = Some(capacity);
        self
    }

    /// Sets the pre-allocation hint.
    #[must_use]
    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = Some(capacity);
        self
    }

    /// Sets a name that appears in moka's debugging output.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Builds the configured tier.
    #[must_use]
    pub fn build(self) -> InMemoryTier {
        InMemoryTier::from_builder(&self)
    }

    /// Builds `shards` tiers that together honour this builder's capacities.
    ///
    /// Capacities are divided evenly, rounding up so no shard ends up with zero room.
    /// Named tiers get a `/<index>` suffix.
    ///
    /// # Examples
    ///
    /// ```
    /// use revalcache_memory::InMemoryTier;
    ///
    /// let shards = InMemoryTier::builder().max_capacity(1_000).build_shards(16);
    /// assert_eq!(shards.len(), 16);
    /// ```
    #[must_use]
    pub fn build_shards(self, shards: usize) -> Vec<InMemoryTier> {
        let shards = shards.max(1);
        let divisor = u64::try_from(shards).unwrap_or(u64::MAX);
        let per_shard = Self {
            max_capacity: self.max_capacity.map(|capacity| capacity.div_ceil(divisor)),
            initial_capacity: self.initial_capacity.map(|capacity| capacity.div_ceil(shards)),
            name: None,
        };

        (0..shards)
            .map(|index| {
                let mut builder = per_shard.clone();
                builder.name = self.name.as_ref().map(|name| format!("{name}/{index}"));
                builder.build()
            })
            .collect()
    }
}
