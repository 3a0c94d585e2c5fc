// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Process-wide cache configuration.

use std::time::Duration;

use revalcache_memory::InMemoryTierBuilder;
use serde::{Deserialize, Serialize};

/// Settings for a [`Cache`](crate::Cache), typically deserialized from a configuration file.
///
/// Every field has a default, so a partial document is enough. Durations are plain
/// integers to keep the format language-neutral.
///
/// # Examples
///
/// ```
/// use revalcache::CacheConfig;
/// use std::time::Duration;
///
/// let config: CacheConfig = serde_json::from_str(r#"{ "name": "auth", "default_ttl_secs": 3 }"#).unwrap();
///
/// assert_eq!(config.name, "auth");
/// assert_eq!(config.shard_count, 16);
/// assert_eq!(config.default_ttl(), Duration::from_secs(3));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[non_exhaustive]
pub struct CacheConfig {
    /// Appears on every emitted event.
    pub name: String,
    /// Number of local tier instances and lock stripes.
    pub shard_count: usize,
    /// How long a new entry is usable at all, in seconds.
    pub default_ttl_secs: u64,
    /// How long a new entry stays fresh, in seconds.
    pub default_revalidate_ttl_secs: u64,
    /// Upper bound on a single load, in milliseconds. Unbounded when absent.
    pub load_timeout_ms: Option<u64>,
    /// Local tier sizing.
    pub local: LocalTierConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            name: crate::builder::DEFAULT_NAME.to_owned(),
            shard_count: crate::builder::DEFAULT_SHARDS,
            default_ttl_secs: crate::builder::DEFAULT_TTL.as_secs(),
            default_revalidate_ttl_secs: crate::builder::DEFAULT_REVALIDATE_TTL.as_secs(),
            load_timeout_ms: None,
            local: LocalTierConfig::default(),
        }
    }
}

impl CacheConfig {
    /// [`default_ttl_secs`](Self::default_ttl_secs) as a duration.
    #[must_use]
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    /// [`default_revalidate_ttl_secs`](Self::default_revalidate_ttl_secs) as a duration.
    #[must_use]
    pub fn default_revalidate_ttl(&self) -> Duration {
        Duration::from_secs(self.default_revalidate_ttl_secs)
    }

    /// [`load_timeout_ms`](Self::load_timeout_ms) as a duration.
    #[must_use]
    pub fn load_timeout(&self) -> Option<Duration> {
        self.load_timeout_ms.map(Duration::from_millis)
    }
}

/// Sizing of the in-memory local tier, summed over all shards.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[non_exhaustive]
pub struct LocalTierConfig {
    /// Maximum number of entries. Unbounded when absent.
    pub max_capacity: Option<u64>,
    /// Pre-allocation hint.
    pub initial_capacity: Option<usize>,
}

impl LocalTierConfig {
    pub(crate) fn to_builder(&self, name: &str) -> InMemoryTierBuilder {
        let mut builder = InMemoryTierBuilder::new().name(name);
        if let Some(capacity) = self.max_capacity {
            builder = builder.max_capacity(capacity);
        }
        if let Some(capacity) = self.initial_capacity {
            builder = builder.initial_capacity(capacity);
        }
        builder
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config: CacheConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, CacheConfig::default());
        assert_eq!(config.default_ttl(), Duration::from_secs(300));
        assert_eq!(config.default_revalidate_ttl(), Duration::from_secs(30));
        assert_eq!(config.load_timeout(), None);
    }

    #[test]
    fn nested_local_settings() {
        let config: CacheConfig =
            serde_json::from_str(r#"{ "local": { "max_capacity": 10000 }, "load_timeout_ms": 250 }"#).unwrap();
        assert_eq!(config.local.max_capacity, Some(10_000));
        assert_eq!(config.local.initial_capacity, None);
        assert_eq!(config.load_timeout(), Some(Duration::from_millis(250)));
    }
}
