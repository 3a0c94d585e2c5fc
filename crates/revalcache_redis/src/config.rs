// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use serde::{Deserialize, Serialize};

/// Address used when no topology is configured.
pub const DEFAULT_URL: &str = "redis://127.0.0.1:6379/";

/// How to reach Redis.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
#[non_exhaustive]
pub enum Topology {
    /// A single node, reached through a reconnecting connection manager.
    Single {
        /// Connection URL, e.g. `redis://host:6379/0`.
        url: String,
    },
    /// A Redis Cluster, discovered from the given seed nodes.
    Cluster {
        /// Seed node URLs.
        nodes: Vec<String>,
    },
}

impl Default for Topology {
    fn default() -> Self {
        Self::Single {
            url: DEFAULT_URL.to_owned(),
        }
    }
}

/// Configuration for [`RedisBackingTier`](crate::RedisBackingTier).
///
/// # Examples
///
/// ```
/// use revalcache_redis::{RedisConfig, Topology};
///
/// let config: RedisConfig = serde_json::from_str(
///     r#"{ "topology": { "mode": "cluster", "nodes": ["redis://10.0.0.1:7000/"] }, "key_prefix": "users:" }"#,
/// )
/// .unwrap();
///
/// assert_eq!(config.key_prefix, "users:");
/// assert!(matches!(config.topology, Topology::Cluster { .. }));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[non_exhaustive]
pub struct RedisConfig {
    /// Where Redis lives.
    pub topology: Topology,
    /// Prepended to every cache key before it reaches Redis.
    pub key_prefix: String,
}

impl RedisConfig {
    /// A single-node configuration for `url`.
    #[must_use]
    pub fn single(url: impl Into<String>) -> Self {
        Self {
            topology: Topology::Single { url: url.into() },
            key_prefix: String::new(),
        }
    }

    /// A cluster configuration seeded with `nodes`.
    #[must_use]
    pub fn cluster<I, S>(nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            topology: Topology::Cluster {
                nodes: nodes.into_iter().map(Into::into).collect(),
            },
            key_prefix: String::new(),
        }
    }

    /// Sets the key prefix.
    #[must_use]
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_local_default() {
        let config: RedisConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, RedisConfig::single(DEFAULT_URL));
    }

    #[test]
    fn single_node_round_trips_through_serde() {
        let config = RedisConfig::single("redis://cache:6379/1").with_key_prefix("auth:");
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["topology"]["mode"], "single");
        assert_eq!(serde_json::from_value::<RedisConfig>(json).unwrap(), config);
    }

    #[test]
    fn cluster_collects_nodes() {
        let config = RedisConfig::cluster(["redis://a:7000/", "redis://b:7000/"]);
        assert_eq!(
            config.topology,
            Topology::Cluster {
                nodes: vec!["redis://a:7000/".into(), "redis://b:7000/".into()]
            }
        );
    }
}
