// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Backing tier implementation using Redis.

use std::{sync::Arc, time::Duration};

use revalcache_tier::{BackingTier, Clock, Entry, Error, system_clock};
use uniflight::UniFlight;

use crate::{config::RedisConfig, connection::Connection};

/// A [`BackingTier`] over Redis.
///
/// Entries are stored as JSON documents of the full [`Entry`] under
/// `key_prefix + key` with a millisecond expiry (`SET .. PX ..`). On a miss the
/// compute future runs once per key within this process; other processes racing
/// for the same key may each compute and the last write wins.
///
/// A document that cannot be parsed is treated as a miss and overwritten.
///
/// Cloning is cheap and clones share the connection.
///
/// # Examples
///
/// ```no_run
/// use revalcache_redis::{RedisBackingTier, RedisConfig};
///
/// # async fn example() -> revalcache_tier::Result<()> {
/// let tier = RedisBackingTier::connect(&RedisConfig::single("redis://127.0.0.1:6379/").with_key_prefix("users:")).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct RedisBackingTier {
    connection: Connection,
    key_prefix: String,
    flights: Arc<UniFlight<String, Result<Entry, Error>>>,
    clock: Clock,
}

impl RedisBackingTier {
    /// Connects to the configured topology.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for malformed addresses and [`Error::Backing`] if
    /// Redis cannot be reached.
    pub async fn connect(config: &RedisConfig) -> Result<Self, Error> {
        let connection = Connection::open(&config.topology).await?;
        tracing::debug!(topology = ?config.topology, "connected to redis");
        Ok(Self {
            connection,
            key_prefix: config.key_prefix.clone(),
            flights: Arc::default(),
            clock: system_clock(),
        })
    }

    /// Replaces the clock used to reject entries that outlived their expiry.
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    fn redis_key(&self, key: &str) -> String {
        prefixed(&self.key_prefix, key)
    }

    async fn read(&self, key: &str) -> Result<Option<Entry>, Error> {
        let bytes: Option<Vec<u8>> = self.connection.query(redis::cmd("GET").arg(self.redis_key(key))).await?;
        let now = self.clock.system_time();
        Ok(bytes
            .and_then(|bytes| decode_entry(key, &bytes))
            .filter(|entry| entry.expires_at() > now))
    }
}

impl BackingTier for RedisBackingTier {
    async fn fetch_or_compute<F>(&self, key: &str, ttl: Duration, compute: F) -> Result<Entry, Error>
    where
        F: Future<Output = Result<Entry, Error>> + Send + 'static,
    {
        if let Some(entry) = self.read(key).await? {
            return Ok(entry);
        }

        let tier = self.clone();
        self.flights
            .work(key.to_owned(), move || async move {
                let entry = compute.await?;
                tier.store(&entry, ttl).await?;
                Ok(entry)
            })
            .await
    }

    async fn store(&self, entry: &Entry, ttl: Duration) -> Result<(), Error> {
        let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        if millis == 0 {
            return Ok(());
        }

        let document = serde_json::to_vec(entry).map_err(|e| Error::ValueNotSupported(e.into()))?;
        self.connection
            .query::<()>(redis::cmd("SET").arg(self.redis_key(entry.key())).arg(document).arg("PX").arg(millis))
            .await
    }
}

fn prefixed(prefix: &str, key: &str) -> String {
    let mut redis_key = String::with_capacity(prefix.len() + key.len());
    redis_key.push_str(prefix);
    redis_key.push_str(key);
    redis_key
}

fn decode_entry(key: &str, bytes: &[u8]) -> Option<Entry> {
    match serde_json::from_slice::<Entry>(bytes) {
        Ok(entry) if entry.key() == key => Some(entry),
        Ok(entry) => {
            tracing::warn!(key, stored_key = entry.key(), "redis document belongs to another key, ignoring");
            None
        }
        Err(error) => {
            tracing::warn!(key, %error, "unreadable redis document, ignoring");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use revalcache_tier::{Lifetimes, Payload};

    use super::*;

    #[test]
    fn prefix_is_prepended() {
        assert_eq!(prefixed("users:", "1"), "users:1");
        assert_eq!(prefixed("", "1"), "1");
    }

    #[test]
    fn stored_document_decodes_back() {
        let lifetimes = Lifetimes::new(Duration::from_secs(1), Duration::from_secs(3)).unwrap();
        let entry = Entry::new("1", Payload::encode(&"Named").unwrap(), SystemTime::UNIX_EPOCH, lifetimes);
        let bytes = serde_json::to_vec(&entry).unwrap();

        assert_eq!(decode_entry("1", &bytes), Some(entry));
    }

    #[test]
    fn foreign_or_corrupt_documents_are_misses() {
        let lifetimes = Lifetimes::new(Duration::from_secs(1), Duration::from_secs(3)).unwrap();
        let entry = Entry::new("other", Payload::encode(&1).unwrap(), SystemTime::UNIX_EPOCH, lifetimes);
        let bytes = serde_json::to_vec(&entry).unwrap();

        assert_eq!(decode_entry("1", &bytes), None);
        assert_eq!(decode_entry("1", b"not json"), None);
    }
}
