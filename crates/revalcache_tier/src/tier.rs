// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The contracts the coordinator needs from its two tiers.
//!
//! Both traits are narrow: storage layout, eviction, transport and
//! serialization stay inside the implementations.

use std::{future::Future, sync::Arc, time::Duration};

use crate::{Entry, Error};

/// The fast, process-local, size-bounded tier.
///
/// The coordinator owns one instance per shard and only touches it while holding that
/// shard's lock. Implementations may buffer writes internally; [`wait`](Self::wait)
/// must not return before every write issued so far is visible to [`get`](Self::get).
pub trait LocalTier: Send + Sync + 'static {
    /// Looks up the entry stored under `key`.
    fn get(&self, key: &str) -> impl Future<Output = Option<Arc<Entry>>> + Send;

    /// Stores `entry` under its own key for at most `ttl`.
    ///
    /// The tier may drop the entry earlier under memory pressure.
    fn set_with_ttl(&self, entry: Arc<Entry>, ttl: Duration) -> impl Future<Output = ()> + Send;

    /// Blocks until buffered writes are visible to subsequent reads.
    fn wait(&self) -> impl Future<Output = ()> + Send;

    /// Removes the entry stored under `key`, if any.
    fn invalidate(&self, key: &str) -> impl Future<Output = ()> + Send;

    /// Returns the number of entries, if the tier tracks it.
    fn len(&self) -> Option<u64> {
        None
    }

    /// Returns `true` if the tier holds no entries, if the tier tracks size.
    fn is_empty(&self) -> Option<bool> {
        self.len().map(|len| len == 0)
    }
}

/// The shared tier providing a fetch-or-compute-once primitive.
///
/// A single instance is shared by every shard of a cache, so implementations must be
/// safe for concurrent use.
pub trait BackingTier: Send + Sync + 'static {
    /// Returns the entry stored under `key`, or runs `compute`, stores its entry for
    /// `ttl` and returns it.
    ///
    /// Concurrent calls for the same key within the tier's coalescing scope must run
    /// `compute` at most once and observe the same result. A failed `compute` is
    /// returned to every waiter and nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns the error produced by `compute`, or [`Error::Backing`] if the tier
    /// itself is unavailable.
    fn fetch_or_compute<F>(&self, key: &str, ttl: Duration, compute: F) -> impl Future<Output = Result<Entry, Error>> + Send
    where
        F: Future<Output = Result<Entry, Error>> + Send + 'static;

    /// Unconditionally stores `entry` for `ttl`, replacing any previous value.
    ///
    /// This writes to the shared store only; any process-local mirror the tier keeps is
    /// bypassed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Backing`] if the tier is unavailable.
    fn store(&self, entry: &Entry, ttl: Duration) -> impl Future<Output = Result<(), Error>> + Send;
}

impl<T> BackingTier for Arc<T>
where
    T: BackingTier,
{
    fn fetch_or_compute<F>(&self, key: &str, ttl: Duration, compute: F) -> impl Future<Output = Result<Entry, Error>> + Send
    where
        F: Future<Output = Result<Entry, Error>> + Send + 'static,
    {
        (**self).fetch_or_compute(key, ttl, compute)
    }

    fn store(&self, entry: &Entry, ttl: Duration) -> impl Future<Output = Result<(), Error>> + Send {
        (**self).store(entry, ttl)
    }
}
