// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Mock backing tier for testing.
//!
//! This module provides [`MockBackingTier`], an in-memory backing tier that records
//! every operation and supports failure injection for testing error paths.

use std::{collections::HashMap, sync::Arc, time::Duration};

use parking_lot::Mutex;
use uniflight::UniFlight;

use crate::{BackingTier, Clock, Entry, Error, system_clock};

/// Recorded backing tier operation.
#[derive(Debug, Clone, PartialEq)]
pub enum BackingOp {
    /// A fetch-or-compute was issued for the given key.
    FetchOrCompute(String),
    /// The compute future for the given key was actually run.
    Compute(String),
    /// An explicit store was issued.
    Store {
        /// The key that was stored.
        key: String,
        /// The TTL it was stored with.
        ttl: Duration,
    },
}

type FailPredicate = Box<dyn Fn(&BackingOp) -> bool + Send + Sync>;

/// A configurable mock backing tier for testing.
///
/// Entries are kept in memory and honour their expiry against the tier's clock.
/// Concurrent fetches for the same key are coalesced, as the trait requires. All
/// operations are recorded for later verification.
///
/// # Examples
///
/// ```
/// use revalcache_tier::testing::{BackingOp, MockBackingTier};
/// use revalcache_tier::{BackingTier, Entry, Lifetimes, Payload};
/// use std::time::{Duration, SystemTime};
///
/// # futures::executor::block_on(async {
/// let tier = MockBackingTier::new();
/// let lifetimes = Lifetimes::new(Duration::from_secs(1), Duration::from_secs(3)).unwrap();
/// let entry = Entry::new("key", Payload::encode(&1).unwrap(), SystemTime::now(), lifetimes);
///
/// tier.store(&entry, Duration::from_secs(3)).await.unwrap();
/// assert!(tier.contains_key("key"));
///
/// // Fail every explicit store from now on.
/// tier.fail_when(|op| matches!(op, BackingOp::Store { .. }));
/// assert!(tier.store(&entry, Duration::from_secs(3)).await.is_err());
/// # });
/// ```
pub struct MockBackingTier {
    data: Arc<Mutex<HashMap<String, Entry>>>,
    operations: Arc<Mutex<Vec<BackingOp>>>,
    fail_when: Arc<Mutex<Option<FailPredicate>>>,
    flights: Arc<UniFlight<String, Result<Entry, Error>>>,
    clock: Clock,
}

impl std::fmt::Debug for MockBackingTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockBackingTier")
            .field("data", &self.data)
            .field("operations", &self.operations)
            .field("fail_when", &self.fail_when.lock().is_some())
            .finish_non_exhaustive()
    }
}

impl Clone for MockBackingTier {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
            operations: Arc::clone(&self.operations),
            fail_when: Arc::clone(&self.fail_when),
            flights: Arc::clone(&self.flights),
            clock: self.clock.clone(),
        }
    }
}

impl Default for MockBackingTier {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackingTier {
    /// Creates an empty mock tier on the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(system_clock())
    }

    /// Creates an empty mock tier that judges expiry with `clock`.
    #[must_use]
    pub fn with_clock(clock: Clock) -> Self {
        Self {
            data: Arc::default(),
            operations: Arc::default(),
            fail_when: Arc::default(),
            flights: Arc::default(),
            clock,
        }
    }

    /// Seeds the tier with an entry without recording an operation.
    pub fn seed(&self, entry: Entry) {
        self.data.lock().insert(entry.key().to_owned(), entry);
    }

    /// Returns a copy of the entry stored under `key`, expired or not.
    #[must_use]
    pub fn entry(&self, key: &str) -> Option<Entry> {
        self.data.lock().get(key).cloned()
    }

    /// Returns true if the tier holds an entry for `key`.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.lock().contains_key(key)
    }

    /// Removes every stored entry.
    pub fn clear(&self) {
        self.data.lock().clear();
    }

    /// Sets a predicate deciding which operations fail with [`Error::Backing`].
    ///
    /// A failing [`BackingOp::FetchOrCompute`] fails before the compute future runs,
    /// simulating an unreachable store.
    pub fn fail_when<F>(&self, predicate: F)
    where
        F: Fn(&BackingOp) -> bool + Send + Sync + 'static,
    {
        *self.fail_when.lock() = Some(Box::new(predicate));
    }

    /// Clears the failure predicate.
    pub fn clear_failures(&self) {
        *self.fail_when.lock() = None;
    }

    /// Returns a clone of all recorded operations.
    #[must_use]
    pub fn operations(&self) -> Vec<BackingOp> {
        self.operations.lock().clone()
    }

    /// Returns how many times a compute future was actually run.
    #[must_use]
    pub fn compute_count(&self) -> usize {
        self.operations
            .lock()
            .iter()
            .filter(|op| matches!(op, BackingOp::Compute(_)))
            .count()
    }

    /// Clears all recorded operations.
    pub fn clear_operations(&self) {
        self.operations.lock().clear();
    }

    fn record(&self, op: BackingOp) -> Result<(), Error> {
        let fail = self.fail_when.lock().as_ref().is_some_and(|predicate| predicate(&op));
        self.operations.lock().push(op);
        if fail {
            return Err(Error::backing("mock: backing tier unavailable"));
        }
        Ok(())
    }

    fn live_entry(&self, key: &str) -> Option<Entry> {
        let now = self.clock.system_time();
        self.data.lock().get(key).filter(|entry| entry.expires_at() > now).cloned()
    }
}

impl BackingTier for MockBackingTier {
    async fn fetch_or_compute<F>(&self, key: &str, _ttl: Duration, compute: F) -> Result<Entry, Error>
    where
        F: Future<Output = Result<Entry, Error>> + Send + 'static,
    {
        self.record(BackingOp::FetchOrCompute(key.to_owned()))?;

        if let Some(entry) = self.live_entry(key) {
            return Ok(entry);
        }

        let tier = self.clone();
        let owned_key = key.to_owned();
        self.flights
            .work(key.to_owned(), move || async move {
                tier.record(BackingOp::Compute(owned_key))?;
                let entry = compute.await?;
                tier.data.lock().insert(entry.key().to_owned(), entry.clone());
                Ok(entry)
            })
            .await
    }

    async fn store(&self, entry: &Entry, ttl: Duration) -> Result<(), Error> {
        self.record(BackingOp::Store {
            key: entry.key().to_owned(),
            ttl,
        })?;
        self.data.lock().insert(entry.key().to_owned(), entry.clone());
        Ok(())
    }
}
