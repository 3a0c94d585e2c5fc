// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::{Error, Payload};

/// A cached record: a payload plus the timestamps that drive its lifecycle.
///
/// An entry is created once per successful load and never mutated afterwards; a
/// refresh produces a new entry. The timestamps are absolute so the same entry can be
/// shared through the backing tier with other processes.
///
/// # Examples
///
/// ```
/// use revalcache_tier::{Entry, Freshness, Lifetimes, Payload};
/// use std::time::{Duration, SystemTime};
///
/// let created = SystemTime::UNIX_EPOCH;
/// let lifetimes = Lifetimes::new(Duration::from_secs(1), Duration::from_secs(3))?;
/// let entry = Entry::new("user:1", Payload::encode(&"alice")?, created, lifetimes);
///
/// assert_eq!(entry.freshness(created), Freshness::Fresh);
/// assert_eq!(entry.freshness(created + Duration::from_secs(2)), Freshness::Stale);
/// assert_eq!(entry.freshness(created + Duration::from_secs(3)), Freshness::Expired);
/// # Ok::<(), revalcache_tier::Error>(())
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    key: String,
    value: Payload,
    created_at: SystemTime,
    revalidate_at: SystemTime,
    expires_at: SystemTime,
}

impl Entry {
    /// Creates an entry loaded at `created_at` whose windows start at that instant.
    #[must_use]
    pub fn new(key: impl Into<String>, value: Payload, created_at: SystemTime, lifetimes: Lifetimes) -> Self {
        Self {
            key: key.into(),
            value,
            created_at,
            revalidate_at: created_at + lifetimes.revalidate(),
            expires_at: created_at + lifetimes.expire(),
        }
    }

    /// The key this entry is stored under.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The stored payload.
    #[must_use]
    pub fn value(&self) -> &Payload {
        &self.value
    }

    /// Consumes the entry and returns the payload.
    #[must_use]
    pub fn into_value(self) -> Payload {
        self.value
    }

    /// When the value was loaded.
    #[must_use]
    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    /// From this point on the entry is stale.
    #[must_use]
    pub fn revalidate_at(&self) -> SystemTime {
        self.revalidate_at
    }

    /// From this point on the entry is expired.
    #[must_use]
    pub fn expires_at(&self) -> SystemTime {
        self.expires_at
    }

    /// Classifies this entry at `now`.
    ///
    /// Expiry takes precedence, so an entry whose revalidate point lies beyond its
    /// expiry point goes straight from fresh to expired.
    #[must_use]
    pub fn freshness(&self, now: SystemTime) -> Freshness {
        if now >= self.expires_at {
            Freshness::Expired
        } else if now < self.revalidate_at {
            Freshness::Fresh
        } else {
            Freshness::Stale
        }
    }

    /// Time left until expiry at `now`, zero once expired.
    #[must_use]
    pub fn time_to_expiry(&self, now: SystemTime) -> Duration {
        self.expires_at.duration_since(now).unwrap_or(Duration::ZERO)
    }
}

/// Freshness of a cache lookup relative to the current time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Freshness {
    /// Nothing is cached under the key.
    Missing,
    /// Serve as-is.
    Fresh,
    /// Serve as-is and refresh in the background.
    Stale,
    /// Unusable; a new value must be loaded before answering.
    Expired,
}

impl Freshness {
    /// Classifies the result of a local lookup at `now`.
    ///
    /// This is a pure function; it is evaluated on every lookup and keeps no state.
    #[must_use]
    pub fn of(entry: Option<&Entry>, now: SystemTime) -> Self {
        entry.map_or(Self::Missing, |entry| entry.freshness(now))
    }

    /// Whether the caller can be answered from the current entry.
    #[must_use]
    pub fn is_servable(self) -> bool {
        matches!(self, Self::Fresh | Self::Stale)
    }

    /// A short label for logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::Fresh => "fresh",
            Self::Stale => "stale",
            Self::Expired => "expired",
        }
    }
}

/// The revalidate and expire windows applied to a newly created entry.
///
/// `revalidate` must be strictly shorter than `expire`; otherwise an entry could never
/// be stale and stale-while-revalidate would be silently disabled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Lifetimes {
    revalidate: Duration,
    expire: Duration,
}

impl Lifetimes {
    /// Creates validated lifetimes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLifetimes`] if either window is zero or if `revalidate`
    /// is not shorter than `expire`.
    pub fn new(revalidate: Duration, expire: Duration) -> Result<Self, Error> {
        if revalidate.is_zero() || revalidate >= expire {
            return Err(Error::InvalidLifetimes { revalidate, expire });
        }
        Ok(Self { revalidate, expire })
    }

    /// Applies optional per-request overrides on top of these defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLifetimes`] if the combination is invalid.
    pub fn with_overrides(self, revalidate: Option<Duration>, expire: Option<Duration>) -> Result<Self, Error> {
        match (revalidate, expire) {
            (None, None) => Ok(self),
            (revalidate, expire) => Self::new(revalidate.unwrap_or(self.revalidate), expire.unwrap_or(self.expire)),
        }
    }

    /// How long a new entry stays fresh.
    #[must_use]
    pub fn revalidate(&self) -> Duration {
        self.revalidate
    }

    /// How long a new entry stays usable at all.
    #[must_use]
    pub fn expire(&self) -> Duration {
        self.expire
    }
}
