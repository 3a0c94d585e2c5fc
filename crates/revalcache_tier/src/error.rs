// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Error types for cache operations.

use std::{sync::Arc, time::Duration};

/// A boxed error as returned by loaders and transports.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

type SharedError = Arc<dyn std::error::Error + Send + Sync>;

/// An error from a cache operation.
///
/// Errors are cheap to clone: a single load result is shared with every caller that
/// was waiting on it, errors included.
///
/// The variants fall into four groups:
///
/// - validation ([`KeyEmpty`](Self::KeyEmpty), [`KeyNotSupported`](Self::KeyNotSupported),
///   [`InvalidLifetimes`](Self::InvalidLifetimes)): detected before any tier is touched;
/// - loading ([`Loader`](Self::Loader), [`ValueNotSupported`](Self::ValueNotSupported),
///   [`Timeout`](Self::Timeout)): the value could not be produced;
/// - decoding ([`Decode`](Self::Decode)): the value was produced and cached but does not
///   fit the caller's destination;
/// - backing tier ([`Backing`](Self::Backing)): the shared tier could not be reached.
///
/// # Examples
///
/// ```
/// use revalcache_tier::Error;
///
/// let error = Error::loader(std::io::Error::other("database down"));
/// assert!(error.is_loader());
/// assert_eq!(error.to_string(), "database down");
/// assert!(error.loader_source_as::<std::io::Error>().is_some());
/// ```
#[derive(Clone, Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The request key was empty.
    #[error("key is empty")]
    KeyEmpty,

    /// The request key cannot be stored.
    #[error("key is not supported: {reason}")]
    KeyNotSupported {
        /// Why the key was rejected.
        reason: &'static str,
    },

    /// The loader produced a value with no structured representation.
    #[error("value is not supported: {0}")]
    ValueNotSupported(#[source] Arc<serde_json::Error>),

    /// The revalidate window is not strictly shorter than the expire window.
    #[error("revalidate window {revalidate:?} must be non-zero and shorter than expire window {expire:?}")]
    InvalidLifetimes {
        /// Requested revalidate window.
        revalidate: Duration,
        /// Requested expire window.
        expire: Duration,
    },

    /// The loader failed. Display and source are the loader's own.
    #[error(transparent)]
    Loader(SharedError),

    /// The cached value does not fit the destination type.
    #[error("failed to decode cached value: {0}")]
    Decode(#[source] Arc<serde_json::Error>),

    /// The backing tier could not serve the request.
    #[error("backing tier unavailable: {0}")]
    Backing(#[source] SharedError),

    /// Loading did not finish within the configured deadline.
    #[error("load did not complete within {0:?}")]
    Timeout(Duration),

    /// The cache configuration is invalid.
    #[error("invalid cache configuration: {0}")]
    Config(String),
}

impl Error {
    /// Wraps a loader failure, keeping it intact for the caller.
    pub fn loader(cause: impl Into<BoxError>) -> Self {
        Self::Loader(Arc::from(cause.into()))
    }

    /// Wraps a backing tier failure such as a lost connection.
    pub fn backing(cause: impl Into<BoxError>) -> Self {
        Self::Backing(Arc::from(cause.into()))
    }

    /// Whether the request was rejected before touching any tier.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::KeyEmpty | Self::KeyNotSupported { .. } | Self::InvalidLifetimes { .. })
    }

    /// Whether the loader failed.
    #[must_use]
    pub fn is_loader(&self) -> bool {
        matches!(self, Self::Loader(_))
    }

    /// Whether the value loaded but did not fit the destination.
    #[must_use]
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode(_))
    }

    /// Whether the backing tier failed.
    #[must_use]
    pub fn is_backing(&self) -> bool {
        matches!(self, Self::Backing(_))
    }

    /// Returns the loader's error as `E`, if this is a loader failure of that type.
    #[must_use]
    pub fn loader_source_as<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        match self {
            Self::Loader(cause) => cause.downcast_ref::<E>(),
            _ => None,
        }
    }
}

/// A specialized [`Result`] type for cache operations.
pub type Result<T> = std::result::Result<T, Error>;
