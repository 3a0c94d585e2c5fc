// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Loaders and per-call requests.

use std::{future::Future, sync::Arc, time::Duration};

use futures::future::{BoxFuture, FutureExt};
use revalcache_tier::{BoxError, Error, Payload};
use serde::Serialize;

/// Produces the value for a key when the cache cannot answer from a stored entry.
///
/// A loader is invoked on a miss or after expiry, and in the background once an entry
/// turns stale. It is implemented for every `Fn(String) -> impl Future<Output =
/// Result<V, E>>`, so a closure is usually enough:
///
/// ```
/// use revalcache::Loader;
///
/// fn assert_loader<L: Loader>(_: L) {}
///
/// assert_loader(|key: String| async move { Ok::<_, std::io::Error>(format!("value of {key}")) });
/// ```
///
/// Implement the trait directly for loaders that carry state such as a connection pool.
pub trait Loader: Send + Sync + 'static {
    /// The produced value. It is encoded once when loaded.
    type Value: Serialize + Send;

    /// The loader's failure, returned unchanged inside [`Error::Loader`].
    type Error: Into<BoxError> + Send;

    /// Produces the current value for `key`.
    fn load(&self, key: &str) -> impl Future<Output = Result<Self::Value, Self::Error>> + Send;
}

impl<F, Fut, V, E> Loader for F
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<V, E>> + Send,
    V: Serialize + Send,
    E: Into<BoxError> + Send,
{
    type Value = V;
    type Error = E;

    fn load(&self, key: &str) -> impl Future<Output = Result<V, E>> + Send {
        self(key.to_owned())
    }
}

/// A single lookup.
///
/// The TTL overrides apply when this request causes a new entry to be created; an
/// entry that already exists keeps the lifetimes it was created with.
///
/// # Examples
///
/// ```
/// use revalcache::ItemRequest;
/// use std::time::Duration;
///
/// let request = ItemRequest::new("user:1", |key: String| async move { Ok::<_, std::io::Error>(key) })
///     .ttl(Duration::from_secs(60))
///     .ttl_revalidate(Duration::from_secs(30));
///
/// assert_eq!(request.key(), "user:1");
/// ```
#[derive(Debug)]
pub struct ItemRequest<L> {
    pub(crate) key: String,
    pub(crate) loader: L,
    pub(crate) ttl: Option<Duration>,
    pub(crate) ttl_revalidate: Option<Duration>,
}

impl<L> ItemRequest<L>
where
    L: Loader,
{
    /// Creates a request for `key` that loads through `loader`.
    pub fn new(key: impl Into<String>, loader: L) -> Self {
        Self {
            key: key.into(),
            loader,
            ttl: None,
            ttl_revalidate: None,
        }
    }

    /// Overrides how long a newly created entry is usable at all.
    #[must_use]
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Overrides how long a newly created entry stays fresh.
    #[must_use]
    pub fn ttl_revalidate(mut self, ttl: Duration) -> Self {
        self.ttl_revalidate = Some(ttl);
        self
    }

    /// The requested key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

/// A loader with its value type erased, shareable with background tasks.
pub(crate) trait ErasedLoader: Send + Sync {
    fn load(&self, key: &str) -> BoxFuture<'static, Result<Payload, Error>>;
}

pub(crate) type SharedLoader = Arc<dyn ErasedLoader>;

struct Erased<L>(Arc<L>);

impl<L> ErasedLoader for Erased<L>
where
    L: Loader,
{
    fn load(&self, key: &str) -> BoxFuture<'static, Result<Payload, Error>> {
        let loader = Arc::clone(&self.0);
        let key = key.to_owned();
        async move {
            let value = loader.load(&key).await.map_err(Error::loader)?;
            Payload::encode(&value)
        }
        .boxed()
    }
}

pub(crate) fn share<L>(loader: L) -> SharedLoader
where
    L: Loader,
{
    Arc::new(Erased(Arc::new(loader)))
}
