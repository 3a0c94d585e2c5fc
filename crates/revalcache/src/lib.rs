// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(docsrs, feature(doc_cfg))]

//! A sharded two-tier read-through cache with stale-while-revalidate.
//!
//! Values are looked up by string key. On a miss the cache asks a shared backing tier
//! for the entry, and the backing tier runs the caller's [`Loader`] when it has nothing
//! live either. The result is kept in a process-local tier. Every entry carries two
//! deadlines:
//!
//! - until its **revalidate** deadline it is *fresh* and served as is;
//! - until its **expire** deadline it is *stale*: served immediately while one
//!   background task reloads it;
//! - after that it is *expired* and never served. The next caller waits for a reload.
//!
//! Keys are spread over a fixed number of shards, each with its own local tier and lock,
//! so unrelated keys rarely contend.
//!
//! # Quick Start
//!
//! ```
//! use revalcache::{Cache, ItemRequest};
//! use serde::{Deserialize, Serialize};
//! use std::time::Duration;
//!
//! #[derive(Serialize, Deserialize)]
//! struct Profile {
//!     id: String,
//!     display_name: String,
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> revalcache::Result<()> {
//! let cache = Cache::builder()
//!     .name("profiles")
//!     .default_ttl(Duration::from_secs(60))
//!     .default_revalidate_ttl(Duration::from_secs(10))
//!     .memory()
//!     .build()?;
//!
//! let load = |id: String| async move {
//!     Ok::<_, std::io::Error>(Profile {
//!         display_name: format!("user {id}"),
//!         id,
//!     })
//! };
//!
//! let profile: Profile = cache.get(ItemRequest::new("42", load)).await?;
//! assert_eq!(profile.display_name, "user 42");
//! # Ok(())
//! # }
//! ```
//!
//! # Tiers
//!
//! The local tier is any [`LocalTier`]; [`InMemoryTier`] is provided. The backing tier
//! is any [`BackingTier`]. The default, [`InMemoryBackingTier`], lives in the same
//! process; the `revalcache_redis` crate provides one shared between processes.
//!
//! # Logging
//!
//! Every lookup, load and refresh emits a `tracing` event with the fields
//! `cache.name`, `cache.operation`, `cache.activity` and, where measured,
//! `cache.duration_ns`. Failed background refreshes are only visible here.
//! Disable with [`CacheBuilder::logging`].
//!
//! # Metrics
//!
//! With the `metrics` feature, [`CacheBuilder::metrics`] counts the same events as
//! OpenTelemetry metrics and records load and refresh durations.

pub mod builder;
pub mod cache;
mod config;
mod loader;
mod refresh;
mod shard;
mod telemetry;

pub use builder::CacheBuilder;
pub use cache::{Cache, MAX_KEY_LEN};
pub use config::{CacheConfig, LocalTierConfig};
pub use loader::{ItemRequest, Loader};
pub use revalcache_memory::{InMemoryBackingTier, InMemoryTier, InMemoryTierBuilder};
#[cfg(any(feature = "test-util", test))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-util")))]
pub use revalcache_tier::ClockControl;
pub use revalcache_tier::{
    BackingTier, BoxError, Clock, Entry, Error, Freshness, Lifetimes, LocalTier, Payload, Result, system_clock,
};
pub use shard::MAX_SHARDS;
