// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! In-memory tiers for `revalcache`, backed by moka.
//!
//! This crate provides two tiers:
//!
//! - [`InMemoryTier`]: the process-local [`LocalTier`](revalcache_tier::LocalTier). It is a
//!   size-bounded moka cache with `TinyLFU` admission where every entry carries its own TTL.
//! - [`InMemoryBackingTier`]: a process-local [`BackingTier`](revalcache_tier::BackingTier)
//!   for single-process deployments and tests, with per-key coalescing of computes.
//!
//! Use [`InMemoryTierBuilder`] to configure capacity without exposing moka types.
//!
//! # Quick Start
//!
//! ```
//! use std::{sync::Arc, time::{Duration, SystemTime}};
//!
//! use revalcache_memory::InMemoryTier;
//! use revalcache_tier::{Entry, Lifetimes, LocalTier, Payload};
//!
//! # futures::executor::block_on(async {
//! let tier = InMemoryTier::builder().max_capacity(1_000).build();
//!
//! let lifetimes = Lifetimes::new(Duration::from_secs(30), Duration::from_secs(300)).unwrap();
//! let entry = Entry::new("key", Payload::encode(&42).unwrap(), SystemTime::now(), lifetimes);
//!
//! tier.set_with_ttl(Arc::new(entry), Duration::from_secs(300)).await;
//! tier.wait().await;
//!
//! let cached = tier.get("key").await.unwrap();
//! assert_eq!(cached.value().decode::<i32>().unwrap(), 42);
//! # });
//! ```

mod backing;
pub mod builder;
pub mod tier;

#[doc(inline)]
pub use backing::InMemoryBackingTier;
#[doc(inline)]
pub use builder::InMemoryTierBuilder;
#[doc(inline)]
pub use tier::InMemoryTier;
