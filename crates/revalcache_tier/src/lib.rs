// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Core abstractions for the `revalcache` stale-while-revalidate cache.
//!
//! This crate defines what the coordinator in `revalcache` composes:
//!
//! - [`Entry`] and [`Freshness`]: a cached record and its classification against the
//!   current time (fresh, stale, expired or missing).
//! - [`Lifetimes`]: the revalidate/expire windows applied when an entry is created.
//! - [`Payload`]: the type-erased stored value with explicit encode and decode steps.
//! - [`LocalTier`] and [`BackingTier`]: the narrow contracts the coordinator needs from
//!   the fast process-local tier and from the shared fetch-or-compute-once tier.
//! - [`Clock`]: the time source used for every timestamp, classification and deadline,
//!   re-exported from `tick`; [`system_clock`] builds the production one.
//! - [`Error`]: the error type shared by every crate in the family.
//!
//! # Implementing a Local Tier
//!
//! ```
//! use std::collections::HashMap;
//! use std::sync::{Arc, Mutex};
//! use std::time::Duration;
//!
//! use revalcache_tier::{Entry, LocalTier};
//!
//! #[derive(Default)]
//! struct MapTier(Mutex<HashMap<String, Arc<Entry>>>);
//!
//! impl LocalTier for MapTier {
//!     async fn get(&self, key: &str) -> Option<Arc<Entry>> {
//!         self.0.lock().unwrap().get(key).cloned()
//!     }
//!
//!     async fn set_with_ttl(&self, entry: Arc<Entry>, _ttl: Duration) {
//!         self.0.lock().unwrap().insert(entry.key().to_owned(), entry);
//!     }
//!
//!     async fn wait(&self) {}
//!
//!     async fn invalidate(&self, key: &str) {
//!         self.0.lock().unwrap().remove(key);
//!     }
//! }
//! ```

mod clock;
mod entry;
pub mod error;
mod payload;
#[cfg(any(feature = "test-util", test))]
pub mod testing;
mod tier;

#[doc(inline)]
pub use clock::system_clock;
#[doc(no_inline)]
pub use tick::Clock;
#[cfg(any(feature = "test-util", test))]
#[doc(no_inline)]
pub use tick::ClockControl;
#[doc(inline)]
pub use entry::{Entry, Freshness, Lifetimes};
#[doc(inline)]
pub use error::{BoxError, Error, Result};
#[doc(inline)]
pub use payload::Payload;
#[doc(inline)]
pub use tier::{BackingTier, LocalTier};
