// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Redis backing tier for `revalcache`.
//!
//! [`RedisBackingTier`] shares cached entries between processes through Redis, either a
//! single node or a cluster, as selected by [`RedisConfig`].
//!
//! ```no_run
//! use revalcache_redis::{RedisBackingTier, RedisConfig};
//!
//! # async fn example() -> revalcache_tier::Result<()> {
//! let config: RedisConfig = serde_json::from_str(r#"{ "key_prefix": "auth:" }"#).unwrap();
//! let tier = RedisBackingTier::connect(&config).await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod connection;
mod tier;

#[doc(inline)]
pub use config::{DEFAULT_URL, RedisConfig, Topology};
#[doc(inline)]
pub use tier::RedisBackingTier;
