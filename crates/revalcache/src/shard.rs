// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::HashSet;

use tokio::sync::{Mutex, MutexGuard};
use xxhash_rust::xxh3::xxh3_64;

/// Upper bound on the number of shards a cache may be built with.
pub const MAX_SHARDS: usize = 1024;

/// What one shard's lock protects: its local tier and the keys it is refreshing.
#[derive(Debug)]
pub(crate) struct ShardState<L> {
    pub(crate) local: L,
    pub(crate) refreshing: HashSet<String>,
}

/// Maps keys to shards and hands out each shard's lock.
///
/// The mapping is a pure function of the key bytes and the shard count, so a key
/// stays on the same shard for the lifetime of the cache.
#[derive(Debug)]
pub(crate) struct ShardRouter<L> {
    shards: Box<[Mutex<ShardState<L>>]>,
}

impl<L> ShardRouter<L> {
    pub(crate) fn new(locals: Vec<L>) -> Self {
        Self {
            shards: locals
                .into_iter()
                .map(|local| {
                    Mutex::new(ShardState {
                        local,
                        refreshing: HashSet::new(),
                    })
                })
                .collect(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.shards.len()
    }

    pub(crate) fn index_of(&self, key: &str) -> usize {
        shard_index(key, self.shards.len())
    }

    pub(crate) async fn lock(&self, index: usize) -> MutexGuard<'_, ShardState<L>> {
        self.shards[index].lock().await
    }
}

fn shard_index(key: &str, shards: usize) -> usize {
    let shards = u64::try_from(shards.max(1)).unwrap_or(u64::MAX);
    usize::try_from(xxh3_64(key.as_bytes()) % shards).unwrap_or_default()
}
