// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Background revalidation of stale entries.
//!
//! A stale entry is served immediately while a detached task loads its replacement.
//! Each shard records the keys it is refreshing so that a burst of reads on the same
//! stale key starts one refresh, not one per read.

use std::{
    future::Future,
    sync::atomic::{AtomicUsize, Ordering},
};

use anyspawn::Spawner;
use tokio::runtime::Handle;

/// Spawns refresh tasks and counts the ones still running.
#[derive(Debug)]
pub(crate) struct RevalidationScheduler {
    spawner: Spawner,
    in_flight: AtomicUsize,
}

impl RevalidationScheduler {
    pub(crate) fn new() -> Self {
        Self {
            spawner: Spawner::new_tokio(),
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Spawns `work` on the current runtime.
    ///
    /// Returns `false` when called outside a runtime, in which case nothing is spawned.
    /// A spawned task must call [`finish`](Self::finish) when done, panic or not.
    pub(crate) fn spawn<F>(&self, work: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if Handle::try_current().is_err() {
            return false;
        }

        self.in_flight.fetch_add(1, Ordering::AcqRel);
        // Fire-and-forget: the task reports its own outcome.
        drop(self.spawner.spawn(work));
        true
    }

    pub(crate) fn finish(&self) {
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
    }

    pub(crate) fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }
}
