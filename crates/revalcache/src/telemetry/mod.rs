// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Structured cache events emitted through `tracing`, and optionally counted through
//! OpenTelemetry metrics.
//!
//! Every event carries the cache name, the operation it belongs to, what happened and,
//! where one was measured, how long it took. The level follows the activity so that
//! hits stay quiet and failures that no caller will ever see still surface.

use std::{sync::Arc, time::Duration};

#[cfg(any(feature = "metrics", test))]
use opentelemetry::{
    KeyValue,
    metrics::{Counter, Histogram, Meter},
};
use revalcache_tier::Error;
use tracing::Level;

#[cfg(any(feature = "metrics", test))]
pub(crate) mod metrics;
#[cfg(test)]
pub(crate) mod testing;

#[cfg(any(feature = "metrics", test))]
const CACHE_NAME: &str = "cache.name";
#[cfg(any(feature = "metrics", test))]
const CACHE_OPERATION_NAME: &str = "cache.operation";
#[cfg(any(feature = "metrics", test))]
const CACHE_ACTIVITY_NAME: &str = "cache.activity";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CacheOperation {
    Get,
    Load,
    Refresh,
}

impl CacheOperation {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Get => "cache.get",
            Self::Load => "cache.load",
            Self::Refresh => "cache.refresh",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CacheActivity {
    Hit,
    Stale,
    Expired,
    Miss,
    Loaded,
    Refreshed,
    RefreshSkipped,
    Error,
}

impl CacheActivity {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "cache.hit",
            Self::Stale => "cache.stale",
            Self::Expired => "cache.expired",
            Self::Miss => "cache.miss",
            Self::Loaded => "cache.loaded",
            Self::Refreshed => "cache.refreshed",
            Self::RefreshSkipped => "cache.refresh_skipped",
            Self::Error => "cache.error",
        }
    }

    pub(crate) fn level(self) -> Level {
        match self {
            Self::Hit | Self::RefreshSkipped => Level::DEBUG,
            Self::Stale | Self::Expired | Self::Miss | Self::Loaded | Self::Refreshed => Level::INFO,
            Self::Error => Level::ERROR,
        }
    }
}

/// Emits cache events for one cache instance.
#[derive(Clone, Debug)]
pub(crate) struct CacheTelemetry {
    name: Arc<str>,
    logging_enabled: bool,
    #[cfg(any(feature = "metrics", test))]
    event_counter: Option<Counter<u64>>,
    #[cfg(any(feature = "metrics", test))]
    operation_duration: Option<Histogram<f64>>,
}

impl CacheTelemetry {
    pub(crate) fn new(name: Arc<str>, logging_enabled: bool) -> Self {
        Self {
            name,
            logging_enabled,
            #[cfg(any(feature = "metrics", test))]
            event_counter: None,
            #[cfg(any(feature = "metrics", test))]
            operation_duration: None,
        }
    }

    /// Counts every event on `meter` and records measured durations as a histogram.
    #[cfg(any(feature = "metrics", test))]
    #[must_use]
    pub(crate) fn with_meter(mut self, meter: &Meter) -> Self {
        self.event_counter = Some(metrics::create_event_counter(meter));
        self.operation_duration = Some(metrics::create_operation_duration_histogram(meter));
        self
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn record(&self, operation: CacheOperation, activity: CacheActivity, duration: Option<Duration>) {
        #[cfg(any(feature = "metrics", test))]
        self.measure(operation, activity, duration);
        self.emit(operation, activity, duration, None);
    }

    pub(crate) fn record_error(&self, operation: CacheOperation, error: &Error, duration: Option<Duration>) {
        #[cfg(any(feature = "metrics", test))]
        self.measure(operation, CacheActivity::Error, duration);
        self.emit(operation, CacheActivity::Error, duration, Some(error));
    }

    #[cfg(any(feature = "metrics", test))]
    fn measure(&self, operation: CacheOperation, activity: CacheActivity, duration: Option<Duration>) {
        if self.event_counter.is_none() && self.operation_duration.is_none() {
            return;
        }

        let attrs = [
            KeyValue::new(CACHE_NAME, self.name.to_string()),
            KeyValue::new(CACHE_OPERATION_NAME, operation.as_str()),
            KeyValue::new(CACHE_ACTIVITY_NAME, activity.as_str()),
        ];

        if let Some(counter) = &self.event_counter {
            counter.add(1, &attrs);
        }
        if let (Some(d), Some(histogram)) = (duration, &self.operation_duration) {
            histogram.record(d.as_secs_f64(), &attrs);
        }
    }

    fn emit(&self, operation: CacheOperation, activity: CacheActivity, duration: Option<Duration>, error: Option<&Error>) {
        if !self.logging_enabled {
            return;
        }

        let name = &*self.name;
        let op = operation.as_str();
        let ev = activity.as_str();
        let duration_ns = duration.map(|d| d.as_nanos());
        let error = error.map(tracing::field::display);

        // The level of a tracing event must be a constant.
        macro_rules! emit_event {
            ($level:ident) => {
                tracing::$level!(
                    cache.name = name,
                    cache.operation = op,
                    cache.activity = ev,
                    cache.duration_ns = ?duration_ns,
                    error,
                    "cache.event"
                )
            };
        }

        let level = activity.level();
        if level == Level::ERROR {
            emit_event!(error);
        } else if level == Level::INFO {
            emit_event!(info);
        } else {
            emit_event!(debug);
        }
    }
}
