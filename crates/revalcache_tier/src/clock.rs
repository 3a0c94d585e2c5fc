// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The time source for entry timestamps, freshness checks and load deadlines.

use tick::{Clock, runtime::InactiveClock};
use tokio::runtime::Handle;

/// Returns a clock that follows the operating system's wall clock.
///
/// Inside a Tokio runtime the clock is driven by that runtime, so its timers fire and
/// deadlines built on it are enforced. Outside a runtime the clock still tells time,
/// but nothing drives its timers: a deadline awaited on it never elapses.
///
/// Entries travel through the backing tier to other processes, so every stamp and
/// classification reads [`Clock::system_time`] rather than a monotonic instant.
///
/// # Examples
///
/// ```
/// let clock = revalcache_tier::system_clock();
/// assert!(clock.system_time() > std::time::UNIX_EPOCH);
/// ```
#[must_use]
pub fn system_clock() -> Clock {
    if Handle::try_current().is_ok() {
        Clock::new_tokio()
    } else {
        let (clock, _driver) = InactiveClock::default().activate();
        clock
    }
}
