// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Conversion between `std::time::Instant` and engine [`HostTime`].

use std::time::{Duration as StdDuration, Instant};

use strata_core::time::HostTime;

/// A monotonic clock whose tick 0 is the moment it was created.
///
/// Ticks are nanoseconds.
#[derive(Clone, Copy, Debug)]
pub struct Clock {
    origin: Instant,
}

impl Clock {
    /// Starts a clock at the current instant.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// Returns the current host time.
    #[must_use]
    pub fn now(&self) -> HostTime {
        self.host_time(Instant::now())
    }

    /// Converts an instant to host time, saturating at both ends.
    #[must_use]
    pub fn host_time(&self, instant: Instant) -> HostTime {
        let nanos = instant.saturating_duration_since(self.origin).as_nanos();
        HostTime(u64::try_from(nanos).unwrap_or(u64::MAX))
    }

    /// Converts host time back to an instant, or `None` if it is not
    /// representable.
    #[must_use]
    pub fn instant(&self, time: HostTime) -> Option<Instant> {
        self.origin.checked_add(StdDuration::from_nanos(time.ticks()))
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_is_monotonic_non_decreasing() {
        let clock = Clock::new();
        let first = clock.now();
        let second = clock.now();
        assert!(second >= first, "monotonic clock should not go backwards");
    }

    #[test]
    fn instants_round_trip_through_host_time() {
        let clock = Clock::new();
        let later = clock.origin + StdDuration::from_millis(1500);
        let time = clock.host_time(later);
        assert_eq!(time, HostTime(1_500_000_000));
        assert_eq!(clock.instant(time), Some(later));
    }

    #[test]
    fn instants_before_the_origin_saturate_to_zero() {
        let earlier = Instant::now();
        let clock = Clock::new();
        assert_eq!(clock.host_time(earlier), HostTime(0));
    }
}
