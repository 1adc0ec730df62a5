// Copyright (c) The test-replay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Clocks that elapsed times in record files are measured with.
//!
//! Every process taking part in a run measures time from the same [`SessionStart`]. For the
//! readings of different worker processes to be comparable, the clock has to be system-wide: on
//! Unix this is `CLOCK_MONOTONIC`, which all processes on a machine share.

use crate::errors::RunContextError;
use std::{cell::Cell, fmt};

/// The environment variable the session start reference is handed to workers through.
pub const SESSION_START_ENV: &str = "TEST_REPLAY_SESSION_START";

/// A source of time readings, in seconds.
///
/// Readings are only meaningful relative to each other.
pub trait SessionClock: fmt::Debug {
    /// Returns the current reading of this clock.
    fn now(&self) -> f64;
}

/// The system-wide monotonic clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct MonotonicClock;

impl SessionClock for MonotonicClock {
    fn now(&self) -> f64 {
        imp::monotonic_now()
    }
}

#[cfg(unix)]
mod imp {
    use nix::time::{ClockId, clock_gettime};

    pub(super) fn monotonic_now() -> f64 {
        match clock_gettime(ClockId::CLOCK_MONOTONIC) {
            Ok(ts) => ts.tv_sec() as f64 + ts.tv_nsec() as f64 / 1e9,
            Err(error) => {
                tracing::debug!("CLOCK_MONOTONIC unavailable ({error}), using the wall clock");
                super::wall_clock_now()
            }
        }
    }
}

#[cfg(not(unix))]
mod imp {
    pub(super) fn monotonic_now() -> f64 {
        super::wall_clock_now()
    }
}

fn wall_clock_now() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0.0, |d| d.as_secs_f64())
}

/// A clock that advances by a fixed step every time it is read.
///
/// Useful for deterministic elapsed times, for example when driving the recorder from tests.
#[derive(Debug)]
pub struct SteppingClock {
    next: Cell<f64>,
    step: f64,
}

impl SteppingClock {
    /// Creates a new clock whose first reading is `start`.
    pub fn new(start: f64, step: f64) -> Self {
        Self {
            next: Cell::new(start),
            step,
        }
    }
}

impl SessionClock for SteppingClock {
    fn now(&self) -> f64 {
        let now = self.next.get();
        self.next.set(now + self.step);
        now
    }
}

/// The clock reading all elapsed times in a run are measured from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SessionStart(f64);

impl SessionStart {
    /// Takes a new reading from `clock`.
    pub fn capture(clock: &dyn SessionClock) -> Self {
        Self(clock.now())
    }

    /// Creates a session start from a known reading.
    pub fn from_reading(reading: f64) -> Self {
        Self(reading)
    }

    /// Returns the raw clock reading.
    pub fn reading(self) -> f64 {
        self.0
    }

    /// Returns the seconds elapsed on `clock` since this reading.
    pub fn elapsed(self, clock: &dyn SessionClock) -> f64 {
        clock.now() - self.0
    }

    /// Parses a session start from the value of [`SESSION_START_ENV`].
    pub fn from_env_value(value: &str) -> Result<Self, RunContextError> {
        value
            .trim()
            .parse()
            .map(Self)
            .map_err(|error| RunContextError::InvalidSessionStart {
                var: SESSION_START_ENV,
                value: value.to_owned(),
                error,
            })
    }

    /// Returns the value to set [`SESSION_START_ENV`] to.
    ///
    /// The value parses back to exactly the same reading.
    pub fn to_env_value(self) -> String {
        self.0.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn monotonic_clock_does_not_go_backwards() {
        let clock = MonotonicClock;
        let first = clock.now();
        let second = clock.now();
        assert!(second >= first, "{second} >= {first}");
    }

    #[test]
    fn stepping_clock_elapsed() {
        let clock = SteppingClock::new(10.0, 0.5);
        let start = SessionStart::capture(&clock);
        assert_eq!(start.reading(), 10.0);
        assert_eq!(start.elapsed(&clock), 0.5);
        assert_eq!(start.elapsed(&clock), 1.0);
    }

    #[test_case(0.0 ; "zero")]
    #[test_case(12345.678901234 ; "fractional")]
    #[test_case(0.1 + 0.2 ; "inexact")]
    fn env_value_round_trips(reading: f64) {
        let start = SessionStart::from_reading(reading);
        let parsed = SessionStart::from_env_value(&start.to_env_value()).unwrap();
        assert_eq!(parsed, start);
    }

    #[test]
    fn invalid_env_value() {
        let error = SessionStart::from_env_value("yesterday").unwrap_err();
        assert!(
            matches!(error, RunContextError::InvalidSessionStart { ref value, .. } if value == "yesterday"),
            "unexpected error: {error:?}"
        );
    }
}
