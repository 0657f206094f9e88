//! Countdown deadlines for bounded polling
//!
//! A [`Deadline`] captures a start instant and a timeout expressed in a
//! [`TimeUnit`]. Every consumer polls in whole-second steps, so sub-second
//! units are rejected at construction.
//!
//! The clock is [`tokio::time::Instant`], which lets paused-time tests drive
//! deadlines deterministically.

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::{Error, Result};

/// Granularity of a deadline's timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeUnit {
    Nanoseconds,
    Microseconds,
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    /// Length of one unit.
    pub fn duration(self) -> Duration {
        match self {
            TimeUnit::Nanoseconds => Duration::from_nanos(1),
            TimeUnit::Microseconds => Duration::from_micros(1),
            TimeUnit::Milliseconds => Duration::from_millis(1),
            TimeUnit::Seconds => Duration::from_secs(1),
            TimeUnit::Minutes => Duration::from_secs(60),
            TimeUnit::Hours => Duration::from_secs(60 * 60),
            TimeUnit::Days => Duration::from_secs(24 * 60 * 60),
        }
    }

    /// `amount` units as a [`Duration`], saturating on overflow.
    pub fn to_duration(self, amount: u64) -> Duration {
        let nanos = self.duration().as_nanos().saturating_mul(amount as u128);
        if nanos > u64::MAX as u128 * 1_000_000_000 {
            return Duration::MAX;
        }
        Duration::new(
            (nanos / 1_000_000_000) as u64,
            (nanos % 1_000_000_000) as u32,
        )
    }

    /// Whole units contained in `duration` (truncating).
    pub fn from_duration(self, duration: Duration) -> u64 {
        let units = duration.as_nanos() / self.duration().as_nanos();
        u64::try_from(units).unwrap_or(u64::MAX)
    }

    /// Whether this unit is at least one second long.
    pub fn is_whole_seconds(self) -> bool {
        !matches!(
            self,
            TimeUnit::Nanoseconds | TimeUnit::Microseconds | TimeUnit::Milliseconds
        )
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TimeUnit::Nanoseconds => "nanoseconds",
            TimeUnit::Microseconds => "microseconds",
            TimeUnit::Milliseconds => "milliseconds",
            TimeUnit::Seconds => "seconds",
            TimeUnit::Minutes => "minutes",
            TimeUnit::Hours => "hours",
            TimeUnit::Days => "days",
        };
        f.write_str(name)
    }
}

/// A countdown started at construction time.
#[derive(Debug, Clone)]
pub struct Deadline {
    started: Instant,
    timeout: u64,
    unit: TimeUnit,
}

impl Deadline {
    /// Start a countdown of `timeout` units.
    ///
    /// Fails with [`Error::InvalidTimeUnit`] for sub-second units.
    pub fn new(timeout: u64, unit: TimeUnit) -> Result<Self> {
        if !unit.is_whole_seconds() {
            return Err(Error::InvalidTimeUnit {
                unit: unit.to_string(),
            });
        }

        Ok(Self {
            started: Instant::now(),
            timeout,
            unit,
        })
    }

    /// Shorthand for a countdown in seconds.
    pub fn from_secs(secs: u64) -> Self {
        Self {
            started: Instant::now(),
            timeout: secs,
            unit: TimeUnit::Seconds,
        }
    }

    /// Original timeout, in [`Deadline::unit`].
    pub fn timeout(&self) -> u64 {
        self.timeout
    }

    pub fn unit(&self) -> TimeUnit {
        self.unit
    }

    /// Whole units elapsed since start (or the last [`Deadline::reset`]).
    pub fn time_elapsed(&self) -> u64 {
        self.unit.from_duration(self.started.elapsed())
    }

    /// Units left before the deadline. Zero or negative once expired.
    pub fn time_left(&self) -> i64 {
        let timeout = i64::try_from(self.timeout).unwrap_or(i64::MAX);
        let elapsed = i64::try_from(self.time_elapsed()).unwrap_or(i64::MAX);
        timeout - elapsed
    }

    /// Precise remaining time, saturating at zero.
    pub fn remaining(&self) -> Duration {
        self.unit
            .to_duration(self.timeout)
            .saturating_sub(self.started.elapsed())
    }

    /// Precise elapsed time.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_zero()
    }

    /// Restart the countdown from now.
    pub fn reset(&mut self) {
        self.started = Instant::now();
    }
}
