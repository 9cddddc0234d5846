//! Time abstraction for testability.
//!
//! The handler stamps listing responses with the server's local time. This
//! module provides a `Clock` trait so tests can pin that value.
//!
//! # Example
//!
//! ```
//! use maplink_core::time::{Clock, MockClock};
//! use chrono::Duration;
//!
//! let clock = MockClock::new();
//! let start = clock.now();
//! clock.advance(Duration::seconds(5));
//! assert_eq!(clock.now() - start, Duration::seconds(5));
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, FixedOffset, Local, Offset, TimeZone};

/// Abstraction over wall-clock time.
///
/// In production, use [`SystemClock`]. In tests, use [`MockClock`].
pub trait Clock: Send + Sync {
    /// Returns the current local time with its UTC offset.
    fn now(&self) -> DateTime<FixedOffset>;
}

/// System clock that uses real time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }
}

/// A mock clock for testing time-dependent code.
#[derive(Debug)]
pub struct MockClock {
    current: Mutex<DateTime<FixedOffset>>,
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MockClock {
    /// Creates a mock clock starting at 2024-01-01T00:00:00+00:00.
    #[must_use]
    pub fn new() -> Self {
        let utc = FixedOffset::east_opt(0).unwrap_or_else(|| Local::now().offset().fix());
        let start = utc
            .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .single()
            .unwrap_or_else(|| Local::now().fixed_offset());
        Self::at(start)
    }

    /// Creates a mock clock fixed at the given time.
    #[must_use]
    pub const fn at(time: DateTime<FixedOffset>) -> Self {
        Self {
            current: Mutex::new(time),
        }
    }

    /// Creates a mock clock that can be shared across threads.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Advances the clock by the given duration.
    pub fn advance(&self, duration: Duration) {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        *current += duration;
    }

    /// Sets the clock to a specific time.
    pub fn set(&self, time: DateTime<FixedOffset>) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = time;
    }
}

impl Clock for MockClock {
    fn now(&self) -> DateTime<FixedOffset> {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Clock for Arc<MockClock> {
    fn now(&self) -> DateTime<FixedOffset> {
        self.as_ref().now()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_recent() {
        let clock = SystemClock;
        let now = clock.now();
        assert!(now.timestamp() > 1_700_000_000);
    }

    #[test]
    fn test_mock_clock_advance_and_set() {
        let clock = MockClock::shared();
        let start = clock.now();
        assert_eq!(start.to_rfc3339(), "2024-01-01T00:00:00+00:00");

        clock.advance(Duration::minutes(90));
        assert_eq!(clock.now() - start, Duration::minutes(90));

        let later = DateTime::parse_from_rfc3339("2025-06-30T12:00:00+02:00").unwrap();
        clock.set(later);
        assert_eq!(Clock::now(&clock), later);
    }
}
