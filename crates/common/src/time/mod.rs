//! Time abstraction for testability
//!
//! Cache expiry, LRU timestamps and limiter windows all read time through the
//! [`Clock`] trait so tests can move time forward without sleeping.
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//!
//! use lumen_common::time::{Clock, MockClock, SystemClock};
//!
//! // Use system clock in production
//! let clock = SystemClock;
//! let _now = clock.now();
//!
//! // Use mock clock in tests
//! let mock = MockClock::new();
//! let start = mock.millis_since_epoch();
//! mock.advance(Duration::from_secs(5));
//! assert_eq!(mock.millis_since_epoch() - start, 5_000);
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

/// Trait for time operations to enable testing
pub trait Clock: Send + Sync + 'static {
    /// Get current instant (monotonic time)
    fn now(&self) -> Instant;

    /// Get current system time (wall clock)
    fn system_time(&self) -> SystemTime;

    /// Get milliseconds since UNIX epoch
    fn millis_since_epoch(&self) -> u64 {
        self.system_time().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
    }
}

/// Real system clock implementation for production use
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn system_time(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Implement Clock for Arc<T> where T: Clock for convenient cloning
impl<T: Clock> Clock for Arc<T> {
    fn now(&self) -> Instant {
        (**self).now()
    }

    fn system_time(&self) -> SystemTime {
        (**self).system_time()
    }
}

/// Mock clock for deterministic testing
///
/// Clones share the same elapsed time, so a clock handed to a cache can be
/// advanced from the test body.
///
/// ```
/// use std::time::Duration;
///
/// use lumen_common::time::MockClock;
///
/// let clock = MockClock::new();
/// clock.advance(Duration::from_secs(10));
/// assert_eq!(clock.elapsed(), Duration::from_secs(10));
/// ```
#[derive(Debug, Clone)]
pub struct MockClock {
    start: Instant,
    elapsed: Arc<Mutex<Duration>>,
    base_system_time: SystemTime,
}

impl MockClock {
    /// Create a new mock clock starting at the current real time
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            elapsed: Arc::new(Mutex::new(Duration::ZERO)),
            base_system_time: SystemTime::now(),
        }
    }

    /// Advance the mock clock by a duration
    pub fn advance(&self, duration: Duration) {
        *self.elapsed.lock() += duration;
    }

    /// Advance the mock clock by seconds (convenience method)
    pub fn advance_secs(&self, secs: u64) {
        self.advance(Duration::from_secs(secs));
    }

    /// Set the mock clock to a specific elapsed time
    pub fn set_elapsed(&self, duration: Duration) {
        *self.elapsed.lock() = duration;
    }

    /// Get the simulated time since the clock was created
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock()
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.start + self.elapsed()
    }

    fn system_time(&self) -> SystemTime {
        self.base_system_time + self.elapsed()
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for time.
    use super::*;

    /// Validates `MockClock::advance` moves both monotonic and wall time.
    ///
    /// Assertions:
    /// - Confirms `now()` moved by exactly the advanced duration.
    /// - Confirms `millis_since_epoch()` moved by the same amount.
    #[test]
    fn test_mock_clock_advance() {
        let clock = MockClock::new();
        let start = clock.now();
        let start_ms = clock.millis_since_epoch();

        clock.advance(Duration::from_millis(1500));

        assert_eq!(clock.now().duration_since(start), Duration::from_millis(1500));
        assert_eq!(clock.millis_since_epoch() - start_ms, 1500);
    }

    /// Validates clones of a `MockClock` share elapsed time.
    ///
    /// Assertions:
    /// - Confirms advancing the clone is visible through the original.
    #[test]
    fn test_mock_clock_clones_share_time() {
        let clock = MockClock::new();
        let handle = clock.clone();

        handle.advance_secs(30);
        assert_eq!(clock.elapsed(), Duration::from_secs(30));

        clock.set_elapsed(Duration::from_secs(5));
        assert_eq!(handle.elapsed(), Duration::from_secs(5));
    }

    /// Validates `Clock` is implemented for `Arc<T>`.
    ///
    /// Assertions:
    /// - Confirms the shared clock reports the inner clock's time.
    #[test]
    fn test_arc_clock_delegates() {
        let clock = Arc::new(MockClock::new());
        clock.advance_secs(2);
        let shared: Arc<MockClock> = Arc::clone(&clock);
        assert_eq!(shared.millis_since_epoch(), clock.millis_since_epoch());
    }
}
