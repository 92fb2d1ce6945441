//! Time provider abstraction
//!
//! Ordering records carry `created_at` / `updated_at` timestamps. The engine
//! reads them from a [`Clock`] so production code uses real system time while
//! tests can pin or advance time explicitly.
//!
//! # Example
//!
//! ```
//! use sorteia::{Clock, SystemClock};
//!
//! let clock = SystemClock;
//! let millis = clock.now_millis();
//! assert!(millis > 0);
//! ```

use std::fmt::Debug;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, TimeZone, Utc};

#[cfg(any(test, feature = "testing"))]
use std::sync::atomic::{AtomicU64, Ordering};

/// A time provider for record timestamps.
pub trait Clock: Send + Sync + Debug {
    /// Returns the current time as milliseconds since Unix epoch.
    fn now_millis(&self) -> u64;

    /// Returns the current time as a UTC timestamp.
    ///
    /// Derived from [`Clock::now_millis`], so implementations only need to
    /// provide the millisecond source.
    fn now(&self) -> DateTime<Utc> {
        millis_to_datetime(self.now_millis())
    }
}

/// Convert milliseconds since Unix epoch into a UTC timestamp.
///
/// Out-of-range values saturate to the epoch.
pub fn millis_to_datetime(millis: u64) -> DateTime<Utc> {
    i64::try_from(millis)
        .ok()
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Production clock using real system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Test clock with auto-advancing time.
///
/// Every `now_millis()` call returns the current value and then advances by
/// one millisecond, so consecutive mutations get strictly increasing
/// timestamps.
///
/// ```
/// use sorteia::{Clock, FixedClock};
///
/// let clock = FixedClock::new(1000);
/// assert_eq!(clock.now_millis(), 1000);
/// clock.advance(500);
/// assert_eq!(clock.now_millis(), 1501);
/// ```
#[cfg(any(test, feature = "testing"))]
#[derive(Debug)]
pub struct FixedClock {
    millis: AtomicU64,
}

#[cfg(any(test, feature = "testing"))]
impl FixedClock {
    /// Create a new fixed clock with the given initial time in milliseconds.
    pub fn new(millis: u64) -> Self {
        Self {
            millis: AtomicU64::new(millis),
        }
    }

    /// Advance the clock by the given number of milliseconds.
    pub fn advance(&self, ms: u64) {
        self.millis.fetch_add(ms, Ordering::SeqCst);
    }
}

#[cfg(any(test, feature = "testing"))]
impl Clock for FixedClock {
    fn now_millis(&self) -> u64 {
        self.millis.fetch_add(1, Ordering::SeqCst)
    }
}

#[cfg(any(test, feature = "testing"))]
impl Default for FixedClock {
    fn default() -> Self {
        // 2024-01-01 00:00:00 UTC
        Self::new(1704067200000)
    }
}
