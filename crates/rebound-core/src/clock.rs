//! Time sources for the backoff calculator.
//!
//! The calculator only ever asks "how many seconds since some fixed origin",
//! so a clock is a single method. Production code uses [`MonotonicClock`];
//! tests drive a [`ManualClock`] by hand.

use crate::error::ClockError;
use std::fmt::Debug;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Seconds since an arbitrary, fixed, monotonic origin.
pub trait Clock: Send + Sync + Debug {
    /// The current reading in seconds.
    fn now(&self) -> f64;
}

/// Clock backed by the monotonic system timer.
///
/// Readings go through `tokio::time::Instant`, so a paused tokio runtime
/// (`#[tokio::test(start_paused = true)]`) is observed consistently with
/// `tokio::time::sleep`. Outside a runtime this is the plain OS monotonic clock.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Create a clock whose origin is now.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// A clock that only moves when told to.
///
/// Starts at `0.0` and refuses to go backwards.
///
/// # Examples
///
/// ```rust
/// use rebound_core::clock::{Clock, ManualClock};
///
/// let clock = ManualClock::new();
/// clock.advance_to(60.0).unwrap();
/// assert_eq!(clock.now(), 60.0);
/// assert!(clock.advance_to(30.0).is_err());
/// assert_eq!(clock.now(), 60.0);
/// ```
#[derive(Debug, Default)]
pub struct ManualClock {
    time: Mutex<f64>,
}

impl ManualClock {
    /// Create a clock reading `0.0`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock to `t` seconds.
    ///
    /// Fails with [`ClockError::Backwards`] if `t` is earlier than the current
    /// reading; the clock is left untouched in that case.
    pub fn advance_to(&self, t: f64) -> Result<(), ClockError> {
        let mut time = self.lock();
        if t.is_nan() || t < *time {
            return Err(ClockError::Backwards {
                current: *time,
                requested: t,
            });
        }
        *time = t;
        Ok(())
    }

    /// Move the clock forward by `by`.
    pub fn advance_by(&self, by: Duration) {
        *self.lock() += by.as_secs_f64();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, f64> {
        // A poisoned f64 is still a valid reading.
        self.time.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        *self.lock()
    }
}
