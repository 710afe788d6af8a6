//! Error types.
//!
//! - [`Failure`] is what a retried call surfaces: the last error of the
//!   operation, chained to every earlier failure of the same logical call.
//! - [`ClockError`] and [`ConfigError`] are the crate's own errors.

mod chain;

pub use chain::Failure;

use thiserror::Error;

/// Errors raised by test clocks.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClockError {
    /// The requested time lies before the current reading.
    #[error("clock cannot go backwards: currently at {current}s, requested {requested}s")]
    Backwards {
        /// The reading at the time of the request
        current: f64,
        /// The rejected target time
        requested: f64,
    },
}

/// Errors raised while loading or validating a retry policy.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// The retry window is negative, NaN, infinite or too large for a `Duration`.
    #[error("invalid retry window: {0} seconds")]
    InvalidWindow(f64),
}
