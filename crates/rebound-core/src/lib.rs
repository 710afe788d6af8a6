#![deny(unsafe_code)]
#![warn(missing_docs)]

//! Retries with full-jitter exponential backoff for the Rebound ecosystem.
//!
//! A retried call is bounded two ways: a total number of calls (including the
//! first) and a wall-clock window that opens with the first call. Waits are
//! sized so their caps exactly fill the window and sampled uniformly below
//! the cap, which keeps concurrent clients from retrying in lockstep.
//!
//! - **Backoff decisions** via the [`Backoff`](backoff::Backoff) trait
//!   - [`BackoffCalculator`](backoff::BackoffCalculator): the closed-form
//!     exponential schedule with a deadline
//!   - zero-wait and zero-attempt variants for tests
//! - **Scoped overrides** via [`overrides`]: swap the backoff of a namespace
//!   for the current thread or task without affecting anyone else
//! - **Execution** via [`Retry`](retry::Retry): blocking and async loops with
//!   a caller-supplied retryability predicate and failure chaining
//!
//! # Examples
//!
//! Using the prelude for convenient imports:
//!
//! ```rust
//! use rebound_core::prelude::*;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let retry = Retry::builder()
//!     .max_calls_total(4)
//!     .window(Duration::from_secs(30))
//!     .retry_if(|e: &std::io::Error| e.kind() == std::io::ErrorKind::ConnectionReset)
//!     .build();
//!
//! let value = retry.run_async(|| async {
//!     Ok::<_, std::io::Error>(42)
//! }).await?;
//! # Ok(())
//! # }
//! ```
//!
//! Tests can make every retry instant:
//!
//! ```rust
//! use rebound_core::prelude::*;
//!
//! let _guard = retry_immediately(None);
//! let retry = Retry::builder().max_calls_total(3).build();
//!
//! let mut calls = 0;
//! let _ = retry.run(|| {
//!     calls += 1;
//!     Err::<(), _>("unavailable")
//! });
//! assert_eq!(calls, 3);
//! ```

pub mod backoff;
pub mod clock;
pub mod error;
pub mod overrides;
pub mod policy;
pub mod retry;

/// Convenient re-exports of commonly used items.
///
/// Import all core abstractions with:
///
/// ```rust
/// use rebound_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::backoff::{Backoff, BackoffCalculator, BackoffVariant};
    pub use crate::clock::{Clock, ManualClock, MonotonicClock};
    pub use crate::error::Failure;
    pub use crate::overrides::{no_retries, replace_backoff, retry_immediately};
    pub use crate::policy::RetryPolicy;
    pub use crate::retry::{Retry, RetryBuilder};
}
