//! Retrying an operation.
//!
//! [`Retry`] drives one logical call at a time through two states:
//!
//! - **Attempting**: call the operation. Success ends the call. A failure the
//!   fixed-delay signal recognises waits that delay, then restarts the budget
//!   with a window that opens after the wait.
//!   A failure the predicate rejects is returned at once. Any other failure is
//!   chained onto the earlier ones and the call moves to backing off.
//! - **Backing off**: ask the call's [`Backoff`](crate::backoff::Backoff) for
//!   a wait. `None` returns the last failure with its chain; a duration is
//!   slept and the call goes back to attempting.
//!
//! [`Retry::run`] blocks the thread while waiting, [`Retry::run_async`]
//! suspends on the tokio timer; both share the same decisions.
//!
//! # Examples
//!
//! ```rust
//! use rebound_core::overrides::retry_immediately;
//! use rebound_core::retry::Retry;
//!
//! # async fn example() {
//! let retry = Retry::builder().max_calls_total(3).build();
//!
//! let _guard = retry_immediately(None);
//! let result = retry
//!     .run_async(|| async { Err::<(), _>(std::io::Error::other("still down")) })
//!     .await;
//!
//! let failure = result.unwrap_err();
//! assert_eq!(failure.chain_len(), 3);
//! # }
//! ```

mod builder;
mod executor;

pub use builder::RetryBuilder;
pub use executor::Retry;
