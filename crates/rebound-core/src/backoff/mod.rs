//! Backoff decisions.
//!
//! # Key Types
//!
//! - [`Backoff`] - per-call state machine answering "wait how long, if at all"
//! - [`BackoffCalculator`] - full-jitter exponential backoff within a window
//! - [`BackoffVariant`] - factory the override registry hands out
//!
//! The sizing is closed-form: for `n` total calls and a window `w`, wait `k`
//! is sampled from `[0, m * 2^k]` with `m = w / (2^(n-1) - 1)`, so the caps of
//! all `n - 1` waits add up to exactly `w`.

mod calculator;
mod formula;
mod variant;

pub use calculator::{Backoff, BackoffCalculator, ZeroAttemptCalculator, ZeroWaitCalculator};
pub use formula::{exponential_cap, exponential_multiplier};
pub use variant::{BackoffVariant, Standard, Variant, ZeroAttempt, ZeroWait, standard};
