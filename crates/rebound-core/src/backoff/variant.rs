//! Factories that pick which [`Backoff`] a logical call gets.

use super::calculator::{Backoff, BackoffCalculator, ZeroAttemptCalculator, ZeroWaitCalculator};
use crate::clock::Clock;
use crate::policy::RetryPolicy;
use std::fmt::Debug;
use std::sync::{Arc, LazyLock};

/// Builds a fresh [`Backoff`] at the start of every logical call.
///
/// The override registry maps namespaces to variants; the executor asks the
/// registry for the active variant and builds one calculator per call.
///
/// # Examples
///
/// A variant that waits a fixed second between calls:
///
/// ```rust
/// use rebound_core::backoff::{Backoff, BackoffVariant};
/// use rebound_core::clock::Clock;
/// use rebound_core::policy::RetryPolicy;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// #[derive(Debug)]
/// struct OneSecond;
///
/// #[derive(Debug)]
/// struct OneSecondBackoff { left: u32, made: u32 }
///
/// impl Backoff for OneSecondBackoff {
///     fn get_backoff(&mut self) -> Option<Duration> {
///         self.made += 1;
///         self.left = self.left.saturating_sub(1);
///         (self.left > 0).then_some(Duration::from_secs(1))
///     }
///     fn attempts_made(&self) -> u32 { self.made }
/// }
///
/// impl BackoffVariant for OneSecond {
///     fn build(&self, _clock: Arc<dyn Clock>, policy: &RetryPolicy) -> Box<dyn Backoff> {
///         Box::new(OneSecondBackoff { left: policy.max_calls_total, made: 0 })
///     }
///     fn name(&self) -> &'static str { "one-second" }
/// }
/// ```
pub trait BackoffVariant: Send + Sync + Debug {
    /// Build the calculator for one logical call.
    fn build(&self, clock: Arc<dyn Clock>, policy: &RetryPolicy) -> Box<dyn Backoff>;

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}

/// A shareable variant, as stored by the override registry.
pub type Variant = Arc<dyn BackoffVariant>;

/// Full-jitter exponential backoff ([`BackoffCalculator`]); the default.
#[derive(Debug, Clone, Copy, Default)]
pub struct Standard;

impl BackoffVariant for Standard {
    fn build(&self, clock: Arc<dyn Clock>, policy: &RetryPolicy) -> Box<dyn Backoff> {
        Box::new(BackoffCalculator::new(
            clock,
            policy.max_calls_total,
            policy.window,
        ))
    }

    fn name(&self) -> &'static str {
        "standard"
    }
}

/// Retries the full budget without waiting ([`ZeroWaitCalculator`]).
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroWait;

impl BackoffVariant for ZeroWait {
    fn build(&self, _clock: Arc<dyn Clock>, policy: &RetryPolicy) -> Box<dyn Backoff> {
        Box::new(ZeroWaitCalculator::new(policy.max_calls_total))
    }

    fn name(&self) -> &'static str {
        "zero-wait"
    }
}

/// Disables retrying ([`ZeroAttemptCalculator`]).
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroAttempt;

impl BackoffVariant for ZeroAttempt {
    fn build(&self, _clock: Arc<dyn Clock>, _policy: &RetryPolicy) -> Box<dyn Backoff> {
        Box::new(ZeroAttemptCalculator::new())
    }

    fn name(&self) -> &'static str {
        "zero-attempt"
    }
}

static STANDARD: LazyLock<Variant> = LazyLock::new(|| Arc::new(Standard));

/// The shared [`Standard`] variant.
pub fn standard() -> Variant {
    Arc::clone(&STANDARD)
}
