use super::executor::{FixedDelayIf, Retry, RetryIf};
use crate::clock::Clock;
use crate::policy::RetryPolicy;
use std::sync::Arc;
use std::time::Duration;

/// Builder for configuring a [`Retry`].
///
/// Provides a fluent API over [`RetryPolicy`] plus the two classifiers the
/// executor consults on every failure.
///
/// # Examples
///
/// ```rust
/// use rebound_core::retry::Retry;
/// use std::time::Duration;
///
/// #[derive(Debug)]
/// enum ApiError {
///     Unavailable,
///     Throttled { retry_after: Duration },
///     BadRequest,
/// }
///
/// let retry = Retry::builder()
///     .max_calls_total(5)
///     .window(Duration::from_secs(120))
///     .namespace("api")
///     .retry_if(|e: &ApiError| matches!(e, ApiError::Unavailable))
///     .fixed_delay_if(|e: &ApiError| match e {
///         ApiError::Throttled { retry_after } => Some(*retry_after),
///         _ => None,
///     })
///     .build();
///
/// assert_eq!(retry.policy().max_calls_total, 5);
/// ```
pub struct RetryBuilder<E> {
    policy: RetryPolicy,
    retry_if: Option<RetryIf<E>>,
    fixed_delay_if: Option<FixedDelayIf<E>>,
    clock: Option<Arc<dyn Clock>>,
}

impl<E> Default for RetryBuilder<E> {
    fn default() -> Self {
        Self {
            policy: RetryPolicy::default(),
            retry_if: None,
            fixed_delay_if: None,
            clock: None,
        }
    }
}

impl<E> Retry<E> {
    /// Create a new builder, starting from [`RetryPolicy::default`].
    pub fn builder() -> RetryBuilder<E> {
        RetryBuilder::default()
    }
}

impl<E> RetryBuilder<E> {
    /// Replace the whole policy.
    pub fn policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Total number of calls, including the first.
    ///
    /// Default: 3
    pub fn max_calls_total(mut self, max_calls_total: u32) -> Self {
        self.policy.max_calls_total = max_calls_total;
        self
    }

    /// Time budget for retries, starting at the first call.
    ///
    /// Default: 60s
    pub fn window(mut self, window: Duration) -> Self {
        self.policy.window = window;
        self
    }

    /// Override namespace of this call site.
    ///
    /// Default: none
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.policy.namespace = Some(namespace.into());
        self
    }

    /// Decide which failures are worth another attempt.
    ///
    /// Failures the predicate rejects are returned at once. Default: every
    /// failure is retried.
    pub fn retry_if<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.retry_if = Some(Arc::new(predicate));
        self
    }

    /// Recognise failures that demand a specific wait, such as throttling
    /// responses.
    ///
    /// When `signal` returns a delay, the executor waits exactly that long and
    /// then starts over with a fresh call budget and window. Checked before
    /// [`retry_if`](Self::retry_if).
    pub fn fixed_delay_if<S>(mut self, signal: S) -> Self
    where
        S: Fn(&E) -> Option<Duration> + Send + Sync + 'static,
    {
        self.fixed_delay_if = Some(Arc::new(signal));
        self
    }

    /// Read time from `clock` instead of the monotonic system clock.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Build the `Retry`.
    ///
    /// Logs a warning when `max_calls_total` is below 2.
    pub fn build(self) -> Retry<E> {
        let mut retry = Retry::new(self.policy);
        if let Some(retry_if) = self.retry_if {
            retry.retry_if = retry_if;
        }
        retry.fixed_delay_if = self.fixed_delay_if;
        retry.clock = self.clock;
        retry
    }
}
