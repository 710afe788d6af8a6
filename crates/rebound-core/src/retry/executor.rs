//! The attempt loop.

use crate::backoff::Backoff;
use crate::clock::{Clock, MonotonicClock};
use crate::error::Failure;
use crate::overrides;
use crate::policy::RetryPolicy;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

pub(crate) type RetryIf<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;
pub(crate) type FixedDelayIf<E> = Arc<dyn Fn(&E) -> Option<Duration> + Send + Sync>;

/// Retries an operation with full-jitter exponential backoff.
///
/// Built with [`Retry::builder`]. One `Retry` can drive any number of calls,
/// sequentially or concurrently; each call gets its own backoff state, chosen
/// through the override registry for the policy's namespace.
///
/// # Examples
///
/// ```rust
/// use rebound_core::retry::Retry;
/// use std::time::Duration;
///
/// let retry = Retry::builder()
///     .max_calls_total(3)
///     .window(Duration::from_millis(30))
///     .retry_if(|e: &std::io::Error| e.kind() == std::io::ErrorKind::TimedOut)
///     .build();
///
/// let mut calls = 0;
/// let value = retry.run(|| {
///     calls += 1;
///     if calls < 2 {
///         Err(std::io::Error::from(std::io::ErrorKind::TimedOut))
///     } else {
///         Ok(42)
///     }
/// });
///
/// // The first wait is capped at 30ms / (2^2 - 1) = 10ms, well inside the window.
/// assert_eq!(value.unwrap(), 42);
/// assert_eq!(calls, 2);
/// ```
pub struct Retry<E> {
    pub(crate) policy: RetryPolicy,
    pub(crate) retry_if: RetryIf<E>,
    pub(crate) fixed_delay_if: Option<FixedDelayIf<E>>,
    pub(crate) clock: Option<Arc<dyn Clock>>,
}

impl<E> Clone for Retry<E> {
    fn clone(&self) -> Self {
        Self {
            policy: self.policy.clone(),
            retry_if: Arc::clone(&self.retry_if),
            fixed_delay_if: self.fixed_delay_if.clone(),
            clock: self.clock.clone(),
        }
    }
}

impl<E> fmt::Debug for Retry<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Retry")
            .field("policy", &self.policy)
            .field("fixed_delay_if", &self.fixed_delay_if.is_some())
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

/// What the loop does after a failed attempt.
enum Decision<E> {
    /// Sleep, then call again. Holds the failure recorded so far.
    Wait { delay: Duration, failure: Failure<E> },
    /// Sleep the requested delay, then start over with a fresh budget and
    /// window.
    Reset { delay: Duration, failure: Failure<E> },
    /// Surface this failure.
    GiveUp(Failure<E>),
}

/// Backoff state of one logical call.
struct Attempts<'a, E> {
    retry: &'a Retry<E>,
    backoff: Box<dyn Backoff>,
}

impl<'a, E> Attempts<'a, E> {
    fn start(retry: &'a Retry<E>) -> Self {
        Self {
            retry,
            backoff: retry.fresh_backoff(),
        }
    }

    fn on_failure(&mut self, error: E, previous: Option<Failure<E>>) -> Decision<E> {
        let policy = &self.retry.policy;

        if let Some(delay) = self.retry.fixed_delay_if.as_ref().and_then(|f| f(&error)) {
            tracing::debug!(
                namespace = ?policy.namespace,
                delay_secs = delay.as_secs_f64(),
                "operation asked for a fixed delay; restarting the retry budget"
            );
            return Decision::Reset {
                delay,
                failure: Failure::chained(error, previous),
            };
        }

        if !(self.retry.retry_if)(&error) {
            tracing::debug!(namespace = ?policy.namespace, "failure is not retryable");
            return Decision::GiveUp(Failure::chained(error, previous));
        }

        let failure = Failure::chained(error, previous);
        match self.backoff.get_backoff() {
            Some(delay) => {
                tracing::debug!(
                    namespace = ?policy.namespace,
                    attempt = self.backoff.attempts_made(),
                    delay_secs = delay.as_secs_f64(),
                    "sleeping before the next attempt"
                );
                Decision::Wait { delay, failure }
            }
            None => {
                tracing::debug!(
                    namespace = ?policy.namespace,
                    attempts = self.backoff.attempts_made(),
                    "call budget spent or next attempt would be past the retry deadline; giving up"
                );
                Decision::GiveUp(failure)
            }
        }
    }

    /// Begin a new budget whose window opens now.
    fn restart(&mut self) {
        self.backoff = self.retry.fresh_backoff();
    }
}

impl<E> Retry<E> {
    /// A retry with `policy` that retries every failure.
    pub fn new(policy: RetryPolicy) -> Self {
        policy.warn_if_vacuous();
        Self {
            policy,
            retry_if: Arc::new(|_| true),
            fixed_delay_if: None,
            clock: None,
        }
    }

    /// The policy this retry was built with.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    fn fresh_backoff(&self) -> Box<dyn Backoff> {
        let clock = match &self.clock {
            Some(clock) => Arc::clone(clock),
            None => Arc::new(MonotonicClock::new()),
        };
        let variant = overrides::resolve(self.policy.namespace.as_deref());
        variant.build(clock, &self.policy)
    }

    /// Call `operation` until it succeeds or the policy runs out, blocking the
    /// current thread between attempts.
    ///
    /// On failure the returned [`Failure`] holds the last error chained to
    /// every earlier one.
    pub fn run<T, F>(&self, mut operation: F) -> Result<T, Failure<E>>
    where
        F: FnMut() -> Result<T, E>,
    {
        let mut attempts = Attempts::start(self);
        let mut previous = None;
        loop {
            let error = match operation() {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };
            match attempts.on_failure(error, previous.take()) {
                Decision::Wait { delay, failure } => {
                    std::thread::sleep(delay);
                    previous = Some(failure);
                }
                Decision::Reset { delay, failure } => {
                    std::thread::sleep(delay);
                    attempts.restart();
                    previous = Some(failure);
                }
                Decision::GiveUp(failure) => return Err(failure),
            }
        }
    }

    /// Like [`run`](Self::run), but awaits `operation` and suspends on the
    /// tokio timer between attempts.
    pub async fn run_async<T, F, Fut>(&self, operation: F) -> Result<T, Failure<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run_async_until(operation, std::future::pending::<()>())
            .await
    }

    /// Like [`run_async`](Self::run_async), but gives up as soon as `cancel`
    /// completes during a backoff wait.
    ///
    /// A cancelled call does not invoke `operation` again and returns the most
    /// recent failure. `cancel` is only watched while waiting; an attempt in
    /// flight always runs to completion.
    pub async fn run_async_until<T, F, Fut, C>(
        &self,
        mut operation: F,
        cancel: C,
    ) -> Result<T, Failure<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: Future<Output = ()>,
    {
        tokio::pin!(cancel);
        let mut attempts = Attempts::start(self);
        let mut previous = None;
        loop {
            let error = match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };
            let (delay, failure, reset) = match attempts.on_failure(error, previous.take()) {
                Decision::Wait { delay, failure } => (delay, failure, false),
                Decision::Reset { delay, failure } => (delay, failure, true),
                Decision::GiveUp(failure) => return Err(failure),
            };
            tokio::select! {
                biased;
                _ = &mut cancel => {
                    tracing::debug!(
                        namespace = ?self.policy.namespace,
                        "retry cancelled while waiting"
                    );
                    return Err(failure);
                }
                _ = tokio::time::sleep(delay) => {}
            }
            if reset {
                attempts.restart();
            }
            previous = Some(failure);
        }
    }
}
