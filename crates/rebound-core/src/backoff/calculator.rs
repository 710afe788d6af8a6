//! Per-call backoff state machines.

use super::formula::{exponential_cap, exponential_multiplier};
use crate::clock::Clock;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

/// Decides, after each failed attempt, whether to wait and for how long.
///
/// One instance drives exactly one logical call and is never shared.
/// `get_backoff` is called once per failed attempt. `None` means "give up";
/// once an implementation has returned `None` it must keep doing so.
pub trait Backoff: Send + Debug {
    /// The wait before the next attempt, or `None` if no attempt is left.
    fn get_backoff(&mut self) -> Option<Duration>;

    /// Number of times `get_backoff` has been called.
    fn attempts_made(&self) -> u32;
}

/// Full-jitter exponential backoff bounded by a call budget and a deadline.
///
/// The deadline (`clock.now() + window`) and the base multiplier are fixed at
/// construction. Every call to [`get_backoff`](Backoff::get_backoff):
///
/// 1. computes the cap `base_multiplier * 2^attempts_made` (see
///    [`exponential_cap`]),
/// 2. samples the wait uniformly from `[0, cap]`,
/// 3. counts the decision,
/// 4. returns `None` once `max_calls_total` calls have been used up,
/// 5. returns `None` if the wait would end past the deadline (no partial waits),
/// 6. returns the wait otherwise.
///
/// # Examples
///
/// ```rust
/// use rebound_core::backoff::{Backoff, BackoffCalculator};
/// use rebound_core::clock::ManualClock;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let clock = Arc::new(ManualClock::new());
/// let mut backoff = BackoffCalculator::new(clock, 3, Duration::from_secs(60));
///
/// // Three calls in total leave room for two waits.
/// assert!(backoff.get_backoff().is_some());
/// assert!(backoff.get_backoff().is_some());
/// assert_eq!(backoff.get_backoff(), None);
/// ```
#[derive(Debug)]
pub struct BackoffCalculator {
    clock: Arc<dyn Clock>,
    max_calls_total: u32,
    window_seconds: f64,
    deadline: f64,
    base_multiplier: f64,
    attempts_made: u32,
    exhausted: bool,
    rng: StdRng,
}

impl BackoffCalculator {
    /// Start a calculator whose window opens now.
    pub fn new(clock: Arc<dyn Clock>, max_calls_total: u32, window: Duration) -> Self {
        let window_seconds = window.as_secs_f64();
        let deadline = clock.now() + window_seconds;
        Self {
            clock,
            max_calls_total,
            window_seconds,
            deadline,
            base_multiplier: exponential_multiplier(max_calls_total, window_seconds),
            attempts_made: 0,
            exhausted: false,
            rng: StdRng::from_entropy(),
        }
    }

    /// Replace the jitter source with a seeded one, for reproducible waits.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Clock reading after which no wait is handed out.
    pub fn deadline(&self) -> f64 {
        self.deadline
    }

    /// The `m` in `m * 2^k`.
    pub fn base_multiplier(&self) -> f64 {
        self.base_multiplier
    }

    /// Total calls permitted, including the first.
    pub fn max_calls_total(&self) -> u32 {
        self.max_calls_total
    }

    fn exhaust(&mut self) -> Option<Duration> {
        self.exhausted = true;
        None
    }
}

impl Backoff for BackoffCalculator {
    fn get_backoff(&mut self) -> Option<Duration> {
        let cap = exponential_cap(self.window_seconds, self.max_calls_total, self.attempts_made);
        // Scaling a unit sample keeps huge caps from overflowing the sampler.
        let jittered = cap * self.rng.gen_range(0.0..=1.0);
        self.attempts_made = self.attempts_made.saturating_add(1);

        if self.exhausted || self.attempts_made >= self.max_calls_total {
            return self.exhaust();
        }

        let seconds_left = self.deadline - self.clock.now();
        if jittered > seconds_left {
            return self.exhaust();
        }

        match Duration::try_from_secs_f64(jittered) {
            Ok(wait) => Some(wait),
            Err(_) => self.exhaust(),
        }
    }

    fn attempts_made(&self) -> u32 {
        self.attempts_made
    }
}

/// Keeps the call budget but never waits and ignores the deadline.
///
/// Meant for tests that exercise retry paths without sleeping.
#[derive(Debug, Clone)]
pub struct ZeroWaitCalculator {
    max_calls_total: u32,
    attempts_made: u32,
}

impl ZeroWaitCalculator {
    /// A calculator allowing `max_calls_total` calls.
    pub fn new(max_calls_total: u32) -> Self {
        Self {
            max_calls_total,
            attempts_made: 0,
        }
    }
}

impl Backoff for ZeroWaitCalculator {
    fn get_backoff(&mut self) -> Option<Duration> {
        self.attempts_made = self.attempts_made.saturating_add(1);
        (self.attempts_made < self.max_calls_total).then_some(Duration::ZERO)
    }

    fn attempts_made(&self) -> u32 {
        self.attempts_made
    }
}

/// Never allows a retry.
#[derive(Debug, Clone, Default)]
pub struct ZeroAttemptCalculator {
    attempts_made: u32,
}

impl ZeroAttemptCalculator {
    /// A calculator that refuses every retry.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Backoff for ZeroAttemptCalculator {
    fn get_backoff(&mut self) -> Option<Duration> {
        self.attempts_made = self.attempts_made.saturating_add(1);
        None
    }

    fn attempts_made(&self) -> u32 {
        self.attempts_made
    }
}
