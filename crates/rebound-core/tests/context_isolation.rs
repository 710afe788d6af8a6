//! Overrides installed by one thread or task must never be seen by another.
//!
//! Every test uses barriers so that all participants have installed their
//! override before any of them runs its retried call, and none reverts it
//! before all have finished. If an override leaked, the last participant to
//! install one would make the others' call counts wrong.

use rebound_core::backoff::{ZeroAttempt, ZeroWait};
use rebound_core::clock::ManualClock;
use rebound_core::overrides::{self, no_retries, retry_immediately, scoped_with};
use rebound_core::retry::Retry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const MAX_CALLS_TOTAL: u32 = 3;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("type error")]
struct TypeError;

#[derive(Debug, Default, Clone)]
struct Counter(Arc<Mutex<HashMap<&'static str, u32>>>);

impl Counter {
    fn hit(&self, key: &'static str) {
        *self.0.lock().unwrap().entry(key).or_default() += 1;
    }

    fn get(&self, key: &'static str) -> u32 {
        self.0.lock().unwrap().get(key).copied().unwrap_or(0)
    }
}

/// A retry whose standard schedule can never retry: the window is empty
/// and every call moves the clock past the deadline.
fn impatient_retry(clock: &Arc<ManualClock>) -> Retry<TypeError> {
    Retry::builder()
        .max_calls_total(MAX_CALLS_TOTAL)
        .window(Duration::ZERO)
        .clock(clock.clone())
        .build()
}

/// A retry whose standard schedule would sleep for seconds.
fn slow_retry() -> Retry<TypeError> {
    Retry::builder()
        .max_calls_total(MAX_CALLS_TOTAL)
        .window(Duration::from_secs(3))
        .build()
}

async fn failing_call(
    retry: &Retry<TypeError>,
    counter: &Counter,
    key: &'static str,
    clock: Option<&ManualClock>,
) -> u32 {
    let start = Instant::now();
    let outcome = tokio::time::timeout(
        Duration::from_millis(500),
        retry.run_async(|| {
            counter.hit(key);
            if let Some(clock) = clock {
                clock.advance_by(Duration::from_secs(1));
            }
            async {
                // Give the other tasks a chance to run.
                tokio::task::yield_now().await;
                Err::<(), _>(TypeError)
            }
        }),
    )
    .await;

    let failure = outcome.expect("retried call overran its timeout").unwrap_err();
    assert!(start.elapsed() < Duration::from_millis(500));
    failure.chain_len() as u32
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_async_overrides_do_not_leak_between_tasks() {
    let counter = Counter::default();
    let start = Arc::new(tokio::sync::Barrier::new(2));
    let end = Arc::new(tokio::sync::Barrier::new(2));

    let no_retry = {
        let (counter, start, end) = (counter.clone(), start.clone(), end.clone());
        tokio::spawn(scoped_with(None, Arc::new(ZeroAttempt), async move {
            start.wait().await;
            let chain = failing_call(&slow_retry(), &counter, "no_retry", None).await;
            end.wait().await;
            chain
        }))
    };
    let immediate = {
        let (counter, start, end) = (counter.clone(), start.clone(), end.clone());
        tokio::spawn(scoped_with(None, Arc::new(ZeroWait), async move {
            start.wait().await;
            let chain = failing_call(&slow_retry(), &counter, "retry_immediately", None).await;
            end.wait().await;
            chain
        }))
    };

    assert_eq!(no_retry.await.unwrap(), 1);
    assert_eq!(immediate.await.unwrap(), MAX_CALLS_TOTAL);
    assert_eq!(counter.get("no_retry"), 1);
    assert_eq!(counter.get("retry_immediately"), MAX_CALLS_TOTAL);
    assert_eq!(overrides::resolve(None).name(), "standard");
}

#[tokio::test]
async fn test_overridden_and_plain_tasks_count_independently() {
    let counter = Counter::default();
    let clock = Arc::new(ManualClock::new());
    let retry = impatient_retry(&clock);
    let start = Arc::new(tokio::sync::Barrier::new(2));
    let end = Arc::new(tokio::sync::Barrier::new(2));

    let plain = {
        let (counter, clock, retry) = (counter.clone(), clock.clone(), retry.clone());
        let (start, end) = (start.clone(), end.clone());
        overrides::spawn(async move {
            start.wait().await;
            failing_call(&retry, &counter, "plain", Some(&*clock)).await;
            end.wait().await;
        })
    };
    let immediate = {
        let (counter, clock, retry) = (counter.clone(), clock.clone(), retry.clone());
        tokio::spawn(scoped_with(None, Arc::new(ZeroWait), async move {
            start.wait().await;
            failing_call(&retry, &counter, "immediate", Some(&*clock)).await;
            end.wait().await;
        }))
    };

    plain.await.unwrap();
    immediate.await.unwrap();
    assert_eq!(counter.get("plain"), 1);
    assert_eq!(counter.get("immediate"), MAX_CALLS_TOTAL);
}

#[tokio::test]
async fn test_nested_task_overrides_its_parent_without_leaking() {
    let counter = Counter::default();
    let start = Arc::new(tokio::sync::Barrier::new(2));
    let end = Arc::new(tokio::sync::Barrier::new(2));

    let outer = {
        let counter = counter.clone();
        tokio::spawn(scoped_with(None, Arc::new(ZeroAttempt), async move {
            let nested = {
                let (counter, start, end) = (counter.clone(), start.clone(), end.clone());
                overrides::spawn(async move {
                    // Inherited from the parent at spawn time.
                    assert_eq!(overrides::resolve(None).name(), "zero-attempt");
                    scoped_with(None, Arc::new(ZeroWait), async {
                        start.wait().await;
                        failing_call(&slow_retry(), &counter, "nested_retry_immediately", None)
                            .await;
                        end.wait().await;
                    })
                    .await;
                    // Leaving the inner scope reveals the inherited override again.
                    assert_eq!(overrides::resolve(None).name(), "zero-attempt");
                })
            };

            start.wait().await;
            failing_call(&slow_retry(), &counter, "no_retry_with_nested", None).await;
            end.wait().await;
            nested.await.unwrap();

            // The nested override never reached the parent.
            assert_eq!(overrides::resolve(None).name(), "zero-attempt");
        }))
    };

    outer.await.unwrap();
    assert_eq!(counter.get("nested_retry_immediately"), MAX_CALLS_TOTAL);
    assert_eq!(counter.get("no_retry_with_nested"), 1);
    assert_eq!(overrides::resolve(None).name(), "standard");
}

#[test]
fn test_threaded_overrides_do_not_leak() {
    let counter = Counter::default();
    let start = Arc::new(std::sync::Barrier::new(2));
    let end = Arc::new(std::sync::Barrier::new(2));

    let worker = |key: &'static str, immediate: bool| {
        let (counter, start, end) = (counter.clone(), start.clone(), end.clone());
        std::thread::spawn(move || {
            let _guard = if immediate {
                retry_immediately(None)
            } else {
                no_retries(None)
            };
            start.wait();
            let began = Instant::now();
            let result = slow_retry().run(|| {
                counter.hit(key);
                Err::<(), _>(TypeError)
            });
            tokio_test::assert_err!(result);
            assert!(began.elapsed() < Duration::from_millis(500));
            end.wait();
        })
    };

    let threads = [worker("no_retry", false), worker("retry_immediately", true)];
    for thread in threads {
        thread.join().unwrap();
    }

    assert_eq!(counter.get("no_retry"), 1);
    assert_eq!(counter.get("retry_immediately"), MAX_CALLS_TOTAL);
}

#[test]
fn test_threads_spawned_under_an_override_inherit_it() {
    let counter = Counter::default();
    let _guard = retry_immediately(None);

    let inherited = {
        let counter = counter.clone();
        overrides::spawn_thread(move || {
            let _ = slow_retry().run(|| {
                counter.hit("inherited");
                Err::<(), _>(TypeError)
            });
        })
    };
    inherited.join().unwrap();

    assert_eq!(counter.get("inherited"), MAX_CALLS_TOTAL);
}
