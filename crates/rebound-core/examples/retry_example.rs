//! Example: retrying a flaky operation
//!
//! This example demonstrates:
//! 1. A retried call spreading its attempts over a window
//! 2. A retryability predicate (only retry network errors)
//! 3. A throttling response that restarts the budget
//! 4. Scoped overrides that make retries instant
//!
//! Run with:
//! ```bash
//! RUST_LOG=rebound_core=debug cargo run -p rebound-core --example retry_example
//! ```

use rebound_core::backoff::{ZeroAttempt, ZeroWait};
use rebound_core::overrides;
use rebound_core::prelude::*;
use std::error::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, thiserror::Error)]
enum ApiError {
    #[error("network error on attempt {0}")]
    Network(u32),
    #[error("auth failed")]
    Auth,
    #[error("throttled, retry after {0:?}")]
    Throttled(Duration),
}

/// A simulated API that fails the first few times
struct UnreliableApi {
    attempts: Arc<AtomicU32>,
    fail_count: u32,
}

impl UnreliableApi {
    fn new(fail_count: u32) -> Self {
        Self {
            attempts: Arc::new(AtomicU32::new(0)),
            fail_count,
        }
    }

    async fn call(&self) -> Result<String, ApiError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;

        if attempt <= self.fail_count {
            println!("  Attempt {attempt}: FAILED (simulating transient error)");
            Err(ApiError::Network(attempt))
        } else {
            println!("  Attempt {attempt}: SUCCESS");
            Ok("API response data".to_string())
        }
    }

    fn total_attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

/// Example 1: Spread 4 calls over a 700ms window
async fn example_window() -> Result<(), Box<dyn Error>> {
    println!("\n=== Example 1: Full-Jitter Backoff Within a Window ===\n");

    // Caps are 100ms, 200ms and 400ms; each wait is drawn from [0, cap].
    let retry = Retry::builder()
        .max_calls_total(4)
        .window(Duration::from_millis(700))
        .build();

    let api = UnreliableApi::new(2);
    let start = Instant::now();
    let result = retry.run_async(|| api.call()).await?;

    println!("\nResult: {result}");
    println!("Total attempts: {}", api.total_attempts());
    println!("Total time: {:?} (at most ~300ms of waiting)", start.elapsed());

    Ok(())
}

/// Example 2: Only network errors are worth retrying
async fn example_predicate() -> Result<(), Box<dyn Error>> {
    println!("\n=== Example 2: Retry Predicate (Network Errors Only) ===\n");

    let retry = Retry::builder()
        .max_calls_total(4)
        .window(Duration::from_millis(100))
        .retry_if(|e: &ApiError| matches!(e, ApiError::Network(_)))
        .build();

    println!("Auth error (should NOT retry)");
    let calls = AtomicU32::new(0);
    let failure = retry
        .run_async(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(ApiError::Auth) }
        })
        .await
        .unwrap_err();
    println!("  {failure} after {} call(s)", calls.load(Ordering::SeqCst));

    println!("\nNetwork errors until the budget runs out");
    let api = UnreliableApi::new(u32::MAX);
    let failure = retry.run_async(|| api.call()).await.unwrap_err();
    println!("  Final error: {failure}");
    for (i, earlier) in failure.history().iter().enumerate() {
        println!("  caused by #{}: {earlier}", i + 1);
    }

    Ok(())
}

/// Example 3: A throttling response dictates the wait and resets the budget
async fn example_throttle() -> Result<(), Box<dyn Error>> {
    println!("\n=== Example 3: Throttling Restarts the Budget ===\n");

    let retry = Retry::builder()
        .max_calls_total(2)
        .window(Duration::from_millis(50))
        .fixed_delay_if(|e: &ApiError| match e {
            ApiError::Throttled(after) => Some(*after),
            _ => None,
        })
        .build();

    let calls = AtomicU32::new(0);
    let result = retry
        .run_async(|| {
            let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                match call {
                    1 | 3 => Err(ApiError::Network(call)),
                    2 => Err(ApiError::Throttled(Duration::from_millis(20))),
                    _ => Ok(call),
                }
            }
        })
        .await;

    match result {
        Ok(call) => println!("  Succeeded on call {call}, budget was 2 per throttle cycle"),
        Err(failure) => println!("  Gave up: {failure}"),
    }

    Ok(())
}

/// Example 4: Overrides are scoped to the task that installs them
async fn example_overrides() -> Result<(), Box<dyn Error>> {
    println!("\n=== Example 4: Scoped Overrides ===\n");

    let retry = Retry::builder()
        .max_calls_total(5)
        .window(Duration::from_secs(60))
        .build();

    let instant = tokio::spawn(overrides::scoped_with(None, Arc::new(ZeroWait), {
        let retry = retry.clone();
        async move {
            let api = UnreliableApi::new(u32::MAX);
            let start = Instant::now();
            let _ = retry.run_async(|| api.call()).await;
            (api.total_attempts(), start.elapsed())
        }
    }));

    let disabled = tokio::spawn(overrides::scoped_with(None, Arc::new(ZeroAttempt), async move {
        let api = UnreliableApi::new(u32::MAX);
        let _ = retry.run_async(|| api.call()).await;
        api.total_attempts()
    }));

    // Guards cover synchronous code on the current thread.
    let calls = AtomicU32::new(0);
    {
        let _guard = no_retries(None);
        let retry = Retry::builder().max_calls_total(5).build();
        let _ = retry.run(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(ApiError::Auth)
        });
    }

    let (attempts, elapsed) = instant.await?;
    println!("  zero-wait: {attempts} attempts in {elapsed:?}");
    println!("  zero-attempt: {} attempt(s)", disabled.await?);
    println!("  no_retries guard: {} attempt(s)", calls.load(Ordering::SeqCst));

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("==============================================");
    println!("   Rebound Core: Retry Examples");
    println!("==============================================");

    example_window().await?;
    example_predicate().await?;
    example_throttle().await?;
    example_overrides().await?;

    println!("\n==============================================");
    println!("   All examples completed successfully!");
    println!("==============================================\n");

    Ok(())
}
