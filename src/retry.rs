//! Exponential backoff for startup operations
//!
//! Reconciliation passes are retried by the controller runtime. This helper
//! is for the one-off calls made before the controllers start, such as
//! applying CRDs while the API server is still coming up.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{error, warn};

/// Backoff settings
#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Maximum number of attempts (0 = unlimited)
    pub max_attempts: u32,
    /// Delay after the first failure
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Growth factor applied after every failure
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 0,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Give up after `attempts` attempts
    pub fn with_max_attempts(attempts: u32) -> Self {
        Self {
            max_attempts: attempts,
            ..Default::default()
        }
    }

    fn exhausted(&self, attempt: u32) -> bool {
        self.max_attempts > 0 && attempt >= self.max_attempts
    }
}

/// Iterator over successive un-jittered delays
#[derive(Clone, Debug)]
pub struct Backoff {
    next: Duration,
    max: Duration,
    multiplier: f64,
}

impl Backoff {
    /// Start a delay sequence for `config`
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            next: config.initial_delay.min(config.max_delay),
            max: config.max_delay,
            multiplier: config.backoff_multiplier,
        }
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let current = self.next;
        self.next = Duration::from_secs_f64(
            (current.as_secs_f64() * self.multiplier).min(self.max.as_secs_f64()),
        );
        Some(current)
    }
}

/// Scale a delay by a random factor in `[0.5, 1.5)`
fn jitter(delay: Duration) -> Duration {
    let factor = rand::thread_rng().gen_range(0.5..1.5);
    Duration::from_secs_f64(delay.as_secs_f64() * factor)
}

/// Run `operation` until it succeeds, `config.max_attempts` is reached, or
/// it fails with an error for which `retryable` returns false
pub async fn retry_if<F, Fut, T, E, P>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
    retryable: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut delays = Backoff::new(config);
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        let e = match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        if !retryable(&e) {
            error!(operation = %operation_name, attempt, error = %e, "operation failed permanently");
            return Err(e);
        }
        if config.exhausted(attempt) {
            error!(operation = %operation_name, attempt, error = %e, "operation failed after max attempts");
            return Err(e);
        }

        let delay = jitter(delays.next().unwrap_or(config.max_delay));
        warn!(
            operation = %operation_name,
            attempt,
            error = %e,
            delay_ms = delay.as_millis() as u64,
            "operation failed, retrying"
        );
        tokio::time::sleep(delay).await;
    }
}
