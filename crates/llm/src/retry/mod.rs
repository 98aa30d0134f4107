//! Retry policy for remote annotator calls
//!
//! [`RetryPolicy`] wraps a single fallible async operation and re-runs it while
//! the returned error is classified as transient by [`RetryableError`].
//! Waits follow a randomized exponential schedule ("full jitter"): before the
//! retry that follows attempt `n` the policy sleeps for a random duration in
//! `0..=min(max_delay, base_delay * 2^(n-1))`.
//!
//! Every attempt and every scheduled retry is recorded in a caller-owned
//! [`RunStatistics`], so counters live with whoever drives the run instead of
//! in process-wide state.
//!
//! ## Usage
//! ```rust,ignore
//! let policy = RetryPolicy::new(RetryConfig::default());
//! let mut stats = RunStatistics::default();
//! let text = policy.execute(&mut stats, || provider.call_once(&request)).await?;
//! ```

use rand::Rng;
use std::fmt::Display;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Configuration for retry behavior with randomized exponential backoff
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total number of attempts, including the first one
    pub max_attempts: u32,
    /// Multiplier of the exponential schedule (wait ceiling after attempt 1)
    pub base_delay: Duration,
    /// Upper bound for a single wait
    pub max_delay: Duration,
    /// Draw the wait uniformly from `0..=ceiling`; when off the ceiling itself is used
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Values below one are clamped to a single attempt.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }
}

/// Classifies errors as transient (worth another attempt) or terminal
pub trait RetryableError {
    /// Returns true if the error is transient
    fn is_retryable(&self) -> bool;

    /// Short machine-friendly label for logging
    fn error_type(&self) -> &'static str;
}

/// Per-run call counters, owned by the caller and reset for each run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStatistics {
    /// Attempts that actually reached the remote call
    pub total_calls: u64,
    /// Failures that were followed by another attempt
    pub retries: u64,
}

impl RunStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_call(&mut self) {
        self.total_calls += 1;
    }

    pub fn record_retry(&mut self) {
        self.retries += 1;
    }
}

impl Display for RunStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "calls: {}, retries: {}", self.total_calls, self.retries)
    }
}

/// Explicit retry policy, independent of any particular call site
#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        let max_attempts = config.max_attempts.max(1);
        Self {
            config: RetryConfig {
                max_attempts,
                ..config
            },
        }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Run `operation` until it succeeds, fails with a terminal error, or the
    /// attempt ceiling is reached. The last error is returned unchanged.
    pub async fn execute<F, Fut, T, E>(
        &self,
        stats: &mut RunStatistics,
        mut operation: F,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: RetryableError + Display,
    {
        let start_time = Instant::now();
        let max_attempts = self.config.max_attempts;
        let mut attempt = 0;

        loop {
            attempt += 1;
            stats.record_call();
            debug!(
                "Attempt {}/{} (elapsed: {:?})",
                attempt,
                max_attempts,
                start_time.elapsed()
            );

            let error = match operation().await {
                Ok(result) => {
                    if attempt > 1 {
                        info!(
                            "Remote call succeeded after {} retries ({:?})",
                            attempt - 1,
                            start_time.elapsed()
                        );
                    }
                    return Ok(result);
                }
                Err(error) => error,
            };

            if !error.is_retryable() {
                error!(
                    "Remote call failed with terminal {} error: {}",
                    error.error_type(),
                    error
                );
                return Err(error);
            }

            if attempt >= max_attempts {
                error!(
                    "Remote call failed after {} attempts over {:?}: {}",
                    attempt,
                    start_time.elapsed(),
                    error
                );
                return Err(error);
            }

            let delay = self.backoff_delay(attempt);
            stats.record_retry();
            warn!(
                "Transient {} error, retrying in {:?} (attempt {}/{}): {}",
                error.error_type(),
                delay,
                attempt,
                max_attempts,
                error
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Wait before the retry that follows the 1-based `attempt`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let ceiling = backoff_ceiling(&self.config, attempt);
        if !self.config.jitter || ceiling.is_zero() {
            return ceiling;
        }

        let secs = rand::thread_rng().gen_range(0.0..=ceiling.as_secs_f64());
        Duration::from_secs_f64(secs)
    }
}

fn backoff_ceiling(config: &RetryConfig, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(63) as i32;
    let raw = config.base_delay.as_secs_f64() * 2f64.powi(exponent);
    let capped = raw.min(config.max_delay.as_secs_f64());
    Duration::from_secs_f64(capped)
}
