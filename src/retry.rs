//! Retry controller with exponential backoff and jitter.
//!
//! Every strategy that talks to the network wraps its attempts in a
//! [`RetryPolicy`]. The policy owns the attempt budget and the backoff schedule;
//! the operation only has to report whether an attempt failed and why.
//!
//! # Retry Strategy
//!
//! - `max_attempts` is the total number of attempts, not the number of retries
//! - Exponential backoff starting at 2 seconds
//! - Random jitter (0-1000ms) added before the cap
//! - Maximum delay capped at 15 seconds
//! - Errors that can never succeed ([`ExtractionError::is_retryable`]) end the
//!   loop immediately

use crate::error::ExtractionError;
use rand::{Rng, rng};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{error, instrument, warn};

/// Backoff schedule plus attempt budget.
///
/// The delay before attempt `n + 1` follows:
/// ```text
/// delay = min(base_delay * 2^(n-1) + random_jitter(0..=max_jitter), max_delay)
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts made before giving up. Always at least one.
    pub max_attempts: u32,
    /// Delay after the first failure (doubles with each attempt).
    pub base_delay: Duration,
    /// Upper bound for any single delay, jitter included.
    pub max_delay: Duration,
    /// Upper bound of the random jitter.
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(15),
            max_jitter: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Create a policy with the default schedule and `max_attempts` total attempts.
    ///
    /// A value of zero is treated as one: the operation always runs at least once.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Default::default()
        }
    }

    /// Deterministic part of the schedule with an explicit jitter.
    ///
    /// `failed_attempt` is 1-based: the delay after the first failure uses
    /// `failed_attempt == 1`.
    pub fn backoff_delay(&self, failed_attempt: u32, jitter: Duration) -> Duration {
        let exp = failed_attempt.saturating_sub(1).min(16);
        let delay = self.base_delay.saturating_mul(1 << exp) + jitter;
        delay.min(self.max_delay)
    }

    /// Delay to sleep after `failed_attempt`, with fresh random jitter.
    pub fn delay_for(&self, failed_attempt: u32) -> Duration {
        let max_jitter_ms = self.max_jitter.as_millis() as u64;
        let jitter_ms: u64 = rng().random_range(0..=max_jitter_ms);
        self.backoff_delay(failed_attempt, Duration::from_millis(jitter_ms))
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget is spent.
    ///
    /// # Arguments
    ///
    /// * `label` - Name used in log lines (usually the strategy name)
    /// * `op` - Called with the 1-based attempt number; returns one attempt's future
    ///
    /// # Returns
    ///
    /// The first successful value, together with the attempt number that produced it.
    ///
    /// # Errors
    ///
    /// Returns the error of the last attempt made.
    #[instrument(level = "debug", skip_all, fields(label = %label))]
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<(T, u32), ExtractionError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ExtractionError>>,
    {
        let total_t0 = Instant::now();
        let max = self.max_attempts.max(1);
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let attempt_t0 = Instant::now();
            match op(attempt).await {
                Ok(value) => return Ok((value, attempt)),
                Err(e) => {
                    let attempt_dt = attempt_t0.elapsed();
                    let total_dt = total_t0.elapsed();

                    if !e.is_retryable() {
                        warn!(label, attempt, kind = e.kind(), error = %e, "not retryable; giving up");
                        return Err(e);
                    }
                    if attempt >= max {
                        error!(
                            label,
                            attempt,
                            max,
                            elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                            elapsed_ms_total = total_dt.as_millis() as u64,
                            kind = e.kind(),
                            error = %e,
                            "exhausted retries"
                        );
                        return Err(e);
                    }

                    let delay = self.delay_for(attempt);
                    warn!(
                        label,
                        attempt,
                        max,
                        elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                        ?delay,
                        kind = e.kind(),
                        error = %e,
                        "attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_backoff_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_delay(1, Duration::ZERO), Duration::from_secs(2));
        assert_eq!(policy.backoff_delay(2, Duration::ZERO), Duration::from_secs(4));
        assert_eq!(policy.backoff_delay(3, Duration::ZERO), Duration::from_secs(8));
        assert_eq!(policy.backoff_delay(4, Duration::ZERO), Duration::from_secs(15));
        assert_eq!(policy.backoff_delay(30, Duration::ZERO), Duration::from_secs(15));
    }

    #[test]
    fn test_jitter_never_exceeds_cap() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.backoff_delay(3, Duration::from_millis(999)),
            Duration::from_millis(8999)
        );
        assert_eq!(
            policy.backoff_delay(4, Duration::from_millis(999)),
            Duration::from_secs(15)
        );
    }

    #[test]
    fn test_random_delays_are_bounded_and_non_decreasing_in_base() {
        let policy = RetryPolicy::default();
        for attempt in 1..6 {
            let d = policy.delay_for(attempt);
            assert!(d >= policy.backoff_delay(attempt, Duration::ZERO));
            assert!(d <= policy.max_delay);
        }
    }

    #[test]
    fn test_debug_lists_every_field() {
        let shown = format!("{:?}", RetryPolicy::new(3));
        for field in ["max_attempts", "base_delay", "max_delay", "max_jitter"] {
            assert!(shown.contains(field), "{field} missing from {shown}");
        }
    }

    #[test]
    fn test_zero_attempts_means_one() {
        assert_eq!(RetryPolicy::new(0).max_attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_makes_exactly_max_attempts() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3);
        let res: Result<((), u32), _> = policy
            .run("test", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ExtractionError::FetchFailure("503".into())) }
            })
            .await;
        assert!(matches!(res, Err(ExtractionError::FetchFailure(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_returns_first_success() {
        let policy = RetryPolicy::new(5);
        let (value, attempt) = policy
            .run("test", |n| async move {
                if n < 2 {
                    Err(ExtractionError::EmptyContent { chars: 0 })
                } else {
                    Ok(n * 10)
                }
            })
            .await
            .unwrap();
        assert_eq!(value, 20);
        assert_eq!(attempt, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_invalid_input() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3);
        let res: Result<((), u32), _> = policy
            .run("test", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ExtractionError::InvalidInput("bad".into())) }
            })
            .await;
        assert!(matches!(res, Err(ExtractionError::InvalidInput(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_sleeps_between_attempts() {
        let policy = RetryPolicy::new(2);
        let t0 = tokio::time::Instant::now();
        let _: Result<((), u32), _> = policy
            .run("test", |_| async { Err(ExtractionError::Timeout(Duration::from_secs(1))) })
            .await;
        assert!(t0.elapsed() >= Duration::from_secs(2));
    }
}
