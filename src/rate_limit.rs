//! Sliding-window rate limiter.
//!
//! Admits at most `N` requests within any rolling 60 second window. Callers
//! that would exceed the window are delayed until the oldest admitted request
//! ages out, plus a one second buffer.
//!
//! The window is guarded by an async mutex that is held across the wait, so
//! concurrent callers queue up behind each other instead of all waking at the
//! same instant and overshooting the budget.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};
use tracing::{debug, info};

const WINDOW: Duration = Duration::from_secs(60);
const BUFFER: Duration = Duration::from_secs(1);

#[derive(Debug)]
pub struct RateLimiter {
    max_per_window: usize,
    admitted: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Create a limiter that admits `requests_per_minute` requests per window.
    pub fn new(requests_per_minute: u32) -> Self {
        let max_per_window = requests_per_minute.max(1) as usize;
        Self {
            max_per_window,
            admitted: Mutex::new(VecDeque::with_capacity(max_per_window)),
        }
    }

    pub fn max_per_window(&self) -> usize {
        self.max_per_window
    }

    /// Wait until a request may be issued, then record it.
    pub async fn acquire(&self) {
        let mut admitted = self.admitted.lock().await;
        prune(&mut admitted, Instant::now());

        if admitted.len() >= self.max_per_window {
            if let Some(oldest) = admitted.front().copied() {
                let wait = (WINDOW + BUFFER).saturating_sub(oldest.elapsed());
                info!(
                    wait_ms = wait.as_millis() as u64,
                    in_window = admitted.len(),
                    "Rate limit reached; waiting"
                );
                sleep(wait).await;
                prune(&mut admitted, Instant::now());
            }
        }

        admitted.push_back(Instant::now());
        debug!(in_window = admitted.len(), "Request admitted");
    }

    /// Number of requests admitted within the current window.
    pub async fn in_window(&self) -> usize {
        let mut admitted = self.admitted.lock().await;
        prune(&mut admitted, Instant::now());
        admitted.len()
    }
}

fn prune(admitted: &mut VecDeque<Instant>, now: Instant) {
    while let Some(front) = admitted.front() {
        if now.saturating_duration_since(*front) >= WINDOW {
            admitted.pop_front();
        } else {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_admits_up_to_limit_without_waiting() {
        let limiter = RateLimiter::new(3);
        let t0 = Instant::now();
        for _ in 0..3 {
            limiter.acquire().await;
        }
        assert_eq!(t0.elapsed(), Duration::ZERO);
        assert_eq!(limiter.in_window().await, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_third_request_waits_for_window() {
        let limiter = RateLimiter::new(2);
        let t0 = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(t0.elapsed() >= Duration::from_secs(60));
        assert!(t0.elapsed() <= Duration::from_secs(62));
    }

    #[tokio::test(start_paused = true)]
    async fn test_old_entries_age_out() {
        let limiter = RateLimiter::new(1);
        limiter.acquire().await;
        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(limiter.in_window().await, 0);
        let t0 = Instant::now();
        limiter.acquire().await;
        assert_eq!(t0.elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_zero_is_clamped() {
        assert_eq!(RateLimiter::new(0).max_per_window(), 1);
    }
}
