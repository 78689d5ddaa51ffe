//! REST Rate Limiting
//!
//! Sliding-window limiter: at most `max_calls` acquisitions inside any
//! `period`. An acquisition past the limit waits until the oldest call in the
//! window expires.
//!
//! Limiters are explicit values. Share one `RateLimits` between several API
//! clients to throttle them jointly.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Default GET limit per second.
pub const DEFAULT_GET_LIMIT: usize = 6;

/// Default POST/PUT/DELETE limit per second.
pub const DEFAULT_POST_LIMIT: usize = 1;

/// Sliding-window rate limiter.
#[derive(Debug)]
pub struct RateLimiter {
    max_calls: usize,
    period: Duration,
    calls: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Create a limiter allowing `max_calls` per `period`.
    ///
    /// A `max_calls` of zero is treated as one.
    #[must_use]
    pub fn new(max_calls: usize, period: Duration) -> Self {
        let max_calls = max_calls.max(1);
        Self {
            max_calls,
            period,
            calls: Mutex::new(VecDeque::with_capacity(max_calls)),
        }
    }

    /// Create a limiter allowing `max_calls` per second.
    #[must_use]
    pub fn per_second(max_calls: usize) -> Self {
        Self::new(max_calls, Duration::from_secs(1))
    }

    /// Wait until a call is permitted, then record it.
    ///
    /// The window lock is held across the wait so concurrent callers queue
    /// in arrival order.
    pub async fn acquire(&self) {
        let mut calls = self.calls.lock().await;

        let now = Instant::now();
        evict_expired(&mut calls, now, self.period);

        if calls.len() >= self.max_calls
            && let Some(&oldest) = calls.front()
        {
            let ready_at = oldest + self.period;
            tracing::trace!(
                wait_ms = ready_at.saturating_duration_since(now).as_millis(),
                "Rate limit reached, waiting"
            );
            tokio::time::sleep_until(ready_at).await;
            evict_expired(&mut calls, Instant::now(), self.period);
        }

        calls.push_back(Instant::now());
    }

    /// Maximum calls per period.
    #[must_use]
    pub const fn max_calls(&self) -> usize {
        self.max_calls
    }

    /// Window length.
    #[must_use]
    pub const fn period(&self) -> Duration {
        self.period
    }
}

fn evict_expired(calls: &mut VecDeque<Instant>, now: Instant, period: Duration) {
    while let Some(&front) = calls.front() {
        if now.saturating_duration_since(front) >= period {
            calls.pop_front();
        } else {
            break;
        }
    }
}

/// GET and POST limiters used by the private API.
#[derive(Debug, Clone)]
pub struct RateLimits {
    /// Limiter for GET requests.
    pub get: Arc<RateLimiter>,
    /// Limiter for POST, PUT, and DELETE requests.
    pub post: Arc<RateLimiter>,
}

impl RateLimits {
    /// Create limits with the given per-second budgets.
    #[must_use]
    pub fn new(get_per_second: usize, post_per_second: usize) -> Self {
        Self {
            get: Arc::new(RateLimiter::per_second(get_per_second)),
            post: Arc::new(RateLimiter::per_second(post_per_second)),
        }
    }
}

impl Default for RateLimits {
    fn default() -> Self {
        Self::new(DEFAULT_GET_LIMIT, DEFAULT_POST_LIMIT)
    }
}
