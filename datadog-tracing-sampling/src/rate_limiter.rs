// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// A token-bucket rate limiter with fractional carry-over.
///
/// The bucket starts full, refills continuously at `refill_per_second`, and
/// `allow` admits a request by deducting one whole token. A rolling
/// one-second window tracks allowed vs total decisions so that
/// [`RateLimiter::effective_rate`] can be reported on sampled spans.
pub struct RateLimiter {
    inner: Mutex<State>,
}

struct State {
    refill_per_second: f64,
    capacity: f64,
    tokens: f64,
    last_refill: Instant,
    window_start: Option<Instant>,
    allowed_in_window: u64,
    total_in_window: u64,
    prev_window_rate: Option<f64>,
}

const WINDOW: Duration = Duration::from_secs(1);

impl RateLimiter {
    /// `per_second` must be finite and greater than zero; this is enforced
    /// during configuration finalization. The bucket capacity is
    /// `max(per_second, 1)` so that sub-1 rates still admit a request once
    /// enough time has passed.
    pub fn new(per_second: f64) -> Self {
        let capacity = per_second.max(1.0);
        RateLimiter {
            inner: Mutex::new(State {
                refill_per_second: per_second,
                capacity,
                tokens: capacity,
                last_refill: Instant::now(),
                window_start: None,
                allowed_in_window: 0,
                total_in_window: 0,
                prev_window_rate: None,
            }),
        }
    }

    /// Returns whether this request is admitted, consuming one token if so.
    pub fn allow(&self) -> bool {
        self.allow_at(Instant::now())
    }

    pub(crate) fn allow_at(&self, now: Instant) -> bool {
        let mut state = self.inner.lock().unwrap();

        let elapsed = now.saturating_duration_since(state.last_refill);
        state.tokens = (state.tokens + elapsed.as_secs_f64() * state.refill_per_second)
            .min(state.capacity);
        state.last_refill = now;

        let allowed = if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        };

        match state.window_start {
            None => state.window_start = Some(now),
            Some(start) => {
                if now.saturating_duration_since(start) >= WINDOW {
                    state.prev_window_rate = Some(window_rate(&state));
                    state.allowed_in_window = 0;
                    state.total_in_window = 0;
                    state.window_start = Some(now);
                }
            }
        }
        if allowed {
            state.allowed_in_window += 1;
        }
        state.total_in_window += 1;

        allowed
    }

    /// The share of recent requests that were admitted, averaged with the
    /// previous window once one exists. 1.0 before any request is seen.
    pub fn effective_rate(&self) -> f64 {
        let state = self.inner.lock().unwrap();
        match state.prev_window_rate {
            Some(prev) => (window_rate(&state) + prev) / 2.0,
            None => window_rate(&state),
        }
    }
}

fn window_rate(state: &State) -> f64 {
    if state.total_in_window == 0 {
        return 1.0;
    }
    state.allowed_in_window as f64 / state.total_in_window as f64
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.lock().unwrap();
        f.debug_struct("RateLimiter")
            .field("refill_per_second", &state.refill_per_second)
            .field("tokens", &state.tokens)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_up_to_capacity() {
        let limiter = RateLimiter::new(5.0);
        let now = Instant::now();
        for _ in 0..5 {
            assert!(limiter.allow_at(now));
        }
        assert!(!limiter.allow_at(now));
    }

    #[test]
    fn test_refill_with_fractional_carry_over() {
        let limiter = RateLimiter::new(5.0);
        let start = Instant::now();
        for _ in 0..5 {
            assert!(limiter.allow_at(start));
        }
        // 0.1 s at 5 tokens/s is half a token: not yet enough.
        assert!(!limiter.allow_at(start + Duration::from_millis(100)));
        // Another 0.1 s carries the fraction over the threshold.
        assert!(limiter.allow_at(start + Duration::from_millis(200)));
        assert!(!limiter.allow_at(start + Duration::from_millis(200)));
    }

    #[test]
    fn test_sub_one_rate() {
        let limiter = RateLimiter::new(0.5);
        let start = Instant::now();
        assert!(limiter.allow_at(start));
        assert!(!limiter.allow_at(start + Duration::from_secs(1)));
        assert!(limiter.allow_at(start + Duration::from_secs(2)));
    }

    #[test]
    fn test_tokens_clamped_to_capacity() {
        let limiter = RateLimiter::new(2.0);
        let start = Instant::now();
        // A long idle period must not build up more than `capacity` tokens.
        let later = start + Duration::from_secs(60);
        assert!(limiter.allow_at(later));
        assert!(limiter.allow_at(later));
        assert!(!limiter.allow_at(later));
    }

    #[test]
    fn test_effective_rate_converges() {
        let limiter = RateLimiter::new(50.0);
        let now = Instant::now();
        let mut allowed = 0;
        for _ in 0..100 {
            if limiter.allow_at(now) {
                allowed += 1;
            }
        }
        assert_eq!(allowed, 50);
        let rate = limiter.effective_rate();
        assert!((0.45..=0.55).contains(&rate), "rate was {rate}");
    }

    #[test]
    fn test_effective_rate_before_any_request() {
        let limiter = RateLimiter::new(10.0);
        assert_eq!(limiter.effective_rate(), 1.0);
    }

    #[test]
    fn test_effective_rate_averages_windows() {
        let limiter = RateLimiter::new(1.0);
        let start = Instant::now();
        // First window: one allowed, one denied.
        assert!(limiter.allow_at(start));
        assert!(!limiter.allow_at(start));
        // Second window: one allowed, one denied.
        let later = start + Duration::from_secs(2);
        assert!(limiter.allow_at(later));
        assert!(!limiter.allow_at(later));
        let rate = limiter.effective_rate();
        assert!((rate - 0.5).abs() < 1e-9, "rate was {rate}");
    }
}
