//! Hourly send cap.
//!
//! Sliding window over the instants of successful sends. Timestamps are
//! appended monotonically, so expired ones are always at the front.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

use crate::{Error, Result};

/// Length of the window.
pub const WINDOW: Duration = Duration::from_secs(60 * 60);

/// Sliding one-hour window of successful sends.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    max_per_hour: u32,
    sent: VecDeque<Instant>,
}

impl RateLimiter {
    /// Allows `max_per_hour` sends in any one-hour window.
    #[must_use]
    pub fn new(max_per_hour: u32) -> Self {
        Self {
            max_per_hour,
            sent: VecDeque::new(),
        }
    }

    /// Configured cap.
    #[must_use]
    pub const fn limit(&self) -> u32 {
        self.max_per_hour
    }

    /// Fails when another send at `now` would exceed the cap.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RateLimitExceeded`].
    pub fn check(&mut self, now: Instant) -> Result<()> {
        self.prune(now);
        if self.sent.len() >= self.max_per_hour as usize {
            return Err(Error::RateLimitExceeded {
                limit: self.max_per_hour,
            });
        }
        Ok(())
    }

    /// Records a successful send.
    pub fn record(&mut self, now: Instant) {
        self.prune(now);
        self.sent.push_back(now);
    }

    /// Sends still available at `now`.
    #[must_use]
    pub fn remaining(&mut self, now: Instant) -> u32 {
        self.prune(now);
        let used = u32::try_from(self.sent.len()).unwrap_or(u32::MAX);
        self.max_per_hour.saturating_sub(used)
    }

    fn prune(&mut self, now: Instant) {
        while let Some(&oldest) = self.sent.front() {
            if now.saturating_duration_since(oldest) >= WINDOW {
                self.sent.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn test_blocks_at_limit() {
        let mut limiter = RateLimiter::new(2);
        let now = Instant::now();
        limiter.check(now).unwrap();
        limiter.record(now);
        limiter.check(now).unwrap();
        limiter.record(now);
        assert!(matches!(limiter.check(now), Err(Error::RateLimitExceeded { limit: 2 })));
        assert_eq!(limiter.remaining(now), 0);
    }

    #[test]
    fn test_window_slides() {
        let mut limiter = RateLimiter::new(1);
        let start = Instant::now();
        limiter.record(start);
        assert!(limiter.check(start + Duration::from_secs(3599)).is_err());
        assert!(limiter.check(start + WINDOW).is_ok());
        assert_eq!(limiter.remaining(start + WINDOW), 1);
    }

    #[test]
    fn test_only_recorded_sends_count() {
        let mut limiter = RateLimiter::new(1);
        let now = Instant::now();
        for _ in 0..5 {
            limiter.check(now).unwrap();
        }
        assert_eq!(limiter.remaining(now), 1);
    }

    #[test]
    fn test_zero_limit_blocks_everything() {
        let mut limiter = RateLimiter::new(0);
        assert!(limiter.check(Instant::now()).is_err());
    }
}
