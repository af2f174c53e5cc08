//! Sliding-window request limiter shared by every outbound market-data call.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::error::ApiError;

pub const DEFAULT_MAX_REQUESTS: usize = 25;
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitStatus {
    pub requests: usize,
    pub limit: usize,
    pub remaining: usize,
    pub window_ms: u64,
    /// When the oldest request in the window expires
    pub reset_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    timestamps: Mutex<VecDeque<Instant>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW)
    }
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            timestamps: Mutex::new(VecDeque::with_capacity(max_requests)),
        }
    }

    pub fn check_and_record(&self) -> Result<(), ApiError> {
        self.check_and_record_at(Instant::now())
    }

    /// Record a request at `now`, or fail without recording if the window is full.
    pub fn check_and_record_at(&self, now: Instant) -> Result<(), ApiError> {
        let mut timestamps = self.timestamps.lock();
        self.trim(&mut timestamps, now);

        if timestamps.len() >= self.max_requests {
            let oldest = timestamps.front().copied().unwrap_or(now);
            let wait = self.window.saturating_sub(now.duration_since(oldest));
            let wait_ms = (wait.as_nanos().div_ceil(1_000_000) as u64).max(1);

            tracing::debug!(
                "Rate limit reached ({} requests in {:?}), wait {}ms",
                timestamps.len(),
                self.window,
                wait_ms
            );
            return Err(ApiError::RateLimitExceeded { wait_ms });
        }

        timestamps.push_back(now);
        Ok(())
    }

    pub fn status(&self) -> RateLimitStatus {
        let now = Instant::now();
        let mut timestamps = self.timestamps.lock();
        self.trim(&mut timestamps, now);

        let requests = timestamps.len();
        let reset_at = timestamps.front().and_then(|oldest| {
            let remaining = self.window.saturating_sub(now.duration_since(*oldest));
            chrono::Duration::from_std(remaining)
                .ok()
                .map(|d| Utc::now() + d)
        });

        RateLimitStatus {
            requests,
            limit: self.max_requests,
            remaining: self.max_requests.saturating_sub(requests),
            window_ms: self.window.as_millis() as u64,
            reset_at,
        }
    }

    fn trim(&self, timestamps: &mut VecDeque<Instant>, now: Instant) {
        while let Some(oldest) = timestamps.front() {
            if now.duration_since(*oldest) >= self.window {
                timestamps.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_up_to_limit() {
        let limiter = RateLimiter::default();
        let start = Instant::now();

        for i in 0..25 {
            assert!(
                limiter.check_and_record_at(start + Duration::from_millis(i * 10)).is_ok(),
                "call {} should pass",
                i + 1
            );
        }
    }

    #[test]
    fn test_rejects_26th_and_recovers_after_window() {
        let limiter = RateLimiter::default();
        let start = Instant::now();

        for _ in 0..25 {
            limiter.check_and_record_at(start).unwrap();
        }

        match limiter.check_and_record_at(start + Duration::from_millis(500)) {
            Err(ApiError::RateLimitExceeded { wait_ms }) => {
                assert!(wait_ms > 0);
                assert_eq!(wait_ms, 59_500);
            }
            other => panic!("expected RateLimitExceeded, got {:?}", other),
        }

        // The rejected attempt must not have been recorded
        assert!(limiter.check_and_record_at(start + Duration::from_millis(60_001)).is_ok());
    }

    #[test]
    fn test_window_slides() {
        let limiter = RateLimiter::new(2, Duration::from_secs(10));
        let start = Instant::now();

        limiter.check_and_record_at(start).unwrap();
        limiter.check_and_record_at(start + Duration::from_secs(5)).unwrap();
        assert!(limiter.check_and_record_at(start + Duration::from_secs(9)).is_err());

        // First entry expired, second still counts
        assert!(limiter.check_and_record_at(start + Duration::from_secs(10)).is_ok());
        assert!(limiter.check_and_record_at(start + Duration::from_secs(11)).is_err());
    }

    #[test]
    fn test_status_reports_remaining() {
        let limiter = RateLimiter::new(5, Duration::from_secs(60));
        limiter.check_and_record().unwrap();
        limiter.check_and_record().unwrap();

        let status = limiter.status();
        assert_eq!(status.requests, 2);
        assert_eq!(status.limit, 5);
        assert_eq!(status.remaining, 3);
        assert_eq!(status.window_ms, 60_000);
        assert!(status.reset_at.is_some());
    }

    #[test]
    fn test_status_empty_window() {
        let status = RateLimiter::default().status();
        assert_eq!(status.requests, 0);
        assert!(status.reset_at.is_none());
    }
}
