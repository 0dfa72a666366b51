//! Fixed-window rate limiting for the control API.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

struct Window {
    count: u32,
    started: Instant,
}

/// Counts requests within a fixed window. Clones share state, so one
/// limiter covers every route handler.
#[derive(Clone)]
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    state: Arc<Mutex<Window>>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            state: Arc::new(Mutex::new(Window {
                count: 0,
                started: Instant::now(),
            })),
        }
    }

    /// Record one request. Returns false when the window's budget is spent.
    pub fn check(&self) -> bool {
        let mut window = self.state.lock().unwrap_or_else(|p| p.into_inner());
        let now = Instant::now();
        if now.duration_since(window.started) >= self.window {
            window.count = 0;
            window.started = now;
        }
        if window.count >= self.max_requests {
            return false;
        }
        window.count += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allows_up_to_limit() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        assert!(limiter.check());
        assert!(limiter.check());
        assert!(limiter.check());
        assert!(!limiter.check());
    }

    #[test]
    fn test_window_resets() {
        let limiter = RateLimiter::new(1, Duration::from_millis(10));
        assert!(limiter.check());
        assert!(!limiter.check());
        std::thread::sleep(Duration::from_millis(15));
        assert!(limiter.check());
    }

    #[test]
    fn test_clones_share_budget() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        let other = limiter.clone();
        assert!(limiter.check());
        assert!(other.check());
        assert!(!limiter.check());
    }
}
