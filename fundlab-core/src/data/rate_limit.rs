//! Fixed-window rate limiter, one budget per provider.
//!
//! Tracks (count, window_start) per provider name. When a window's budget is
//! spent, `acquire` sleeps until the window would reset and then proceeds.
//! This is a fixed-window counter, not a token bucket: bursts straddling a
//! window boundary are accepted as a known limitation of the design.
//!
//! The limiter is an explicit instance owned by the resolver, never a
//! process-global. Tests get isolated budgets for free.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::warn;

#[derive(Debug)]
struct Budget {
    count: u32,
    window_start: Instant,
}

/// Per-provider request budget over a rolling fixed window.
#[derive(Debug)]
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    budgets: HashMap<String, Budget>,
}

impl RateLimiter {
    /// `limit` requests per `window`, counted independently per provider.
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            budgets: HashMap::new(),
        }
    }

    /// Default budget: 100 requests per minute, the most conservative of the
    /// upstream sources' published limits.
    pub fn default_provider() -> Self {
        Self::new(100, Duration::from_secs(60))
    }

    /// Take one request slot for `provider`, sleeping until the current
    /// window resets if the budget is spent.
    pub fn acquire(&mut self, provider: &str) {
        let now = Instant::now();
        let budget = self
            .budgets
            .entry(provider.to_string())
            .or_insert_with(|| Budget {
                count: 0,
                window_start: now,
            });

        let elapsed = now.duration_since(budget.window_start);
        if elapsed >= self.window {
            budget.count = 0;
            budget.window_start = now;
        } else if budget.count >= self.limit {
            let wait = self.window - elapsed;
            warn!(
                provider,
                wait_ms = wait.as_millis() as u64,
                "request budget spent, waiting for window reset"
            );
            std::thread::sleep(wait);
            budget.count = 0;
            budget.window_start = Instant::now();
        }

        budget.count += 1;
    }

    /// Requests spent in the current window (diagnostics only).
    pub fn current_count(&self, provider: &str) -> u32 {
        self.budgets.get(provider).map(|b| b.count).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exactly_limit_requests_never_block() {
        let mut rl = RateLimiter::new(5, Duration::from_secs(60));
        let start = Instant::now();
        for _ in 0..5 {
            rl.acquire("src");
        }
        assert!(start.elapsed() < Duration::from_millis(50));
        assert_eq!(rl.current_count("src"), 5);
    }

    #[test]
    fn limit_plus_one_blocks_until_window_reset() {
        let mut rl = RateLimiter::new(2, Duration::from_millis(80));
        let start = Instant::now();
        rl.acquire("src");
        rl.acquire("src");
        rl.acquire("src"); // third request must wait out the window
        assert!(start.elapsed() >= Duration::from_millis(80));
        assert_eq!(rl.current_count("src"), 1);
    }

    #[test]
    fn window_expiry_resets_count() {
        let mut rl = RateLimiter::new(2, Duration::from_millis(20));
        rl.acquire("src");
        rl.acquire("src");
        std::thread::sleep(Duration::from_millis(25));
        let start = Instant::now();
        rl.acquire("src");
        assert!(start.elapsed() < Duration::from_millis(15));
    }

    #[test]
    fn budgets_are_per_provider() {
        let mut rl = RateLimiter::new(1, Duration::from_secs(60));
        let start = Instant::now();
        rl.acquire("a");
        rl.acquire("b"); // separate budget, no wait
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}
