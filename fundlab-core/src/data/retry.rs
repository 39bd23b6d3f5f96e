//! Bounded retry with jittered delay for provider calls.
//!
//! Wraps any fetch closure. Transport errors (`Err`) are transient and
//! retried; ordinary absence (`Ok(None)`) is final and returned immediately.
//! Exhausted retries degrade to absence with a warning — a fetch failure for
//! one entity must never abort the batch.

use super::provider::FetchError;
use rand::Rng;
use std::time::Duration;
use tracing::warn;

/// Retry policy for a single provider call.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Additional attempts after the first (3 retries = up to 4 calls).
    pub max_retries: u32,
    pub base_delay: Duration,
    /// Add up to one extra `base_delay` of random jitter per sleep, so
    /// retries from consecutive entities don't line up against the provider.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            jitter: false,
        }
    }

    /// Run `op` with up to `max_retries` additional attempts on `Err`.
    ///
    /// Returns the successful value, or `None` once retries are exhausted.
    /// The terminal failure is logged, not escalated.
    pub fn run<T>(
        &self,
        context: &str,
        mut op: impl FnMut() -> Result<Option<T>, FetchError>,
    ) -> Option<T> {
        let mut last_error = None;
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                std::thread::sleep(self.delay());
            }
            match op() {
                Ok(found) => return found,
                Err(e) => {
                    warn!(
                        context,
                        attempt = attempt + 1,
                        max_attempts = self.max_retries + 1,
                        error = %e,
                        "fetch attempt failed"
                    );
                    last_error = Some(e);
                }
            }
        }
        if let Some(e) = last_error {
            warn!(context, error = %e, "retries exhausted, treating as absent");
        }
        None
    }

    fn delay(&self) -> Duration {
        if self.jitter {
            let extra = rand::thread_rng().gen_range(0..=self.base_delay.as_millis() as u64);
            self.base_delay + Duration::from_millis(extra)
        } else {
            self.base_delay
        }
    }
}
