//! Multi-source resolver — provider fallback in priority order.
//!
//! Tries each adapter through the rate limiter and retry policy, normalizes
//! the raw response, and applies the validation predicate. The first
//! snapshot that validates wins; later providers are not invoked. When no
//! source validates, the entity is skipped for this run — absence is never a
//! hard error.

use super::normalize::{normalize, IndicatorTable};
use super::provider::FundamentalsProvider;
use super::rate_limit::RateLimiter;
use super::retry::RetryPolicy;
use super::validate::ValidationRules;
use crate::domain::{EntityId, FinancialSnapshot, Period};
use tracing::{debug, warn};

/// Resolves one (entity, period) against an ordered list of providers.
///
/// Owns its rate limiter and retry policy explicitly; there is no hidden
/// global state, and tests construct isolated instances.
pub struct MultiSourceResolver {
    providers: Vec<Box<dyn FundamentalsProvider>>,
    limiter: RateLimiter,
    retry: RetryPolicy,
    table: IndicatorTable,
    rules: ValidationRules,
}

impl MultiSourceResolver {
    pub fn new(
        providers: Vec<Box<dyn FundamentalsProvider>>,
        limiter: RateLimiter,
        retry: RetryPolicy,
        table: IndicatorTable,
        rules: ValidationRules,
    ) -> Self {
        Self {
            providers,
            limiter,
            retry,
            table,
            rules,
        }
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Fetch, normalize, and validate a snapshot from the first provider
    /// that can produce one. `None` means every source came up empty or
    /// implausible for this period.
    pub fn resolve(&mut self, entity: &EntityId, period: Period) -> Option<FinancialSnapshot> {
        for provider in &self.providers {
            let name = provider.name();
            let limiter = &mut self.limiter;
            let context = format!("{name}:{entity}@{period}");

            let raw = self.retry.run(&context, || {
                limiter.acquire(name);
                provider.fetch(entity, period)
            });
            let Some(raw) = raw else {
                debug!(provider = name, %entity, %period, "no data from provider");
                continue;
            };

            let snapshot = normalize(entity, period, &raw, &self.table);
            match self.rules.check(&snapshot) {
                Ok(()) => {
                    debug!(provider = name, %entity, %period, "snapshot accepted");
                    return Some(snapshot);
                }
                Err(failure) => {
                    warn!(
                        provider = name,
                        %entity,
                        %period,
                        %failure,
                        "snapshot rejected by validation"
                    );
                }
            }
        }
        None
    }

    /// Resolve without the required-indicator / bounds predicate. Used for
    /// prior-period lookups, where a sparse snapshot still contributes to
    /// the comparison tests (each absent side just scores false).
    pub fn resolve_unchecked(
        &mut self,
        entity: &EntityId,
        period: Period,
    ) -> Option<FinancialSnapshot> {
        for provider in &self.providers {
            let name = provider.name();
            let limiter = &mut self.limiter;
            let context = format!("{name}:{entity}@{period}");

            let raw = self.retry.run(&context, || {
                limiter.acquire(name);
                provider.fetch(entity, period)
            });
            if let Some(raw) = raw {
                let snapshot = normalize(entity, period, &raw, &self.table);
                if !snapshot.is_empty() {
                    return Some(snapshot);
                }
            }
        }
        None
    }
}
