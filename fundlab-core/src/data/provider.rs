//! Provider trait and structured fetch errors.
//!
//! The FundamentalsProvider trait abstracts over external data sources
//! (Eastmoney, Tushare, local CSV fixtures) so the resolver can try them in
//! priority order and tests can substitute mocks.
//!
//! The contract distinguishes two shapes of "no data":
//! - `Ok(None)` — ordinary absence (unlisted entity, period not covered by
//!   this source). Never retried.
//! - `Err(FetchError)` — transport-level failure (timeout, malformed
//!   response). The retry policy treats these as transient.

use crate::domain::{EntityId, Period};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Structured error types for provider fetches.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("provider '{0}' is not configured")]
    NotConfigured(String),

    #[error("http status {status} for {entity}")]
    HttpStatus { status: u16, entity: String },
}

/// Raw key-value table from one provider response, before normalization.
///
/// Keys are provider-specific labels; values are loosely typed (numbers or
/// strings, whatever the wire format carried). The normalizer owns the
/// mapping onto canonical indicators.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSnapshot {
    pub name: Option<String>,
    pub industry: Option<String>,
    pub fields: BTreeMap<String, Value>,
}

impl RawSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, label: impl Into<String>, value: Value) -> Self {
        self.fields.insert(label.into(), value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Trait for fundamentals data sources.
///
/// Implementations own request construction and response parsing for one
/// external source. The rate limiter and retry policy sit above this trait —
/// providers don't sleep or retry on their own.
pub trait FundamentalsProvider: Send + Sync {
    /// Short stable name, used for rate-limit bookkeeping and logs.
    fn name(&self) -> &str;

    /// Fetch the raw fundamentals table for one entity at one period.
    fn fetch(&self, entity: &EntityId, period: Period) -> Result<Option<RawSnapshot>, FetchError>;
}
