//! Eastmoney quote-API provider.
//!
//! Fetches the latest fundamentals snapshot from the push2 `qt/stock/get`
//! endpoint. The API speaks numeric field codes (`f178` is return on total
//! assets, `f116` the debt ratio); this adapter maps codes to descriptive
//! labels and leaves the canonical mapping to the normalizer.
//!
//! The endpoint only carries the most recent reporting period, so any other
//! requested period answers `Ok(None)` and the resolver falls through to a
//! source with historical coverage.

use super::provider::{FetchError, FundamentalsProvider, RawSnapshot};
use crate::domain::{EntityId, Market, Period};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

/// Field codes requested from the endpoint, with the label each one carries
/// in the raw snapshot. `f57`/`f58`/`f127` (code, name, industry) are handled
/// separately.
const FIELD_LABELS: &[(&str, &str)] = &[
    ("f162", "eps"),
    ("f163", "pe (static)"),
    ("f164", "pe (ttm)"),
    ("f167", "price to book"),
    ("f168", "price to sales"),
    ("f173", "book value per share"),
    ("f177", "return on equity (%)"),
    ("f178", "return on total assets (%)"),
    ("f184", "gross profit margin (%)"),
    ("f185", "net profit margin (%)"),
    ("f186", "operating margin (%)"),
    ("f187", "total asset turnover"),
    ("f188", "dividend yield (%)"),
    ("f116", "debt to asset ratio (%)"),
    ("f277", "current ratio"),
    ("f183", "total operating revenue"),
    ("f105", "net profit"),
];

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    data: Option<BTreeMap<String, Value>>,
}

/// Eastmoney push2 fundamentals provider.
pub struct EastmoneyProvider {
    client: reqwest::blocking::Client,
    base_url: String,
    /// The single period this endpoint can answer for.
    latest: Period,
}

impl EastmoneyProvider {
    pub const NAME: &'static str = "eastmoney";

    pub fn new(latest: Period) -> Self {
        Self::with_base_url("https://push2.eastmoney.com/api", latest)
    }

    /// Base URL override for tests against a local stub server.
    pub fn with_base_url(base_url: impl Into<String>, latest: Period) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            base_url: base_url.into(),
            latest,
        }
    }

    /// `secid` prefix: 1 for Shanghai listings, 0 for Shenzhen.
    fn secid(entity: &EntityId) -> String {
        let prefix = match entity.market() {
            Market::Shanghai => "1",
            Market::Shenzhen => "0",
        };
        format!("{prefix}.{}", entity.code())
    }

    fn quote_url(&self, entity: &EntityId) -> String {
        let mut fields: Vec<&str> = vec!["f57", "f58", "f127"];
        fields.extend(FIELD_LABELS.iter().map(|(code, _)| *code));
        format!(
            "{}/qt/stock/get?secid={}&fields={}",
            self.base_url,
            Self::secid(entity),
            fields.join(",")
        )
    }

    fn parse(data: BTreeMap<String, Value>) -> RawSnapshot {
        let mut raw = RawSnapshot::new();
        raw.name = data
            .get("f58")
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        raw.industry = data
            .get("f127")
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        for (code, label) in FIELD_LABELS {
            if let Some(value) = data.get(*code) {
                if !value.is_null() {
                    raw.fields.insert((*label).to_string(), value.clone());
                }
            }
        }
        raw
    }
}

impl FundamentalsProvider for EastmoneyProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn fetch(&self, entity: &EntityId, period: Period) -> Result<Option<RawSnapshot>, FetchError> {
        if period != self.latest {
            return Ok(None);
        }

        let url = self.quote_url(entity);
        let resp = self.client.get(&url).send().map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(e.to_string())
            } else {
                FetchError::NetworkUnreachable(e.to_string())
            }
        })?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(FetchError::RateLimited {
                retry_after_secs: retry_after,
            });
        }
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                entity: entity.to_string(),
            });
        }

        let quote: QuoteResponse = resp.json().map_err(|e| {
            FetchError::ResponseFormatChanged(format!("decode quote for {entity}: {e}"))
        })?;

        // `data: null` is the API's way of saying "no such listing".
        let Some(data) = quote.data else {
            return Ok(None);
        };
        let raw = Self::parse(data);
        if raw.is_empty() {
            return Ok(None);
        }
        Ok(Some(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn secid_prefix_by_market() {
        let sh = EntityId::parse("600519.SH").unwrap();
        let sz = EntityId::parse("000001.SZ").unwrap();
        assert_eq!(EastmoneyProvider::secid(&sh), "1.600519");
        assert_eq!(EastmoneyProvider::secid(&sz), "0.000001");
    }

    #[test]
    fn parse_maps_codes_to_labels() {
        let mut data = BTreeMap::new();
        data.insert("f58".to_string(), json!("Kweichow Moutai"));
        data.insert("f127".to_string(), json!("Beverages"));
        data.insert("f178".to_string(), json!(23.4));
        data.insert("f116".to_string(), json!("17.9"));
        data.insert("f184".to_string(), Value::Null);

        let raw = EastmoneyProvider::parse(data);
        assert_eq!(raw.name.as_deref(), Some("Kweichow Moutai"));
        assert_eq!(raw.industry.as_deref(), Some("Beverages"));
        assert_eq!(raw.fields.get("return on total assets (%)"), Some(&json!(23.4)));
        assert_eq!(raw.fields.get("debt to asset ratio (%)"), Some(&json!("17.9")));
        assert!(!raw.fields.contains_key("gross profit margin (%)"));
    }

    #[test]
    fn non_latest_period_is_ordinary_absence() {
        let provider = EastmoneyProvider::new(Period::Annual(2024));
        let entity = EntityId::parse("600519.SH").unwrap();
        let result = provider.fetch(&entity, Period::Annual(2023));
        assert!(matches!(result, Ok(None)));
    }
}
