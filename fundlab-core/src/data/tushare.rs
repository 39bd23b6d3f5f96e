//! Tushare HTTP API provider.
//!
//! Single POST endpoint; the `api_name` field selects the dataset. We pull
//! `fina_indicator` for the requested period and, best-effort, `daily_basic`
//! for the valuation ratios. Responses arrive as a column-name array plus
//! row arrays, zipped here into the raw label→value table.
//!
//! Requires an API token; the runner only wires this provider in when one is
//! configured.

use super::provider::{FetchError, FundamentalsProvider, RawSnapshot};
use crate::domain::{EntityId, Period};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct ApiResponse {
    code: i64,
    msg: Option<String>,
    data: Option<ApiData>,
}

#[derive(Debug, Deserialize)]
struct ApiData {
    fields: Vec<String>,
    items: Vec<Vec<Value>>,
}

/// Tushare fundamentals provider.
pub struct TushareProvider {
    client: reqwest::blocking::Client,
    endpoint: String,
    token: String,
}

impl TushareProvider {
    pub const NAME: &'static str = "tushare";

    pub fn new(token: impl Into<String>) -> Self {
        Self::with_endpoint("http://api.waditu.com", token)
    }

    /// Endpoint override for tests against a local stub server.
    pub fn with_endpoint(endpoint: impl Into<String>, token: impl Into<String>) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            endpoint: endpoint.into(),
            token: token.into(),
        }
    }

    fn call(&self, api_name: &str, params: Value) -> Result<Option<ApiData>, FetchError> {
        let body = json!({
            "api_name": api_name,
            "token": self.token,
            "params": params,
            "fields": "",
        });

        let resp = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout(e.to_string())
                } else {
                    FetchError::NetworkUnreachable(e.to_string())
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                entity: api_name.to_string(),
            });
        }

        let api: ApiResponse = resp.json().map_err(|e| {
            FetchError::ResponseFormatChanged(format!("decode {api_name}: {e}"))
        })?;

        if api.code != 0 {
            let msg = api.msg.unwrap_or_default();
            let lowered = msg.to_ascii_lowercase();
            if lowered.contains("token") {
                return Err(FetchError::AuthenticationRequired(msg));
            }
            if lowered.contains("每分钟") || lowered.contains("too many") {
                return Err(FetchError::RateLimited { retry_after_secs: 60 });
            }
            return Err(FetchError::ResponseFormatChanged(format!(
                "{api_name} returned code {}: {msg}",
                api.code
            )));
        }

        Ok(api.data.filter(|d| !d.items.is_empty()))
    }

    /// Zip the first result row into the raw field table.
    fn merge_row(raw: &mut RawSnapshot, data: &ApiData) {
        let Some(row) = data.items.first() else {
            return;
        };
        for (field, value) in data.fields.iter().zip(row.iter()) {
            if !value.is_null() {
                raw.fields.insert(field.clone(), value.clone());
            }
        }
    }
}

impl FundamentalsProvider for TushareProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn fetch(&self, entity: &EntityId, period: Period) -> Result<Option<RawSnapshot>, FetchError> {
        let mut raw = RawSnapshot::new();

        let indicators = self.call(
            "fina_indicator",
            json!({ "ts_code": entity.as_str(), "period": period.end_date() }),
        )?;
        match indicators {
            Some(data) => Self::merge_row(&mut raw, &data),
            None => return Ok(None),
        }

        // Valuation ratios live in daily_basic; absence there must not sink
        // the fundamentals row we already have.
        match self.call("daily_basic", json!({ "ts_code": entity.as_str() })) {
            Ok(Some(data)) => Self::merge_row(&mut raw, &data),
            Ok(None) => {}
            Err(e) => debug!(%entity, error = %e, "daily_basic unavailable, keeping fina_indicator row"),
        }

        Ok(Some(raw))
    }
}
