//! Indicator normalizer — provider label vocabularies onto canonical keys.
//!
//! Each provider reports the same metric under a different label ("roa",
//! "return on total assets (%)", "total asset return"). The table maps each
//! canonical indicator to an ordered list of known label variants; matching
//! is exact first, then normalized-substring, and the first hit wins.
//!
//! Normalization is pure and total: it never fails. Unparsable values, and
//! non-positive values for strictly-positive indicators, degrade to "absent"
//! rather than zero — a silent zero would corrupt every downstream boolean
//! comparison.

use super::provider::RawSnapshot;
use crate::domain::{EntityId, FinancialSnapshot, Indicator, Period};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TableError {
    #[error("parse indicator table TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("unknown canonical indicator key '{0}'")]
    UnknownIndicator(String),
}

/// Canonical indicator → ordered label variants.
///
/// Data-driven so new providers are additive: ship a TOML fragment with the
/// new source's labels instead of touching adapter code.
#[derive(Debug, Clone)]
pub struct IndicatorTable {
    variants: BTreeMap<Indicator, Vec<String>>,
}

impl IndicatorTable {
    /// Built-in table covering the Eastmoney, Tushare, and fixture
    /// vocabularies. Variant order is priority order; the more specific
    /// labels come first so substring matching cannot shadow them.
    pub fn builtin() -> Self {
        let mut variants = BTreeMap::new();
        let mut add = |ind: Indicator, labels: &[&str]| {
            variants.insert(ind, labels.iter().map(|s| s.to_string()).collect());
        };

        add(
            Indicator::ReturnOnAssets,
            &["return on total assets", "return on assets", "roa"],
        );
        add(
            Indicator::OperatingCashFlow,
            &["operating cash flow per share", "operating cash flow", "ocfps", "ocf"],
        );
        add(
            Indicator::NetProfit,
            &["net profit (deducted)", "net profit", "profit_dedt", "net income"],
        );
        add(
            Indicator::LeverageRatio,
            &["debt to asset ratio", "debt_to_assets", "debt ratio", "leverage"],
        );
        add(Indicator::CurrentRatio, &["current ratio", "current_ratio"]);
        add(
            Indicator::GrossMargin,
            &["gross profit margin", "grossprofit_margin", "gross margin"],
        );
        add(
            Indicator::AssetTurnover,
            &["total asset turnover", "assets_turn", "asset turnover"],
        );
        add(
            Indicator::Revenue,
            &["total operating revenue", "total revenue", "total_revenue", "revenue"],
        );
        add(
            Indicator::EquityIssuance,
            &["new share issuance", "equity issuance", "shares issued"],
        );
        add(
            Indicator::PriceEarnings,
            &["pe (static)", "price earnings", "p/e", "pe"],
        );
        add(
            Indicator::PriceToBook,
            &["price to book", "p/b", "pb"],
        );
        add(
            Indicator::ReturnOnEquity,
            &["return on equity", "roe"],
        );

        Self { variants }
    }

    /// Parse additional variants from a TOML table of
    /// `canonical_key = ["label", ...]` entries.
    pub fn from_toml(content: &str) -> Result<Self, TableError> {
        let raw: BTreeMap<String, Vec<String>> = toml::from_str(content)?;
        let mut variants = BTreeMap::new();
        for (key, labels) in raw {
            let ind = Indicator::from_key(&key).ok_or(TableError::UnknownIndicator(key))?;
            variants.insert(ind, labels);
        }
        Ok(Self { variants })
    }

    /// Merge another table into this one. Merged variants are appended after
    /// the existing ones, so built-in priorities are preserved.
    pub fn merge(&mut self, other: IndicatorTable) {
        for (ind, labels) in other.variants {
            let slot = self.variants.entry(ind).or_default();
            for label in labels {
                if !slot.iter().any(|l| l.eq_ignore_ascii_case(&label)) {
                    slot.push(label);
                }
            }
        }
    }

    /// Find the raw key matching an indicator, if any.
    ///
    /// For each variant in priority order: an exact normalized match wins,
    /// otherwise the first raw key containing the variant as a substring.
    fn match_key<'a>(&self, indicator: Indicator, keys: &[(&'a str, String)]) -> Option<&'a str> {
        let variants = self.variants.get(&indicator)?;
        for variant in variants {
            let v = normalize_label(variant);
            if let Some((raw, _)) = keys.iter().find(|(_, norm)| *norm == v) {
                return Some(raw);
            }
            if let Some((raw, _)) = keys.iter().find(|(_, norm)| norm.contains(&v)) {
                return Some(raw);
            }
        }
        None
    }
}

fn normalize_label(label: &str) -> String {
    label.trim().to_ascii_lowercase()
}

/// Coerce a loosely typed provider value to f64.
///
/// Accepts JSON numbers and numeric strings (with optional `%` suffix and
/// thousands separators). Placeholder strings ("--", "-", "", "None", "nan")
/// and everything else parse to `None`.
pub fn parse_numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => {
            let trimmed = s.trim().trim_end_matches('%').replace(',', "");
            if trimmed.is_empty() {
                return None;
            }
            match trimmed.parse::<f64>() {
                Ok(f) if f.is_finite() => Some(f),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Map one raw provider table onto a normalized snapshot.
///
/// Pure and total: any failure for a single field degrades to that
/// indicator being absent.
pub fn normalize(
    entity: &EntityId,
    period: Period,
    raw: &RawSnapshot,
    table: &IndicatorTable,
) -> FinancialSnapshot {
    let mut snapshot = FinancialSnapshot::new(entity.clone(), period);
    snapshot.name = raw.name.clone();
    snapshot.industry = raw.industry.clone();

    let keys: Vec<(&str, String)> = raw
        .fields
        .keys()
        .map(|k| (k.as_str(), normalize_label(k)))
        .collect();

    for indicator in Indicator::ALL {
        let Some(key) = table.match_key(indicator, &keys) else {
            continue;
        };
        let Some(value) = raw.fields.get(key).and_then(parse_numeric) else {
            continue;
        };
        if indicator.strictly_positive() && value <= 0.0 {
            continue;
        }
        snapshot.set(indicator, value);
    }

    snapshot
}
