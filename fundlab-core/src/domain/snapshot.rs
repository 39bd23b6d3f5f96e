//! Canonical indicators and normalized per-period snapshots.
//!
//! Providers speak wildly different field vocabularies; the normalizer maps
//! them onto the `Indicator` enum. A snapshot never stores a defaulted zero:
//! an indicator a provider did not report is simply absent, and every
//! downstream comparison treats absence as unknown.

use super::{EntityId, Period};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Provider-independent name for a financial metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Indicator {
    ReturnOnAssets,
    OperatingCashFlow,
    NetProfit,
    LeverageRatio,
    CurrentRatio,
    GrossMargin,
    AssetTurnover,
    Revenue,
    /// Non-zero when the provider reports new share issuance for the period.
    EquityIssuance,
    PriceEarnings,
    PriceToBook,
    ReturnOnEquity,
}

impl Indicator {
    /// All canonical indicators, in the column order of the persisted table.
    pub const ALL: [Indicator; 12] = [
        Indicator::ReturnOnAssets,
        Indicator::OperatingCashFlow,
        Indicator::NetProfit,
        Indicator::LeverageRatio,
        Indicator::CurrentRatio,
        Indicator::GrossMargin,
        Indicator::AssetTurnover,
        Indicator::Revenue,
        Indicator::EquityIssuance,
        Indicator::PriceEarnings,
        Indicator::PriceToBook,
        Indicator::ReturnOnEquity,
    ];

    /// Stable snake_case key used in config files and CSV headers.
    pub fn key(&self) -> &'static str {
        match self {
            Indicator::ReturnOnAssets => "return_on_assets",
            Indicator::OperatingCashFlow => "operating_cash_flow",
            Indicator::NetProfit => "net_profit",
            Indicator::LeverageRatio => "leverage_ratio",
            Indicator::CurrentRatio => "current_ratio",
            Indicator::GrossMargin => "gross_margin",
            Indicator::AssetTurnover => "asset_turnover",
            Indicator::Revenue => "revenue",
            Indicator::EquityIssuance => "equity_issuance",
            Indicator::PriceEarnings => "price_earnings",
            Indicator::PriceToBook => "price_to_book",
            Indicator::ReturnOnEquity => "return_on_equity",
        }
    }

    /// Indicators that are meaningless at or below zero (valuation ratios).
    /// Non-positive values from a provider degrade to absent rather than
    /// poisoning downstream comparisons.
    pub fn strictly_positive(&self) -> bool {
        matches!(
            self,
            Indicator::PriceEarnings | Indicator::PriceToBook | Indicator::ReturnOnEquity
        )
    }

    pub fn from_key(key: &str) -> Option<Indicator> {
        Indicator::ALL.iter().copied().find(|i| i.key() == key)
    }
}

impl fmt::Display for Indicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Normalized indicator values for one entity at one reporting period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialSnapshot {
    pub entity: EntityId,
    pub period: Period,
    /// Display name as reported by the provider, if any.
    pub name: Option<String>,
    pub industry: Option<String>,
    pub values: BTreeMap<Indicator, f64>,
}

impl FinancialSnapshot {
    pub fn new(entity: EntityId, period: Period) -> Self {
        Self {
            entity,
            period,
            name: None,
            industry: None,
            values: BTreeMap::new(),
        }
    }

    /// Value of an indicator, or `None` when the provider did not report it.
    pub fn get(&self, indicator: Indicator) -> Option<f64> {
        self.values.get(&indicator).copied()
    }

    pub fn set(&mut self, indicator: Indicator, value: f64) {
        self.values.insert(indicator, value);
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
