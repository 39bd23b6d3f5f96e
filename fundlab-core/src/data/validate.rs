//! Snapshot validation — plausibility bounds for normalized snapshots.
//!
//! A snapshot with one implausible field is untrustworthy as a whole, so a
//! single out-of-range value rejects the entire snapshot. This is a
//! deliberate simplicity/robustness tradeoff: partial acceptance would let a
//! provider's garbage row contribute "valid" fields to scoring.

use crate::domain::{FinancialSnapshot, Indicator};

/// Inclusive-upper plausibility range for one indicator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    /// Exclusive lower bound.
    pub min: f64,
    /// Inclusive upper bound.
    pub max: f64,
}

impl Bounds {
    pub fn contains(&self, value: f64) -> bool {
        value > self.min && value <= self.max
    }
}

/// Why a snapshot was rejected. Logged, never escalated.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationFailure {
    MissingRequired(Indicator),
    OutOfRange {
        indicator: Indicator,
        value: f64,
        bounds: Bounds,
    },
}

impl std::fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationFailure::MissingRequired(ind) => {
                write!(f, "required indicator '{ind}' is absent")
            }
            ValidationFailure::OutOfRange {
                indicator,
                value,
                bounds,
            } => write!(
                f,
                "'{indicator}' = {value} outside ({}, {}]",
                bounds.min, bounds.max
            ),
        }
    }
}

/// Validation predicate applied to every normalized snapshot before it is
/// accepted from a provider.
#[derive(Debug, Clone)]
pub struct ValidationRules {
    /// Indicators that must be present. Call-site dependent: the scoring
    /// pipeline requires the profitability inputs, screeners require the
    /// valuation trio.
    pub required: Vec<Indicator>,
    pub price_earnings: Bounds,
    pub price_to_book: Bounds,
    pub return_on_equity: Bounds,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            required: vec![
                Indicator::PriceEarnings,
                Indicator::PriceToBook,
                Indicator::ReturnOnEquity,
            ],
            price_earnings: Bounds { min: 1.0, max: 200.0 },
            price_to_book: Bounds { min: 0.1, max: 20.0 },
            return_on_equity: Bounds { min: 0.1, max: 100.0 },
        }
    }
}

impl ValidationRules {
    /// Rules for the scoring pipeline: the current-period profitability
    /// inputs must be present; valuation ratios are bounds-checked only when
    /// a provider happens to report them.
    pub fn for_scoring() -> Self {
        Self {
            required: vec![Indicator::ReturnOnAssets, Indicator::OperatingCashFlow],
            ..Self::default()
        }
    }

    /// Check a snapshot. `Err` carries the first failure found; one failure
    /// rejects the whole snapshot.
    pub fn check(&self, snapshot: &FinancialSnapshot) -> Result<(), ValidationFailure> {
        for &required in &self.required {
            if snapshot.get(required).is_none() {
                return Err(ValidationFailure::MissingRequired(required));
            }
        }

        let bounded = [
            (Indicator::PriceEarnings, self.price_earnings),
            (Indicator::PriceToBook, self.price_to_book),
            (Indicator::ReturnOnEquity, self.return_on_equity),
        ];
        for (indicator, bounds) in bounded {
            if let Some(value) = snapshot.get(indicator) {
                if !bounds.contains(value) {
                    return Err(ValidationFailure::OutOfRange {
                        indicator,
                        value,
                        bounds,
                    });
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EntityId, Period};

    fn snapshot(values: &[(Indicator, f64)]) -> FinancialSnapshot {
        let mut snap = FinancialSnapshot::new(
            EntityId::parse("000001.SZ").unwrap(),
            Period::Annual(2024),
        );
        for &(ind, v) in values {
            snap.set(ind, v);
        }
        snap
    }

    #[test]
    fn plausible_snapshot_passes() {
        let snap = snapshot(&[
            (Indicator::PriceEarnings, 12.0),
            (Indicator::PriceToBook, 1.4),
            (Indicator::ReturnOnEquity, 15.0),
        ]);
        assert!(ValidationRules::default().check(&snap).is_ok());
    }

    #[test]
    fn missing_required_indicator_rejects() {
        let snap = snapshot(&[
            (Indicator::PriceEarnings, 12.0),
            (Indicator::PriceToBook, 1.4),
        ]);
        assert_eq!(
            ValidationRules::default().check(&snap),
            Err(ValidationFailure::MissingRequired(Indicator::ReturnOnEquity))
        );
    }

    #[test]
    fn implausible_pe_rejects_whole_snapshot() {
        // pe = 250 invalidates everything, including the plausible fields.
        let snap = snapshot(&[
            (Indicator::PriceEarnings, 250.0),
            (Indicator::PriceToBook, 1.4),
            (Indicator::ReturnOnEquity, 15.0),
        ]);
        assert!(matches!(
            ValidationRules::default().check(&snap),
            Err(ValidationFailure::OutOfRange {
                indicator: Indicator::PriceEarnings,
                ..
            })
        ));
    }

    #[test]
    fn bounds_are_exclusive_low_inclusive_high() {
        let b = Bounds { min: 1.0, max: 200.0 };
        assert!(!b.contains(1.0));
        assert!(b.contains(1.01));
        assert!(b.contains(200.0));
        assert!(!b.contains(200.01));
    }

    #[test]
    fn scoring_rules_only_bound_present_ratios() {
        let snap = snapshot(&[
            (Indicator::ReturnOnAssets, 5.0),
            (Indicator::OperatingCashFlow, 2.1),
        ]);
        assert!(ValidationRules::for_scoring().check(&snap).is_ok());
    }
}
