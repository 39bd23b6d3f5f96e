//! Piotroski F-Score engine.
//!
//! Nine independent binary tests over a current-period snapshot and an
//! optional prior-period snapshot, summed into a score in [0, 9]. The
//! per-test outcome vector is recorded for auditability.
//!
//! Evaluation is deterministic and total: an indicator absent on either
//! side of a test makes that test false — never true, never an error.

use crate::domain::{EntityId, FinancialSnapshot, Indicator, Period};
use serde::{Deserialize, Serialize};

/// The nine score tests, in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreTest {
    PositiveRoa,
    PositiveOperatingCashFlow,
    RoaImproved,
    CashFlowExceedsProfit,
    LeverageDecreased,
    CurrentRatioImproved,
    NoNewEquity,
    GrossMarginImproved,
    AssetTurnoverImproved,
}

impl ScoreTest {
    pub const ALL: [ScoreTest; 9] = [
        ScoreTest::PositiveRoa,
        ScoreTest::PositiveOperatingCashFlow,
        ScoreTest::RoaImproved,
        ScoreTest::CashFlowExceedsProfit,
        ScoreTest::LeverageDecreased,
        ScoreTest::CurrentRatioImproved,
        ScoreTest::NoNewEquity,
        ScoreTest::GrossMarginImproved,
        ScoreTest::AssetTurnoverImproved,
    ];

    /// Stable snake_case key used in the persisted score table header.
    pub fn key(&self) -> &'static str {
        match self {
            ScoreTest::PositiveRoa => "positive_roa",
            ScoreTest::PositiveOperatingCashFlow => "positive_operating_cash_flow",
            ScoreTest::RoaImproved => "roa_improved",
            ScoreTest::CashFlowExceedsProfit => "cash_flow_exceeds_profit",
            ScoreTest::LeverageDecreased => "leverage_decreased",
            ScoreTest::CurrentRatioImproved => "current_ratio_improved",
            ScoreTest::NoNewEquity => "no_new_equity",
            ScoreTest::GrossMarginImproved => "gross_margin_improved",
            ScoreTest::AssetTurnoverImproved => "asset_turnover_improved",
        }
    }
}

/// Result of scoring one entity for one period. Immutable after creation;
/// a re-run overwrites with last-write-wins semantics in the result store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub entity: EntityId,
    pub period: Period,
    pub name: Option<String>,
    pub industry: Option<String>,
    /// Total score, always in [0, 9].
    pub score: u8,
    /// Per-test outcomes, indexed by `ScoreTest::ALL` order.
    pub outcomes: [bool; 9],
}

impl ScoreResult {
    pub fn outcome(&self, test: ScoreTest) -> bool {
        let index = ScoreTest::ALL
            .iter()
            .position(|t| *t == test)
            .unwrap_or(0);
        self.outcomes[index]
    }
}

/// Both sides present and the comparison holds; anything absent is false.
fn improved(
    current: &FinancialSnapshot,
    prior: Option<&FinancialSnapshot>,
    indicator: Indicator,
    cmp: impl Fn(f64, f64) -> bool,
) -> bool {
    match (current.get(indicator), prior.and_then(|p| p.get(indicator))) {
        (Some(cur), Some(prev)) => cmp(cur, prev),
        _ => false,
    }
}

/// Evaluate the nine tests for one entity.
///
/// `prior` may be `None` (newly listed entity, or no source covers the
/// prior period): the five comparison tests then evaluate false and the
/// maximum attainable score is 4.
pub fn evaluate(current: &FinancialSnapshot, prior: Option<&FinancialSnapshot>) -> ScoreResult {
    let get = |ind| current.get(ind);

    let positive_roa = matches!(get(Indicator::ReturnOnAssets), Some(v) if v > 0.0);
    let positive_ocf = matches!(get(Indicator::OperatingCashFlow), Some(v) if v > 0.0);
    let roa_improved = improved(current, prior, Indicator::ReturnOnAssets, |c, p| c > p);
    let accruals = match (get(Indicator::OperatingCashFlow), get(Indicator::NetProfit)) {
        (Some(ocf), Some(profit)) => ocf > profit,
        _ => false,
    };
    let leverage_decreased = improved(current, prior, Indicator::LeverageRatio, |c, p| c < p);
    let current_ratio_improved = improved(current, prior, Indicator::CurrentRatio, |c, p| c > p);
    // No detection logic exists upstream for share issuance; the flag is an
    // explicit opt-out. Absent flag means the test passes.
    let no_new_equity = !matches!(get(Indicator::EquityIssuance), Some(v) if v > 0.0);
    let gross_margin_improved = improved(current, prior, Indicator::GrossMargin, |c, p| c > p);
    let asset_turnover_improved = improved(current, prior, Indicator::AssetTurnover, |c, p| c > p);

    let outcomes = [
        positive_roa,
        positive_ocf,
        roa_improved,
        accruals,
        leverage_decreased,
        current_ratio_improved,
        no_new_equity,
        gross_margin_improved,
        asset_turnover_improved,
    ];
    let score = outcomes.iter().filter(|&&b| b).count() as u8;

    ScoreResult {
        entity: current.entity.clone(),
        period: current.period,
        name: current.name.clone(),
        industry: current.industry.clone(),
        score,
        outcomes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn snapshot(period: Period, values: &[(Indicator, f64)]) -> FinancialSnapshot {
        let mut snap =
            FinancialSnapshot::new(EntityId::parse("600519.SH").unwrap(), period);
        for &(ind, v) in values {
            snap.set(ind, v);
        }
        snap
    }

    #[test]
    fn all_nine_tests_pass() {
        let current = snapshot(
            Period::Annual(2024),
            &[
                (Indicator::ReturnOnAssets, 0.05),
                (Indicator::OperatingCashFlow, 120.0),
                (Indicator::NetProfit, 100.0),
                (Indicator::LeverageRatio, 0.4),
                (Indicator::CurrentRatio, 1.8),
                (Indicator::GrossMargin, 0.4),
                (Indicator::AssetTurnover, 0.9),
            ],
        );
        let prior = snapshot(
            Period::Annual(2023),
            &[
                (Indicator::ReturnOnAssets, 0.03),
                (Indicator::LeverageRatio, 0.5),
                (Indicator::CurrentRatio, 1.5),
                (Indicator::GrossMargin, 0.35),
                (Indicator::AssetTurnover, 0.8),
            ],
        );

        let result = evaluate(&current, Some(&prior));
        assert_eq!(result.score, 9);
        assert!(result.outcomes.iter().all(|&b| b));
    }

    #[test]
    fn missing_prior_caps_score_at_four() {
        let current = snapshot(
            Period::Annual(2024),
            &[
                (Indicator::ReturnOnAssets, 9.9),
                (Indicator::OperatingCashFlow, 500.0),
                (Indicator::NetProfit, 100.0),
                (Indicator::LeverageRatio, 0.1),
                (Indicator::CurrentRatio, 3.0),
                (Indicator::GrossMargin, 0.9),
                (Indicator::AssetTurnover, 2.0),
            ],
        );
        let result = evaluate(&current, None);
        assert_eq!(result.score, 4);
        assert!(!result.outcome(ScoreTest::RoaImproved));
        assert!(!result.outcome(ScoreTest::LeverageDecreased));
        assert!(!result.outcome(ScoreTest::CurrentRatioImproved));
        assert!(!result.outcome(ScoreTest::GrossMarginImproved));
        assert!(!result.outcome(ScoreTest::AssetTurnoverImproved));
    }

    #[test]
    fn absent_indicator_never_scores() {
        // No OCF: both cash-flow tests must be false even with huge profit.
        let current = snapshot(
            Period::Annual(2024),
            &[
                (Indicator::ReturnOnAssets, 5.0),
                (Indicator::NetProfit, -10.0),
            ],
        );
        let result = evaluate(&current, None);
        assert!(!result.outcome(ScoreTest::PositiveOperatingCashFlow));
        assert!(!result.outcome(ScoreTest::CashFlowExceedsProfit));
    }

    #[test]
    fn equity_issuance_flag_fails_test_seven() {
        let mut current = snapshot(
            Period::Annual(2024),
            &[(Indicator::ReturnOnAssets, 5.0)],
        );
        assert!(evaluate(&current, None).outcome(ScoreTest::NoNewEquity));

        current.set(Indicator::EquityIssuance, 1.0);
        assert!(!evaluate(&current, None).outcome(ScoreTest::NoNewEquity));

        // An explicit zero flag is "no issuance", same as absence.
        current.set(Indicator::EquityIssuance, 0.0);
        assert!(evaluate(&current, None).outcome(ScoreTest::NoNewEquity));
    }

    #[test]
    fn empty_snapshot_scores_only_the_default_pass() {
        let current = snapshot(Period::Annual(2024), &[]);
        let result = evaluate(&current, None);
        assert_eq!(result.score, 1);
        assert!(result.outcome(ScoreTest::NoNewEquity));
    }

    #[test]
    fn score_equals_outcome_count() {
        let current = snapshot(
            Period::Annual(2024),
            &[
                (Indicator::ReturnOnAssets, 1.0),
                (Indicator::OperatingCashFlow, -5.0),
            ],
        );
        let result = evaluate(&current, None);
        assert_eq!(
            result.score as usize,
            result.outcomes.iter().filter(|&&b| b).count()
        );
    }

    proptest! {
        /// Any combination of present/absent indicator values keeps the
        /// score inside [0, 9] and consistent with the outcome vector.
        #[test]
        fn score_is_always_bounded(
            current_vals in proptest::collection::btree_map(
                0usize..Indicator::ALL.len(),
                -1e6f64..1e6,
                0..Indicator::ALL.len(),
            ),
            prior_vals in proptest::collection::btree_map(
                0usize..Indicator::ALL.len(),
                -1e6f64..1e6,
                0..Indicator::ALL.len(),
            ),
            has_prior in any::<bool>(),
        ) {
            let mut current = FinancialSnapshot::new(
                EntityId::parse("000001.SZ").unwrap(),
                Period::Annual(2024),
            );
            for (idx, value) in &current_vals {
                current.set(Indicator::ALL[*idx], *value);
            }
            let mut prior = FinancialSnapshot::new(
                EntityId::parse("000001.SZ").unwrap(),
                Period::Annual(2023),
            );
            for (idx, value) in &prior_vals {
                prior.set(Indicator::ALL[*idx], *value);
            }

            let result = evaluate(&current, has_prior.then_some(&prior));
            prop_assert!(result.score <= 9);
            prop_assert_eq!(
                result.score as usize,
                result.outcomes.iter().filter(|&&b| b).count()
            );
        }
    }
}
