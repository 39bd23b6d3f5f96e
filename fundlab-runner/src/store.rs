//! Result persistence — fundamentals table, score table, top extract.
//!
//! Three artifacts under the data directory:
//! - `fundamentals.csv`: append-only normalized indicator rows, one per
//!   resolved (entity, period).
//! - `scores.csv`: one row per entity, last-write-wins across runs, always
//!   rewritten sorted by score descending.
//! - `top_scores.json`: the head of the score table, for downstream
//!   consumers that only want the shortlist.

use fundlab_core::domain::{FinancialSnapshot, Indicator};
use fundlab_core::score::{ScoreResult, ScoreTest};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

const FUNDAMENTALS_FILE: &str = "fundamentals.csv";
const SCORES_FILE: &str = "scores.csv";
const TOP_FILE: &str = "top_scores.json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("result store io: {0}")]
    Io(#[from] std::io::Error),

    #[error("result store csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("result store json: {0}")]
    Json(#[from] serde_json::Error),
}

/// One persisted score line. Flat named columns rather than a serialized
/// vector so the CSV stays greppable and spreadsheet-friendly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRow {
    pub entity: String,
    pub name: String,
    pub industry: String,
    pub period: String,
    pub score: u8,
    pub positive_roa: bool,
    pub positive_operating_cash_flow: bool,
    pub roa_improved: bool,
    pub cash_flow_exceeds_profit: bool,
    pub leverage_decreased: bool,
    pub current_ratio_improved: bool,
    pub no_new_equity: bool,
    pub gross_margin_improved: bool,
    pub asset_turnover_improved: bool,
}

impl From<&ScoreResult> for ScoreRow {
    fn from(r: &ScoreResult) -> Self {
        let out = |t: ScoreTest| r.outcome(t);
        Self {
            entity: r.entity.as_str().to_string(),
            name: r.name.clone().unwrap_or_default(),
            industry: r.industry.clone().unwrap_or_default(),
            period: r.period.to_string(),
            score: r.score,
            positive_roa: out(ScoreTest::PositiveRoa),
            positive_operating_cash_flow: out(ScoreTest::PositiveOperatingCashFlow),
            roa_improved: out(ScoreTest::RoaImproved),
            cash_flow_exceeds_profit: out(ScoreTest::CashFlowExceedsProfit),
            leverage_decreased: out(ScoreTest::LeverageDecreased),
            current_ratio_improved: out(ScoreTest::CurrentRatioImproved),
            no_new_equity: out(ScoreTest::NoNewEquity),
            gross_margin_improved: out(ScoreTest::GrossMarginImproved),
            asset_turnover_improved: out(ScoreTest::AssetTurnoverImproved),
        }
    }
}

/// File-backed store rooted at the configured data directory.
#[derive(Debug)]
pub struct ResultStore {
    dir: PathBuf,
}

impl ResultStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn fundamentals_path(&self) -> PathBuf {
        self.dir.join(FUNDAMENTALS_FILE)
    }

    pub fn scores_path(&self) -> PathBuf {
        self.dir.join(SCORES_FILE)
    }

    pub fn top_path(&self) -> PathBuf {
        self.dir.join(TOP_FILE)
    }

    /// Append normalized snapshots to the fundamentals table. The header is
    /// written once, when the file is first created. Absent indicators stay
    /// blank cells, never zeros.
    pub fn append_snapshots(&self, snapshots: &[FinancialSnapshot]) -> Result<(), StoreError> {
        if snapshots.is_empty() {
            return Ok(());
        }
        let path = self.fundamentals_path();
        let fresh = !path.exists();
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);

        if fresh {
            let mut header = vec!["entity", "name", "industry", "period"];
            header.extend(Indicator::ALL.iter().map(|i| i.key()));
            writer.write_record(&header)?;
        }
        for snap in snapshots {
            let mut record = vec![
                snap.entity.as_str().to_string(),
                snap.name.clone().unwrap_or_default(),
                snap.industry.clone().unwrap_or_default(),
                snap.period.to_string(),
            ];
            for indicator in Indicator::ALL {
                record.push(match snap.get(indicator) {
                    Some(v) => v.to_string(),
                    None => String::new(),
                });
            }
            writer.write_record(&record)?;
        }
        writer.flush()?;
        debug!(count = snapshots.len(), "appended fundamentals rows");
        Ok(())
    }

    /// Merge new score results into the score table: one row per entity,
    /// newest run wins, sorted by score descending (ties by entity id).
    /// Also refreshes the top-N JSON extract.
    pub fn merge_scores(&self, results: &[ScoreResult], top_n: usize) -> Result<(), StoreError> {
        let mut by_entity: BTreeMap<String, ScoreRow> = self
            .load_scores()?
            .into_iter()
            .map(|row| (row.entity.clone(), row))
            .collect();
        for result in results {
            let row = ScoreRow::from(result);
            by_entity.insert(row.entity.clone(), row);
        }

        let mut rows: Vec<ScoreRow> = by_entity.into_values().collect();
        rows.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.entity.cmp(&b.entity)));

        self.write_scores(&rows)?;
        self.write_top(&rows, top_n)?;
        debug!(total = rows.len(), merged = results.len(), "score table rewritten");
        Ok(())
    }

    /// The current score table, empty when no run has completed yet.
    pub fn load_scores(&self) -> Result<Vec<ScoreRow>, StoreError> {
        let path = self.scores_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::Reader::from_path(&path)?;
        let mut rows = Vec::new();
        for record in reader.deserialize() {
            rows.push(record?);
        }
        Ok(rows)
    }

    fn write_scores(&self, rows: &[ScoreRow]) -> Result<(), StoreError> {
        let path = self.scores_path();
        let tmp = path.with_extension("csv.tmp");
        {
            let mut writer = csv::Writer::from_path(&tmp)?;
            for row in rows {
                writer.serialize(row)?;
            }
            writer.flush()?;
        }
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn write_top(&self, rows: &[ScoreRow], top_n: usize) -> Result<(), StoreError> {
        let head = &rows[..rows.len().min(top_n)];
        let path = self.top_path();
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(head)?)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }
}
