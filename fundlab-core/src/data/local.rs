//! Local CSV fixture provider.
//!
//! Serves raw snapshots from a long-format CSV, one field per row:
//!
//! ```csv
//! entity,period,label,value,name,industry
//! 600519.SH,2024,roa,23.4,Kweichow Moutai,Beverages
//! 600519.SH,2024,ocfps,52.1,,
//! ```
//!
//! Used for offline runs and as the deterministic source in integration
//! tests. The whole file is loaded at construction; `fetch` is a map lookup
//! and never fails.

use super::provider::{FetchError, FundamentalsProvider, RawSnapshot};
use crate::domain::{EntityId, Period};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("read fixture file: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse fixture CSV: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Deserialize)]
struct FixtureRow {
    entity: String,
    period: String,
    label: String,
    value: String,
    name: Option<String>,
    industry: Option<String>,
}

/// Fixture-backed provider keyed by (entity, period display form).
pub struct LocalCsvProvider {
    snapshots: BTreeMap<(String, String), RawSnapshot>,
}

impl LocalCsvProvider {
    pub const NAME: &'static str = "local";

    pub fn from_file(path: &Path) -> Result<Self, FixtureError> {
        let mut reader = csv::Reader::from_path(path)?;
        let mut snapshots: BTreeMap<(String, String), RawSnapshot> = BTreeMap::new();

        for row in reader.deserialize() {
            let row: FixtureRow = row?;
            let key = (row.entity, row.period);
            let snap = snapshots.entry(key).or_default();
            snap.fields
                .insert(row.label, Value::String(row.value));
            if let Some(name) = row.name.filter(|s| !s.is_empty()) {
                snap.name = Some(name);
            }
            if let Some(industry) = row.industry.filter(|s| !s.is_empty()) {
                snap.industry = Some(industry);
            }
        }

        Ok(Self { snapshots })
    }

    pub fn snapshot_count(&self) -> usize {
        self.snapshots.len()
    }
}

impl FundamentalsProvider for LocalCsvProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn fetch(&self, entity: &EntityId, period: Period) -> Result<Option<RawSnapshot>, FetchError> {
        let key = (entity.as_str().to_string(), period.to_string());
        Ok(self.snapshots.get(&key).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_fixture(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_rows_into_snapshots() {
        let file = write_fixture(
            "entity,period,label,value,name,industry\n\
             600519.SH,2024,roa,23.4,Kweichow Moutai,Beverages\n\
             600519.SH,2024,ocfps,52.1,,\n\
             600519.SH,2023,roa,22.0,,\n",
        );
        let provider = LocalCsvProvider::from_file(file.path()).unwrap();
        assert_eq!(provider.snapshot_count(), 2);

        let entity = EntityId::parse("600519.SH").unwrap();
        let current = provider.fetch(&entity, Period::Annual(2024)).unwrap().unwrap();
        assert_eq!(current.fields.len(), 2);
        assert_eq!(current.name.as_deref(), Some("Kweichow Moutai"));

        let prior = provider.fetch(&entity, Period::Annual(2023)).unwrap().unwrap();
        assert_eq!(prior.fields.get("roa"), Some(&Value::String("22.0".into())));
    }

    #[test]
    fn unknown_entity_is_ordinary_absence() {
        let file = write_fixture("entity,period,label,value,name,industry\n");
        let provider = LocalCsvProvider::from_file(file.path()).unwrap();
        let entity = EntityId::parse("000001.SZ").unwrap();
        assert!(matches!(
            provider.fetch(&entity, Period::Annual(2024)),
            Ok(None)
        ));
    }
}
