//! Pipeline configuration.
//!
//! Loaded from a TOML file, every field defaulted, and overridable through
//! environment variables so scheduled runs can be tuned without editing
//! config files (`FUNDLAB_BATCH_SIZE`, `FUNDLAB_MAX_ENTITIES`,
//! `TUSHARE_TOKEN`).

use fundlab_core::data::{
    EastmoneyProvider, FixtureError, FundamentalsProvider, IndicatorTable, LocalCsvProvider,
    MultiSourceResolver, RateLimiter, RetryPolicy, TableError, TushareProvider, ValidationRules,
};
use fundlab_core::domain::Period;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse config TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("indicator table: {0}")]
    Table(#[from] TableError),

    #[error("fixture provider: {0}")]
    Fixture(#[from] FixtureError),

    #[error("no usable provider configured (priority list: {0:?})")]
    NoProviders(Vec<String>),

    #[error("unknown provider '{0}' in priority list")]
    UnknownProvider(String),
}

fn default_batch_size() -> usize {
    20
}
fn default_rate_limit_count() -> u32 {
    100
}
fn default_rate_limit_window_secs() -> u64 {
    60
}
fn default_batch_delay_secs() -> (f64, f64) {
    (3.0, 5.0)
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_delay_ms() -> u64 {
    500
}
fn default_providers() -> Vec<String> {
    vec!["eastmoney".into(), "tushare".into()]
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}
fn default_top_n() -> usize {
    10
}

/// Full configuration surface of a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Entities per batch; the checkpoint advances after each batch.
    pub batch_size: usize,
    /// Cap on entities processed this run. 0 = unbounded.
    pub max_entities: usize,
    /// Per-provider request budget.
    pub rate_limit_count: u32,
    pub rate_limit_window_secs: u64,
    /// Inter-batch delay bounds (uniform jitter), distinct from the
    /// per-provider rate limit.
    pub batch_delay_secs: (f64, f64),
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    /// Provider priority order. Unconfigurable sources (e.g. tushare
    /// without a token) are skipped with a warning.
    pub providers: Vec<String>,
    pub data_dir: PathBuf,
    /// Fiscal year to score. Defaults to the latest complete fiscal year.
    pub report_year: Option<i32>,
    pub tushare_token: Option<String>,
    /// CSV fixture backing the `local` provider.
    pub fixture_file: Option<PathBuf>,
    /// Extra indicator label variants, merged after the built-in table.
    pub indicator_table_file: Option<PathBuf>,
    /// Entries in the top-scores extract.
    pub top_n: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_entities: 0,
            rate_limit_count: default_rate_limit_count(),
            rate_limit_window_secs: default_rate_limit_window_secs(),
            batch_delay_secs: default_batch_delay_secs(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            providers: default_providers(),
            data_dir: default_data_dir(),
            report_year: None,
            tushare_token: None,
            fixture_file: None,
            indicator_table_file: None,
            top_n: default_top_n(),
        }
    }
}

impl PipelineConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: PipelineConfig = toml::from_str(&content)?;
        config.apply_env();
        Ok(config)
    }

    /// Environment overrides, applied after file values.
    pub fn apply_env(&mut self) {
        if let Some(v) = env_parse::<usize>("FUNDLAB_BATCH_SIZE") {
            self.batch_size = v;
        }
        if let Some(v) = env_parse::<usize>("FUNDLAB_MAX_ENTITIES") {
            self.max_entities = v;
        }
        if let Ok(token) = std::env::var("TUSHARE_TOKEN") {
            if !token.is_empty() {
                self.tushare_token = Some(token);
            }
        }
    }

    /// The period being collected: the configured fiscal year, or the
    /// latest complete one.
    pub fn current_period(&self) -> Period {
        use chrono::Datelike;
        let year = self
            .report_year
            .unwrap_or_else(|| chrono::Utc::now().year() - 1);
        Period::Annual(year)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.retry_delay_ms),
            jitter: true,
        }
    }

    pub fn rate_limiter(&self) -> RateLimiter {
        RateLimiter::new(
            self.rate_limit_count,
            Duration::from_secs(self.rate_limit_window_secs),
        )
    }

    pub fn indicator_table(&self) -> Result<IndicatorTable, ConfigError> {
        let mut table = IndicatorTable::builtin();
        if let Some(path) = &self.indicator_table_file {
            let content = std::fs::read_to_string(path)?;
            table.merge(IndicatorTable::from_toml(&content)?);
        }
        Ok(table)
    }

    /// Instantiate the providers named in the priority list, preserving
    /// order and skipping sources that lack their configuration.
    pub fn build_providers(&self) -> Result<Vec<Box<dyn FundamentalsProvider>>, ConfigError> {
        let latest = self.current_period();
        let mut providers: Vec<Box<dyn FundamentalsProvider>> = Vec::new();

        for name in &self.providers {
            match name.as_str() {
                "eastmoney" => providers.push(Box::new(EastmoneyProvider::new(latest))),
                "tushare" => match &self.tushare_token {
                    Some(token) => providers.push(Box::new(TushareProvider::new(token.clone()))),
                    None => warn!("tushare in priority list but no token configured, skipping"),
                },
                "local" => match &self.fixture_file {
                    Some(path) => providers.push(Box::new(LocalCsvProvider::from_file(path)?)),
                    None => warn!("local provider in priority list but no fixture file, skipping"),
                },
                other => return Err(ConfigError::UnknownProvider(other.to_string())),
            }
        }

        if providers.is_empty() {
            return Err(ConfigError::NoProviders(self.providers.clone()));
        }
        Ok(providers)
    }

    pub fn build_resolver(&self) -> Result<MultiSourceResolver, ConfigError> {
        Ok(MultiSourceResolver::new(
            self.build_providers()?,
            self.rate_limiter(),
            self.retry_policy(),
            self.indicator_table()?,
            ValidationRules::for_scoring(),
        ))
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = PipelineConfig::default();
        assert_eq!(config.batch_size, 20);
        assert_eq!(config.max_entities, 0);
        assert_eq!(config.rate_limit_count, 100);
        assert_eq!(config.batch_delay_secs, (3.0, 5.0));
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let config: PipelineConfig =
            toml::from_str("batch_size = 5\nproviders = [\"eastmoney\"]\n").unwrap();
        assert_eq!(config.batch_size, 5);
        assert_eq!(config.providers, vec!["eastmoney"]);
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn tushare_without_token_is_skipped_not_fatal() {
        let config = PipelineConfig {
            providers: vec!["eastmoney".into(), "tushare".into()],
            tushare_token: None,
            ..Default::default()
        };
        let providers = config.build_providers().unwrap();
        assert_eq!(providers.len(), 1);
        assert_eq!(providers[0].name(), "eastmoney");
    }

    #[test]
    fn empty_priority_list_is_an_error() {
        let config = PipelineConfig {
            providers: vec!["tushare".into()],
            tushare_token: None,
            ..Default::default()
        };
        assert!(matches!(
            config.build_providers(),
            Err(ConfigError::NoProviders(_))
        ));
    }

    #[test]
    fn unknown_provider_is_an_error() {
        let config = PipelineConfig {
            providers: vec!["bloomberg".into()],
            ..Default::default()
        };
        assert!(matches!(
            config.build_providers(),
            Err(ConfigError::UnknownProvider(_))
        ));
    }

    #[test]
    fn report_year_overrides_current_period() {
        let config = PipelineConfig {
            report_year: Some(2023),
            ..Default::default()
        };
        assert_eq!(config.current_period(), Period::Annual(2023));
    }
}
