//! Batch orchestrator — drives the collection run.
//!
//! Processes the universe sequentially in fixed-size batches. After each
//! batch the results are persisted and the checkpoint advanced, so a crash
//! or interrupt loses at most one batch of work. A single entity failing to
//! resolve never aborts the batch: it is logged, skipped, and left out of
//! the completed set so the next full run picks it up again.
//!
//! Between batches the orchestrator sleeps a jittered interval on top of
//! the per-provider rate limit, keeping the request cadence irregular.

use crate::checkpoint::{CheckpointError, CheckpointRecord, CheckpointStore};
use crate::config::PipelineConfig;
use crate::store::{ResultStore, StoreError};
use fundlab_core::data::{EntityUniverse, MultiSourceResolver};
use fundlab_core::domain::{Entity, FinancialSnapshot};
use fundlab_core::score::{self, ScoreResult};
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Outcome of a run, for the CLI to report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Entities attempted this run.
    pub processed: usize,
    /// Entities resolved, scored, and persisted.
    pub succeeded: usize,
    /// Entities no source could produce a valid snapshot for.
    pub skipped: usize,
    /// True when a stop request cut the run short.
    pub interrupted: bool,
}

/// Sequential batch driver over a universe, a resolver, and the stores.
pub struct BatchOrchestrator {
    config: PipelineConfig,
    resolver: MultiSourceResolver,
    universe: EntityUniverse,
    checkpoint: CheckpointStore,
    store: ResultStore,
    stop: Arc<AtomicBool>,
}

impl BatchOrchestrator {
    pub fn new(
        config: PipelineConfig,
        resolver: MultiSourceResolver,
        universe: EntityUniverse,
        stop: Arc<AtomicBool>,
    ) -> Result<Self, RunError> {
        let checkpoint = CheckpointStore::new(config.data_dir.join("checkpoint.json"));
        let store = ResultStore::new(&config.data_dir)?;
        Ok(Self {
            config,
            resolver,
            universe,
            checkpoint,
            store,
            stop,
        })
    }

    fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Entities still to process: everything at or past the checkpoint's
    /// index that is not already in the completed set, capped by
    /// `max_entities`. Each entry keeps its ordinal position in the
    /// universe, which is what the checkpoint records. The flag reports
    /// whether the cap cut the list short — a capped run must keep its
    /// checkpoint so the next invocation continues where it left off.
    fn remaining(&self, record: &CheckpointRecord) -> (Vec<(usize, Entity)>, bool) {
        let start = record.last_index.min(self.universe.len());
        let mut remaining: Vec<(usize, Entity)> = self
            .universe
            .entities()
            .iter()
            .enumerate()
            .skip(start)
            .filter(|(_, e)| !record.completed_ids.contains(e.id.as_str()))
            .map(|(i, e)| (i, e.clone()))
            .collect();
        let mut truncated = false;
        if self.config.max_entities > 0 && remaining.len() > self.config.max_entities {
            remaining.truncate(self.config.max_entities);
            truncated = true;
        }
        (remaining, truncated)
    }

    /// Run to completion or until stopped. Returns a summary either way;
    /// only persistence failures surface as errors.
    pub fn run(&mut self) -> Result<RunSummary, RunError> {
        let mut record = self.checkpoint.load();
        if !record.is_fresh() {
            info!(
                last_index = record.last_index,
                completed = record.completed_ids.len(),
                "resuming from checkpoint"
            );
        }

        let (remaining, capped) = self.remaining(&record);
        let period = self.config.current_period();
        info!(
            universe = self.universe.len(),
            remaining = remaining.len(),
            %period,
            providers = ?self.resolver.provider_names(),
            "starting collection run"
        );

        let mut summary = RunSummary::default();
        let batches: Vec<&[(usize, Entity)]> =
            remaining.chunks(self.config.batch_size.max(1)).collect();
        let batch_count = batches.len();

        for (batch_no, batch) in batches.into_iter().enumerate() {
            let mut snapshots: Vec<FinancialSnapshot> = Vec::new();
            let mut scores: Vec<ScoreResult> = Vec::new();
            let mut completed: Vec<&str> = Vec::new();
            let mut last_attempted = None;

            for (index, entity) in batch {
                if self.stop_requested() {
                    summary.interrupted = true;
                    break;
                }
                last_attempted = Some(*index);
                summary.processed += 1;

                match self.resolver.resolve(&entity.id, period) {
                    Some(current) => {
                        let prior = self.resolver.resolve_unchecked(&entity.id, period.prior());
                        scores.push(score::evaluate(&current, prior.as_ref()));
                        if let Some(prior) = prior {
                            snapshots.push(prior);
                        }
                        snapshots.push(current);
                        completed.push(entity.id.as_str());
                        summary.succeeded += 1;
                    }
                    None => {
                        warn!(entity = entity.id.as_str(), %period, "no valid snapshot, skipping");
                        summary.skipped += 1;
                    }
                }
            }

            // Commit whatever this batch produced, even a partial batch cut
            // short by a stop request.
            if let Some(last) = last_attempted {
                self.store.append_snapshots(&snapshots)?;
                self.store.merge_scores(&scores, self.config.top_n)?;
                record.last_index = last + 1;
                record
                    .completed_ids
                    .extend(completed.iter().map(|id| id.to_string()));
                self.checkpoint.save(&record)?;
                info!(
                    batch = batch_no + 1,
                    of = batch_count,
                    succeeded = completed.len(),
                    attempted = batch.len(),
                    "batch committed"
                );
            }

            if summary.interrupted || self.stop_requested() {
                summary.interrupted = true;
                info!("stop requested, exiting after committed batch");
                return Ok(summary);
            }
            if batch_no + 1 < batch_count {
                self.pause_between_batches();
            }
        }

        // Drop the checkpoint only when the pass covered the whole
        // universe; a capped run keeps it so the next invocation continues
        // from the saved index instead of refetching completed entities.
        if capped {
            info!(
                processed = summary.processed,
                succeeded = summary.succeeded,
                skipped = summary.skipped,
                "entity cap reached, checkpoint kept for resume"
            );
        } else {
            self.checkpoint.clear()?;
            info!(
                processed = summary.processed,
                succeeded = summary.succeeded,
                skipped = summary.skipped,
                "run complete, checkpoint cleared"
            );
        }
        Ok(summary)
    }

    fn pause_between_batches(&self) {
        let (lo, hi) = self.config.batch_delay_secs;
        if hi <= 0.0 {
            return;
        }
        let secs = if hi > lo {
            rand::thread_rng().gen_range(lo..=hi)
        } else {
            lo
        };
        std::thread::sleep(Duration::from_secs_f64(secs.max(0.0)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fundlab_core::data::{
        FetchError, FundamentalsProvider, IndicatorTable, RawSnapshot, RateLimiter, RetryPolicy,
        ValidationRules,
    };
    use fundlab_core::domain::{EntityId, Period};
    use serde_json::json;
    use std::collections::BTreeSet;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Provider scripted per entity id; the prior period answers with the
    /// same fields so comparison tests see both sides. Records every fetch.
    struct Scripted {
        rows: Vec<(&'static str, Vec<(&'static str, f64)>)>,
        failing: BTreeSet<&'static str>,
        fetches: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(rows: Vec<(&'static str, Vec<(&'static str, f64)>)>) -> Self {
            Self {
                rows,
                failing: BTreeSet::new(),
                fetches: Mutex::new(Vec::new()),
            }
        }

        fn fetch_count(&self, id: &str) -> usize {
            self.fetches
                .lock()
                .unwrap()
                .iter()
                .filter(|f| f.starts_with(id))
                .count()
        }
    }

    impl FundamentalsProvider for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        fn fetch(
            &self,
            entity: &EntityId,
            period: Period,
        ) -> Result<Option<RawSnapshot>, FetchError> {
            self.fetches
                .lock()
                .unwrap()
                .push(format!("{entity}@{period}"));
            if self.failing.contains(entity.as_str()) {
                return Err(FetchError::Timeout("scripted outage".into()));
            }
            let Some((_, fields)) = self.rows.iter().find(|(id, _)| *id == entity.as_str())
            else {
                return Ok(None);
            };
            let mut raw = RawSnapshot::new();
            for (label, value) in fields {
                raw = raw.with_field(*label, json!(value));
            }
            Ok(Some(raw))
        }
    }

    const GOOD: &[(&str, f64)] = &[("roa", 5.0), ("ocfps", 2.0)];

    fn config(dir: &TempDir, batch_size: usize) -> PipelineConfig {
        PipelineConfig {
            batch_size,
            batch_delay_secs: (0.0, 0.0),
            data_dir: dir.path().join("data"),
            report_year: Some(2024),
            ..Default::default()
        }
    }

    fn resolver(provider: Arc<Scripted>) -> MultiSourceResolver {
        struct Shared(Arc<Scripted>);
        impl FundamentalsProvider for Shared {
            fn name(&self) -> &str {
                self.0.name()
            }
            fn fetch(
                &self,
                entity: &EntityId,
                period: Period,
            ) -> Result<Option<RawSnapshot>, FetchError> {
                self.0.fetch(entity, period)
            }
        }
        MultiSourceResolver::new(
            vec![Box::new(Shared(provider))],
            RateLimiter::new(10_000, Duration::from_secs(60)),
            RetryPolicy::new(1, Duration::from_millis(1)),
            IndicatorTable::builtin(),
            ValidationRules::for_scoring(),
        )
    }

    fn universe(ids: &[&str]) -> EntityUniverse {
        EntityUniverse::from_entities(
            ids.iter()
                .map(|id| Entity::new(EntityId::parse(id).unwrap(), *id))
                .collect(),
        )
    }

    fn orchestrator(
        dir: &TempDir,
        batch_size: usize,
        provider: Arc<Scripted>,
        ids: &[&str],
    ) -> BatchOrchestrator {
        BatchOrchestrator::new(
            config(dir, batch_size),
            resolver(provider),
            universe(ids),
            Arc::new(AtomicBool::new(false)),
        )
        .unwrap()
    }

    #[test]
    fn full_run_scores_everything_and_clears_checkpoint() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(Scripted::new(vec![
            ("600519.SH", GOOD.to_vec()),
            ("000001.SZ", GOOD.to_vec()),
            ("600036.SH", GOOD.to_vec()),
        ]));
        let mut orch = orchestrator(&dir, 2, provider.clone(), &[
            "600519.SH",
            "000001.SZ",
            "600036.SH",
        ]);

        let summary = orch.run().unwrap();
        assert_eq!(summary.succeeded, 3);
        assert_eq!(summary.skipped, 0);
        assert!(!summary.interrupted);
        assert!(!dir.path().join("data/checkpoint.json").exists());

        let rows = orch.store.load_scores().unwrap();
        assert_eq!(rows.len(), 3);
        // Each entity fetched twice: current period and prior period.
        assert_eq!(provider.fetch_count("600519.SH"), 2);
    }

    #[test]
    fn resume_skips_completed_entities() {
        let dir = TempDir::new().unwrap();
        let ids = ["600519.SH", "000001.SZ", "600036.SH"];
        let provider = Arc::new(Scripted::new(
            ids.iter().map(|id| (*id, GOOD.to_vec())).collect(),
        ));

        let checkpoint = CheckpointStore::new(dir.path().join("data/checkpoint.json"));
        checkpoint
            .save(&CheckpointRecord {
                last_index: 1,
                completed_ids: ["600519.SH".to_string()].into_iter().collect(),
            })
            .unwrap();

        let mut orch = orchestrator(&dir, 10, provider.clone(), &ids);
        let summary = orch.run().unwrap();

        assert_eq!(summary.processed, 2);
        assert_eq!(provider.fetch_count("600519.SH"), 0);
        assert_eq!(provider.fetch_count("000001.SZ"), 2);
    }

    #[test]
    fn failed_entity_does_not_lose_the_batch() {
        let dir = TempDir::new().unwrap();
        let mut scripted = Scripted::new(vec![
            ("600519.SH", GOOD.to_vec()),
            ("600036.SH", GOOD.to_vec()),
        ]);
        scripted.failing.insert("000001.SZ");
        let provider = Arc::new(scripted);

        let mut orch = orchestrator(&dir, 3, provider, &[
            "600519.SH",
            "000001.SZ",
            "600036.SH",
        ]);
        let summary = orch.run().unwrap();

        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(orch.store.load_scores().unwrap().len(), 2);
    }

    #[test]
    fn stop_flag_exits_cleanly_and_cleared_flag_resumes() {
        let dir = TempDir::new().unwrap();
        let ids = ["600519.SH", "000001.SZ", "600036.SH", "000002.SZ"];
        let provider = Arc::new(Scripted::new(
            ids.iter().map(|id| (*id, GOOD.to_vec())).collect(),
        ));

        let stop = Arc::new(AtomicBool::new(false));
        let mut orch = BatchOrchestrator::new(
            config(&dir, 2),
            resolver(provider),
            universe(&ids),
            stop.clone(),
        )
        .unwrap();

        // Stop raised before the run starts: the first entity check fires
        // before any fetch, so nothing is processed and no checkpoint exists.
        stop.store(true, Ordering::SeqCst);
        let summary = orch.run().unwrap();
        assert!(summary.interrupted);
        assert_eq!(summary.processed, 0);
        assert!(!dir.path().join("data/checkpoint.json").exists() || {
            let record = CheckpointStore::new(dir.path().join("data/checkpoint.json")).load();
            record.is_fresh()
        });

        // Cleared flag: the run proceeds normally from the top.
        stop.store(false, Ordering::SeqCst);
        let summary = orch.run().unwrap();
        assert!(!summary.interrupted);
        assert_eq!(summary.succeeded, 4);
    }

    #[test]
    fn stop_mid_batch_commits_attempted_entities() {
        let dir = TempDir::new().unwrap();
        let ids = ["600519.SH", "000001.SZ", "600036.SH"];
        let inner = Arc::new(Scripted::new(
            ids.iter().map(|id| (*id, GOOD.to_vec())).collect(),
        ));
        let stop = Arc::new(AtomicBool::new(false));

        // Trips the stop flag while the second entity is being fetched, as a
        // signal handler would from another thread.
        struct Tripwire {
            inner: Arc<Scripted>,
            stop: Arc<AtomicBool>,
        }
        impl FundamentalsProvider for Tripwire {
            fn name(&self) -> &str {
                self.inner.name()
            }
            fn fetch(
                &self,
                entity: &EntityId,
                period: Period,
            ) -> Result<Option<RawSnapshot>, FetchError> {
                if entity.as_str() == "000001.SZ" {
                    self.stop.store(true, Ordering::SeqCst);
                }
                self.inner.fetch(entity, period)
            }
        }

        let resolver = MultiSourceResolver::new(
            vec![Box::new(Tripwire {
                inner: inner.clone(),
                stop: stop.clone(),
            })],
            RateLimiter::new(10_000, Duration::from_secs(60)),
            RetryPolicy::new(1, Duration::from_millis(1)),
            IndicatorTable::builtin(),
            ValidationRules::for_scoring(),
        );
        let mut orch =
            BatchOrchestrator::new(config(&dir, 3), resolver, universe(&ids), stop).unwrap();

        let summary = orch.run().unwrap();
        assert!(summary.interrupted);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(inner.fetch_count("600036.SH"), 0);

        // The partial batch was committed before exiting.
        let record = CheckpointStore::new(dir.path().join("data/checkpoint.json")).load();
        assert_eq!(record.last_index, 2);
        assert_eq!(record.completed_ids.len(), 2);
        assert_eq!(orch.store.load_scores().unwrap().len(), 2);
    }

    #[test]
    fn skipped_entity_is_retried_on_the_next_full_run() {
        let dir = TempDir::new().unwrap();
        let ids = ["600519.SH", "000001.SZ"];
        // 000001.SZ has no data anywhere.
        let provider = Arc::new(Scripted::new(vec![("600519.SH", GOOD.to_vec())]));

        let mut orch = orchestrator(&dir, 10, provider.clone(), &ids);
        orch.run().unwrap();
        let first = provider.fetch_count("000001.SZ");
        assert!(first > 0);

        // Checkpoint was cleared, so a second run attempts it again.
        let mut orch = orchestrator(&dir, 10, provider.clone(), &ids);
        orch.run().unwrap();
        assert!(provider.fetch_count("000001.SZ") > first);
    }

    #[test]
    fn max_entities_caps_the_run() {
        let dir = TempDir::new().unwrap();
        let ids = ["600519.SH", "000001.SZ", "600036.SH"];
        let provider = Arc::new(Scripted::new(
            ids.iter().map(|id| (*id, GOOD.to_vec())).collect(),
        ));
        let mut cfg = config(&dir, 10);
        cfg.max_entities = 1;

        let mut orch = BatchOrchestrator::new(
            cfg,
            resolver(provider),
            universe(&ids),
            Arc::new(AtomicBool::new(false)),
        )
        .unwrap();
        let summary = orch.run().unwrap();
        assert_eq!(summary.processed, 1);
    }

    #[test]
    fn capped_run_keeps_checkpoint_and_next_run_continues() {
        let dir = TempDir::new().unwrap();
        let ids = ["600519.SH", "000001.SZ", "600036.SH"];
        let provider = Arc::new(Scripted::new(
            ids.iter().map(|id| (*id, GOOD.to_vec())).collect(),
        ));
        let capped = |provider: Arc<Scripted>| {
            let mut cfg = config(&dir, 10);
            cfg.max_entities = 1;
            BatchOrchestrator::new(
                cfg,
                resolver(provider),
                universe(&ids),
                Arc::new(AtomicBool::new(false)),
            )
            .unwrap()
        };

        capped(provider.clone()).run().unwrap();
        let checkpoint = CheckpointStore::new(dir.path().join("data/checkpoint.json"));
        let record = checkpoint.load();
        assert_eq!(record.last_index, 1);
        assert!(record.completed_ids.contains("600519.SH"));

        // The second capped run picks up at the saved index; the first
        // entity is not refetched.
        capped(provider.clone()).run().unwrap();
        assert_eq!(provider.fetch_count("600519.SH"), 2);
        assert_eq!(provider.fetch_count("000001.SZ"), 2);
        assert_eq!(checkpoint.load().last_index, 2);

        // The final capped run exhausts the universe, so the checkpoint is
        // cleared like any completed pass.
        capped(provider.clone()).run().unwrap();
        assert_eq!(provider.fetch_count("600036.SH"), 2);
        assert!(checkpoint.load().is_fresh());
    }
}
