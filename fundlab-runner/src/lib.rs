//! fundlab runner — batch orchestration around the core engine.
//!
//! Ties the pieces from `fundlab-core` into a resumable pipeline run:
//! configuration loading, checkpointing, the batch loop, and result
//! persistence. The CLI crate is a thin shell over this one.

pub mod checkpoint;
pub mod config;
pub mod orchestrator;
pub mod store;

pub use checkpoint::{CheckpointError, CheckpointRecord, CheckpointStore};
pub use config::{ConfigError, PipelineConfig};
pub use orchestrator::{BatchOrchestrator, RunError, RunSummary};
pub use store::{ResultStore, ScoreRow, StoreError};
