//! fundlab core — fundamentals collection and scoring engine.
//!
//! This crate contains the heart of the pipeline:
//! - Domain types (entities, periods, canonical indicators, snapshots)
//! - Provider adapters behind a uniform fetch contract
//! - Indicator normalization from provider vocabularies to canonical keys
//! - Fixed-window rate limiting and bounded retry
//! - Multi-source resolution with snapshot validation
//! - The nine-test F-Score engine
//!
//! Batch orchestration, checkpointing, and result persistence live in
//! `fundlab-runner`.

pub mod data;
pub mod domain;
pub mod score;
