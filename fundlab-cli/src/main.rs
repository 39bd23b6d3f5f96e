//! fundlab CLI — collection runs, score inspection, checkpoint management.
//!
//! Commands:
//! - `run` — execute a checkpointed collection run over a universe file
//! - `top` — print the current top-scored entities
//! - `checkpoint status` — report saved run progress
//! - `checkpoint reset` — discard saved progress

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fundlab_core::data::EntityUniverse;
use fundlab_runner::{BatchOrchestrator, CheckpointStore, PipelineConfig, ResultStore};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "fundlab",
    about = "fundlab CLI — fundamentals collection and F-Score pipeline"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a collection run, resuming from any saved checkpoint.
    Run {
        /// Path to a TOML config file. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Universe CSV (id,name). Required.
        #[arg(long)]
        universe: PathBuf,

        /// Cap on entities processed this run (overrides config).
        #[arg(long)]
        max: Option<usize>,

        /// Entities per batch (overrides config).
        #[arg(long)]
        batch_size: Option<usize>,

        /// Data directory for results and checkpoint. Defaults to ./data.
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Print the current top-scored entities from the score table.
    Top {
        /// Number of entries to show.
        #[arg(long, default_value_t = 10)]
        n: usize,

        /// Data directory. Defaults to ./data.
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,
    },
    /// Checkpoint management commands.
    Checkpoint {
        #[command(subcommand)]
        action: CheckpointAction,
    },
}

#[derive(Subcommand)]
enum CheckpointAction {
    /// Report saved run progress.
    Status {
        /// Data directory. Defaults to ./data.
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,
    },
    /// Discard saved progress so the next run starts from the top.
    Reset {
        /// Data directory. Defaults to ./data.
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            universe,
            max,
            batch_size,
            data_dir,
        } => run_pipeline(config, &universe, max, batch_size, data_dir),
        Commands::Top { n, data_dir } => print_top(&data_dir, n),
        Commands::Checkpoint { action } => match action {
            CheckpointAction::Status { data_dir } => checkpoint_status(&data_dir),
            CheckpointAction::Reset { data_dir } => checkpoint_reset(&data_dir),
        },
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => {
            let mut config = PipelineConfig::default();
            config.apply_env();
            Ok(config)
        }
    }
}

fn run_pipeline(
    config_path: Option<PathBuf>,
    universe_path: &Path,
    max: Option<usize>,
    batch_size: Option<usize>,
    data_dir: Option<PathBuf>,
) -> Result<()> {
    let mut config = load_config(config_path.as_deref())?;
    if let Some(max) = max {
        config.max_entities = max;
    }
    if let Some(batch_size) = batch_size {
        config.batch_size = batch_size;
    }
    if let Some(data_dir) = data_dir {
        config.data_dir = data_dir;
    }

    let universe = EntityUniverse::from_file(universe_path)
        .with_context(|| format!("loading universe from {}", universe_path.display()))?;
    let resolver = config.build_resolver()?;

    let stop = Arc::new(AtomicBool::new(false));
    let handler_flag = stop.clone();
    ctrlc::set_handler(move || {
        eprintln!("\nstop requested, finishing current batch...");
        handler_flag.store(true, Ordering::SeqCst);
    })
    .context("installing interrupt handler")?;

    let data_dir = config.data_dir.clone();
    let top_n = config.top_n;
    let mut orchestrator = BatchOrchestrator::new(config, resolver, universe, stop)?;
    let summary = orchestrator.run()?;

    println!();
    println!("=== Collection Run ===");
    println!("Processed:   {}", summary.processed);
    println!("Succeeded:   {}", summary.succeeded);
    println!("Skipped:     {}", summary.skipped);
    if summary.interrupted {
        println!();
        println!("Interrupted — progress saved, rerun to resume.");
    }
    println!();
    print_top(&data_dir, top_n)?;
    Ok(())
}

fn print_top(data_dir: &Path, n: usize) -> Result<()> {
    let store = ResultStore::new(data_dir)?;
    let rows = store.load_scores()?;
    if rows.is_empty() {
        println!("No scores yet: {}", data_dir.display());
        return Ok(());
    }

    println!("{:<12} {:<20} {:<8} {:>6}", "Entity", "Name", "Period", "Score");
    println!("{}", "-".repeat(50));
    for row in rows.iter().take(n) {
        println!(
            "{:<12} {:<20} {:<8} {:>6}",
            row.entity, row.name, row.period, row.score
        );
    }
    Ok(())
}

fn checkpoint_path(data_dir: &Path) -> PathBuf {
    data_dir.join("checkpoint.json")
}

fn checkpoint_status(data_dir: &Path) -> Result<()> {
    let store = CheckpointStore::new(checkpoint_path(data_dir));
    let record = store.load();
    if record.is_fresh() {
        println!("No checkpoint: {}", store.path().display());
        return Ok(());
    }
    println!("Checkpoint:  {}", store.path().display());
    println!("Last index:  {}", record.last_index);
    println!("Completed:   {}", record.completed_ids.len());
    Ok(())
}

fn checkpoint_reset(data_dir: &Path) -> Result<()> {
    let store = CheckpointStore::new(checkpoint_path(data_dir));
    let record = store.load();
    if record.is_fresh() {
        println!("No checkpoint to reset.");
        return Ok(());
    }
    store.clear()?;
    println!(
        "Checkpoint cleared ({} completed entities forgotten).",
        record.completed_ids.len()
    );
    Ok(())
}
