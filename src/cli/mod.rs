//! Command-line interface for chronoverse.
//!
//! Provides commands for synchronizing universes into the library,
//! previewing resolution, validating definitions, and inspecting past runs.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use glob::Pattern;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use uuid::Uuid;

use crate::adapters::{MediaLibrary, SnapshotLibrary};
use crate::config::{self, ResolvedConfig};
use crate::core::{
    classify, CatalogIndex, Resolver, SyncJournal, TimelineSynchronizer, UniverseResolution,
};
use crate::domain::{
    BatchOutcome, BatchStatus, InternalId, NotFoundReason, RunSummary, Universe, UniverseFile,
    UniverseState,
};

/// chronoverse - Chronological collection synchronizer
#[derive(Parser, Debug)]
#[command(name = "chronoverse")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Library snapshot file (overrides config)
    #[arg(long, global = true)]
    pub library: Option<PathBuf>,

    /// Universe definitions file (overrides config)
    #[arg(long, global = true)]
    pub universes: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Synchronize universes into named collections
    Sync {
        /// Universe keys or glob patterns (all universes if omitted)
        #[arg(short, long = "universe")]
        universe: Vec<String>,

        /// Classify and resolve without writing collections
        #[arg(long)]
        dry_run: bool,

        /// Print the batch outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show how each item of a universe resolves
    Resolve {
        /// Universe key
        key: String,
    },

    /// Validate universe definitions
    Validate,

    /// Build the catalog index and show its statistics
    Index,

    /// List recent runs
    Runs {
        /// Maximum number of runs to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Show the journal summary of a run
    Status {
        /// Run ID (UUID)
        run_id: String,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let cfg = config::config()?;
        let library = self.library.unwrap_or_else(|| cfg.library.clone());
        let universes = self.universes.unwrap_or_else(|| cfg.universes.clone());

        match self.command {
            Commands::Sync {
                universe,
                dry_run,
                json,
            } => run_sync(cfg, &library, &universes, &universe, dry_run, json).await,
            Commands::Resolve { key } => resolve_universe(cfg, &library, &universes, &key).await,
            Commands::Validate => validate_universes(&universes),
            Commands::Index => show_index(cfg, &library).await,
            Commands::Runs { limit } => list_runs(cfg, limit).await,
            Commands::Status { run_id } => show_status(cfg, &run_id).await,
            Commands::Config => show_config(cfg, &library, &universes),
        }
    }
}

/// Load and validate the universe definitions file
fn load_universes(path: &Path) -> Result<UniverseFile> {
    let file = UniverseFile::from_file(path)?;
    file.validate()?;
    Ok(file)
}

/// Pick the universes whose keys match any of `patterns`
fn select_universes(file: &UniverseFile, patterns: &[String]) -> Result<Vec<Universe>> {
    if patterns.is_empty() {
        return Ok(file.universes.clone());
    }

    let compiled = patterns
        .iter()
        .map(|p| Pattern::new(p).with_context(|| format!("Invalid universe pattern: {}", p)))
        .collect::<Result<Vec<_>>>()?;

    for (raw, pattern) in patterns.iter().zip(&compiled) {
        if !file.universes.iter().any(|u| pattern.matches(&u.key)) {
            anyhow::bail!("No universe matches '{}'", raw);
        }
    }

    Ok(file
        .universes
        .iter()
        .filter(|u| compiled.iter().any(|p| p.matches(&u.key)))
        .cloned()
        .collect())
}

async fn open_library(path: &Path) -> Result<Arc<dyn MediaLibrary>> {
    let library = SnapshotLibrary::open(path).await?;
    Ok(Arc::new(library))
}

/// Synchronize the selected universes
async fn run_sync(
    cfg: &ResolvedConfig,
    library_path: &Path,
    universes_path: &Path,
    patterns: &[String],
    dry_run: bool,
    json: bool,
) -> Result<()> {
    let file = load_universes(universes_path)?;
    let selected = select_universes(&file, patterns)?;
    let library = open_library(library_path).await?;

    let mut options = cfg.sync.to_options();
    options.dry_run |= dry_run;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing current universe");
            on_signal.cancel();
        }
    });

    let mut synchronizer = TimelineSynchronizer::new(library)
        .with_options(options)
        .with_cancellation(cancel);
    if cfg.sync.journal {
        synchronizer = synchronizer.with_journal(cfg.runs_dir());
    }
    if !json {
        synchronizer = synchronizer
            .with_progress(|done, total| eprintln!("[{}/{}] universes processed", done, total));
    }

    let outcome = synchronizer.synchronize_batch(&selected).await?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&outcome).context("Failed to serialize batch outcome")?
        );
    } else {
        print_batch(&outcome);
    }

    if outcome.status == BatchStatus::Failed {
        std::process::exit(1);
    }

    Ok(())
}

fn print_batch(outcome: &BatchOutcome) {
    println!(
        "{:<20} {:<14} {:<9} {:>8} {:>10}",
        "UNIVERSE", "STATE", "ACTION", "MATCHED", "UNMATCHED"
    );
    println!("{}", "-".repeat(65));

    for universe in &outcome.universes {
        println!(
            "{:<20} {:<14} {:<9} {:>8} {:>10}",
            universe.key,
            state_label(universe.state),
            format!("{:?}", universe.action).to_lowercase(),
            universe.matched_count(),
            universe.unmatched_count()
        );
        for error in &universe.errors {
            println!("    {:?}: {}", error.kind, error.message);
        }
    }

    println!();
    println!(
        "Run {}{}: {:?} ({} synchronized, {} failed, {} skipped)",
        outcome.run_id,
        if outcome.dry_run { " (dry run)" } else { "" },
        outcome.status,
        outcome.summary.succeeded,
        outcome.summary.failed,
        outcome.summary.skipped
    );

    if !outcome.advice.recommendations.is_empty() {
        println!();
        println!("Recommendations ({:?}):", outcome.advice.overall_severity);
        for recommendation in &outcome.advice.recommendations {
            println!("  - {}", recommendation);
        }
    }
}

/// Show per-item resolution for one universe
async fn resolve_universe(
    cfg: &ResolvedConfig,
    library_path: &Path,
    universes_path: &Path,
    key: &str,
) -> Result<()> {
    let file = load_universes(universes_path)?;
    let universe = file
        .get(key)
        .with_context(|| format!("Universe '{}' not found", key))?;

    let library = open_library(library_path).await?;
    let index = CatalogIndex::build(library.as_ref(), &cfg.sync.to_options().index).await?;
    let resolver = Resolver::new(&index);

    let resolution = resolver.resolve_universe(universe);

    println!("{} ({})", universe.name, universe.key);
    for line in item_lines(universe, &resolution) {
        println!("{}", line);
    }

    println!();
    println!(
        "Matched {} of {} ({:.0}%)",
        resolution.matched.len(),
        resolution.total,
        resolution.match_rate * 100.0
    );

    Ok(())
}

/// One line per declared item, built from a single resolution pass
fn item_lines(universe: &Universe, resolution: &UniverseResolution) -> Vec<String> {
    let matched: HashMap<usize, &InternalId> = resolution
        .matched_positions
        .iter()
        .copied()
        .zip(&resolution.matched)
        .collect();
    let unmatched: HashMap<usize, &NotFoundReason> = resolution
        .unmatched
        .iter()
        .map(|u| (u.position, &u.reason))
        .collect();

    universe
        .items
        .iter()
        .enumerate()
        .filter_map(|(position, item)| {
            let label = item.title.as_deref().unwrap_or("");
            if let Some(id) = matched.get(&position) {
                Some(format!("  {:>3}. {:<22} -> {} {}", position, item.reference(), id, label))
            } else {
                unmatched.get(&position).map(|reason| {
                    format!("  {:>3}. {:<22} -- {:?} {}", position, item.reference(), reason, label)
                })
            }
        })
        .collect()
}

/// Classify every universe and report problems
fn validate_universes(universes_path: &Path) -> Result<()> {
    let file = UniverseFile::from_file(universes_path)?;
    let mut invalid = 0;

    if let Err(e) = file.validate() {
        println!("Definitions: {:#}", e);
        invalid += 1;
    }

    for universe in &file.universes {
        let report = classify(universe);
        let distribution = report
            .distribution
            .iter()
            .map(|(kind, share)| format!("{} {:.0}%", kind, share.percentage))
            .collect::<Vec<_>>()
            .join(", ");

        println!(
            "{:<20} {:<8} {} items{}",
            universe.key,
            if report.is_valid { "ok" } else { "INVALID" },
            report.total,
            if distribution.is_empty() {
                String::new()
            } else {
                format!(" ({})", distribution)
            }
        );
        for error in &report.errors {
            println!("    error: {}", error);
        }
        for warning in &report.structural_warnings {
            println!("    warning: {}", warning);
        }

        if !report.is_valid {
            invalid += 1;
        }
    }

    if invalid > 0 {
        eprintln!("\n[{} problem(s) found]", invalid);
        std::process::exit(1);
    }

    Ok(())
}

/// Build the index and print its statistics
async fn show_index(cfg: &ResolvedConfig, library_path: &Path) -> Result<()> {
    let library = open_library(library_path).await?;
    let index = CatalogIndex::build(library.as_ref(), &cfg.sync.to_options().index).await?;
    let stats = index.stats();

    println!("Library: {}", library_path.display());
    println!("  Scanned:    {}", stats.scanned);
    println!("  Indexed:    {}", stats.indexed);
    println!("  Skipped:    {}", stats.skipped);
    println!("  Duplicates: {}", stats.duplicates);
    println!();
    println!("Partitions:");
    for (partition, size) in index.partition_sizes() {
        println!("  {:<14} {}", partition, size);
    }

    Ok(())
}

fn state_label(state: UniverseState) -> &'static str {
    match state {
        UniverseState::Pending => "pending",
        UniverseState::Classified => "classified",
        UniverseState::Resolved => "resolved",
        UniverseState::Synchronized => "synchronized",
        UniverseState::Failed => "failed",
    }
}

async fn load_summary(runs_dir: &Path, run_id: Uuid) -> Result<Option<RunSummary>> {
    SyncJournal::open(runs_dir, run_id).await?.summary().await
}

/// List recent runs
async fn list_runs(cfg: &ResolvedConfig, limit: usize) -> Result<()> {
    let runs_dir = cfg.runs_dir();
    let mut summaries = Vec::new();

    for run_id in SyncJournal::list_runs(&runs_dir).await? {
        match load_summary(&runs_dir, run_id).await {
            Ok(Some(summary)) => summaries.push(summary),
            Ok(None) => {}
            Err(e) => warn!(%run_id, error = %e, "Skipping unreadable run"),
        }
    }

    if summaries.is_empty() {
        println!("No runs found");
        return Ok(());
    }

    summaries.sort_by(|a, b| b.started_at.cmp(&a.started_at));
    summaries.truncate(limit);

    println!(
        "{:<38} {:<22} {:>6} {:>6} {:>7}",
        "RUN ID", "STARTED", "OK", "FAILED", "SKIPPED"
    );
    println!("{}", "-".repeat(83));

    for run in summaries {
        println!(
            "{:<38} {:<22} {:>6} {:>6} {:>7}",
            run.id,
            run.started_at.format("%Y-%m-%d %H:%M:%S"),
            run.succeeded(),
            run.failed(),
            run.skipped.len()
        );
    }

    Ok(())
}

/// Show the status of a run
async fn show_status(cfg: &ResolvedConfig, run_id_str: &str) -> Result<()> {
    let run_id =
        Uuid::parse_str(run_id_str).with_context(|| format!("Invalid run ID: {}", run_id_str))?;

    let runs_dir = cfg.runs_dir();
    if !SyncJournal::list_runs(&runs_dir).await?.contains(&run_id) {
        anyhow::bail!("Run not found: {}", run_id);
    }

    let run = load_summary(&runs_dir, run_id)
        .await?
        .with_context(|| format!("Run {} has an empty journal", run_id))?;

    println!("Run ID: {}", run.id);
    println!("Started: {}", run.started_at);
    match run.completed_at {
        Some(completed) => println!("Completed: {}", completed),
        None => println!("Completed: (unfinished)"),
    }
    if let Some(ref reason) = run.aborted {
        println!("Aborted: {}", reason);
    }
    println!("\nUniverse states:");
    for (key, state) in &run.universes {
        println!("  {}: {}", key, state_label(*state));
    }
    for key in &run.skipped {
        println!("  {}: skipped", key);
    }

    Ok(())
}

fn show_config(cfg: &ResolvedConfig, library: &Path, universes: &Path) -> Result<()> {
    println!("chronoverse configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home:      {}", cfg.home.display());
    println!("  Runs:      {}", cfg.runs_dir().display());
    println!("  Library:   {}", library.display());
    println!("  Universes: {}", universes.display());
    println!();
    println!("Sync:");
    println!("  Dry run:                  {}", cfg.sync.dry_run);
    println!("  Write timeout:            {}s", cfg.sync.write_timeout_seconds);
    println!("  Parallel index threshold: {}", cfg.sync.parallel_index_threshold);
    println!("  Journal:                  {}", cfg.sync.journal);

    Ok(())
}
