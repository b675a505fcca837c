//! Timeline synchronizer.
//!
//! Drives each universe through classify → resolve → collection write,
//! records every state change, and isolates failures so one universe can
//! never stop the others. Only a failed index build aborts a batch.

use std::collections::HashSet;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::adapters::{LibraryError, MediaLibrary};
use crate::domain::{
    BatchOutcome, BatchSummary, CollectionId, InternalId, JournalEvent, JournalEventType,
    SyncAction, TransitionError, Universe, UniverseOutcome, UniverseState,
};

use super::advisor::{advise, failure_record};
use super::classifier::classify;
use super::index::{CatalogIndex, IndexOptions};
use super::journal::SyncJournal;
use super::resolver::Resolver;

/// Callback invoked after each universe with (processed, total)
pub type ProgressCallback = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Failures that end one universe's synchronization
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Universe '{key}' failed validation: {}", errors.join("; "))]
    Validation { key: String, errors: Vec<String> },

    #[error("Invalid universe: {0}")]
    InvalidUniverse(String),

    #[error("Collection write for '{name}' timed out after {seconds}s")]
    WriteTimeout { name: String, seconds: u64 },

    #[error(transparent)]
    Library(#[from] LibraryError),

    #[error(transparent)]
    Transition(#[from] TransitionError),
}

/// Synchronizer settings
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Classify and resolve without writing collections
    pub dry_run: bool,

    /// Upper bound on each collection lookup or write
    pub write_timeout: Duration,

    pub index: IndexOptions,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            write_timeout: Duration::from_secs(30),
            index: IndexOptions::default(),
        }
    }
}

/// Per-batch context shared by all universes in the batch
struct RunContext {
    run_id: Uuid,
    journal: Option<SyncJournal>,
}

impl RunContext {
    fn detached() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            journal: None,
        }
    }

    /// Append to the journal; failures are logged, never propagated
    async fn record(&self, event: JournalEvent) {
        if let Some(ref journal) = self.journal {
            if let Err(e) = journal.append(&event).await {
                warn!(run_id = %self.run_id, error = %e, "Failed to write journal event");
            }
        }
    }
}

/// One universe moving through its states
struct UniverseRun<'a> {
    ctx: &'a RunContext,
    outcome: UniverseOutcome,

    /// Name the universe is journaled under
    label: String,
}

impl<'a> UniverseRun<'a> {
    fn new(ctx: &'a RunContext, universe: &Universe) -> Self {
        Self {
            ctx,
            outcome: UniverseOutcome::for_universe(universe),
            label: universe.key.clone(),
        }
    }

    fn labelled(mut self, label: String) -> Self {
        self.label = label;
        self
    }

    async fn advance(
        &mut self,
        next: UniverseState,
        event_type: JournalEventType,
        summary: String,
    ) -> Result<(), SyncError> {
        self.outcome.state = self.outcome.state.advance(next)?;

        let mut event =
            JournalEvent::universe(self.ctx.run_id, &self.label, event_type, next, summary);
        if next != UniverseState::Classified {
            event = event.with_counts(self.outcome.matched_count(), self.outcome.unmatched_count());
        } else {
            event = event.with_fingerprint(self.outcome.fingerprint.clone());
        }
        self.ctx.record(event).await;

        Ok(())
    }

    async fn fail(mut self, err: SyncError) -> UniverseOutcome {
        let record = failure_record(&err);
        warn!(
            universe = %self.outcome.key,
            from = ?self.outcome.state,
            kind = ?record.kind,
            error = %err,
            "Universe synchronization failed"
        );

        self.outcome.state = self
            .outcome
            .state
            .advance(UniverseState::Failed)
            .unwrap_or(UniverseState::Failed);
        self.outcome.errors.push(record);

        let event = JournalEvent::universe(
            self.ctx.run_id,
            &self.label,
            JournalEventType::UniverseFailed,
            UniverseState::Failed,
            format!("Universe '{}' failed", self.outcome.key),
        )
        .with_error(err.to_string());
        self.ctx.record(event).await;

        self.outcome
    }
}

/// Synchronizes universes into named collections of a media library
pub struct TimelineSynchronizer {
    library: Arc<dyn MediaLibrary>,
    options: SyncOptions,

    /// Directory that receives one journal per batch
    runs_dir: Option<PathBuf>,

    cancel: Option<CancellationToken>,
    progress: Option<ProgressCallback>,
}

impl TimelineSynchronizer {
    /// Create a synchronizer with default options
    pub fn new(library: Arc<dyn MediaLibrary>) -> Self {
        Self {
            library,
            options: SyncOptions::default(),
            runs_dir: None,
            cancel: None,
            progress: None,
        }
    }

    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    /// Journal every batch under `runs_dir/<run-id>/journal.jsonl`
    pub fn with_journal(mut self, runs_dir: impl Into<PathBuf>) -> Self {
        self.runs_dir = Some(runs_dir.into());
        self
    }

    /// Stop between universes once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn with_progress(mut self, callback: impl Fn(usize, usize) + Send + Sync + 'static) -> Self {
        self.progress = Some(Arc::new(callback));
        self
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Build the catalog index from the library
    pub async fn build_index(&self) -> Result<CatalogIndex, LibraryError> {
        CatalogIndex::build(self.library.as_ref(), &self.options.index).await
    }

    /// Synchronize a batch of universes against a fresh index.
    ///
    /// Returns `Err` only when the index cannot be built; every per-universe
    /// failure is captured in the outcome.
    #[instrument(skip(self, universes), fields(universes = universes.len(), dry_run = self.options.dry_run))]
    pub async fn synchronize_batch(&self, universes: &[Universe]) -> Result<BatchOutcome> {
        let ctx = self.open_run().await;
        info!(run_id = %ctx.run_id, "Starting synchronization batch");

        ctx.record(JournalEvent::batch(
            ctx.run_id,
            JournalEventType::BatchStarted,
            format!("Batch of {} universes started", universes.len()),
        ))
        .await;

        let index = match self.build_index().await {
            Ok(index) => index,
            Err(e) => {
                error!(run_id = %ctx.run_id, error = %e, "Catalog index build failed");
                ctx.record(
                    JournalEvent::batch(
                        ctx.run_id,
                        JournalEventType::IndexFailed,
                        "Catalog index build failed".to_string(),
                    )
                    .with_error(e.to_string()),
                )
                .await;
                return Err(anyhow::Error::new(e).context("Failed to build catalog index"));
            }
        };

        let stats = index.stats();
        ctx.record(JournalEvent::batch(
            ctx.run_id,
            JournalEventType::IndexBuilt,
            format!(
                "Indexed {} of {} library entries ({} external ids)",
                stats.indexed,
                stats.scanned,
                index.len()
            ),
        ))
        .await;

        Ok(self.run_batch(&ctx, universes, &index).await)
    }

    /// Synchronize a batch against an index the caller already built
    pub async fn synchronize_batch_with_index(
        &self,
        universes: &[Universe],
        index: &CatalogIndex,
    ) -> BatchOutcome {
        let ctx = self.open_run().await;
        ctx.record(JournalEvent::batch(
            ctx.run_id,
            JournalEventType::BatchStarted,
            format!("Batch of {} universes started (shared index)", universes.len()),
        ))
        .await;

        self.run_batch(&ctx, universes, index).await
    }

    /// Synchronize a single universe against a built index
    pub async fn synchronize(&self, universe: &Universe, index: &CatalogIndex) -> UniverseOutcome {
        let ctx = RunContext::detached();
        self.synchronize_in(&ctx, universe, index).await
    }

    async fn run_batch(
        &self,
        ctx: &RunContext,
        universes: &[Universe],
        index: &CatalogIndex,
    ) -> BatchOutcome {
        let total = universes.len();
        let mut outcomes = Vec::with_capacity(total);
        let mut seen_keys = HashSet::new();
        let mut seen_names = HashSet::new();

        for (processed, universe) in universes.iter().enumerate() {
            if self.is_cancelled() {
                warn!(
                    run_id = %ctx.run_id,
                    remaining = total - processed,
                    "Batch cancelled, skipping remaining universes"
                );
                for remaining in &universes[processed..] {
                    ctx.record(JournalEvent::universe(
                        ctx.run_id,
                        &remaining.key,
                        JournalEventType::UniverseSkipped,
                        UniverseState::Pending,
                        format!("Universe '{}' skipped (cancelled)", remaining.key),
                    ))
                    .await;
                    outcomes.push(UniverseOutcome::for_universe(remaining));
                }
                break;
            }

            // Later duplicates fail; the first key or collection name wins
            let outcome = if !seen_keys.insert(universe.key.as_str()) {
                UniverseRun::new(ctx, universe)
                    .labelled(format!("{}#{}", universe.key, processed))
                    .fail(SyncError::InvalidUniverse(format!(
                        "duplicate universe key '{}' in batch",
                        universe.key
                    )))
                    .await
            } else if !seen_names.insert(universe.name.as_str()) {
                UniverseRun::new(ctx, universe)
                    .fail(SyncError::InvalidUniverse(format!(
                        "duplicate collection name '{}' in batch",
                        universe.name
                    )))
                    .await
            } else {
                self.synchronize_in(ctx, universe, index).await
            };
            outcomes.push(outcome);

            if let Some(ref progress) = self.progress {
                progress(processed + 1, total);
            }
        }

        let summary = BatchSummary::from_outcomes(&outcomes);
        let status = summary.status();
        let advice = advise(&outcomes);

        ctx.record(JournalEvent::batch(
            ctx.run_id,
            JournalEventType::BatchCompleted,
            format!(
                "Batch finished: {} synchronized, {} failed, {} skipped",
                summary.succeeded, summary.failed, summary.skipped
            ),
        ))
        .await;

        info!(
            run_id = %ctx.run_id,
            ?status,
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            severity = ?advice.overall_severity,
            "Synchronization batch finished"
        );

        BatchOutcome {
            run_id: ctx.run_id,
            status,
            summary,
            universes: outcomes,
            advice,
            dry_run: self.options.dry_run,
        }
    }

    #[instrument(skip(self, ctx, universe, index), fields(universe = %universe.key))]
    async fn synchronize_in(
        &self,
        ctx: &RunContext,
        universe: &Universe,
        index: &CatalogIndex,
    ) -> UniverseOutcome {
        let mut run = UniverseRun::new(ctx, universe);

        match self.drive(&mut run, universe, index).await {
            Ok(()) => run.outcome,
            Err(err) => run.fail(err).await,
        }
    }

    async fn drive(
        &self,
        run: &mut UniverseRun<'_>,
        universe: &Universe,
        index: &CatalogIndex,
    ) -> Result<(), SyncError> {
        if let Some(problem) = universe.identity_problem() {
            return Err(SyncError::InvalidUniverse(problem));
        }

        // Classify
        let report = classify(universe);
        let is_valid = report.is_valid;
        let errors = report.errors.clone();
        if report.is_empty {
            warn!("Universe declares no items");
        }
        for warning in &report.structural_warnings {
            warn!(%warning, "Structurally invalid timeline item");
        }
        run.outcome.classification = Some(report);

        if !is_valid {
            return Err(SyncError::Validation {
                key: universe.key.clone(),
                errors,
            });
        }

        run.advance(
            UniverseState::Classified,
            JournalEventType::UniverseClassified,
            format!("Universe '{}' classified ({} items)", universe.key, universe.len()),
        )
        .await?;

        // Resolve
        let resolution = Resolver::new(index).resolve_universe(universe);
        run.outcome.matched = resolution.matched;
        run.outcome.unmatched = resolution.unmatched;
        run.outcome.match_rate = resolution.match_rate;

        let summary = format!(
            "Resolved {} of {} items",
            run.outcome.matched_count(),
            resolution.total
        );
        run.advance(UniverseState::Resolved, JournalEventType::UniverseResolved, summary)
            .await?;

        // Write
        if self.options.dry_run {
            debug!("Dry run, collection left untouched");
            run.outcome.action = SyncAction::Skipped;
        } else {
            let (collection, action) = self
                .write_collection(&universe.name, &run.outcome.matched)
                .await?;
            run.outcome.collection_id = Some(collection);
            run.outcome.action = action;
        }

        let summary = format!(
            "Collection '{}' {:?} with {} items",
            universe.name,
            run.outcome.action,
            run.outcome.matched_count()
        );
        run.advance(
            UniverseState::Synchronized,
            JournalEventType::UniverseSynchronized,
            summary,
        )
        .await?;

        info!(
            action = ?run.outcome.action,
            matched = run.outcome.matched_count(),
            unmatched = run.outcome.unmatched_count(),
            match_rate = run.outcome.match_rate,
            "Universe synchronized"
        );

        Ok(())
    }

    /// Create the named collection or replace its membership wholesale
    async fn write_collection(
        &self,
        name: &str,
        items: &[InternalId],
    ) -> Result<(CollectionId, SyncAction), SyncError> {
        let existing = self
            .bounded(name, self.library.find_named_collection(name))
            .await?;

        match existing {
            Some(collection) => {
                self.bounded(
                    name,
                    self.library.replace_collection_membership(&collection, items),
                )
                .await?;
                Ok((collection, SyncAction::Updated))
            }
            None => {
                let collection = self
                    .bounded(name, self.library.create_named_collection(name, items))
                    .await?;
                Ok((collection, SyncAction::Created))
            }
        }
    }

    /// Run a library call under the configured write timeout
    async fn bounded<T>(
        &self,
        name: &str,
        call: impl Future<Output = Result<T, LibraryError>>,
    ) -> Result<T, SyncError> {
        match tokio::time::timeout(self.options.write_timeout, call).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(SyncError::WriteTimeout {
                name: name.to_string(),
                seconds: self.options.write_timeout.as_secs(),
            }),
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(CancellationToken::is_cancelled)
            .unwrap_or(false)
    }

    async fn open_run(&self) -> RunContext {
        let run_id = Uuid::new_v4();

        let journal = match self.runs_dir {
            Some(ref runs_dir) => match SyncJournal::open(runs_dir, run_id).await {
                Ok(journal) => Some(journal),
                Err(e) => {
                    warn!(%run_id, error = %e, "Sync journal unavailable, continuing without it");
                    None
                }
            },
            None => None,
        };

        RunContext { run_id, journal }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryLibrary;

    #[test]
    fn test_default_options() {
        let options = SyncOptions::default();
        assert!(!options.dry_run);
        assert_eq!(options.write_timeout, Duration::from_secs(30));
        assert_eq!(options.index.parallel_threshold, 5000);
    }

    #[test]
    fn test_validation_error_lists_items() {
        let err = SyncError::Validation {
            key: "x".into(),
            errors: vec!["item 0 (a:1): bad".into(), "item 2 (b:2): worse".into()],
        };
        assert_eq!(
            err.to_string(),
            "Universe 'x' failed validation: item 0 (a:1): bad; item 2 (b:2): worse"
        );
    }

    #[tokio::test]
    async fn test_invalid_key_fails_before_classification() {
        let library = Arc::new(InMemoryLibrary::new());
        let synchronizer = TimelineSynchronizer::new(library.clone());
        let index = CatalogIndex::empty();

        let outcome = synchronizer
            .synchronize(&Universe::new("has space", "Spaced"), &index)
            .await;

        assert!(outcome.is_failed());
        assert!(outcome.classification.is_none());
        assert_eq!(library.collection_count().await, 0);
    }
}
