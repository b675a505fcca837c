//! Per-universe and per-batch synchronization outcomes.
//!
//! Outcomes are created fresh on every run and never reused.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::failure::FailureRecord;
use super::ids::{CollectionId, InternalId};
use super::report::{AdvisorReport, ClassificationReport, UnmatchedItem};
use super::universe::Universe;

/// Lifecycle of one universe within a batch.
///
/// `Pending → Classified → Resolved → Synchronized`, or `Failed` from any
/// non-terminal state. States are never re-entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UniverseState {
    #[default]
    Pending,
    Classified,
    Resolved,
    Synchronized,
    Failed,
}

impl UniverseState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Synchronized | Self::Failed)
    }

    /// Move to `next`, rejecting anything but the forward edge or failure
    pub fn advance(self, next: UniverseState) -> Result<UniverseState, TransitionError> {
        let allowed = match (self, next) {
            (from, Self::Failed) => !from.is_terminal(),
            (Self::Pending, Self::Classified) => true,
            (Self::Classified, Self::Resolved) => true,
            (Self::Resolved, Self::Synchronized) => true,
            _ => false,
        };

        if allowed {
            Ok(next)
        } else {
            Err(TransitionError {
                from: self,
                to: next,
            })
        }
    }
}

/// Rejected universe state change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Invalid universe state transition: {from:?} -> {to:?}")]
pub struct TransitionError {
    pub from: UniverseState,
    pub to: UniverseState,
}

/// What happened to the named collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncAction {
    Created,
    Updated,
    Skipped,
}

/// Result of synchronizing one universe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniverseOutcome {
    pub key: String,
    pub name: String,
    pub state: UniverseState,
    pub action: SyncAction,
    pub collection_id: Option<CollectionId>,

    /// Declared item count
    pub declared: usize,

    /// Matched ids in declared order, as written to the collection
    pub matched: Vec<InternalId>,

    /// Declared items the library does not have (diagnostics, not failures)
    pub unmatched: Vec<UnmatchedItem>,

    pub match_rate: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<ClassificationReport>,

    #[serde(default)]
    pub errors: Vec<FailureRecord>,

    /// Fingerprint of the declared items this outcome was computed from
    pub fingerprint: String,
}

impl UniverseOutcome {
    pub(crate) fn for_universe(universe: &Universe) -> Self {
        Self {
            key: universe.key.clone(),
            name: universe.name.clone(),
            state: UniverseState::Pending,
            action: SyncAction::Skipped,
            collection_id: None,
            declared: universe.len(),
            matched: Vec::new(),
            unmatched: Vec::new(),
            match_rate: 0.0,
            classification: None,
            errors: Vec::new(),
            fingerprint: universe.fingerprint(),
        }
    }

    pub fn matched_count(&self) -> usize {
        self.matched.len()
    }

    pub fn unmatched_count(&self) -> usize {
        self.unmatched.len()
    }

    pub fn is_success(&self) -> bool {
        self.state == UniverseState::Synchronized
    }

    pub fn is_failed(&self) -> bool {
        self.state == UniverseState::Failed
    }
}

/// Overall verdict of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// Every processed universe synchronized
    Succeeded,

    /// At least one universe synchronized and at least one failed
    PartialSuccess,

    /// Every processed universe failed
    Failed,

    /// Cancelled before any universe was processed
    Cancelled,
}

/// Counts over a batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,

    /// Not processed because the batch was cancelled
    pub skipped: usize,

    pub matched_items: usize,
    pub unmatched_items: usize,
}

impl BatchSummary {
    pub fn from_outcomes(outcomes: &[UniverseOutcome]) -> Self {
        let mut summary = Self {
            total: outcomes.len(),
            ..Default::default()
        };

        for outcome in outcomes {
            match outcome.state {
                UniverseState::Synchronized => {
                    summary.succeeded += 1;
                    summary.matched_items += outcome.matched_count();
                    summary.unmatched_items += outcome.unmatched_count();
                }
                UniverseState::Failed => summary.failed += 1,
                _ => summary.skipped += 1,
            }
        }

        summary
    }

    pub fn status(&self) -> BatchStatus {
        let processed = self.succeeded + self.failed;
        if processed == 0 && self.skipped > 0 {
            BatchStatus::Cancelled
        } else if processed > 0 && self.succeeded == 0 {
            BatchStatus::Failed
        } else if self.failed > 0 {
            BatchStatus::PartialSuccess
        } else {
            BatchStatus::Succeeded
        }
    }
}

/// Structured result of `synchronize_batch`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub run_id: Uuid,
    pub status: BatchStatus,
    pub summary: BatchSummary,

    /// One outcome per requested universe, in request order
    pub universes: Vec<UniverseOutcome>,

    pub advice: AdvisorReport,

    pub dry_run: bool,
}

impl BatchOutcome {
    pub fn get(&self, key: &str) -> Option<&UniverseOutcome> {
        self.universes.iter().find(|u| u.key == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions() {
        let state = UniverseState::Pending;
        let state = state.advance(UniverseState::Classified).unwrap();
        let state = state.advance(UniverseState::Resolved).unwrap();
        let state = state.advance(UniverseState::Synchronized).unwrap();
        assert!(state.is_terminal());
    }

    #[test]
    fn test_rejected_transitions() {
        assert!(UniverseState::Pending
            .advance(UniverseState::Resolved)
            .is_err());
        assert!(UniverseState::Resolved
            .advance(UniverseState::Classified)
            .is_err());
        assert!(UniverseState::Synchronized
            .advance(UniverseState::Failed)
            .is_err());
        assert!(UniverseState::Failed
            .advance(UniverseState::Failed)
            .is_err());
        assert_eq!(
            UniverseState::Classified.advance(UniverseState::Failed),
            Ok(UniverseState::Failed)
        );
    }

    #[test]
    fn test_batch_status() {
        let summary = |succeeded, failed, skipped| BatchSummary {
            total: succeeded + failed + skipped,
            succeeded,
            failed,
            skipped,
            ..Default::default()
        };

        assert_eq!(summary(0, 0, 0).status(), BatchStatus::Succeeded);
        assert_eq!(summary(3, 0, 0).status(), BatchStatus::Succeeded);
        assert_eq!(summary(2, 1, 0).status(), BatchStatus::PartialSuccess);
        assert_eq!(summary(0, 3, 0).status(), BatchStatus::Failed);
        assert_eq!(summary(0, 1, 2).status(), BatchStatus::Failed);
        assert_eq!(summary(0, 0, 2).status(), BatchStatus::Cancelled);
    }
}
