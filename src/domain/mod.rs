//! Domain types for chronoverse.
//!
//! This module contains the core data structures:
//! - Timeline items and universes: what the user declared
//! - Outcomes: what a synchronization run produced
//! - Reports: classification, unmatched items and advice attached to outcomes
//! - Failures: the taxonomy the advisor classifies into
//! - Events: journal records of a run

pub mod events;
pub mod failure;
pub mod ids;
pub mod outcome;
pub mod report;
pub mod run;
pub mod timeline;
pub mod universe;

// Re-export commonly used types
pub use events::{JournalEvent, JournalEventType};
pub use failure::{FailureKind, FailureRecord, RecoveryStrategy, Severity};
pub use ids::{CollectionId, InternalId};
pub use outcome::{
    BatchOutcome, BatchStatus, BatchSummary, SyncAction, TransitionError, UniverseOutcome,
    UniverseState,
};
pub use report::{AdvisorReport, ClassificationReport, KindShare, NotFoundReason, UnmatchedItem};
pub use run::RunSummary;
pub use timeline::{ContentKind, ExternalSource, ParseTagError, TimelineItem};
pub use universe::{Universe, UniverseFile};
