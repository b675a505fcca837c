//! Core synchronization engine.
//!
//! This module contains:
//! - CatalogIndex: Reverse index from external ids to library ids
//! - Resolver: Item lookups against a built index
//! - Classifier: Kind and provider compatibility checks
//! - TimelineSynchronizer: Batch execution engine
//! - Advisor: Failure classification and recommendations
//! - SyncJournal: Append-only run log

pub mod advisor;
pub mod classifier;
pub mod index;
pub mod journal;
pub mod resolver;
pub mod synchronizer;

// Re-export commonly used types
pub use advisor::{advise, classify_failure, AdvisorReport};
pub use classifier::{classify, classify_items, ClassificationReport, KindShare};
pub use index::{CatalogIndex, IndexOptions, IndexStats};
pub use journal::SyncJournal;
pub use resolver::{NotFoundReason, Resolution, Resolver, UniverseResolution, UnmatchedItem};
pub use synchronizer::{ProgressCallback, SyncError, SyncOptions, TimelineSynchronizer};
