//! chronoverse - Chronological collection synchronizer for media libraries
//!
//! Takes declared, ordered watch timelines ("universes") that reference
//! content by external catalog ids and keeps one named, ordered collection
//! per universe in a media library.
//!
//! # Architecture
//!
//! Each batch runs the same pipeline:
//! - The library is scanned once into an immutable catalog index
//! - Every universe is classified, resolved and written independently
//! - Failures are isolated per universe and summarized by the advisor
//! - State changes are appended to a per-run journal
//!
//! # Modules
//!
//! - `adapters`: Media library integrations (snapshot file, in-memory)
//! - `core`: Engine (CatalogIndex, Resolver, Classifier, Synchronizer, Advisor)
//! - `domain`: Data structures (TimelineItem, Universe, outcomes, events)
//! - `config`: Configuration discovery
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Synchronize every universe
//! chronoverse sync
//!
//! # Preview one universe without writing
//! chronoverse sync --universe 'mcu*' --dry-run
//!
//! # Inspect a past run
//! chronoverse status <run-id>
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;

// Re-export main types at crate root for convenience
pub use adapters::{InMemoryLibrary, LibraryEntry, LibraryError, MediaLibrary, SnapshotLibrary};
pub use core::{CatalogIndex, Resolver, SyncOptions, TimelineSynchronizer};
pub use domain::{
    BatchOutcome, BatchStatus, ContentKind, ExternalSource, TimelineItem, Universe,
    UniverseOutcome, UniverseState,
};
