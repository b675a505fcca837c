//! Adapter interfaces for the target media library.
//!
//! The hosting media server owns entity storage and collection persistence.
//! The engine talks to it only through [`MediaLibrary`].

pub mod memory;
pub mod snapshot;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{CollectionId, ContentKind, ExternalSource, InternalId};

pub use memory::InMemoryLibrary;
pub use snapshot::SnapshotLibrary;

/// Kind of an entry as the library stores it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Movie,
    Series,
    Season,
    Episode,
    Other,
}

impl EntryKind {
    /// Timeline kind this entry can be matched as, if any
    pub fn content_kind(self) -> Option<ContentKind> {
        match self {
            Self::Movie => Some(ContentKind::Movie),
            Self::Episode => Some(ContentKind::Episode),
            Self::Series | Self::Season | Self::Other => None,
        }
    }
}

/// One item of the library catalog as returned by a scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryEntry {
    pub id: InternalId,

    pub kind: EntryKind,

    /// Display title, never used for matching
    #[serde(default)]
    pub title: String,

    /// Provider name → external identifier (e.g. "Tmdb" → "603")
    #[serde(default)]
    pub provider_ids: BTreeMap<String, String>,
}

impl LibraryEntry {
    pub fn new(id: impl Into<String>, kind: EntryKind, title: impl Into<String>) -> Self {
        Self {
            id: InternalId::new(id),
            kind,
            title: title.into(),
            provider_ids: BTreeMap::new(),
        }
    }

    pub fn with_provider_id(mut self, provider: impl Into<String>, value: impl Into<String>) -> Self {
        self.provider_ids.insert(provider.into(), value.into());
        self
    }

    /// Recognized, non-blank external ids in provider-name order
    pub fn external_ids(&self) -> impl Iterator<Item = (ExternalSource, &str)> + '_ {
        self.provider_ids.iter().filter_map(|(provider, value)| {
            let source = provider.parse::<ExternalSource>().ok()?;
            let value = value.trim();
            (!value.is_empty()).then_some((source, value))
        })
    }
}

/// Failures reported by the library collaborator
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LibraryError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Library call timed out: {0}")]
    Timeout(String),

    #[error("Collection not found: {0}")]
    CollectionNotFound(CollectionId),

    #[error("Library in invalid state: {0}")]
    InvalidState(String),

    #[error("Operation not supported by library: {0}")]
    Unsupported(String),

    #[error("Library I/O error: {0}")]
    Io(String),

    #[error("{0}")]
    Other(String),
}

impl From<std::io::Error> for LibraryError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(err.to_string()),
            std::io::ErrorKind::TimedOut => Self::Timeout(err.to_string()),
            _ => Self::Io(err.to_string()),
        }
    }
}

/// Trait for the library collaborator
#[async_trait]
pub trait MediaLibrary: Send + Sync {
    /// Human-readable library name
    fn name(&self) -> &str;

    /// Return every catalog entry; called once per index build
    async fn scan_all(&self) -> Result<Vec<LibraryEntry>, LibraryError>;

    /// Look up a named collection
    async fn find_named_collection(&self, name: &str)
        -> Result<Option<CollectionId>, LibraryError>;

    /// Create a named collection holding `items` in order
    async fn create_named_collection(
        &self,
        name: &str,
        items: &[InternalId],
    ) -> Result<CollectionId, LibraryError>;

    /// Replace a collection's membership and order with `items`
    async fn replace_collection_membership(
        &self,
        collection: &CollectionId,
        items: &[InternalId],
    ) -> Result<(), LibraryError>;
}
