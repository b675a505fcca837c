//! Library backed by a JSON snapshot file.
//!
//! The snapshot is an export of the hosting server's catalog plus the named
//! collections chronoverse manages. Each collection change takes an exclusive
//! lock on a sidecar `.lock` file, re-reads the file, applies the change and
//! writes it back with write-to-temp and rename before releasing the lock.
//!
//! ```text
//! {
//!   "version": 1,
//!   "entries": [
//!     { "id": "a1b2", "kind": "movie", "title": "Iron Man",
//!       "provider_ids": { "Tmdb": "1726", "Imdb": "tt0371746" } }
//!   ],
//!   "collections": [
//!     { "id": "…", "name": "MCU", "items": ["a1b2"] }
//!   ]
//! }
//! ```

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::{LibraryEntry, LibraryError, MediaLibrary};
use crate::domain::{CollectionId, InternalId};

/// On-disk snapshot layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Snapshot format version
    pub version: u32,

    #[serde(default)]
    pub entries: Vec<LibraryEntry>,

    #[serde(default)]
    pub collections: Vec<SnapshotCollection>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            version: 1,
            entries: Vec::new(),
            collections: Vec::new(),
        }
    }
}

/// A named collection in the snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotCollection {
    pub id: CollectionId,
    pub name: String,
    #[serde(default)]
    pub items: Vec<InternalId>,
}

/// Library served from a snapshot file
pub struct SnapshotLibrary {
    path: PathBuf,
    snapshot: RwLock<Snapshot>,
}

impl SnapshotLibrary {
    /// Load the snapshot at `path`
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let content = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read library snapshot: {}", path.display()))?;

        let snapshot: Snapshot = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse library snapshot: {}", path.display()))?;

        debug!(
            path = %path.display(),
            entries = snapshot.entries.len(),
            collections = snapshot.collections.len(),
            "Loaded library snapshot"
        );

        Ok(Self {
            path,
            snapshot: RwLock::new(snapshot),
        })
    }

    /// Write `snapshot` to `path` and return a library serving it
    pub async fn create(path: impl Into<PathBuf>, snapshot: Snapshot) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        persist(&path, &snapshot)
            .await
            .with_context(|| format!("Failed to write library snapshot: {}", path.display()))?;

        Ok(Self {
            path,
            snapshot: RwLock::new(snapshot),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get a collection by display name
    pub async fn collection(&self, name: &str) -> Option<SnapshotCollection> {
        self.snapshot
            .read()
            .await
            .collections
            .iter()
            .find(|c| c.name == name)
            .cloned()
    }

    pub async fn collections(&self) -> Vec<SnapshotCollection> {
        self.snapshot.read().await.collections.clone()
    }
}

#[async_trait]
impl MediaLibrary for SnapshotLibrary {
    fn name(&self) -> &str {
        "snapshot"
    }

    async fn scan_all(&self) -> Result<Vec<LibraryEntry>, LibraryError> {
        Ok(self.snapshot.read().await.entries.clone())
    }

    async fn find_named_collection(
        &self,
        name: &str,
    ) -> Result<Option<CollectionId>, LibraryError> {
        Ok(self
            .snapshot
            .read()
            .await
            .collections
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.id.clone()))
    }

    async fn create_named_collection(
        &self,
        name: &str,
        items: &[InternalId],
    ) -> Result<CollectionId, LibraryError> {
        let name = name.to_string();
        let items = items.to_vec();

        self.update(move |snapshot| {
            if snapshot.collections.iter().any(|c| c.name == name) {
                return Err(LibraryError::InvalidState(format!(
                    "collection '{}' already exists",
                    name
                )));
            }

            let id = CollectionId::new(Uuid::new_v4().to_string());
            snapshot.collections.push(SnapshotCollection {
                id: id.clone(),
                name,
                items,
            });
            Ok(id)
        })
        .await
    }

    async fn replace_collection_membership(
        &self,
        collection: &CollectionId,
        items: &[InternalId],
    ) -> Result<(), LibraryError> {
        let collection = collection.clone();
        let items = items.to_vec();

        self.update(move |snapshot| {
            let stored = snapshot
                .collections
                .iter_mut()
                .find(|c| c.id == collection)
                .ok_or(LibraryError::CollectionNotFound(collection))?;
            stored.items = items;
            Ok(())
        })
        .await
    }
}

impl SnapshotLibrary {
    /// Apply `change` to the file's current contents under the exclusive lock.
    ///
    /// The in-memory copy becomes what was written, including changes other
    /// handles made since `open`.
    async fn update<T, F>(&self, change: F) -> Result<T, LibraryError>
    where
        F: FnOnce(&mut Snapshot) -> Result<T, LibraryError> + Send + 'static,
        T: Send + 'static,
    {
        let mut current = self.snapshot.write().await;
        let path = self.path.clone();

        let (written, value) = tokio::task::spawn_blocking(move || update_locked(&path, change))
            .await
            .map_err(|e| LibraryError::Other(format!("Snapshot writer panicked: {}", e)))??;

        *current = written;
        Ok(value)
    }
}

/// Write a whole snapshot, replacing whatever is on disk
async fn persist(path: &Path, snapshot: &Snapshot) -> Result<(), LibraryError> {
    let snapshot = snapshot.clone();
    let path = path.to_path_buf();

    tokio::task::spawn_blocking(move || {
        let _lock = lock(&path)?;
        write_atomic(&path, &snapshot)
    })
    .await
    .map_err(|e| LibraryError::Other(format!("Snapshot writer panicked: {}", e)))?
}

/// Read, change and rewrite the snapshot while holding the lock
fn update_locked<T>(
    path: &Path,
    change: impl FnOnce(&mut Snapshot) -> Result<T, LibraryError>,
) -> Result<(Snapshot, T), LibraryError> {
    // Lock is released when the file is dropped
    let _lock = lock(path)?;

    let content = std::fs::read_to_string(path)?;
    let mut snapshot: Snapshot = serde_json::from_str(&content)
        .map_err(|e| LibraryError::Other(format!("Failed to parse snapshot: {}", e)))?;

    let value = change(&mut snapshot)?;
    write_atomic(path, &snapshot)?;

    debug!(
        path = %path.display(),
        collections = snapshot.collections.len(),
        "Snapshot updated"
    );

    Ok((snapshot, value))
}

/// Acquire the exclusive lock on the sidecar `.lock` file
fn lock(path: &Path) -> Result<std::fs::File, LibraryError> {
    let lock_file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path.with_extension("lock"))?;
    lock_file.lock_exclusive()?;
    Ok(lock_file)
}

/// Write to a temp file in the same directory and rename over `path`
fn write_atomic(path: &Path, snapshot: &Snapshot) -> Result<(), LibraryError> {
    let content = serde_json::to_string_pretty(snapshot)
        .map_err(|e| LibraryError::Other(format!("Failed to serialize snapshot: {}", e)))?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(content.as_bytes())?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| LibraryError::from(e.error))?;

    Ok(())
}
