//! In-process library used by tests and embedders.
//!
//! Holds catalog entries and named collections in memory. Failures can be
//! injected for scans and for writes to specific collection names.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{LibraryEntry, LibraryError, MediaLibrary};
use crate::domain::{CollectionId, InternalId};

/// A named collection as stored by the library
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCollection {
    pub id: CollectionId,
    pub name: String,
    pub items: Vec<InternalId>,
}

#[derive(Debug, Default)]
struct State {
    entries: Vec<LibraryEntry>,
    collections: Vec<StoredCollection>,
    scan_failure: Option<LibraryError>,
    write_failures: HashMap<String, LibraryError>,
}

/// Library backed by process memory
#[derive(Debug, Default)]
pub struct InMemoryLibrary {
    state: RwLock<State>,
    next_collection: AtomicUsize,
    scans: AtomicUsize,
}

impl InMemoryLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: impl IntoIterator<Item = LibraryEntry>) -> Self {
        Self {
            state: RwLock::new(State {
                entries: entries.into_iter().collect(),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    pub async fn add_entry(&self, entry: LibraryEntry) {
        self.state.write().await.entries.push(entry);
    }

    pub async fn remove_entry(&self, id: &InternalId) -> Option<LibraryEntry> {
        let mut state = self.state.write().await;
        let pos = state.entries.iter().position(|e| &e.id == id)?;
        Some(state.entries.remove(pos))
    }

    /// Make every subsequent scan fail with `error`
    pub async fn fail_scans_with(&self, error: LibraryError) {
        self.state.write().await.scan_failure = Some(error);
    }

    /// Make writes to the collection named `name` fail with `error`
    pub async fn fail_writes_for(&self, name: impl Into<String>, error: LibraryError) {
        self.state
            .write()
            .await
            .write_failures
            .insert(name.into(), error);
    }

    pub async fn clear_failures(&self) {
        let mut state = self.state.write().await;
        state.scan_failure = None;
        state.write_failures.clear();
    }

    /// Get a collection by display name
    pub async fn collection(&self, name: &str) -> Option<StoredCollection> {
        self.state
            .read()
            .await
            .collections
            .iter()
            .find(|c| c.name == name)
            .cloned()
    }

    /// Replace a collection's items directly, bypassing the engine
    pub async fn edit_collection(&self, name: &str, items: Vec<InternalId>) -> bool {
        let mut state = self.state.write().await;
        match state.collections.iter_mut().find(|c| c.name == name) {
            Some(collection) => {
                collection.items = items;
                true
            }
            None => false,
        }
    }

    pub async fn collection_count(&self) -> usize {
        self.state.read().await.collections.len()
    }

    /// Number of `scan_all` calls served so far
    pub fn scan_count(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }

    fn check_write(state: &State, name: &str) -> Result<(), LibraryError> {
        match state.write_failures.get(name) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl MediaLibrary for InMemoryLibrary {
    fn name(&self) -> &str {
        "memory"
    }

    async fn scan_all(&self) -> Result<Vec<LibraryEntry>, LibraryError> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        let state = self.state.read().await;
        if let Some(ref err) = state.scan_failure {
            return Err(err.clone());
        }
        Ok(state.entries.clone())
    }

    async fn find_named_collection(
        &self,
        name: &str,
    ) -> Result<Option<CollectionId>, LibraryError> {
        let state = self.state.read().await;
        Ok(state
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
        let mut state = self.state.write().await;
        Self::check_write(&state, name)?;

        if state.collections.iter().any(|c| c.name == name) {
            return Err(LibraryError::InvalidState(format!(
                "collection '{}' already exists",
                name
            )));
        }

        let n = self.next_collection.fetch_add(1, Ordering::SeqCst) + 1;
        let id = CollectionId::new(format!("collection-{}", n));
        state.collections.push(StoredCollection {
            id: id.clone(),
            name: name.to_string(),
            items: items.to_vec(),
        });

        Ok(id)
    }

    async fn replace_collection_membership(
        &self,
        collection: &CollectionId,
        items: &[InternalId],
    ) -> Result<(), LibraryError> {
        let mut state = self.state.write().await;

        let name = state
            .collections
            .iter()
            .find(|c| &c.id == collection)
            .map(|c| c.name.clone())
            .ok_or_else(|| LibraryError::CollectionNotFound(collection.clone()))?;
        Self::check_write(&state, &name)?;

        if let Some(stored) = state.collections.iter_mut().find(|c| &c.id == collection) {
            stored.items = items.to_vec();
        }

        Ok(())
    }
}
