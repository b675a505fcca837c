//! Reverse index from external catalog ids to library ids.
//!
//! The index is partitioned by (source, kind). It is built in one pass over a
//! library scan and handed out as a finished value; lookups take `&self` and
//! never mutate, so a built index can be shared freely across universes.

use std::collections::{BTreeMap, HashMap};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::adapters::{LibraryEntry, LibraryError, MediaLibrary};
use crate::domain::{ContentKind, ExternalSource, InternalId};

use super::classifier::is_supported_combination;

type PartitionKey = (ExternalSource, ContentKind);
type Partitions = HashMap<PartitionKey, HashMap<String, InternalId>>;

/// Build tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexOptions {
    /// Entry count at which the build is split across rayon workers
    pub parallel_threshold: usize,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            parallel_threshold: 5000,
        }
    }
}

/// Counters gathered while building
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    /// Entries returned by the scan
    pub scanned: usize,

    /// Entries inserted under at least one external id
    pub indexed: usize,

    /// Entries without an indexable kind or recognized external id
    pub skipped: usize,

    /// External ids already claimed by an earlier entry
    pub duplicates: usize,
}

/// Immutable (source, kind) → external id → internal id map
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogIndex {
    partitions: Partitions,
    stats: IndexStats,
}

impl CatalogIndex {
    /// An index with nothing in it
    pub fn empty() -> Self {
        Self::default()
    }

    /// Scan `library` once and index the result
    #[instrument(skip(library, options), fields(library = library.name()))]
    pub async fn build(
        library: &dyn MediaLibrary,
        options: &IndexOptions,
    ) -> Result<Self, LibraryError> {
        let entries = library.scan_all().await?;

        let index = if entries.len() >= options.parallel_threshold {
            debug!(entries = entries.len(), "Building index in parallel");
            tokio::task::spawn_blocking(move || Self::from_entries_parallel(&entries))
                .await
                .map_err(|e| LibraryError::Other(format!("Index build worker failed: {}", e)))?
        } else {
            Self::from_entries(&entries)
        };

        info!(
            scanned = index.stats.scanned,
            indexed = index.stats.indexed,
            skipped = index.stats.skipped,
            duplicates = index.stats.duplicates,
            "Catalog index built"
        );

        Ok(index)
    }

    /// Discard current contents and rebuild from `library`
    pub async fn rebuild(
        &mut self,
        library: &dyn MediaLibrary,
        options: &IndexOptions,
    ) -> Result<(), LibraryError> {
        *self = Self::build(library, options).await?;
        Ok(())
    }

    /// Index entries sequentially in scan order
    pub fn from_entries(entries: &[LibraryEntry]) -> Self {
        let mut partial = Partial::default();
        for entry in entries {
            partial.insert(entry);
        }
        partial.finish()
    }

    /// Index entries across rayon workers.
    ///
    /// Each worker owns the partitions of one contiguous chunk; chunks are
    /// merged in scan order so the first entry to claim an id wins, exactly as
    /// in the sequential build.
    pub fn from_entries_parallel(entries: &[LibraryEntry]) -> Self {
        if entries.is_empty() {
            return Self::empty();
        }

        let workers = rayon::current_num_threads().max(1);
        let chunk_size = entries.len().div_ceil(workers).max(1);

        let partials: Vec<Partial> = entries
            .par_chunks(chunk_size)
            .map(|chunk| {
                let mut partial = Partial::default();
                for entry in chunk {
                    partial.insert(entry);
                }
                partial
            })
            .collect();

        let mut merged = Partial::default();
        for partial in partials {
            merged.merge(partial);
        }
        merged.finish()
    }

    /// Internal id for an external id, or `None`.
    ///
    /// Combinations outside the compatibility table are always `None`.
    pub fn lookup(
        &self,
        external_id: &str,
        source: ExternalSource,
        kind: ContentKind,
    ) -> Option<&InternalId> {
        if !is_supported_combination(source, kind) {
            return None;
        }
        self.partitions.get(&(source, kind))?.get(external_id)
    }

    pub fn stats(&self) -> IndexStats {
        self.stats
    }

    /// Number of ids held in one partition
    pub fn partition_len(&self, source: ExternalSource, kind: ContentKind) -> usize {
        self.partitions
            .get(&(source, kind))
            .map(HashMap::len)
            .unwrap_or(0)
    }

    /// Partition sizes keyed by `source/kind`
    pub fn partition_sizes(&self) -> BTreeMap<String, usize> {
        self.partitions
            .iter()
            .map(|((source, kind), ids)| (format!("{}/{}", source, kind), ids.len()))
            .collect()
    }

    /// Total external ids held
    pub fn len(&self) -> usize {
        self.partitions.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Index under construction, owned by one worker
#[derive(Debug, Default)]
struct Partial {
    partitions: Partitions,
    stats: IndexStats,
}

impl Partial {
    fn insert(&mut self, entry: &LibraryEntry) {
        self.stats.scanned += 1;

        let Some(kind) = entry.kind.content_kind() else {
            self.stats.skipped += 1;
            return;
        };

        let mut inserted_any = false;
        for (source, external_id) in entry.external_ids() {
            inserted_any = true;
            let ids = self.partitions.entry((source, kind)).or_default();
            if ids.contains_key(external_id) {
                self.stats.duplicates += 1;
                debug!(
                    %source,
                    %kind,
                    external_id,
                    entry = %entry.id,
                    "External id already indexed, keeping first entry"
                );
            } else {
                ids.insert(external_id.to_string(), entry.id.clone());
            }
        }

        if inserted_any {
            self.stats.indexed += 1;
        } else {
            self.stats.skipped += 1;
        }
    }

    /// Fold a later chunk into this one
    fn merge(&mut self, later: Partial) {
        self.stats.scanned += later.stats.scanned;
        self.stats.indexed += later.stats.indexed;
        self.stats.skipped += later.stats.skipped;
        self.stats.duplicates += later.stats.duplicates;

        for (key, ids) in later.partitions {
            let target = self.partitions.entry(key).or_default();
            for (external_id, internal_id) in ids {
                if target.contains_key(&external_id) {
                    self.stats.duplicates += 1;
                } else {
                    target.insert(external_id, internal_id);
                }
            }
        }
    }

    fn finish(self) -> CatalogIndex {
        CatalogIndex {
            partitions: self.partitions,
            stats: self.stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{EntryKind, InMemoryLibrary};

    fn movie(id: &str, tmdb: &str) -> LibraryEntry {
        LibraryEntry::new(id, EntryKind::Movie, id).with_provider_id("Tmdb", tmdb)
    }

    #[test]
    fn test_entry_indexed_once_per_source() {
        let entries = vec![LibraryEntry::new("m1", EntryKind::Movie, "The Matrix")
            .with_provider_id("Tmdb", "603")
            .with_provider_id("Imdb", "tt0133093")];

        let index = CatalogIndex::from_entries(&entries);

        let expected = InternalId::from("m1");
        assert_eq!(
            index.lookup("603", ExternalSource::Tmdb, ContentKind::Movie),
            Some(&expected)
        );
        assert_eq!(
            index.lookup("tt0133093", ExternalSource::Imdb, ContentKind::Movie),
            Some(&expected)
        );
        assert_eq!(index.len(), 2);
        assert_eq!(index.stats().indexed, 1);
    }

    #[test]
    fn test_kind_partitions_are_separate() {
        let entries = vec![
            movie("m1", "100"),
            LibraryEntry::new("e1", EntryKind::Episode, "Pilot").with_provider_id("Tmdb", "100"),
        ];

        let index = CatalogIndex::from_entries(&entries);

        assert_eq!(
            index.lookup("100", ExternalSource::Tmdb, ContentKind::Movie),
            Some(&InternalId::from("m1"))
        );
        assert_eq!(
            index.lookup("100", ExternalSource::Tmdb, ContentKind::Episode),
            Some(&InternalId::from("e1"))
        );
        assert_eq!(index.lookup("100", ExternalSource::Imdb, ContentKind::Movie), None);
    }

    #[test]
    fn test_skips_unindexable_entries() {
        let entries = vec![
            LibraryEntry::new("s1", EntryKind::Series, "Loki").with_provider_id("Tmdb", "84958"),
            LibraryEntry::new("m2", EntryKind::Movie, "Home Video"),
            LibraryEntry::new("m3", EntryKind::Movie, "Tvdb only").with_provider_id("Tvdb", "1"),
        ];

        let index = CatalogIndex::from_entries(&entries);

        assert!(index.is_empty());
        assert_eq!(
            index.stats(),
            IndexStats {
                scanned: 3,
                indexed: 0,
                skipped: 3,
                duplicates: 0
            }
        );
    }

    #[test]
    fn test_first_entry_wins_on_duplicate() {
        let entries = vec![movie("first", "1"), movie("second", "1")];

        let index = CatalogIndex::from_entries(&entries);

        assert_eq!(
            index.lookup("1", ExternalSource::Tmdb, ContentKind::Movie),
            Some(&InternalId::from("first"))
        );
        assert_eq!(index.stats().duplicates, 1);
    }

    #[test]
    fn test_parallel_build_matches_sequential() {
        let entries: Vec<_> = (0..2_000)
            .map(|i| movie(&format!("m{}", i), &(i % 1_500).to_string()))
            .collect();

        let sequential = CatalogIndex::from_entries(&entries);
        let parallel = CatalogIndex::from_entries_parallel(&entries);

        assert_eq!(sequential, parallel);
        assert_eq!(parallel.stats().duplicates, 500);
        assert_eq!(
            parallel.lookup("42", ExternalSource::Tmdb, ContentKind::Movie),
            Some(&InternalId::from("m42"))
        );
    }

    #[tokio::test]
    async fn test_build_is_idempotent_and_scans_once() {
        let library = InMemoryLibrary::with_entries([movie("m1", "1"), movie("m2", "2")]);
        let options = IndexOptions::default();

        let first = CatalogIndex::build(&library, &options).await.unwrap();
        assert_eq!(library.scan_count(), 1);

        let second = CatalogIndex::build(&library, &options).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_rebuild_clears_prior_state() {
        let library = InMemoryLibrary::with_entries([movie("m1", "1")]);
        let options = IndexOptions::default();

        let mut index = CatalogIndex::build(&library, &options).await.unwrap();
        library.remove_entry(&InternalId::from("m1")).await;
        library.add_entry(movie("m2", "2")).await;
        index.rebuild(&library, &options).await.unwrap();

        assert_eq!(index.lookup("1", ExternalSource::Tmdb, ContentKind::Movie), None);
        assert!(index
            .lookup("2", ExternalSource::Tmdb, ContentKind::Movie)
            .is_some());
    }

    #[tokio::test]
    async fn test_parallel_path_through_build() {
        let library = InMemoryLibrary::with_entries((0..50).map(|i| {
            movie(&format!("m{}", i), &i.to_string())
        }));
        let options = IndexOptions {
            parallel_threshold: 10,
        };

        let index = CatalogIndex::build(&library, &options).await.unwrap();
        assert_eq!(index.partition_len(ExternalSource::Tmdb, ContentKind::Movie), 50);
        assert_eq!(index.partition_sizes().get("tmdb/movie"), Some(&50));
    }
}
