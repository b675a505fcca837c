//! Deterministic matching of declared items against the catalog index.
//!
//! Matching uses only the (source, identifier, kind) triple. Titles and
//! seasons are carried along for reporting and never looked at here.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::{ContentKind, ExternalSource, InternalId, TimelineItem, Universe};

pub use crate::domain::{NotFoundReason, UnmatchedItem};

use super::classifier::is_supported_combination;
use super::index::CatalogIndex;

/// Outcome of resolving one item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "value")]
pub enum Resolution {
    Matched(InternalId),
    NotFound(NotFoundReason),
}

impl Resolution {
    pub fn is_matched(&self) -> bool {
        matches!(self, Self::Matched(_))
    }

    pub fn internal_id(&self) -> Option<&InternalId> {
        match self {
            Self::Matched(id) => Some(id),
            Self::NotFound(_) => None,
        }
    }
}

/// Resolution of a whole universe, in declared order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniverseResolution {
    pub universe: String,

    /// Matched internal ids in declared order
    pub matched: Vec<InternalId>,

    /// Declared positions of the matched ids, parallel to `matched`
    pub matched_positions: Vec<usize>,

    pub unmatched: Vec<UnmatchedItem>,

    pub total: usize,

    /// matched / total, 0.0 for an empty universe
    pub match_rate: f64,
}

type LookupKey = (ExternalSource, String, ContentKind);

/// Resolves timeline items against a built index
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    index: &'a CatalogIndex,
}

impl<'a> Resolver<'a> {
    pub fn new(index: &'a CatalogIndex) -> Self {
        Self { index }
    }

    /// Resolve a single item
    pub fn resolve_one(&self, item: &TimelineItem) -> Resolution {
        match lookup_key(item) {
            Ok(key) => self.lookup(&key),
            Err(reason) => {
                log_unresolvable(item, reason);
                Resolution::NotFound(reason)
            }
        }
    }

    /// Resolve many items, one result per input in input order.
    ///
    /// Repeated triples are looked up once; every result equals what
    /// [`Resolver::resolve_one`] returns for the same item.
    pub fn resolve_many(&self, items: &[TimelineItem]) -> Vec<Resolution> {
        let mut cache: HashMap<LookupKey, Resolution> = HashMap::with_capacity(items.len());

        items
            .iter()
            .map(|item| match lookup_key(item) {
                Ok(key) => cache
                    .entry(key)
                    .or_insert_with_key(|key| self.lookup(key))
                    .clone(),
                Err(reason) => {
                    log_unresolvable(item, reason);
                    Resolution::NotFound(reason)
                }
            })
            .collect()
    }

    /// Resolve a universe into matched ids and unmatched diagnostics
    pub fn resolve_universe(&self, universe: &Universe) -> UniverseResolution {
        let results = self.resolve_many(&universe.items);

        let mut matched = Vec::new();
        let mut matched_positions = Vec::new();
        let mut unmatched = Vec::new();

        for (position, (item, result)) in universe.items.iter().zip(results).enumerate() {
            match result {
                Resolution::Matched(id) => {
                    matched.push(id);
                    matched_positions.push(position);
                }
                Resolution::NotFound(reason) => unmatched.push(UnmatchedItem {
                    position,
                    reference: item.reference(),
                    reason,
                    item: item.clone(),
                }),
            }
        }

        let total = universe.items.len();
        let match_rate = if total == 0 {
            0.0
        } else {
            matched.len() as f64 / total as f64
        };

        debug!(
            universe = %universe.key,
            matched = matched.len(),
            unmatched = unmatched.len(),
            match_rate,
            "Universe resolved"
        );

        UniverseResolution {
            universe: universe.key.clone(),
            matched,
            matched_positions,
            unmatched,
            total,
            match_rate,
        }
    }

    fn lookup(&self, (source, id, kind): &LookupKey) -> Resolution {
        match self.index.lookup(id, *source, *kind) {
            Some(internal) => Resolution::Matched(internal.clone()),
            None => Resolution::NotFound(NotFoundReason::NotInLibrary),
        }
    }
}

/// Normalized lookup triple for an item
fn lookup_key(item: &TimelineItem) -> Result<LookupKey, NotFoundReason> {
    if !item.is_structurally_valid() {
        return Err(NotFoundReason::InvalidItem);
    }

    let source = item
        .parsed_source()
        .map_err(|_| NotFoundReason::UnsupportedCombination)?;
    let kind = item
        .parsed_kind()
        .map_err(|_| NotFoundReason::UnsupportedCombination)?;

    if !is_supported_combination(source, kind) {
        return Err(NotFoundReason::UnsupportedCombination);
    }

    Ok((source, item.id.trim().to_string(), kind))
}

fn log_unresolvable(item: &TimelineItem, reason: NotFoundReason) {
    match reason {
        NotFoundReason::InvalidItem => warn!(
            reference = %item.reference(),
            missing = ?item.missing_fields(),
            "Skipping structurally invalid timeline item"
        ),
        _ => debug!(reference = %item.reference(), ?reason, "Timeline item not resolvable"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{EntryKind, LibraryEntry};

    fn index() -> CatalogIndex {
        CatalogIndex::from_entries(&[
            LibraryEntry::new("lib-1", EntryKind::Movie, "Iron Man").with_provider_id("Tmdb", "1"),
            LibraryEntry::new("lib-3", EntryKind::Movie, "Thor").with_provider_id("Imdb", "tt3"),
            LibraryEntry::new("lib-ep", EntryKind::Episode, "Pilot").with_provider_id("Tmdb", "77"),
        ])
    }

    #[test]
    fn test_resolve_one_match_and_miss() {
        let index = index();
        let resolver = Resolver::new(&index);

        assert_eq!(
            resolver.resolve_one(&TimelineItem::movie(ExternalSource::Tmdb, "1")),
            Resolution::Matched(InternalId::from("lib-1"))
        );
        assert_eq!(
            resolver.resolve_one(&TimelineItem::movie(ExternalSource::Tmdb, "2")),
            Resolution::NotFound(NotFoundReason::NotInLibrary)
        );
    }

    #[test]
    fn test_structural_and_unsupported_items() {
        let index = index();
        let resolver = Resolver::new(&index);

        assert_eq!(
            resolver.resolve_one(&TimelineItem::new("", "tmdb", "movie")),
            Resolution::NotFound(NotFoundReason::InvalidItem)
        );
        assert_eq!(
            resolver.resolve_one(&TimelineItem::new("1", "tmdb", "documentary")),
            Resolution::NotFound(NotFoundReason::UnsupportedCombination)
        );
        assert_eq!(
            resolver.resolve_one(&TimelineItem::new("1", "tvdb", "movie")),
            Resolution::NotFound(NotFoundReason::UnsupportedCombination)
        );
    }

    #[test]
    fn test_tags_and_ids_are_normalized() {
        let index = index();
        let resolver = Resolver::new(&index);

        assert!(resolver
            .resolve_one(&TimelineItem::new(" 1 ", "TMDB", "Movie"))
            .is_matched());
    }

    #[test]
    fn test_kind_is_part_of_identity() {
        let index = index();
        let resolver = Resolver::new(&index);

        assert!(!resolver
            .resolve_one(&TimelineItem::movie(ExternalSource::Tmdb, "77"))
            .is_matched());
        assert!(resolver
            .resolve_one(&TimelineItem::episode(ExternalSource::Tmdb, "77", Some(1)))
            .is_matched());
    }

    #[test]
    fn test_resolve_universe_rate_and_order() {
        let index = index();
        let resolver = Resolver::new(&index);

        let universe = Universe::new("x", "X")
            .with_item(TimelineItem::movie(ExternalSource::Imdb, "tt3"))
            .with_item(TimelineItem::movie(ExternalSource::Tmdb, "2"))
            .with_item(TimelineItem::movie(ExternalSource::Tmdb, "1"))
            .with_item(TimelineItem::new("", "tmdb", "movie"));

        let resolution = resolver.resolve_universe(&universe);

        assert_eq!(
            resolution.matched,
            vec![InternalId::from("lib-3"), InternalId::from("lib-1")]
        );
        assert_eq!(resolution.matched_positions, vec![0, 2]);
        assert_eq!(resolution.unmatched.len(), 2);
        assert_eq!(resolution.unmatched[0].reference, "tmdb:2");
        assert_eq!(resolution.unmatched[1].reason, NotFoundReason::InvalidItem);
        assert!((resolution.match_rate - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_universe_rate_is_zero() {
        let index = index();
        let resolution = Resolver::new(&index).resolve_universe(&Universe::new("e", "E"));

        assert_eq!(resolution.total, 0);
        assert_eq!(resolution.match_rate, 0.0);
    }
}
