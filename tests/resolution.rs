//! Integration tests for index building and resolution.

use chronoverse::adapters::{EntryKind, InMemoryLibrary, LibraryEntry};
use chronoverse::core::{CatalogIndex, IndexOptions, NotFoundReason, Resolution, Resolver};
use chronoverse::domain::{ContentKind, ExternalSource, InternalId, TimelineItem};

fn catalog() -> Vec<LibraryEntry> {
    let mut entries: Vec<_> = (0..40)
        .map(|i| {
            LibraryEntry::new(format!("m{}", i), EntryKind::Movie, format!("Movie {}", i))
                .with_provider_id("Tmdb", i.to_string())
                .with_provider_id("Imdb", format!("tt{:07}", i))
        })
        .collect();
    entries.extend((0..10).map(|i| {
        LibraryEntry::new(format!("e{}", i), EntryKind::Episode, format!("Episode {}", i))
            .with_provider_id("Tmdb", format!("ep{}", i))
    }));
    entries
}

fn items() -> Vec<TimelineItem> {
    let mut items = Vec::new();
    for i in (0..60).step_by(3) {
        items.push(TimelineItem::movie(ExternalSource::Tmdb, i.to_string()));
        items.push(TimelineItem::movie(ExternalSource::Imdb, format!("tt{:07}", i)));
    }
    items.push(TimelineItem::episode(ExternalSource::Tmdb, "ep3", Some(1)));
    items.push(TimelineItem::movie(ExternalSource::Tmdb, "ep3"));
    items.push(TimelineItem::new("7", "tvdb", "movie"));
    items.push(TimelineItem::new("", "tmdb", "movie"));
    items
}

#[tokio::test]
async fn test_resolution_is_deterministic() {
    let library = InMemoryLibrary::with_entries(catalog());
    let options = IndexOptions::default();

    let first = CatalogIndex::build(&library, &options).await.unwrap();
    let second = CatalogIndex::build(&library, &options).await.unwrap();

    let a = Resolver::new(&first).resolve_many(&items());
    let b = Resolver::new(&second).resolve_many(&items());
    assert_eq!(a, b);
}

#[test]
fn test_batch_matches_individual_lookups() {
    let index = CatalogIndex::from_entries(&catalog());
    let resolver = Resolver::new(&index);
    let items = items();

    let batch = resolver.resolve_many(&items);
    let individual: Vec<_> = items.iter().map(|i| resolver.resolve_one(i)).collect();
    assert_eq!(batch, individual);

    // Any permutation of the input gives the permuted output
    let mut permuted: Vec<(usize, TimelineItem)> = items.iter().cloned().enumerate().collect();
    permuted.reverse();
    permuted.rotate_left(7);
    let permuted_items: Vec<_> = permuted.iter().map(|(_, i)| i.clone()).collect();
    let permuted_results = resolver.resolve_many(&permuted_items);

    for ((original, _), result) in permuted.iter().zip(&permuted_results) {
        assert_eq!(result, &batch[*original]);
    }
}

#[test]
fn test_repeated_items_resolve_identically() {
    let index = CatalogIndex::from_entries(&catalog());
    let resolver = Resolver::new(&index);

    let item = TimelineItem::movie(ExternalSource::Tmdb, "12");
    let results = resolver.resolve_many(&[item.clone(), item.clone(), item]);

    assert!(results
        .iter()
        .all(|r| r == &Resolution::Matched(InternalId::from("m12"))));
}

#[test]
fn test_sources_do_not_cross_match() {
    let entries = vec![LibraryEntry::new("only-tmdb", EntryKind::Movie, "Solo")
        .with_provider_id("Tmdb", "5")];
    let index = CatalogIndex::from_entries(&entries);
    let resolver = Resolver::new(&index);

    assert!(resolver
        .resolve_one(&TimelineItem::movie(ExternalSource::Tmdb, "5"))
        .is_matched());
    assert_eq!(
        resolver.resolve_one(&TimelineItem::movie(ExternalSource::Imdb, "5")),
        Resolution::NotFound(NotFoundReason::NotInLibrary)
    );
}

#[test]
fn test_titles_and_seasons_do_not_affect_matching() {
    let index = CatalogIndex::from_entries(&catalog());
    let resolver = Resolver::new(&index);

    let plain = TimelineItem::episode(ExternalSource::Tmdb, "ep4", None);
    let decorated = TimelineItem::episode(ExternalSource::Tmdb, "ep4", Some(9))
        .with_title("Completely different title");

    assert_eq!(resolver.resolve_one(&plain), resolver.resolve_one(&decorated));
    assert_eq!(
        resolver.resolve_one(&plain).internal_id(),
        Some(&InternalId::from("e4"))
    );
}

#[test]
fn test_universe_resolution_counts() {
    let index = CatalogIndex::from_entries(&catalog());
    let resolver = Resolver::new(&index);
    let universe = chronoverse::domain::Universe::new("mixed", "Mixed").with_items(items());

    let resolution = resolver.resolve_universe(&universe);

    // 14 of the 20 tmdb/imdb pairs are in range, plus one episode
    assert_eq!(resolution.matched.len(), 14 * 2 + 1);
    assert_eq!(resolution.matched.len() + resolution.unmatched.len(), resolution.total);
    assert!(resolution
        .matched_positions
        .windows(2)
        .all(|w| w[0] < w[1]));
}

#[tokio::test]
async fn test_parallel_build_through_library() {
    let library = InMemoryLibrary::with_entries(catalog());

    let sequential = CatalogIndex::build(&library, &IndexOptions::default())
        .await
        .unwrap();
    let parallel = CatalogIndex::build(
        &library,
        &IndexOptions {
            parallel_threshold: 1,
        },
    )
    .await
    .unwrap();

    assert_eq!(sequential, parallel);
    assert_eq!(
        parallel.partition_len(ExternalSource::Tmdb, ContentKind::Episode),
        10
    );
}
