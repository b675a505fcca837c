//! Content classification for declared universes.
//!
//! Checks that every declared kind is supported and that every
//! (source, kind) pair appears in the compatibility table, then summarizes
//! the kind distribution. Validation never stops at the first error.

use std::collections::BTreeMap;

use crate::domain::{ContentKind, ExternalSource, TimelineItem, Universe};

pub use crate::domain::{ClassificationReport, KindShare};

/// Kinds a timeline may declare
pub const SUPPORTED_KINDS: &[ContentKind] = &[ContentKind::Movie, ContentKind::Episode];

/// (source, kind) pairs the engine can resolve
pub const SUPPORTED_COMBINATIONS: &[(ExternalSource, ContentKind)] = &[
    (ExternalSource::Tmdb, ContentKind::Movie),
    (ExternalSource::Tmdb, ContentKind::Episode),
    (ExternalSource::Imdb, ContentKind::Movie),
    (ExternalSource::Imdb, ContentKind::Episode),
];

pub fn is_supported_kind(kind: ContentKind) -> bool {
    SUPPORTED_KINDS.contains(&kind)
}

pub fn is_supported_combination(source: ExternalSource, kind: ContentKind) -> bool {
    SUPPORTED_COMBINATIONS.contains(&(source, kind))
}

/// Classify a universe's declared items
pub fn classify(universe: &Universe) -> ClassificationReport {
    classify_items(&universe.items)
}

pub fn classify_items(items: &[TimelineItem]) -> ClassificationReport {
    let mut errors = Vec::new();
    let mut structural_warnings = Vec::new();
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();

    for (position, item) in items.iter().enumerate() {
        let kind_label = item.kind.trim().to_ascii_lowercase();
        if !kind_label.is_empty() {
            *counts.entry(kind_label).or_default() += 1;
        }

        let missing = item.missing_fields();
        if !missing.is_empty() {
            structural_warnings.push(format!(
                "item {} ({}): missing {}",
                position,
                item.reference(),
                missing.join(", ")
            ));
        }

        if let Some(message) = validate_item(item) {
            errors.push(format!("item {} ({}): {}", position, item.reference(), message));
        }
    }

    let total = items.len();
    let distribution = counts
        .into_iter()
        .map(|(kind, count)| {
            let percentage = count as f64 * 100.0 / total as f64;
            (kind, KindShare { count, percentage })
        })
        .collect::<BTreeMap<_, _>>();

    ClassificationReport {
        is_valid: errors.is_empty(),
        errors,
        structural_warnings,
        is_mixed: distribution.len() > 1,
        is_empty: total == 0,
        total,
        distribution,
    }
}

/// Validation message for one item, or `None` when it is acceptable.
///
/// Blank source or kind is left to the resolver's structural handling.
fn validate_item(item: &TimelineItem) -> Option<String> {
    if item.kind.trim().is_empty() {
        return None;
    }

    let kind = match item.parsed_kind() {
        Ok(kind) if is_supported_kind(kind) => kind,
        Ok(kind) => return Some(format!("unsupported content kind '{}'", kind)),
        Err(e) => return Some(e.to_string()),
    };

    if item.source.trim().is_empty() {
        return None;
    }

    match item.parsed_source() {
        Ok(source) if is_supported_combination(source, kind) => None,
        Ok(source) => Some(format!(
            "source '{}' is not compatible with kind '{}'",
            source, kind
        )),
        Err(e) => Some(format!("{} (no compatible kinds)", e)),
    }
}
