//! Failure classification and operator-facing recommendations.
//!
//! The advisor only classifies and recommends. It never retries and never
//! changes the control flow of a batch.

use std::collections::BTreeMap;

use crate::adapters::LibraryError;
use crate::domain::{FailureKind, FailureRecord, Severity, UniverseOutcome};

pub use crate::domain::AdvisorReport;

use super::synchronizer::SyncError;

/// Classify a synchronization failure
pub fn classify_failure(error: &SyncError) -> FailureKind {
    match error {
        SyncError::Validation { .. } | SyncError::InvalidUniverse(_) => FailureKind::InvalidInput,
        SyncError::WriteTimeout { .. } => FailureKind::Timeout,
        SyncError::Transition(_) => FailureKind::InvalidState,
        SyncError::Library(err) => classify_library_error(err),
    }
}

/// Classify an error reported by the library collaborator
pub fn classify_library_error(error: &LibraryError) -> FailureKind {
    match error {
        LibraryError::PermissionDenied(_) => FailureKind::PermissionDenied,
        LibraryError::Timeout(_) => FailureKind::Timeout,
        LibraryError::CollectionNotFound(_) => FailureKind::NotFound,
        LibraryError::InvalidState(_) => FailureKind::InvalidState,
        LibraryError::Unsupported(_) => FailureKind::UnsupportedOperation,
        LibraryError::Io(message) | LibraryError::Other(message) => classify_message(message),
    }
}

/// Classify an untyped error message by its wording
pub fn classify_message(message: &str) -> FailureKind {
    let lower = message.to_ascii_lowercase();

    if lower.contains("permission") || lower.contains("access denied") || lower.contains("forbidden")
    {
        FailureKind::PermissionDenied
    } else if lower.contains("timed out") || lower.contains("timeout") {
        FailureKind::Timeout
    } else if lower.contains("not found") || lower.contains("no such") {
        FailureKind::NotFound
    } else if lower.contains("not supported") || lower.contains("unsupported") {
        FailureKind::UnsupportedOperation
    } else if lower.contains("invalid state") || lower.contains("already exists") {
        FailureKind::InvalidState
    } else if lower.contains("invalid") {
        FailureKind::InvalidInput
    } else {
        FailureKind::Unknown
    }
}

/// Classify and package a failure for an outcome
pub fn failure_record(error: &SyncError) -> FailureRecord {
    FailureRecord::new(classify_failure(error), error.to_string())
}

/// Aggregate the failures and gaps of a batch into a report
pub fn advise(outcomes: &[UniverseOutcome]) -> AdvisorReport {
    let mut counts: BTreeMap<FailureKind, usize> = BTreeMap::new();
    let mut overall_severity = Severity::None;

    for outcome in outcomes.iter().filter(|o| o.is_failed()) {
        let Some(primary) = outcome.errors.first() else {
            continue;
        };
        *counts.entry(primary.kind).or_default() += 1;
        for record in &outcome.errors {
            overall_severity = overall_severity.max(record.severity);
        }
    }

    let mut recommendations: Vec<String> = counts
        .iter()
        .map(|(kind, count)| recommendation(*kind, *count))
        .collect();

    let incomplete: Vec<&str> = outcomes
        .iter()
        .filter(|o| o.is_success() && !o.unmatched.is_empty())
        .map(|o| o.key.as_str())
        .collect();
    if !incomplete.is_empty() {
        recommendations.push(format!(
            "{} synchronized {} missing library content ({}); add the items or check their provider ids",
            incomplete.len(),
            plural(incomplete.len(), "universe is", "universes are"),
            incomplete.join(", ")
        ));
    }

    AdvisorReport {
        counts,
        overall_severity,
        recommendations,
    }
}

fn recommendation(kind: FailureKind, count: usize) -> String {
    let subject = format!(
        "{} {} failed due to {}",
        count,
        plural(count, "universe", "universes"),
        kind.label()
    );

    let action = match kind {
        FailureKind::InvalidInput => "fix the listed items in the universe definitions",
        FailureKind::PermissionDenied => "check access rights on the target library",
        FailureKind::Timeout => "retry after a delay or raise the write timeout",
        FailureKind::NotFound => "the collection vanished mid-run; rerun to recreate it",
        FailureKind::InvalidState => "rerun once the library settles",
        FailureKind::UnsupportedOperation => "the target library cannot manage collections",
        FailureKind::Unknown => "inspect the logs and retry",
    };

    format!("{}; {}", subject, action)
}

fn plural<'a>(count: usize, one: &'a str, many: &'a str) -> &'a str {
    if count == 1 {
        one
    } else {
        many
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CollectionId, UniverseState};

    fn failed(key: &str, kind: FailureKind) -> UniverseOutcome {
        let mut outcome = UniverseOutcome::for_universe(&crate::domain::Universe::new(key, key));
        outcome.state = UniverseState::Failed;
        outcome.errors.push(FailureRecord::new(kind, "boom"));
        outcome
    }

    #[test]
    fn test_library_error_mapping() {
        assert_eq!(
            classify_library_error(&LibraryError::PermissionDenied("x".into())),
            FailureKind::PermissionDenied
        );
        assert_eq!(
            classify_library_error(&LibraryError::CollectionNotFound(CollectionId::new("c"))),
            FailureKind::NotFound
        );
        assert_eq!(
            classify_library_error(&LibraryError::Unsupported("playlists".into())),
            FailureKind::UnsupportedOperation
        );
        assert_eq!(
            classify_library_error(&LibraryError::Other("connection timed out".into())),
            FailureKind::Timeout
        );
    }

    #[test]
    fn test_message_fallbacks() {
        assert_eq!(classify_message("Access denied for user"), FailureKind::PermissionDenied);
        assert_eq!(classify_message("invalid payload"), FailureKind::InvalidInput);
        assert_eq!(classify_message("something odd"), FailureKind::Unknown);
    }

    #[test]
    fn test_sync_error_mapping() {
        let validation = SyncError::Validation {
            key: "x".into(),
            errors: vec!["item 0: bad".into()],
        };
        assert_eq!(classify_failure(&validation), FailureKind::InvalidInput);

        let timeout = SyncError::WriteTimeout {
            name: "X".into(),
            seconds: 5,
        };
        assert_eq!(failure_record(&timeout).severity, Severity::Medium);
    }

    #[test]
    fn test_report_aggregates() {
        let outcomes = vec![
            failed("a", FailureKind::PermissionDenied),
            failed("b", FailureKind::PermissionDenied),
            failed("c", FailureKind::Timeout),
        ];

        let report = advise(&outcomes);

        assert_eq!(report.counts.get(&FailureKind::PermissionDenied), Some(&2));
        assert_eq!(report.overall_severity, Severity::High);
        assert_eq!(report.recommendations.len(), 2);
        assert!(report.recommendations[0]
            .starts_with("2 universes failed due to permission errors; check access rights"));
    }

    #[test]
    fn test_clean_batch_has_no_severity() {
        let report = advise(&[]);
        assert!(!report.has_failures());
        assert_eq!(report.overall_severity, Severity::None);
        assert!(report.recommendations.is_empty());
    }
}
