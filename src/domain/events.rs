//! Journal events for synchronization runs.
//!
//! Every universe state change in a batch is recorded as an immutable event
//! in an append-only log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::outcome::UniverseState;

/// A single event in the append-only sync journal.
///
/// The summary of a past run can be reconstructed by replaying its events in
/// order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEvent {
    /// Unique identifier for this event
    pub id: Uuid,

    /// When this event occurred (ISO 8601)
    pub timestamp: DateTime<Utc>,

    /// The batch run this event belongs to
    pub run_id: Uuid,

    /// Universe key (absent for batch-level events)
    pub universe: Option<String>,

    /// Type of event
    pub event_type: JournalEventType,

    /// Human-readable summary
    pub summary: String,

    /// Universe state after this event (universe events only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<UniverseState>,

    /// Matched item count, once known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched: Option<usize>,

    /// Unmatched item count, once known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unmatched: Option<usize>,

    /// Fingerprint of the universe's declared items
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,

    /// Error message if failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JournalEvent {
    /// Create a batch-level event with the current timestamp
    pub fn batch(run_id: Uuid, event_type: JournalEventType, summary: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            run_id,
            universe: None,
            event_type,
            summary,
            state: None,
            matched: None,
            unmatched: None,
            fingerprint: None,
            error: None,
        }
    }

    /// Create a universe-level event carrying the state it moved to
    pub fn universe(
        run_id: Uuid,
        universe: &str,
        event_type: JournalEventType,
        state: UniverseState,
        summary: String,
    ) -> Self {
        Self {
            universe: Some(universe.to_string()),
            state: Some(state),
            ..Self::batch(run_id, event_type, summary)
        }
    }

    pub fn with_counts(mut self, matched: usize, unmatched: usize) -> Self {
        self.matched = Some(matched);
        self.unmatched = Some(unmatched);
        self
    }

    pub fn with_fingerprint(mut self, fingerprint: String) -> Self {
        self.fingerprint = Some(fingerprint);
        self
    }

    pub fn with_error(mut self, error: String) -> Self {
        self.error = Some(error);
        self
    }
}

/// Types of events recorded during a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalEventType {
    BatchStarted,
    IndexBuilt,
    IndexFailed,
    UniverseClassified,
    UniverseResolved,
    UniverseSynchronized,
    UniverseFailed,
    UniverseSkipped,
    BatchCompleted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = JournalEvent::universe(
            Uuid::new_v4(),
            "mcu",
            JournalEventType::UniverseResolved,
            UniverseState::Resolved,
            "Resolved 3 of 4 items".to_string(),
        )
        .with_counts(3, 1);

        let json = serde_json::to_string(&event).unwrap();
        let parsed: JournalEvent = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.event_type, JournalEventType::UniverseResolved);
        assert_eq!(parsed.state, Some(UniverseState::Resolved));
        assert_eq!(parsed.universe.as_deref(), Some("mcu"));
        assert_eq!(parsed.matched, Some(3));
    }

    #[test]
    fn test_batch_event_omits_universe_fields() {
        let event = JournalEvent::batch(
            Uuid::new_v4(),
            JournalEventType::BatchStarted,
            "Batch of 2 universes".to_string(),
        );

        let json = serde_json::to_string(&event).unwrap();
        assert!(!json.contains("\"state\""));
        assert!(!json.contains("\"error\""));
    }

    #[test]
    fn test_event_with_error() {
        let event = JournalEvent::universe(
            Uuid::new_v4(),
            "mcu",
            JournalEventType::UniverseFailed,
            UniverseState::Failed,
            "Universe failed".to_string(),
        )
        .with_error("permission denied".to_string());

        assert_eq!(event.error, Some("permission denied".to_string()));
    }
}
