//! Run summaries reconstructed from journal events.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::events::{JournalEvent, JournalEventType};
use super::outcome::UniverseState;

/// Summary of a past synchronization run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,

    /// Set when the index build failed and the batch was aborted
    pub aborted: Option<String>,

    /// Last known state per universe key
    pub universes: BTreeMap<String, UniverseState>,

    /// Universes skipped by cancellation
    pub skipped: Vec<String>,
}

impl RunSummary {
    /// Reconstruct a run summary from a sequence of events
    pub fn from_events(events: &[JournalEvent]) -> Option<Self> {
        let first_event = events.first()?;

        let mut run = Self {
            id: first_event.run_id,
            started_at: first_event.timestamp,
            completed_at: None,
            aborted: None,
            universes: BTreeMap::new(),
            skipped: Vec::new(),
        };

        for event in events {
            run.apply_event(event);
        }

        Some(run)
    }

    /// Apply a single event to update the summary
    pub fn apply_event(&mut self, event: &JournalEvent) {
        match event.event_type {
            JournalEventType::BatchStarted => {
                self.started_at = event.timestamp;
            }
            JournalEventType::BatchCompleted => {
                self.completed_at = Some(event.timestamp);
            }
            JournalEventType::IndexFailed => {
                self.aborted = Some(event.error.clone().unwrap_or_default());
                self.completed_at = Some(event.timestamp);
            }
            JournalEventType::UniverseSkipped => {
                if let Some(ref key) = event.universe {
                    self.skipped.push(key.clone());
                }
            }
            JournalEventType::IndexBuilt => {}
            JournalEventType::UniverseClassified
            | JournalEventType::UniverseResolved
            | JournalEventType::UniverseSynchronized
            | JournalEventType::UniverseFailed => {
                if let (Some(key), Some(state)) = (&event.universe, event.state) {
                    self.universes.insert(key.clone(), state);
                }
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.completed_at.is_some()
    }

    pub fn succeeded(&self) -> usize {
        self.count(UniverseState::Synchronized)
    }

    pub fn failed(&self) -> usize {
        self.count(UniverseState::Failed)
    }

    fn count(&self, state: UniverseState) -> usize {
        self.universes.values().filter(|s| **s == state).count()
    }
}
