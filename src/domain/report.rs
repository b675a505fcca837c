//! Reports attached to universe and batch outcomes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::failure::{FailureKind, Severity};
use super::timeline::TimelineItem;

/// Count and share of one declared kind
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KindShare {
    pub count: usize,

    /// Percentage of all declared items (0–100)
    pub percentage: f64,
}

/// Result of classifying one universe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub is_valid: bool,

    /// One message per invalid item, prefixed with its position
    pub errors: Vec<String>,

    /// Items with blank required fields; the resolver skips these
    #[serde(default)]
    pub structural_warnings: Vec<String>,

    /// More than one distinct kind declared
    pub is_mixed: bool,

    pub is_empty: bool,

    pub total: usize,

    /// Declared kind (lowercased) → count and percentage
    pub distribution: BTreeMap<String, KindShare>,
}

impl ClassificationReport {
    pub fn share(&self, kind: &str) -> Option<&KindShare> {
        self.distribution.get(kind)
    }
}

/// Why an item did not resolve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotFoundReason {
    /// Blank id, source or kind
    InvalidItem,

    /// Source or kind outside the compatibility table
    UnsupportedCombination,

    /// Valid reference the library does not hold
    NotInLibrary,
}

/// A declared item that did not resolve, kept for diagnostics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnmatchedItem {
    /// Position in the universe's declared order
    pub position: usize,

    /// `source:identifier`
    pub reference: String,

    pub reason: NotFoundReason,

    pub item: TimelineItem,
}

/// Batch-level diagnostics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdvisorReport {
    /// Failed universes per failure kind
    pub counts: BTreeMap<FailureKind, usize>,

    /// Highest severity observed (`None` when nothing failed)
    pub overall_severity: Severity,

    pub recommendations: Vec<String>,
}

impl AdvisorReport {
    pub fn has_failures(&self) -> bool {
        !self.counts.is_empty()
    }
}
