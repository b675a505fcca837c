//! Failure taxonomy shared by the synchronizer and the advisor.

use serde::{Deserialize, Serialize};

/// Category a universe failure falls into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    InvalidInput,
    PermissionDenied,
    Timeout,
    NotFound,
    InvalidState,
    UnsupportedOperation,
    Unknown,
}

impl FailureKind {
    pub fn severity(self) -> Severity {
        match self {
            Self::InvalidInput => Severity::Medium,
            Self::PermissionDenied => Severity::High,
            Self::Timeout => Severity::Medium,
            Self::NotFound => Severity::Low,
            Self::InvalidState => Severity::High,
            Self::UnsupportedOperation => Severity::Critical,
            Self::Unknown => Severity::Medium,
        }
    }

    pub fn recovery_strategy(self) -> RecoveryStrategy {
        match self {
            Self::InvalidInput => RecoveryStrategy::SkipInvalidItems,
            Self::PermissionDenied => RecoveryStrategy::NoRecoveryAvailable,
            Self::Timeout => RecoveryStrategy::RetryWithDelay,
            Self::NotFound => RecoveryStrategy::CreateEmptyAsFallback,
            Self::InvalidState => RecoveryStrategy::RetryWithDelay,
            Self::UnsupportedOperation => RecoveryStrategy::NoRecoveryAvailable,
            Self::Unknown => RecoveryStrategy::RetryWithDelay,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid input",
            Self::PermissionDenied => "permission errors",
            Self::Timeout => "timeouts",
            Self::NotFound => "missing library objects",
            Self::InvalidState => "invalid state",
            Self::UnsupportedOperation => "unsupported operations",
            Self::Unknown => "unknown errors",
        }
    }
}

/// How bad a failure is for the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    #[default]
    None,
    Low,
    Medium,
    High,
    Critical,
}

/// Suggested follow-up for a failure; never executed automatically
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStrategy {
    RetryWithDelay,
    SkipInvalidItems,
    CreateEmptyAsFallback,
    NoRecoveryAvailable,
}

/// A classified failure attached to a universe outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub kind: FailureKind,
    pub severity: Severity,
    pub strategy: RecoveryStrategy,
    pub message: String,
}

impl FailureRecord {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.severity(),
            strategy: kind.recovery_strategy(),
            message: message.into(),
        }
    }
}
