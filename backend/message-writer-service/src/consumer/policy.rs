//! Outcome classification and commit policies
//!
//! Everything here is pure so the decisions can be tested without a broker
//! or a database.

use crate::repository::PersistOutcome;
use std::str::FromStr;

/// What the loop does with a record after processing it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Stored; commit and continue
    Commit,
    /// Not storable; log, commit and continue
    Skip,
    /// Stop without committing so the record is redelivered after restart
    Halt,
}

impl Disposition {
    pub fn commits_offset(&self) -> bool {
        matches!(self, Disposition::Commit | Disposition::Skip)
    }
}

/// Handling of persistence failures that are neither lookup nor connection
/// failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OtherFailurePolicy {
    /// Log, commit and move on
    #[default]
    Skip,
    /// Treat as fatal and keep the offset
    Halt,
}

impl FromStr for OtherFailurePolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(OtherFailurePolicy::Skip),
            "halt" => Ok(OtherFailurePolicy::Halt),
            other => Err(format!("expected 'skip' or 'halt', got '{}'", other)),
        }
    }
}

/// Handling of a failed offset commit after a commit or skip decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommitPolicy {
    /// Log the failure and keep consuming
    #[default]
    BestEffort,
    /// Stop the loop on the first failed commit
    Strict,
}

impl CommitPolicy {
    pub fn escalates_failures(&self) -> bool {
        matches!(self, CommitPolicy::Strict)
    }
}

impl FromStr for CommitPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "best_effort" => Ok(CommitPolicy::BestEffort),
            "strict" => Ok(CommitPolicy::Strict),
            other => Err(format!("expected 'best_effort' or 'strict', got '{}'", other)),
        }
    }
}

/// Map a persistence outcome to a disposition
pub fn classify(outcome: &PersistOutcome, other_failures: OtherFailurePolicy) -> Disposition {
    match outcome {
        PersistOutcome::Stored { .. } => Disposition::Commit,
        PersistOutcome::NotFound(_) => Disposition::Skip,
        PersistOutcome::ConnectionLost(_) => Disposition::Halt,
        PersistOutcome::OtherFailure(_) => match other_failures {
            OtherFailurePolicy::Skip => Disposition::Skip,
            OtherFailurePolicy::Halt => Disposition::Halt,
        },
    }
}
