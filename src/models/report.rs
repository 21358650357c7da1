use uuid::Uuid;

use super::{Advisory, EffectivePatternSet, SubmoduleChange};
use crate::error::SubmoduleFailure;

/// Result of bringing one submodule to its requested ref and depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Registered and fetched for the first time.
    Initialized,
    /// Already registered; re-fetched to a new ref or depth.
    Updated,
    /// Nothing to do: absent from the profile, or already matching.
    Skipped,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initialized => "initialized",
            Self::Updated => "updated",
            Self::Skipped => "skipped",
        }
    }
}

/// Result of applying a pattern set to a working tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// Same set as last recorded; no VCS call was made.
    Unchanged,
}

#[derive(Debug)]
pub enum SubmoduleStatus {
    /// Not a key of the profile's `submodules`; never registered.
    NotInProfile,
    Ready {
        outcome: Outcome,
        apply: ApplyOutcome,
        patterns: EffectivePatternSet,
        reference: Option<String>,
    },
    Failed(SubmoduleFailure),
}

#[derive(Debug)]
pub struct SubmoduleReport {
    pub name: String,
    pub status: SubmoduleStatus,
}

/// An advisory tagged with the submodule it was raised for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmoduleAdvisory {
    pub submodule: String,
    pub advisory: Advisory,
}

/// What happened to the state file at the end of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateWrite {
    Committed,
    /// The run succeeded but produced the state already on disk.
    Unchanged,
    /// At least one submodule failed; the previous state stays authoritative.
    Withheld,
}

/// Aggregated result of an init or upgrade run, one entry per known submodule
/// in name order.
#[derive(Debug)]
pub struct RunReport {
    pub run_id: Uuid,
    pub service: String,
    pub version: String,
    pub submodules: Vec<SubmoduleReport>,
    pub advisories: Vec<SubmoduleAdvisory>,
    /// Diff from the previous state. Empty when the state was withheld.
    pub changes: Vec<SubmoduleChange>,
    pub state: StateWrite,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }

    pub fn failures(&self) -> impl Iterator<Item = &SubmoduleFailure> {
        self.submodules.iter().filter_map(|report| match &report.status {
            SubmoduleStatus::Failed(failure) => Some(failure),
            _ => None,
        })
    }

    pub fn get(&self, name: &str) -> Option<&SubmoduleStatus> {
        self.submodules
            .iter()
            .find(|report| report.name == name)
            .map(|report| &report.status)
    }
}
