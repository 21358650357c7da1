use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::EffectivePatternSet;

/// Current on-disk state file format.
///
/// Newer tool versions may only add optional fields; older files must keep
/// deserializing, so every field past the active pair carries a default.
pub const STATE_SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    STATE_SCHEMA_VERSION
}

/// What is actually materialized for a workspace root.
///
/// `applied` reflects the last successful run, not a profile's raw content. A
/// submodule missing from `applied` is not initialized by decg.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceState {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub active_service: String,
    pub active_version: String,
    #[serde(default)]
    pub applied: BTreeMap<String, EffectivePatternSet>,
    /// Checked-out reference per submodule. Absent when the submodule sits on
    /// the commit pinned by the superproject.
    #[serde(default, rename = "ref")]
    pub refs: BTreeMap<String, String>,
    /// Whether each submodule was fetched shallow.
    #[serde(default)]
    pub shallow: BTreeMap<String, bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_id: Option<Uuid>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl WorkspaceState {
    pub fn new(service: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            schema_version: STATE_SCHEMA_VERSION,
            active_service: service.into(),
            active_version: version.into(),
            applied: BTreeMap::new(),
            refs: BTreeMap::new(),
            shallow: BTreeMap::new(),
            last_run_id: None,
            updated_at: Utc::now(),
        }
    }

    /// Equal in everything but bookkeeping (`last_run_id`, `updated_at`).
    pub fn same_content(&self, other: &WorkspaceState) -> bool {
        self.schema_version == other.schema_version
            && self.active_service == other.active_service
            && self.active_version == other.active_version
            && self.applied == other.applied
            && self.refs == other.refs
            && self.shallow == other.shallow
    }

    pub fn snapshot(&self, name: &str) -> Option<SubmoduleSnapshot> {
        self.applied.get(name).map(|patterns| SubmoduleSnapshot {
            patterns: patterns.clone(),
            reference: self.refs.get(name).cloned(),
        })
    }
}

/// The recorded state of a single submodule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmoduleSnapshot {
    pub patterns: EffectivePatternSet,
    pub reference: Option<String>,
}

/// Trees touched by runs whose state commit was withheld.
///
/// The committed [`WorkspaceState`] is stale for these submodules: a failed
/// run may have changed their patterns or ref anyway. Cleared by the next
/// successful run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Journal {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_id: Option<Uuid>,
    /// What each tree was left at. `None` means the submodule failed part way
    /// and its tree cannot be trusted at all.
    #[serde(default)]
    pub trees: BTreeMap<String, Option<SubmoduleSnapshot>>,
}

impl Journal {
    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }
}

/// How a submodule differs between two workspace states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Removed,
    /// Ref changed. Reported even if the patterns changed too; compare
    /// `before`/`after` for the full picture.
    RefChanged,
    PatternsChanged,
    Unchanged,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Removed => "removed",
            Self::RefChanged => "ref_changed",
            Self::PatternsChanged => "patterns_changed",
            Self::Unchanged => "unchanged",
        }
    }
}

/// One row of a state diff, ordered by submodule name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmoduleChange {
    pub name: String,
    pub kind: ChangeKind,
    pub before: Option<SubmoduleSnapshot>,
    pub after: Option<SubmoduleSnapshot>,
}
