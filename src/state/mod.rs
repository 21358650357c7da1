//! Workspace state persistence and diffing.
//!
//! The state file is the durable record of what the last successful run
//! materialized. [`StateStore::commit`] is called once per run, after every
//! submodule succeeded, and replaces the file atomically.
//!
//! A run that fails still changes some trees. Those are written to the
//! [`Journal`] instead, so the next run does not trust the stale state for
//! them.

use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StateError;
use crate::models::{
    ChangeKind, Journal, SubmoduleChange, WorkspaceState, STATE_SCHEMA_VERSION,
};

pub struct StateStore {
    path: PathBuf,
    journal: PathBuf,
}

impl StateStore {
    /// The journal sits next to the state file as `<stem>.journal.json`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let journal = path.with_extension("journal.json");
        Self { path, journal }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn journal_path(&self) -> &Path {
        &self.journal
    }

    /// `Ok(None)` before the first successful run.
    pub fn load(&self) -> Result<Option<WorkspaceState>, StateError> {
        let Some(state) = read_json::<WorkspaceState>(&self.path)? else {
            return Ok(None);
        };

        if state.schema_version > STATE_SCHEMA_VERSION {
            tracing::warn!(
                found = state.schema_version,
                supported = STATE_SCHEMA_VERSION,
                "state file written by a newer decg; unknown fields are ignored"
            );
        }
        Ok(Some(state))
    }

    /// Write `state` via a temp file in the same directory and rename it into
    /// place, so a crash never leaves a half-written file.
    pub fn commit(&self, state: &WorkspaceState) -> Result<(), StateError> {
        write_atomic(&self.path, state)?;
        tracing::debug!(path = %self.path.display(), "committed workspace state");
        Ok(())
    }

    /// Empty when every run so far committed.
    pub fn load_journal(&self) -> Result<Journal, StateError> {
        Ok(read_json(&self.journal)?.unwrap_or_default())
    }

    /// Merge `journal` into the one on disk; entries for the same submodule
    /// are replaced.
    pub fn record_journal(&self, journal: Journal) -> Result<(), StateError> {
        let mut merged = self.load_journal()?;
        merged.last_run_id = journal.last_run_id;
        merged.trees.extend(journal.trees);
        write_atomic(&self.journal, &merged)?;
        tracing::debug!(
            path = %self.journal.display(),
            submodules = merged.trees.len(),
            "recorded trees touched by a withheld run"
        );
        Ok(())
    }

    pub fn clear_journal(&self) -> Result<(), StateError> {
        match fs::remove_file(&self.journal) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StateError::Commit {
                path: self.journal.clone(),
                source,
            }),
        }
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StateError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StateError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|source| StateError::Corrupt {
            path: path.to_path_buf(),
            source,
        })
}

fn write_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StateError> {
    let commit_err = |source| StateError::Commit {
        path: path.to_path_buf(),
        source,
    };

    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(commit_err)?;

    let mut content = serde_json::to_vec_pretty(value).map_err(|e| commit_err(e.into()))?;
    content.push(b'\n');

    let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(commit_err)?;
    temp.write_all(&content).map_err(commit_err)?;
    temp.as_file().sync_all().map_err(commit_err)?;
    temp.persist(path).map_err(|e| commit_err(e.error))?;
    Ok(())
}

/// Per-submodule differences between `old` and `new`, ordered by name.
///
/// Every submodule present in either state gets exactly one row. When both
/// the ref and the patterns changed, the row is `RefChanged`.
pub fn diff(old: Option<&WorkspaceState>, new: &WorkspaceState) -> Vec<SubmoduleChange> {
    let mut names: BTreeSet<&str> = new.applied.keys().map(String::as_str).collect();
    if let Some(old) = old {
        names.extend(old.applied.keys().map(String::as_str));
    }

    names
        .into_iter()
        .map(|name| {
            let before = old.and_then(|state| state.snapshot(name));
            let after = new.snapshot(name);
            let kind = match (&before, &after) {
                (None, Some(_)) => ChangeKind::Added,
                (Some(_), None) => ChangeKind::Removed,
                (Some(b), Some(a)) if b.reference != a.reference => ChangeKind::RefChanged,
                (Some(b), Some(a)) if b.patterns != a.patterns => ChangeKind::PatternsChanged,
                _ => ChangeKind::Unchanged,
            };
            SubmoduleChange {
                name: name.to_string(),
                kind,
                before,
                after,
            }
        })
        .collect()
}
