//! VCS capability used by the initializer and the sparse-checkout applier.
//!
//! The rest of the crate talks to submodules only through [`Vcs`], so runs can
//! be exercised against an in-memory implementation. [`GitCli`] is the real
//! one.

mod git;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use git::GitCli;

use crate::models::Submodule;

/// What a registered submodule looks like on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Probe {
    pub shallow: bool,
    /// Local branch HEAD is on; `None` when detached.
    pub branch: Option<String>,
}

/// History depth for a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchDepth {
    /// Depth 1.
    Shallow,
    /// Full history on a repository that already has it.
    Full,
    /// Full history on a repository that is currently shallow.
    Unshallow,
}

/// Rules written to a submodule's sparse-checkout configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SparseRules {
    /// Directory whitelist (cone mode).
    Cone(Vec<String>),
    /// Raw pattern-file lines, evaluated last-match-wins.
    Patterns(Vec<String>),
}

#[derive(Debug, Error)]
pub enum VcsError {
    #[error("`{command}` timed out after {}s", after.as_secs())]
    Timeout { command: String, after: Duration },

    #[error("`{command}` exited with status {status}: {stderr}")]
    Failed {
        command: String,
        status: i32,
        stderr: String,
    },

    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Rejected(String),
}

/// Submodule operations needed to materialize a workspace.
///
/// Implementations must be safe to call concurrently for different
/// submodules. Calls for the same submodule are never issued concurrently.
#[async_trait]
pub trait Vcs: Send + Sync {
    /// `None` when the submodule has no working tree yet.
    async fn probe(&self, submodule: &Submodule) -> Result<Option<Probe>, VcsError>;

    /// Register the submodule and check out the commit pinned by the
    /// superproject.
    async fn register(&self, submodule: &Submodule, shallow: bool) -> Result<(), VcsError>;

    /// Fetch `reference` (or the default remote head when `None`) at `depth`.
    async fn fetch(
        &self,
        submodule: &Submodule,
        reference: Option<&str>,
        depth: FetchDepth,
    ) -> Result<(), VcsError>;

    /// Check out what the last fetch of `reference` brought in.
    async fn checkout(&self, submodule: &Submodule, reference: &str) -> Result<(), VcsError>;

    /// Replace the sparse-checkout rules and reconcile the working tree.
    async fn set_sparse(&self, submodule: &Submodule, rules: &SparseRules)
        -> Result<(), VcsError>;

    /// Turn sparse checkout off, materializing the full tree.
    async fn disable_sparse(&self, submodule: &Submodule) -> Result<(), VcsError>;

    /// Switch to local branch `branch`, creating it at HEAD when missing.
    ///
    /// With `reset`, an existing branch is moved to HEAD first, so HEAD stays
    /// where the last checkout put it. Without it, an existing branch is
    /// checked out as is.
    async fn ensure_branch(
        &self,
        submodule: &Submodule,
        branch: &str,
        reset: bool,
    ) -> Result<(), VcsError>;
}
