//! Error taxonomy.
//!
//! Fatal errors ([`SchemaError`], [`StateError`], [`ConfigError`]) abort a run
//! and are wrapped by the crate-level [`Error`]. Per-submodule errors
//! ([`FetchError`], [`CheckoutError`]) never abort a run; they are collected
//! into a [`RunReport`](crate::models::RunReport) as [`SubmoduleFailure`]s.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::vcs::VcsError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Crate-level error for everything that stops a run before or after the
/// per-submodule phase.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("workspace is locked by another decg process ({})", path.display())]
    Locked { path: PathBuf },

    #[error("failed to create lock file {}: {source}", path.display())]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Malformed, ambiguous or inconsistent profile input. Raised before any
/// VCS call or state write.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("failed to read profile {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid profile {}: {reason}", path.display())]
    Invalid { path: PathBuf, reason: String },

    #[error("ambiguous profile '{stem}': {}", display_paths(candidates))]
    Ambiguous {
        stem: String,
        candidates: Vec<PathBuf>,
    },

    #[error("unknown submodule '{name}' (known: {known})")]
    UnknownSubmodule { name: String, known: String },
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Why a fetch failed.
#[derive(Debug, Error)]
pub enum FetchCause {
    #[error("timed out after {}s", after.as_secs())]
    Timeout { after: Duration },

    #[error(transparent)]
    Vcs(VcsError),
}

impl From<VcsError> for FetchCause {
    fn from(err: VcsError) -> Self {
        match err {
            VcsError::Timeout { after, .. } => Self::Timeout { after },
            other => Self::Vcs(other),
        }
    }
}

/// Registration, fetch or ref checkout failed for one submodule.
#[derive(Debug, Error)]
#[error("fetch failed for {submodule}: {cause}")]
pub struct FetchError {
    pub submodule: String,
    #[source]
    pub cause: FetchCause,
}

impl FetchError {
    pub fn new(submodule: &str, cause: impl Into<FetchCause>) -> Self {
        Self {
            submodule: submodule.to_string(),
            cause: cause.into(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.cause, FetchCause::Timeout { .. })
    }
}

/// Why a sparse-checkout application failed.
#[derive(Debug, Error)]
pub enum CheckoutCause {
    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: &'static str },

    #[error(transparent)]
    Vcs(#[from] VcsError),
}

/// Sparse checkout (or work branch switch) failed for one submodule.
#[derive(Debug, Error)]
#[error("checkout failed for {submodule}: {cause}")]
pub struct CheckoutError {
    pub submodule: String,
    #[source]
    pub cause: CheckoutCause,
}

impl CheckoutError {
    pub fn new(submodule: &str, cause: impl Into<CheckoutCause>) -> Self {
        Self {
            submodule: submodule.to_string(),
            cause: cause.into(),
        }
    }
}

/// A per-submodule failure collected during a run.
#[derive(Debug, Error)]
pub enum SubmoduleFailure {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Checkout(#[from] CheckoutError),
}

impl SubmoduleFailure {
    pub fn submodule(&self) -> &str {
        match self {
            Self::Fetch(e) => &e.submodule,
            Self::Checkout(e) => &e.submodule,
        }
    }
}

/// Reading or committing the workspace state file failed.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to read state file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt state file {}: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to commit state file {}: {source}", path.display())]
    Commit {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no .gitmodules found in {} or any parent directory", start.display())]
    NoHubRoot { start: PathBuf },
}
