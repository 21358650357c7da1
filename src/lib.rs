//! Sparse-checkout workspace initializer for multi-submodule hubs.
//!
//! A hub is a git superproject whose `.gitmodules` lists several monorepos.
//! For a given service and version, `decg` decides which submodules to
//! initialize, which paths of each to materialize, and records what it did so
//! the next run can diff against it.

pub mod config;
pub mod error;
pub mod gitmodules;
pub mod models;
pub mod profile;
pub mod render;
pub mod resolver;
pub mod state;
pub mod vcs;
pub mod workspace;

pub use error::{Error, Result};
