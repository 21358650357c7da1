use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A submodule declared by the hub.
///
/// `path` is relative to the hub root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submodule {
    pub name: String,
    pub path: PathBuf,
    pub url: Option<String>,
}

impl Submodule {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            url: None,
        }
    }
}
