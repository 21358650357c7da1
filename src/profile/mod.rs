//! Profile loading and validation.

mod locator;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

pub use locator::{ConventionalLocator, ProfileLocator};

use crate::error::SchemaError;
use crate::models::{Profile, ProfileOptions, SubmoduleSpec};

/// On-disk shape of a profile. Unknown top-level keys are ignored;
/// [`SubmoduleSpec`] itself rejects unknown keys.
#[derive(Debug, Deserialize)]
struct ProfileDocument {
    service: Option<String>,
    version: Option<String>,
    /// `name:` with no value parses as `None` and means a full checkout.
    submodules: Option<BTreeMap<String, Option<SubmoduleSpec>>>,
    #[serde(default)]
    options: Option<ProfileOptions>,
}

/// Resolves profiles for a hub.
pub struct ProfileStore {
    root: PathBuf,
    locator: Box<dyn ProfileLocator>,
}

impl ProfileStore {
    pub fn new(root: impl Into<PathBuf>, locator: Box<dyn ProfileLocator>) -> Self {
        Self {
            root: root.into(),
            locator,
        }
    }

    /// Load the profile for `service`/`version`.
    ///
    /// An `explicit` path (relative paths are taken from the hub root) must
    /// exist. Without one, the locator is asked, and `Ok(None)` means no
    /// profile exists for this pair.
    pub fn resolve(
        &self,
        service: &str,
        version: &str,
        explicit: Option<&Path>,
    ) -> Result<Option<Profile>, SchemaError> {
        let path = match explicit {
            Some(path) if path.is_absolute() => path.to_path_buf(),
            Some(path) => self.root.join(path),
            None => match self.locator.find(service, version)? {
                Some(path) => path,
                None => {
                    tracing::info!(service, version, "no sparse profile found");
                    return Ok(None);
                }
            },
        };

        let profile = read_profile(&path)?;

        if profile.service != service || profile.version != version {
            tracing::warn!(
                path = %path.display(),
                "profile declares {} {}, using it for {} {}",
                profile.service,
                profile.version,
                service,
                version
            );
        }
        tracing::info!(path = %path.display(), "loaded sparse profile");
        Ok(Some(profile))
    }
}

/// Read and parse the profile document at `path`.
pub fn read_profile(path: &Path) -> Result<Profile, SchemaError> {
    let contents = std::fs::read_to_string(path).map_err(|source| SchemaError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    parse_profile(path, &contents)
}

/// Parse and validate a profile document. `.json` files are read as JSON,
/// everything else as YAML.
pub fn parse_profile(path: &Path, contents: &str) -> Result<Profile, SchemaError> {
    let invalid = |reason: String| SchemaError::Invalid {
        path: path.to_path_buf(),
        reason,
    };

    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let document: ProfileDocument = if is_json {
        serde_json::from_str(contents).map_err(|e| invalid(e.to_string()))?
    } else {
        serde_yaml_ng::from_str(contents).map_err(|e| invalid(e.to_string()))?
    };

    let service = required(document.service, "service").map_err(invalid)?;
    let version = required(document.version, "version").map_err(invalid)?;

    let submodules_listed = document.submodules.is_some();
    let mut submodules = BTreeMap::new();
    for (name, spec) in document.submodules.unwrap_or_default() {
        if name.trim().is_empty() {
            return Err(invalid("submodule names must not be empty".to_string()));
        }
        submodules.insert(name, spec.unwrap_or_default());
    }

    Ok(Profile {
        service,
        version,
        submodules,
        options: document.options.unwrap_or_default(),
        submodules_listed,
    })
}

fn required(value: Option<String>, field: &str) -> Result<String, String> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(format!("missing required field `{field}`")),
    }
}
