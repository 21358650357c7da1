//! Workspace configuration.
//!
//! Layers, later wins: built-in defaults, the user file
//! (`$XDG_CONFIG_HOME/decg/config.json`), the hub file
//! (`<root>/.decg/config.json`), then `DECG_*` environment variables.
//! Missing files are skipped; malformed ones are an error.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use dirs::config_dir;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::gitmodules::GITMODULES;

const APP_NAME: &str = "decg";
const CONFIG_FILE: &str = "config.json";

/// Hub-local directory holding the config, state and lock files.
pub const HUB_DIR: &str = ".decg";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Directory of `{service}-{version}.<ext>` profiles, relative to the hub root.
    pub profiles_dir: PathBuf,
    /// Extensions the conventional lookup accepts.
    pub profile_extensions: Vec<String>,
    /// State file, relative to the hub root.
    pub state_file: PathBuf,
    pub fetch_timeout_secs: u64,
    /// Submodules processed concurrently.
    pub jobs: usize,
    /// Ref used when neither the profile nor the previous state names one.
    /// `None` keeps the commit pinned by the superproject.
    pub default_ref: Option<String>,
    /// Replaces `.gitmodules` as the list of known submodules (name -> path).
    pub submodules: Option<BTreeMap<String, PathBuf>>,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            profiles_dir: PathBuf::from("configs/sparse-profiles"),
            profile_extensions: vec!["yaml".into(), "yml".into(), "json".into()],
            state_file: PathBuf::from(HUB_DIR).join("workspace-state.json"),
            fetch_timeout_secs: 300,
            jobs: 4,
            default_ref: None,
            submodules: None,
        }
    }
}

/// One config file. Every key is optional and only overrides what it sets.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConfigLayer {
    pub profiles_dir: Option<PathBuf>,
    pub profile_extensions: Option<Vec<String>>,
    pub state_file: Option<PathBuf>,
    pub fetch_timeout_secs: Option<u64>,
    pub jobs: Option<usize>,
    pub default_ref: Option<String>,
    pub submodules: Option<BTreeMap<String, PathBuf>>,
}

impl ConfigLayer {
    pub fn apply_to(self, config: &mut WorkspaceConfig) {
        if let Some(v) = self.profiles_dir {
            config.profiles_dir = v;
        }
        if let Some(v) = self.profile_extensions {
            config.profile_extensions = v;
        }
        if let Some(v) = self.state_file {
            config.state_file = v;
        }
        if let Some(v) = self.fetch_timeout_secs {
            config.fetch_timeout_secs = v;
        }
        if let Some(v) = self.jobs {
            config.jobs = v;
        }
        if let Some(v) = self.default_ref {
            config.default_ref = Some(v);
        }
        if let Some(v) = self.submodules {
            config.submodules = Some(v);
        }
    }
}

impl WorkspaceConfig {
    /// Load every layer for the hub at `root`.
    pub fn load(root: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(path) = user_config_path() {
            if let Some(layer) = read_layer(&path)? {
                layer.apply_to(&mut config);
            }
        }
        if let Some(layer) = read_layer(&hub_config_path(root))? {
            layer.apply_to(&mut config);
        }
        apply_env_overrides(&mut config);
        Ok(config)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn profiles_path(&self, root: &Path) -> PathBuf {
        root.join(&self.profiles_dir)
    }

    pub fn state_path(&self, root: &Path) -> PathBuf {
        root.join(&self.state_file)
    }

    /// Save as the hub config file.
    pub fn save(&self, root: &Path) -> anyhow::Result<()> {
        use anyhow::Context;

        let path = hub_config_path(root);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&path, content).context("Failed to write config file")?;
        Ok(())
    }
}

pub fn user_config_path() -> Option<PathBuf> {
    let mut path = config_dir()?;
    path.push(APP_NAME);
    path.push(CONFIG_FILE);
    Some(path)
}

pub fn hub_config_path(root: &Path) -> PathBuf {
    root.join(HUB_DIR).join(CONFIG_FILE)
}

fn read_layer(path: &Path) -> Result<Option<ConfigLayer>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

pub fn apply_env_overrides(config: &mut WorkspaceConfig) {
    if let Ok(raw) = std::env::var("DECG_FETCH_TIMEOUT_SECS") {
        match raw.trim().parse::<u64>() {
            Ok(value) => config.fetch_timeout_secs = value,
            Err(err) => tracing::warn!("invalid DECG_FETCH_TIMEOUT_SECS, ignoring: {err}"),
        }
    }

    if let Ok(raw) = std::env::var("DECG_JOBS") {
        match raw.trim().parse::<usize>() {
            Ok(value) if value > 0 => config.jobs = value,
            Ok(_) => tracing::warn!("DECG_JOBS must be at least 1, ignoring"),
            Err(err) => tracing::warn!("invalid DECG_JOBS, ignoring: {err}"),
        }
    }

    if let Ok(raw) = std::env::var("DECG_PROFILES_DIR") {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            config.profiles_dir = PathBuf::from(trimmed);
        }
    }
}

/// Walk up from `start` to the first directory containing `.gitmodules`.
pub fn find_hub_root(start: &Path) -> Result<PathBuf, ConfigError> {
    start
        .ancestors()
        .find(|dir| dir.join(GITMODULES).exists())
        .map(Path::to_path_buf)
        .ok_or_else(|| ConfigError::NoHubRoot {
            start: start.to_path_buf(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_hub_conventions() {
        let config = WorkspaceConfig::default();
        assert_eq!(config.profiles_dir, PathBuf::from("configs/sparse-profiles"));
        assert_eq!(config.state_file, PathBuf::from(".decg/workspace-state.json"));
        assert_eq!(config.fetch_timeout(), Duration::from_secs(300));
        assert!(config.default_ref.is_none());
    }

    #[test]
    fn layer_overrides_only_what_it_sets() {
        let mut config = WorkspaceConfig::default();
        let layer: ConfigLayer =
            serde_json::from_str(r#"{"jobs": 8, "default_ref": "main"}"#).unwrap();
        layer.apply_to(&mut config);

        assert_eq!(config.jobs, 8);
        assert_eq!(config.default_ref.as_deref(), Some("main"));
        assert_eq!(config.fetch_timeout_secs, 300);
    }

    #[test]
    fn hub_layer_is_read_and_malformed_file_errors() {
        let tmp = tempfile::tempdir().unwrap();
        let path = hub_config_path(tmp.path());
        fs::create_dir_all(path.parent().unwrap()).unwrap();

        fs::write(&path, r#"{"fetch_timeout_secs": 5}"#).unwrap();
        let layer = read_layer(&path).unwrap().expect("layer present");
        assert_eq!(layer.fetch_timeout_secs, Some(5));

        fs::write(&path, "{not json").unwrap();
        assert!(matches!(read_layer(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn save_then_read_back() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = WorkspaceConfig::default();
        config.jobs = 2;
        config.save(tmp.path()).unwrap();

        let layer = read_layer(&hub_config_path(tmp.path())).unwrap().unwrap();
        assert_eq!(layer.jobs, Some(2));
    }

    #[test]
    fn finds_hub_root_from_nested_directory() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join(GITMODULES), "").unwrap();
        let nested = tmp.path().join("apps/fe/src");
        fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_hub_root(&nested).unwrap(), tmp.path());
    }
}
