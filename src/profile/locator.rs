use std::path::{Path, PathBuf};

use crate::error::SchemaError;

/// Finds the profile document for a (service, version) pair.
pub trait ProfileLocator: Send + Sync {
    /// `Ok(None)` when no document exists. More than one match is an error.
    fn find(&self, service: &str, version: &str) -> Result<Option<PathBuf>, SchemaError>;
}

/// Looks up `{dir}/{service}-{version}.{ext}` for each known extension.
///
/// The stem must match exactly, including case, even on case-insensitive
/// filesystems.
#[derive(Debug, Clone)]
pub struct ConventionalLocator {
    dir: PathBuf,
    extensions: Vec<String>,
}

impl ConventionalLocator {
    pub fn new(dir: impl Into<PathBuf>, extensions: Vec<String>) -> Self {
        Self {
            dir: dir.into(),
            extensions,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Every `(stem, path)` in the directory with a known extension, sorted.
    pub fn list(&self) -> Result<Vec<(String, PathBuf)>, SchemaError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(SchemaError::Unreadable {
                    path: self.dir.clone(),
                    source,
                })
            }
        };

        let mut found = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| SchemaError::Unreadable {
                path: self.dir.clone(),
                source,
            })?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let (Some(stem), Some(ext)) = (
                path.file_stem().and_then(|s| s.to_str()),
                path.extension().and_then(|s| s.to_str()),
            ) else {
                continue;
            };
            if self.extensions.iter().any(|known| known == ext) {
                found.push((stem.to_string(), path.clone()));
            }
        }
        found.sort();
        Ok(found)
    }
}

impl ProfileLocator for ConventionalLocator {
    fn find(&self, service: &str, version: &str) -> Result<Option<PathBuf>, SchemaError> {
        let stem = format!("{service}-{version}");
        let mut candidates: Vec<PathBuf> = self
            .list()?
            .into_iter()
            .filter(|(found, _)| *found == stem)
            .map(|(_, path)| path)
            .collect();

        match candidates.len() {
            0 => Ok(None),
            1 => Ok(candidates.pop()),
            _ => Err(SchemaError::Ambiguous { stem, candidates }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locator(dir: &Path) -> ConventionalLocator {
        ConventionalLocator::new(dir, vec!["yaml".into(), "yml".into(), "json".into()])
    }

    #[test]
    fn missing_directory_finds_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let found = locator(&tmp.path().join("nope"))
            .find("svc", "v1")
            .expect("find");
        assert!(found.is_none());
    }

    #[test]
    fn finds_exact_stem_only() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("svc-v1.yaml"), "").unwrap();
        std::fs::write(tmp.path().join("svc-v10.yaml"), "").unwrap();
        std::fs::write(tmp.path().join("SVC-v1.yml"), "").unwrap();
        std::fs::write(tmp.path().join("svc-v1.txt"), "").unwrap();

        let found = locator(tmp.path()).find("svc", "v1").expect("find");
        assert_eq!(found, Some(tmp.path().join("svc-v1.yaml")));
    }

    #[test]
    fn two_extensions_for_one_stem_is_ambiguous() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("svc-v1.yaml"), "").unwrap();
        std::fs::write(tmp.path().join("svc-v1.json"), "").unwrap();

        let err = locator(tmp.path()).find("svc", "v1").expect_err("ambiguous");
        match err {
            SchemaError::Ambiguous { stem, candidates } => {
                assert_eq!(stem, "svc-v1");
                assert_eq!(candidates.len(), 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
