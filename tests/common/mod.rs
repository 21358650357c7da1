#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use decg::config::WorkspaceConfig;
use decg::models::{Journal, Submodule, WorkspaceState};
use decg::state::StateStore;
use decg::vcs::{FetchDepth, Probe, SparseRules, Vcs, VcsError};
use decg::workspace::Workspace;

/// A VCS call as seen by [`FakeVcs`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Probe(String),
    Register { submodule: String, shallow: bool },
    Fetch {
        submodule: String,
        reference: Option<String>,
        depth: FetchDepth,
    },
    Checkout { submodule: String, reference: String },
    SetSparse { submodule: String, rules: SparseRules },
    DisableSparse(String),
    EnsureBranch {
        submodule: String,
        branch: String,
        reset: bool,
    },
}

impl Call {
    pub fn submodule(&self) -> &str {
        match self {
            Call::Probe(s) | Call::DisableSparse(s) => s,
            Call::Register { submodule, .. }
            | Call::Fetch { submodule, .. }
            | Call::Checkout { submodule, .. }
            | Call::SetSparse { submodule, .. }
            | Call::EnsureBranch { submodule, .. } => submodule,
        }
    }

    pub fn touches_tree(&self) -> bool {
        matches!(self, Call::SetSparse { .. } | Call::DisableSparse(_))
    }
}

/// Commit a freshly registered tree sits on.
pub const PINNED: &str = "pinned";

/// One submodule's working tree.
#[derive(Debug, Clone, Default)]
pub struct FakeTree {
    pub shallow: bool,
    /// Ref whose commit HEAD points at.
    pub head: String,
    /// Local branches and the ref each one points at.
    pub branches: BTreeMap<String, String>,
    /// Checked-out branch; `None` is a detached HEAD.
    pub branch: Option<String>,
    /// `None` means sparse checkout is disabled.
    pub sparse: Option<SparseRules>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fault {
    Timeout,
    Sparse,
}

/// In-memory [`Vcs`] recording every call.
#[derive(Default)]
pub struct FakeVcs {
    trees: Mutex<BTreeMap<String, FakeTree>>,
    calls: Mutex<Vec<Call>>,
    faults: Mutex<BTreeMap<String, Fault>>,
    files: BTreeMap<String, Vec<String>>,
}

impl FakeVcs {
    /// `files` lists the paths each submodule's full tree contains.
    pub fn with_files(files: BTreeMap<String, Vec<String>>) -> Self {
        Self {
            files,
            ..Self::default()
        }
    }

    /// Every network operation on `submodule` times out from now on.
    pub fn time_out(&self, submodule: &str) {
        self.faults
            .lock()
            .unwrap()
            .insert(submodule.to_string(), Fault::Timeout);
    }

    /// Sparse-checkout changes on `submodule` fail from now on.
    pub fn reject_sparse(&self, submodule: &str) {
        self.faults
            .lock()
            .unwrap()
            .insert(submodule.to_string(), Fault::Sparse);
    }

    pub fn heal(&self) {
        self.faults.lock().unwrap().clear();
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, submodule: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.submodule() == submodule)
            .collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn tree(&self, submodule: &str) -> Option<FakeTree> {
        self.trees.lock().unwrap().get(submodule).cloned()
    }

    pub fn is_registered(&self, submodule: &str) -> bool {
        self.trees.lock().unwrap().contains_key(submodule)
    }

    /// Paths of `submodule` present on disk under its sparse rules.
    pub fn materialized(&self, submodule: &str) -> Vec<String> {
        let Some(tree) = self.tree(submodule) else {
            return Vec::new();
        };
        let files = self.files.get(submodule).cloned().unwrap_or_default();
        files
            .into_iter()
            .filter(|file| match &tree.sparse {
                None => true,
                Some(SparseRules::Cone(dirs)) => {
                    !file.contains('/')
                        || dirs
                            .iter()
                            .any(|dir| file.starts_with(&format!("{dir}/")))
                }
                Some(SparseRules::Patterns(lines)) => last_match_includes(lines, file),
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn fault(&self, submodule: &Submodule) -> Option<Fault> {
        self.faults.lock().unwrap().get(&submodule.name).copied()
    }

    fn check_network(&self, submodule: &Submodule, command: &str) -> Result<(), VcsError> {
        match self.fault(submodule) {
            Some(Fault::Timeout) => Err(VcsError::Timeout {
                command: format!("git {command}"),
                after: Duration::from_secs(300),
            }),
            _ => Ok(()),
        }
    }

    fn update(&self, submodule: &Submodule, f: impl FnOnce(&mut FakeTree)) -> Result<(), VcsError> {
        let mut trees = self.trees.lock().unwrap();
        match trees.get_mut(&submodule.name) {
            Some(tree) => {
                f(tree);
                Ok(())
            }
            None => Err(VcsError::Rejected(format!(
                "{} is not registered",
                submodule.name
            ))),
        }
    }
}

/// gitignore-style evaluation: the last matching line decides, nothing
/// matches by default.
fn last_match_includes(lines: &[String], file: &str) -> bool {
    let mut included = false;
    for line in lines {
        let (negated, pattern) = match line.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, line.as_str()),
        };
        let pattern = pattern.trim_start_matches('/');
        let matches = match pattern.strip_suffix('*') {
            Some(prefix) => file.starts_with(prefix),
            None => file == pattern || file.starts_with(&format!("{pattern}/")),
        };
        if matches {
            included = !negated;
        }
    }
    included
}

#[async_trait]
impl Vcs for FakeVcs {
    async fn probe(&self, submodule: &Submodule) -> Result<Option<Probe>, VcsError> {
        self.record(Call::Probe(submodule.name.clone()));
        Ok(self.tree(&submodule.name).map(|tree| Probe {
            shallow: tree.shallow,
            branch: tree.branch,
        }))
    }

    async fn register(&self, submodule: &Submodule, shallow: bool) -> Result<(), VcsError> {
        self.record(Call::Register {
            submodule: submodule.name.clone(),
            shallow,
        });
        self.check_network(submodule, "submodule update")?;
        self.trees.lock().unwrap().insert(
            submodule.name.clone(),
            FakeTree {
                shallow,
                head: PINNED.to_string(),
                ..FakeTree::default()
            },
        );
        Ok(())
    }

    async fn fetch(
        &self,
        submodule: &Submodule,
        reference: Option<&str>,
        depth: FetchDepth,
    ) -> Result<(), VcsError> {
        self.record(Call::Fetch {
            submodule: submodule.name.clone(),
            reference: reference.map(str::to_string),
            depth,
        });
        self.check_network(submodule, "fetch")?;
        self.update(submodule, |tree| tree.shallow = depth == FetchDepth::Shallow)
    }

    async fn checkout(&self, submodule: &Submodule, reference: &str) -> Result<(), VcsError> {
        self.record(Call::Checkout {
            submodule: submodule.name.clone(),
            reference: reference.to_string(),
        });
        self.update(submodule, |tree| {
            tree.head = reference.to_string();
            tree.branch = None;
        })
    }

    async fn set_sparse(&self, submodule: &Submodule, rules: &SparseRules) -> Result<(), VcsError> {
        self.record(Call::SetSparse {
            submodule: submodule.name.clone(),
            rules: rules.clone(),
        });
        if self.fault(submodule) == Some(Fault::Sparse) {
            return Err(VcsError::Rejected("sparse-checkout set failed".to_string()));
        }
        self.update(submodule, |tree| tree.sparse = Some(rules.clone()))
    }

    async fn disable_sparse(&self, submodule: &Submodule) -> Result<(), VcsError> {
        self.record(Call::DisableSparse(submodule.name.clone()));
        if self.fault(submodule) == Some(Fault::Sparse) {
            return Err(VcsError::Rejected("sparse-checkout disable failed".to_string()));
        }
        self.update(submodule, |tree| tree.sparse = None)
    }

    async fn ensure_branch(
        &self,
        submodule: &Submodule,
        branch: &str,
        reset: bool,
    ) -> Result<(), VcsError> {
        self.record(Call::EnsureBranch {
            submodule: submodule.name.clone(),
            branch: branch.to_string(),
            reset,
        });
        self.update(submodule, |tree| {
            match tree.branches.get(branch) {
                // Plain checkout of an existing branch moves HEAD to its tip.
                Some(tip) if !reset => tree.head = tip.clone(),
                _ => {
                    tree.branches.insert(branch.to_string(), tree.head.clone());
                }
            }
            tree.branch = Some(branch.to_string());
        })
    }
}

/// A temporary hub root with a `.gitmodules`, a profiles directory and a
/// shared [`FakeVcs`].
pub struct Hub {
    pub dir: TempDir,
    pub vcs: Arc<FakeVcs>,
    pub config: WorkspaceConfig,
}

impl Hub {
    /// Hub with one submodule per entry of `files`, mounted at `repos/<name>`.
    pub fn new(files: &[(&str, &[&str])]) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");

        let mut gitmodules = String::new();
        let mut trees = BTreeMap::new();
        for (name, paths) in files {
            gitmodules.push_str(&format!(
                "[submodule \"{name}\"]\n\tpath = repos/{name}\n\turl = git@example.com:org/{name}.git\n"
            ));
            trees.insert(
                name.to_string(),
                paths.iter().map(|p| p.to_string()).collect(),
            );
        }
        std::fs::write(dir.path().join(".gitmodules"), gitmodules)
            .expect("Failed to write .gitmodules");

        let config = WorkspaceConfig::default();
        std::fs::create_dir_all(config.profiles_path(dir.path()))
            .expect("Failed to create profiles dir");

        Self {
            dir,
            vcs: Arc::new(FakeVcs::with_files(trees)),
            config,
        }
    }

    /// The three-monorepo hub used across scenarios.
    pub fn ecg() -> Self {
        Self::new(&[
            (
                "decg-be-monorepo",
                &["README.md", "apps/ecg-api/main.py", "apps/billing/main.py", "docs/index.md"],
            ),
            (
                "decg-fe-monorepo",
                &[
                    "package.json",
                    "apps/ecg-ui/index.tsx",
                    "apps/admin/index.tsx",
                    "apps/sftp-monitor/index.tsx",
                    "packages/ui/button.tsx",
                ],
            ),
            ("decg-go-monorepo", &["go.mod", "cmd/ingest/main.go"]),
        ])
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn write_profile(&self, file_name: &str, contents: &str) -> PathBuf {
        let path = self.config.profiles_path(self.root()).join(file_name);
        std::fs::write(&path, contents).expect("Failed to write profile");
        path
    }

    pub fn workspace(&self) -> Workspace {
        let vcs: Arc<dyn Vcs> = self.vcs.clone();
        Workspace::open(self.root(), self.config.clone(), vcs).expect("Failed to open workspace")
    }

    pub fn state_path(&self) -> PathBuf {
        self.config.state_path(self.root())
    }

    pub fn state(&self) -> Option<WorkspaceState> {
        StateStore::new(self.state_path())
            .load()
            .expect("Failed to load state")
    }

    pub fn journal(&self) -> Journal {
        StateStore::new(self.state_path())
            .load_journal()
            .expect("Failed to load journal")
    }

    pub fn state_bytes(&self) -> Option<Vec<u8>> {
        std::fs::read(self.state_path()).ok()
    }
}

pub fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub fn names(calls: &[Call]) -> BTreeSet<String> {
    calls.iter().map(|c| c.submodule().to_string()).collect()
}
