//! Init and upgrade runs.
//!
//! A run resolves a profile, plans one entry per known submodule, brings each
//! planned submodule to its ref and pattern set (concurrently, bounded by
//! `jobs`), and commits the resulting [`WorkspaceState`] only if every
//! submodule succeeded.

mod initializer;
mod lock;
mod sparse;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::Instrument;
use uuid::Uuid;

pub use initializer::{CheckoutTarget, Ensured, SubmoduleInitializer};
pub use lock::WorkspaceLock;
pub use sparse::{render as render_sparse, SparseApplier, UNIVERSAL_PATTERN};

use crate::config::WorkspaceConfig;
use crate::error::{CheckoutError, Result, SchemaError, StateError, SubmoduleFailure};
use crate::models::*;
use crate::profile::{read_profile, ConventionalLocator, ProfileLocator, ProfileStore};
use crate::resolver;
use crate::state::{self, StateStore};
use crate::vcs::Vcs;

/// Arguments of `init` / `version new`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitRequest {
    pub service: String,
    pub version: String,
    /// Explicit profile document; relative paths start at the hub root.
    pub profile: Option<PathBuf>,
    /// `<path>` for every profiled submodule, or `<submodule>:<path>`.
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl InitRequest {
    pub fn new(service: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            version: version.into(),
            ..Self::default()
        }
    }
}

/// Which submodules get a full checkout when no profile document exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    /// Every submodule the hub knows about.
    AllKnown,
    /// The submodules active in the current state, keeping their refs.
    PreviouslyActive,
}

/// What a run intends to do with one known submodule.
#[derive(Debug, Clone)]
pub struct PlannedSubmodule {
    pub submodule: Submodule,
    /// `None` when the profile does not list this submodule.
    pub spec: Option<SubmoduleSpec>,
    pub set: Option<EffectivePatternSet>,
    pub reference: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Plan {
    pub service: String,
    pub version: String,
    pub profile: Profile,
    /// False when the profile is a fallback rather than a loaded document.
    pub from_document: bool,
    pub entries: Vec<PlannedSubmodule>,
    pub advisories: Vec<SubmoduleAdvisory>,
}

impl Plan {
    pub fn work_branch(&self) -> String {
        format!("{}/develop/{}", self.service, self.version)
    }

    /// The state a fully successful run of this plan commits.
    pub fn planned_state(&self) -> WorkspaceState {
        let mut state = WorkspaceState::new(&self.service, &self.version);
        for entry in &self.entries {
            let Some(set) = &entry.set else {
                continue;
            };
            let name = &entry.submodule.name;
            state.applied.insert(name.clone(), set.clone());
            if let Some(reference) = &entry.reference {
                state.refs.insert(name.clone(), reference.clone());
            }
            state
                .shallow
                .insert(name.clone(), self.profile.options.shallow_clone);
        }
        state
    }
}

/// A hub root with its configuration, known submodules and VCS capability.
pub struct Workspace {
    root: PathBuf,
    config: WorkspaceConfig,
    submodules: Vec<Submodule>,
    profiles: ProfileStore,
    state: StateStore,
    vcs: Arc<dyn Vcs>,
}

impl Workspace {
    pub fn new(
        root: impl Into<PathBuf>,
        config: WorkspaceConfig,
        mut submodules: Vec<Submodule>,
        vcs: Arc<dyn Vcs>,
    ) -> Self {
        let root = root.into();
        submodules.sort_by(|a, b| a.name.cmp(&b.name));
        let locator = ConventionalLocator::new(
            config.profiles_path(&root),
            config.profile_extensions.clone(),
        );
        Self {
            profiles: ProfileStore::new(&root, Box::new(locator)),
            state: StateStore::new(config.state_path(&root)),
            root,
            config,
            submodules,
            vcs,
        }
    }

    /// Open the hub at `root`, reading known submodules from the config
    /// override or `.gitmodules`.
    pub fn open(
        root: impl Into<PathBuf>,
        config: WorkspaceConfig,
        vcs: Arc<dyn Vcs>,
    ) -> Result<Self> {
        let root = root.into();
        let submodules = match &config.submodules {
            Some(map) => map
                .iter()
                .map(|(name, path)| Submodule::new(name.clone(), path.clone()))
                .collect(),
            None => crate::gitmodules::read(&root)?,
        };
        Ok(Self::new(root, config, submodules, vcs))
    }

    /// Replace the conventional profile lookup.
    pub fn with_locator(mut self, locator: Box<dyn ProfileLocator>) -> Self {
        self.profiles = ProfileStore::new(&self.root, locator);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &WorkspaceConfig {
        &self.config
    }

    pub fn submodules(&self) -> &[Submodule] {
        &self.submodules
    }

    pub fn state_store(&self) -> &StateStore {
        &self.state
    }

    pub fn load_state(&self) -> std::result::Result<Option<WorkspaceState>, StateError> {
        self.state.load()
    }

    /// Versions of `service` with a profile in the conventional directory.
    ///
    /// A file name alone cannot tell `svc-x-v1` (service `svc`) from `svc-x`
    /// version `v1`, so each candidate's `service` field has to agree.
    pub fn list_versions(&self, service: &str) -> std::result::Result<Vec<String>, SchemaError> {
        let locator = ConventionalLocator::new(
            self.config.profiles_path(&self.root),
            self.config.profile_extensions.clone(),
        );
        let prefix = format!("{service}-");
        let mut versions: Vec<String> = locator
            .list()?
            .into_iter()
            .filter_map(|(stem, path)| {
                let version = stem.strip_prefix(&prefix).filter(|v| !v.is_empty())?;
                match read_profile(&path) {
                    Ok(doc) if doc.service == service => Some(version.to_string()),
                    Ok(doc) => {
                        tracing::debug!(path = %path.display(), service = %doc.service, "profile belongs to another service");
                        None
                    }
                    Err(e) => {
                        tracing::warn!("skipping profile: {e}");
                        None
                    }
                }
            })
            .collect();
        versions.dedup();
        Ok(versions)
    }

    /// Resolve the profile and decide what happens to every known submodule.
    /// Pure apart from reading the profile; all schema errors surface here.
    pub fn plan(
        &self,
        request: &InitRequest,
        fallback: Fallback,
        current: Option<&WorkspaceState>,
    ) -> Result<Plan> {
        let loaded = self.profiles.resolve(
            &request.service,
            &request.version,
            request.profile.as_deref(),
        )?;
        let from_document = loaded.is_some();

        let mut profile = match loaded {
            Some(mut profile) if !profile.submodules_listed => {
                profile.submodules = self
                    .submodules
                    .iter()
                    .map(|s| (s.name.clone(), SubmoduleSpec::default()))
                    .collect();
                profile
            }
            Some(profile) => profile,
            None => self.fallback_profile(request, fallback, current),
        };

        apply_overrides(
            &mut profile.submodules,
            &request.include,
            &request.exclude,
            &self.submodules,
        )?;
        for name in profile.submodules.keys() {
            self.ensure_known(name)?;
        }

        let mut advisories = Vec::new();
        let entries = self
            .submodules
            .iter()
            .map(|submodule| {
                let spec = profile.submodules.get(&submodule.name).cloned();
                let (set, reference) = match &spec {
                    Some(spec) => {
                        let resolution = resolver::resolve(spec);
                        if let Some(advisory) = resolution.advisory {
                            tracing::warn!(submodule = %submodule.name, "{advisory}");
                            advisories.push(SubmoduleAdvisory {
                                submodule: submodule.name.clone(),
                                advisory,
                            });
                        }
                        let reference = spec
                            .reference
                            .clone()
                            .or_else(|| current.and_then(|s| s.refs.get(&submodule.name).cloned()))
                            .or_else(|| self.config.default_ref.clone());
                        (Some(resolution.set), reference)
                    }
                    None => (None, None),
                };
                PlannedSubmodule {
                    submodule: submodule.clone(),
                    spec,
                    set,
                    reference,
                }
            })
            .collect();

        Ok(Plan {
            service: request.service.clone(),
            version: request.version.clone(),
            profile,
            from_document,
            entries,
            advisories,
        })
    }

    /// Diff between the current state and what `request` would commit, with
    /// no VCS call and no write.
    pub fn preview(&self, request: &InitRequest, fallback: Fallback) -> Result<Vec<SubmoduleChange>> {
        let current = self.state.load()?;
        let plan = self.plan(request, fallback, current.as_ref())?;
        Ok(state::diff(current.as_ref(), &plan.planned_state()))
    }

    /// Initialize the workspace for `request`. Without a profile, every known
    /// submodule gets a full checkout.
    pub async fn init(&self, request: &InitRequest) -> Result<RunReport> {
        self.run(request, Fallback::AllKnown).await
    }

    /// Move the workspace to a new version. Without a profile, the currently
    /// active submodules get a full checkout at their current refs.
    pub async fn version_new(&self, request: &InitRequest) -> Result<RunReport> {
        self.run(request, Fallback::PreviouslyActive).await
    }

    async fn run(&self, request: &InitRequest, fallback: Fallback) -> Result<RunReport> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "run",
            %run_id,
            service = %request.service,
            version = %request.version
        );
        self.run_inner(request, fallback, run_id)
            .instrument(span)
            .await
    }

    async fn run_inner(
        &self,
        request: &InitRequest,
        fallback: Fallback,
        run_id: Uuid,
    ) -> Result<RunReport> {
        let current = self.state.load()?;
        let journal = self.state.load_journal()?;
        if !journal.is_empty() {
            tracing::info!(
                submodules = journal.trees.len(),
                "previous run was withheld, reconciling its trees"
            );
        }
        let baseline = Baseline {
            state: current.as_ref(),
            journal: &journal,
        };
        let plan = self.plan(request, fallback, current.as_ref())?;

        let initializer = SubmoduleInitializer::new(self.vcs.as_ref());
        let applier = SparseApplier::new(self.vcs.as_ref());
        let branch = plan.profile.options.auto_branch.then(|| plan.work_branch());

        let mut submodules: Vec<SubmoduleReport> = stream::iter(&plan.entries)
            .map(|entry| {
                self.process(
                    entry,
                    &initializer,
                    &applier,
                    plan.profile.options,
                    branch.as_deref(),
                    &baseline,
                )
            })
            .buffer_unordered(self.config.jobs.max(1))
            .collect()
            .await;
        submodules.sort_by(|a, b| a.name.cmp(&b.name));

        let mut report = RunReport {
            run_id,
            service: plan.service.clone(),
            version: plan.version.clone(),
            submodules,
            advisories: plan.advisories.clone(),
            changes: Vec::new(),
            state: StateWrite::Withheld,
        };

        let failed = report.failures().count();
        if failed > 0 {
            tracing::warn!(failed, "run failed, workspace state left unchanged");
            self.state
                .record_journal(touched_trees(&report, &baseline, run_id))?;
            return Ok(report);
        }

        let mut next = plan.planned_state();
        next.last_run_id = Some(run_id);
        report.changes = state::diff(current.as_ref(), &next);

        if current.as_ref().is_some_and(|c| c.same_content(&next)) {
            tracing::info!("workspace already up to date");
            report.state = StateWrite::Unchanged;
        } else {
            self.state.commit(&next)?;
            tracing::info!(path = %self.state.path().display(), "workspace state committed");
            report.state = StateWrite::Committed;
        }
        self.state.clear_journal()?;
        Ok(report)
    }

    async fn process(
        &self,
        entry: &PlannedSubmodule,
        initializer: &SubmoduleInitializer<'_>,
        applier: &SparseApplier<'_>,
        options: ProfileOptions,
        branch: Option<&str>,
        baseline: &Baseline<'_>,
    ) -> SubmoduleReport {
        let name = entry.submodule.name.clone();
        let Some(set) = &entry.set else {
            return SubmoduleReport {
                name,
                status: SubmoduleStatus::NotInProfile,
            };
        };
        let failed = |name: String, failure: SubmoduleFailure| {
            tracing::error!(submodule = %name, "{failure}");
            SubmoduleReport {
                name,
                status: SubmoduleStatus::Failed(failure),
            }
        };

        let target = CheckoutTarget {
            reference: entry.reference.as_deref(),
            shallow: options.shallow_clone,
            recorded: baseline.reference(&name),
        };
        let ensured = match initializer
            .ensure(&entry.submodule, entry.spec.as_ref(), target)
            .await
        {
            Ok(ensured) => ensured,
            Err(e) => return failed(name, e.into()),
        };
        let outcome = ensured.outcome;

        // A freshly registered tree has no sparse config, whatever was recorded.
        let previous = match outcome {
            Outcome::Initialized => None,
            _ => baseline.patterns(&name),
        };
        let apply = match applier.apply(&entry.submodule, set, previous).await {
            Ok(apply) => apply,
            Err(e) => return failed(name, e.into()),
        };

        if let Some(branch) = branch {
            let on_branch = ensured.branch.as_deref() == Some(branch);
            if ensured.moved_head() || !on_branch {
                let reset = ensured.moved_head();
                if let Err(e) = self
                    .vcs
                    .ensure_branch(&entry.submodule, branch, reset)
                    .await
                {
                    let err = CheckoutError::new(&name, e);
                    return failed(name, err.into());
                }
            }
        }

        SubmoduleReport {
            name,
            status: SubmoduleStatus::Ready {
                outcome,
                apply,
                patterns: set.clone(),
                reference: entry.reference.clone(),
            },
        }
    }

    fn fallback_profile(
        &self,
        request: &InitRequest,
        fallback: Fallback,
        current: Option<&WorkspaceState>,
    ) -> Profile {
        match (fallback, current) {
            (Fallback::PreviouslyActive, Some(state)) => {
                let names: Vec<&String> = state
                    .applied
                    .keys()
                    .filter(|name| {
                        let known = self.submodules.iter().any(|s| &s.name == *name);
                        if !known {
                            tracing::warn!(submodule = %name, "previously active submodule is no longer known, dropping");
                        }
                        known
                    })
                    .collect();
                let mut profile = Profile::full_checkout(
                    &request.service,
                    &request.version,
                    names.into_iter().cloned(),
                );
                // Keep the previous depth when every submodule agreed on it.
                if let Some(&first) = state.shallow.values().next() {
                    if state.shallow.values().all(|&s| s == first) {
                        profile.options.shallow_clone = first;
                    }
                }
                tracing::info!(
                    submodules = profile.submodules.len(),
                    "no profile, keeping previously active submodules with full checkout"
                );
                profile
            }
            _ => {
                tracing::info!("no profile, using full checkout for every submodule");
                Profile::full_checkout(
                    &request.service,
                    &request.version,
                    self.submodules.iter().map(|s| s.name.clone()),
                )
            }
        }
    }

    fn ensure_known(&self, name: &str) -> std::result::Result<(), SchemaError> {
        ensure_known(name, &self.submodules)
    }
}

/// What the trees are known to look like before a run: the committed state,
/// overridden per submodule by the journal of withheld runs.
struct Baseline<'a> {
    state: Option<&'a WorkspaceState>,
    journal: &'a Journal,
}

impl Baseline<'_> {
    fn patterns(&self, name: &str) -> Option<&EffectivePatternSet> {
        match self.journal.trees.get(name) {
            Some(entry) => entry.as_ref().map(|s| &s.patterns),
            None => self.state.and_then(|s| s.applied.get(name)),
        }
    }

    fn reference(&self, name: &str) -> Option<&str> {
        match self.journal.trees.get(name) {
            Some(entry) => entry.as_ref().and_then(|s| s.reference.as_deref()),
            None => self
                .state
                .and_then(|s| s.refs.get(name))
                .map(String::as_str),
        }
    }
}

/// Journal entries for every tree a withheld run touched. Failed submodules
/// are marked untrusted; submodules outside the profile were not touched.
fn touched_trees(report: &RunReport, baseline: &Baseline<'_>, run_id: Uuid) -> Journal {
    let trees = report
        .submodules
        .iter()
        .filter_map(|sub| match &sub.status {
            SubmoduleStatus::NotInProfile => None,
            SubmoduleStatus::Ready {
                patterns,
                reference,
                ..
            } => {
                let reference = reference
                    .clone()
                    .or_else(|| baseline.reference(&sub.name).map(str::to_string));
                Some((
                    sub.name.clone(),
                    Some(SubmoduleSnapshot {
                        patterns: patterns.clone(),
                        reference,
                    }),
                ))
            }
            SubmoduleStatus::Failed(_) => Some((sub.name.clone(), None)),
        })
        .collect();
    Journal {
        last_run_id: Some(run_id),
        trees,
    }
}

fn ensure_known(name: &str, known: &[Submodule]) -> std::result::Result<(), SchemaError> {
    if known.iter().any(|s| s.name == name) {
        return Ok(());
    }
    Err(SchemaError::UnknownSubmodule {
        name: name.to_string(),
        known: known
            .iter()
            .map(|s| s.name.as_str())
            .collect::<Vec<_>>()
            .join(", "),
    })
}

/// Append CLI `--include` / `--exclude` entries after the profile's own
/// patterns, in the order given.
fn apply_overrides(
    submodules: &mut BTreeMap<String, SubmoduleSpec>,
    include: &[String],
    exclude: &[String],
    known: &[Submodule],
) -> std::result::Result<(), SchemaError> {
    let entries = include
        .iter()
        .map(|raw| (raw, true))
        .chain(exclude.iter().map(|raw| (raw, false)));

    for (raw, is_include) in entries {
        let (target, path) = split_override(raw);
        let names: Vec<String> = match target {
            Some(name) => {
                ensure_known(name, known)?;
                vec![name.to_string()]
            }
            None => submodules.keys().cloned().collect(),
        };
        if names.is_empty() {
            tracing::warn!(pattern = %raw, "no submodule in the profile to apply this pattern to");
        }
        for name in names {
            let spec = submodules.entry(name).or_default();
            let list = if is_include {
                spec.include.get_or_insert_with(Vec::new)
            } else {
                spec.exclude.get_or_insert_with(Vec::new)
            };
            list.push(path.to_string());
        }
    }
    Ok(())
}

/// `fe:apps/x` -> (Some("fe"), "apps/x"); `apps/x` -> (None, "apps/x").
/// The part before `:` must not contain `/` to count as a submodule name.
fn split_override(raw: &str) -> (Option<&str>, &str) {
    match raw.split_once(':') {
        Some((name, path)) if !name.is_empty() && !name.contains('/') => (Some(name), path),
        _ => (None, raw),
    }
}
