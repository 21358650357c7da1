use crate::error::FetchError;
use crate::models::{Outcome, Submodule, SubmoduleSpec};
use crate::vcs::{FetchDepth, Vcs};

/// What a run wants checked out for one submodule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckoutTarget<'a> {
    /// `None` keeps whatever is there (or the superproject-pinned commit on
    /// first registration).
    pub reference: Option<&'a str>,
    pub shallow: bool,
    /// Ref the tree is known to be at: the journal entry of a withheld run,
    /// else the last committed state.
    pub recorded: Option<&'a str>,
}

/// What [`SubmoduleInitializer::ensure`] did, and where HEAD was before.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ensured {
    pub outcome: Outcome,
    /// Local branch checked out before the run touched the tree. Always
    /// `None` for a freshly registered submodule.
    pub branch: Option<String>,
}

impl Ensured {
    fn new(outcome: Outcome, branch: Option<String>) -> Self {
        Self { outcome, branch }
    }

    /// HEAD may have moved in this run, so a work branch has to follow it.
    pub fn moved_head(&self) -> bool {
        self.outcome != Outcome::Skipped
    }
}

/// Brings submodules to the requested ref and depth.
pub struct SubmoduleInitializer<'a> {
    vcs: &'a dyn Vcs,
}

impl<'a> SubmoduleInitializer<'a> {
    pub fn new(vcs: &'a dyn Vcs) -> Self {
        Self { vcs }
    }

    /// Ensure `submodule` matches `target`.
    ///
    /// A submodule without a profile entry is left alone entirely. A registered one
    /// that already matches costs a single probe.
    pub async fn ensure(
        &self,
        submodule: &Submodule,
        spec: Option<&SubmoduleSpec>,
        target: CheckoutTarget<'_>,
    ) -> Result<Ensured, FetchError> {
        if spec.is_none() {
            tracing::debug!(submodule = %submodule.name, "not in profile, skipping");
            return Ok(Ensured::new(Outcome::Skipped, None));
        }
        let fail = |e| FetchError::new(&submodule.name, e);

        let Some(probe) = self.vcs.probe(submodule).await.map_err(fail)? else {
            tracing::info!(
                submodule = %submodule.name,
                reference = target.reference.unwrap_or("pinned"),
                shallow = target.shallow,
                "registering submodule"
            );
            self.vcs
                .register(submodule, target.shallow)
                .await
                .map_err(fail)?;
            if let Some(reference) = target.reference {
                let depth = if target.shallow {
                    FetchDepth::Shallow
                } else {
                    FetchDepth::Full
                };
                self.vcs
                    .fetch(submodule, Some(reference), depth)
                    .await
                    .map_err(fail)?;
                self.vcs
                    .checkout(submodule, reference)
                    .await
                    .map_err(fail)?;
            }
            return Ok(Ensured::new(Outcome::Initialized, None));
        };

        let ref_changed = target
            .reference
            .is_some_and(|reference| target.recorded != Some(reference));
        let depth_changed = probe.shallow != target.shallow;
        if !ref_changed && !depth_changed {
            return Ok(Ensured::new(Outcome::Skipped, probe.branch));
        }

        let depth = match (probe.shallow, target.shallow) {
            (_, true) => FetchDepth::Shallow,
            (true, false) => FetchDepth::Unshallow,
            (false, false) => FetchDepth::Full,
        };
        tracing::info!(
            submodule = %submodule.name,
            from = target.recorded.unwrap_or("pinned"),
            to = target.reference.unwrap_or("pinned"),
            ?depth,
            "updating submodule"
        );
        self.vcs
            .fetch(submodule, target.reference, depth)
            .await
            .map_err(fail)?;
        if let (true, Some(reference)) = (ref_changed, target.reference) {
            self.vcs
                .checkout(submodule, reference)
                .await
                .map_err(fail)?;
        }
        Ok(Ensured::new(Outcome::Updated, probe.branch))
    }
}
