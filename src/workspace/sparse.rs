use crate::error::{CheckoutCause, CheckoutError};
use crate::models::{ApplyOutcome, EffectivePatternSet, PatternMode, Submodule};
use crate::vcs::{SparseRules, Vcs};

/// Matches every top-level entry in a non-cone pattern file.
pub const UNIVERSAL_PATTERN: &str = "/*";

/// Applies resolved pattern sets to submodule working trees.
pub struct SparseApplier<'a> {
    vcs: &'a dyn Vcs,
}

impl<'a> SparseApplier<'a> {
    pub fn new(vcs: &'a dyn Vcs) -> Self {
        Self { vcs }
    }

    /// Narrow `submodule` to `set`.
    ///
    /// `previous` is the set the tree is known to carry (from the last
    /// committed run, or the journal of a withheld one); when it equals `set`
    /// nothing is touched. Patterns are validated
    /// before any VCS call.
    pub async fn apply(
        &self,
        submodule: &Submodule,
        set: &EffectivePatternSet,
        previous: Option<&EffectivePatternSet>,
    ) -> Result<ApplyOutcome, CheckoutError> {
        if previous == Some(set) {
            tracing::debug!(submodule = %submodule.name, "sparse patterns unchanged");
            return Ok(ApplyOutcome::Unchanged);
        }

        let rules = render(set).map_err(|cause| CheckoutError::new(&submodule.name, cause))?;
        let result = match &rules {
            None => self.vcs.disable_sparse(submodule).await,
            Some(rules) => self.vcs.set_sparse(submodule, rules).await,
        };
        result.map_err(|e| CheckoutError::new(&submodule.name, e))?;

        tracing::info!(
            submodule = %submodule.name,
            mode = set.mode.as_str(),
            patterns = set.patterns.len(),
            "applied sparse checkout"
        );
        Ok(ApplyOutcome::Applied)
    }
}

/// Translate a pattern set into sparse-checkout rules; `None` means disable
/// sparse checkout.
///
/// Exclude mode starts from [`UNIVERSAL_PATTERN`] and negates each pattern in
/// order. A pattern that is already negated (`!p`) becomes a positive `p`,
/// re-including what an earlier entry excluded.
pub fn render(set: &EffectivePatternSet) -> Result<Option<SparseRules>, CheckoutCause> {
    validate(set)?;
    Ok(match set.mode {
        PatternMode::Full => None,
        PatternMode::IncludeOnly => Some(SparseRules::Cone(
            set.patterns
                .iter()
                .map(|p| p.trim().trim_matches('/').to_string())
                .collect(),
        )),
        PatternMode::ExcludeAllBut => {
            let mut lines = Vec::with_capacity(set.patterns.len() + 1);
            lines.push(UNIVERSAL_PATTERN.to_string());
            for pattern in &set.patterns {
                let pattern = pattern.trim();
                match pattern.strip_prefix('!') {
                    Some(reinclude) => lines.push(anchor(reinclude)),
                    None => lines.push(format!("!{}", anchor(pattern))),
                }
            }
            Some(SparseRules::Patterns(lines))
        }
    })
}

fn anchor(pattern: &str) -> String {
    if pattern.starts_with('/') {
        pattern.to_string()
    } else {
        format!("/{pattern}")
    }
}

fn validate(set: &EffectivePatternSet) -> Result<(), CheckoutCause> {
    let cone = set.mode == PatternMode::IncludeOnly;
    for pattern in &set.patterns {
        if let Some(reason) = invalid_reason(pattern, cone) {
            return Err(CheckoutCause::InvalidPattern {
                pattern: pattern.clone(),
                reason,
            });
        }
    }
    Ok(())
}

fn invalid_reason(pattern: &str, cone: bool) -> Option<&'static str> {
    let trimmed = pattern.trim();
    if pattern.contains(['\n', '\r']) {
        return Some("patterns must be a single line");
    }
    if trimmed.is_empty() || trimmed.trim_matches('/').is_empty() {
        return Some("pattern is empty");
    }
    if trimmed == "!" {
        return Some("bare negation");
    }
    if trimmed.split('/').any(|component| component == "..") {
        return Some("`..` is not allowed");
    }
    if cone {
        if trimmed.starts_with('!') {
            return Some("negation is not allowed in include mode");
        }
        if trimmed.contains(['*', '?', '[']) {
            return Some("include mode takes directories, not globs");
        }
        if trimmed.starts_with('-') {
            return Some("directory names may not start with `-`");
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn full_disables_sparse() {
        assert_eq!(render(&EffectivePatternSet::full()).unwrap(), None);
    }

    #[test]
    fn include_renders_cone_directories() {
        let rules = render(&EffectivePatternSet::include_only(strings(&[
            "apps/ecg-ui",
            "/packages/",
        ])))
        .unwrap();
        assert_eq!(
            rules,
            Some(SparseRules::Cone(strings(&["apps/ecg-ui", "packages"])))
        );
    }

    #[test]
    fn exclude_renders_universal_then_negations_in_order() {
        let rules = render(&EffectivePatternSet::exclude_all_but(strings(&[
            "/apps/*",
            "!/apps/sftp-monitor",
            "docs",
        ])))
        .unwrap();
        assert_eq!(
            rules,
            Some(SparseRules::Patterns(strings(&[
                "/*",
                "!/apps/*",
                "/apps/sftp-monitor",
                "!/docs",
            ])))
        );
    }

    #[test]
    fn rejects_globs_in_include_mode() {
        let err = render(&EffectivePatternSet::include_only(strings(&["apps/*"]))).unwrap_err();
        assert!(matches!(err, CheckoutCause::InvalidPattern { .. }));
    }

    #[test]
    fn rejects_parent_components_and_empty_patterns() {
        for bad in ["../outside", "apps/../..", "  ", "/", "!"] {
            let set = EffectivePatternSet::exclude_all_but(strings(&[bad]));
            assert!(render(&set).is_err(), "{bad:?} should be rejected");
        }
    }
}
