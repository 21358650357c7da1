//! Include/exclude precedence.
//!
//! | include | exclude | mode              | patterns                 |
//! |---------|---------|-------------------|--------------------------|
//! | yes     | yes     | `IncludeOnly`     | include, plus advisory   |
//! | yes     | no      | `IncludeOnly`     | include                  |
//! | no      | yes     | `ExcludeAllBut`   | exclude                  |
//! | no      | no      | `Full`            | empty                    |
//!
//! An empty list counts as absent. Patterns are passed through in document
//! order, never sorted or de-duplicated.

use crate::models::{Advisory, EffectivePatternSet, SubmoduleSpec};

/// Resolver output for one submodule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub set: EffectivePatternSet,
    pub advisory: Option<Advisory>,
}

/// Compute the effective pattern set for `spec`. Never fails.
pub fn resolve(spec: &SubmoduleSpec) -> Resolution {
    match (spec.effective_include(), spec.effective_exclude()) {
        (Some(include), Some(exclude)) => Resolution {
            set: EffectivePatternSet::include_only(include.to_vec()),
            advisory: Some(Advisory::ExcludeIgnored {
                ignored: exclude.to_vec(),
            }),
        },
        (Some(include), None) => Resolution {
            set: EffectivePatternSet::include_only(include.to_vec()),
            advisory: None,
        },
        (None, Some(exclude)) => Resolution {
            set: EffectivePatternSet::exclude_all_but(exclude.to_vec()),
            advisory: None,
        },
        (None, None) => Resolution {
            set: EffectivePatternSet::full(),
            advisory: None,
        },
    }
}
