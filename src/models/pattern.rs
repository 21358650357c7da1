use serde::{Deserialize, Serialize};

/// How a submodule's working tree is narrowed.
///
/// - `IncludeOnly`: only the listed directories are materialized (cone mode)
/// - `ExcludeAllBut`: everything is materialized except the listed patterns
/// - `Full`: sparse checkout is disabled
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PatternMode {
    IncludeOnly,
    ExcludeAllBut,
    Full,
}

impl PatternMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IncludeOnly => "include_only",
            Self::ExcludeAllBut => "exclude_all_but",
            Self::Full => "full",
        }
    }
}

/// Resolved sparse-checkout rules for one submodule.
///
/// `patterns` keeps the order the profile gave them in: exclude mode is
/// last-match-wins, so a later negated entry can re-include a path that an
/// earlier, broader entry excluded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EffectivePatternSet {
    pub mode: PatternMode,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub patterns: Vec<String>,
}

impl EffectivePatternSet {
    pub fn full() -> Self {
        Self {
            mode: PatternMode::Full,
            patterns: Vec::new(),
        }
    }

    pub fn include_only(patterns: Vec<String>) -> Self {
        Self {
            mode: PatternMode::IncludeOnly,
            patterns,
        }
    }

    pub fn exclude_all_but(patterns: Vec<String>) -> Self {
        Self {
            mode: PatternMode::ExcludeAllBut,
            patterns,
        }
    }

    pub fn is_full(&self) -> bool {
        self.mode == PatternMode::Full
    }
}

/// A non-fatal note raised while resolving a [`SubmoduleSpec`](super::SubmoduleSpec).
///
/// Advisories are returned to the caller rather than printed so that they can
/// be rendered, logged or asserted on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Advisory {
    /// Both `include` and `exclude` were given; `exclude` was dropped.
    ExcludeIgnored { ignored: Vec<String> },
}

impl std::fmt::Display for Advisory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ExcludeIgnored { ignored } => write!(
                f,
                "both include and exclude are set; exclude ignored ({})",
                ignored.join(", ")
            ),
        }
    }
}
