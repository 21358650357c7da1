use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A sparse-checkout profile for one (service, version) pair.
///
/// Profiles are loaded once per run and never mutated afterwards. A submodule
/// that is not a key of `submodules` is left completely uninitialized; an
/// empty [`SubmoduleSpec`] means a full checkout.
///
/// A document without a `submodules` key at all covers every known submodule
/// with a full checkout; `submodules_listed` is false in that case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Profile {
    pub service: String,
    pub version: String,
    pub submodules: BTreeMap<String, SubmoduleSpec>,
    pub options: ProfileOptions,
    #[serde(skip)]
    pub submodules_listed: bool,
}

impl Profile {
    /// Profile used when no document exists: every named submodule gets a
    /// full checkout with default options.
    pub fn full_checkout<I, S>(service: &str, version: &str, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            service: service.to_string(),
            version: version.to_string(),
            submodules: names
                .into_iter()
                .map(|name| (name.into(), SubmoduleSpec::default()))
                .collect(),
            options: ProfileOptions::default(),
            submodules_listed: true,
        }
    }
}

/// Include/exclude rules for one submodule.
///
/// Both lists may be present in a document; the resolver decides which one
/// takes effect. Unknown keys are rejected at load time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubmoduleSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<Vec<String>>,
    /// Branch, tag or commit to check out. Falls back to the previously
    /// recorded ref, then the configured default.
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

impl SubmoduleSpec {
    pub fn include<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            include: Some(paths.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    pub fn exclude<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            exclude: Some(paths.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    /// Include list, if it has at least one entry.
    pub fn effective_include(&self) -> Option<&[String]> {
        self.include.as_deref().filter(|paths| !paths.is_empty())
    }

    /// Exclude list, if it has at least one entry.
    pub fn effective_exclude(&self) -> Option<&[String]> {
        self.exclude.as_deref().filter(|paths| !paths.is_empty())
    }
}

/// Per-profile checkout options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileOptions {
    /// Fetch with depth 1 instead of full history.
    pub shallow_clone: bool,
    /// Switch each submodule to `{service}/develop/{version}` after checkout.
    pub auto_branch: bool,
}

impl Default for ProfileOptions {
    fn default() -> Self {
        Self {
            shallow_clone: true,
            auto_branch: true,
        }
    }
}
