//! Domain models for decg.
//!
//! # Core Concepts
//!
//! ## Inputs
//!
//! - [`Profile`]: A (service, version) document naming the submodules to
//!   initialize and the include/exclude rules for each ([`SubmoduleSpec`]).
//! - [`Submodule`]: A submodule known to the hub, as declared in `.gitmodules`.
//!
//! ## Derived
//!
//! - [`EffectivePatternSet`]: The resolved sparse-checkout rules for one submodule.
//! - [`Advisory`]: A non-fatal note produced while resolving rules.
//!
//! ## Durable
//!
//! - [`WorkspaceState`]: What was last materialized on disk. The only
//!   persistent record; every run reads it and a successful run replaces it.
//! - [`SubmoduleChange`]: One row of a diff between two states.
//!
//! ## Run results
//!
//! - [`RunReport`]: Per-submodule outcome of an init or upgrade run.

mod pattern;
mod profile;
mod report;
mod state;
mod submodule;

pub use pattern::*;
pub use profile::*;
pub use report::*;
pub use state::*;
pub use submodule::*;
