//! ASCII tree rendering for run reports, workspace status and diffs.

use crate::models::{
    ApplyOutcome, ChangeKind, EffectivePatternSet, Outcome, PatternMode, RunReport, StateWrite,
    Submodule, SubmoduleChange, SubmoduleStatus, WorkspaceState,
};

const INITIALIZED: char = '●';
const UPDATED: char = '◐';
const UNCHANGED: char = '○';
const ABSENT: char = '◌';
const FAILED: char = '✗';

/// Render a run report, one line per known submodule.
///
/// Example output:
/// ```text
/// deep-ecg-analysis v0.0.1
/// ├── ● decg-be-monorepo  initialized, full
/// ├── ✗ decg-fe-monorepo  fetch failed for decg-fe-monorepo: timed out after 300s
/// └── ◌ decg-go-monorepo  not in profile
/// state: withheld (1 failed)
/// ```
pub fn render_report(report: &RunReport) -> String {
    let mut output = format!("{} {}\n", report.service, report.version);

    let lines: Vec<(char, &str, String)> = report
        .submodules
        .iter()
        .map(|sub| match &sub.status {
            SubmoduleStatus::NotInProfile => (ABSENT, sub.name.as_str(), "not in profile".to_string()),
            SubmoduleStatus::Ready {
                outcome,
                apply,
                patterns,
                reference,
            } => {
                let symbol = match (outcome, apply) {
                    (Outcome::Initialized, _) => INITIALIZED,
                    (Outcome::Updated, _) | (_, ApplyOutcome::Applied) => UPDATED,
                    (Outcome::Skipped, ApplyOutcome::Unchanged) => UNCHANGED,
                };
                let mut detail = format!("{}, {}", outcome.as_str(), describe_patterns(patterns));
                if let Some(reference) = reference {
                    detail.push_str(&format!(" @ {reference}"));
                }
                (symbol, sub.name.as_str(), detail)
            }
            SubmoduleStatus::Failed(failure) => (FAILED, sub.name.as_str(), failure.to_string()),
        })
        .collect();
    push_branches(&mut output, &lines);

    for advisory in &report.advisories {
        output.push_str(&format!("warning: {}: {}\n", advisory.submodule, advisory.advisory));
    }

    let state = match report.state {
        StateWrite::Committed => "state: committed".to_string(),
        StateWrite::Unchanged => "state: unchanged".to_string(),
        StateWrite::Withheld => format!("state: withheld ({} failed)", report.failures().count()),
    };
    output.push_str(&state);
    output.push('\n');
    output
}

/// Render what the state records for every known submodule. Submodules the
/// state does not mention are shown as absent, never as full checkouts.
pub fn render_status(known: &[Submodule], state: Option<&WorkspaceState>) -> String {
    let mut output = match state {
        Some(state) => format!("{} {}\n", state.active_service, state.active_version),
        None => "(not initialized)\n".to_string(),
    };

    let lines: Vec<(char, &str, String)> = known
        .iter()
        .map(|sub| match state.and_then(|s| s.snapshot(&sub.name)) {
            Some(snapshot) => {
                let mut detail = format!(
                    "{}  {}",
                    sub.path.display(),
                    describe_patterns(&snapshot.patterns)
                );
                detail.push_str(&format!(
                    " @ {}",
                    snapshot.reference.as_deref().unwrap_or("pinned")
                ));
                (INITIALIZED, sub.name.as_str(), detail)
            }
            None => (ABSENT, sub.name.as_str(), format!("{}  absent", sub.path.display())),
        })
        .collect();
    push_branches(&mut output, &lines);
    output
}

/// Render a state diff.
pub fn render_changes(changes: &[SubmoduleChange]) -> String {
    if changes.is_empty() {
        return "(no submodules)\n".to_string();
    }
    let lines: Vec<(char, &str, String)> = changes
        .iter()
        .map(|change| {
            let symbol = match change.kind {
                ChangeKind::Added => INITIALIZED,
                ChangeKind::Removed => ABSENT,
                ChangeKind::RefChanged | ChangeKind::PatternsChanged => UPDATED,
                ChangeKind::Unchanged => UNCHANGED,
            };
            let describe = |snapshot: &Option<crate::models::SubmoduleSnapshot>| match snapshot {
                Some(s) => format!(
                    "{} @ {}",
                    describe_patterns(&s.patterns),
                    s.reference.as_deref().unwrap_or("pinned")
                ),
                None => "absent".to_string(),
            };
            let detail = match change.kind {
                ChangeKind::Unchanged => describe(&change.after),
                _ => format!("{} -> {}", describe(&change.before), describe(&change.after)),
            };
            (
                symbol,
                change.name.as_str(),
                format!("{}  {}", change.kind.as_str(), detail),
            )
        })
        .collect();

    let mut output = String::new();
    push_branches(&mut output, &lines);
    output
}

fn describe_patterns(set: &EffectivePatternSet) -> String {
    match set.mode {
        PatternMode::Full => "full".to_string(),
        PatternMode::IncludeOnly | PatternMode::ExcludeAllBut => {
            format!("{} [{}]", set.mode.as_str(), set.patterns.join(", "))
        }
    }
}

fn push_branches(output: &mut String, lines: &[(char, &str, String)]) {
    for (i, (symbol, name, detail)) in lines.iter().enumerate() {
        let branch = if i == lines.len() - 1 {
            "└── "
        } else {
            "├── "
        };
        output.push_str(branch);
        output.push(*symbol);
        output.push(' ');
        output.push_str(name);
        output.push_str("  ");
        output.push_str(detail);
        output.push('\n');
    }
}
