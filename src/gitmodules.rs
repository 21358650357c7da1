//! Minimal `.gitmodules` reader.
//!
//! Only `[submodule "<name>"]` sections and their `path` / `url` keys are
//! read; anything else is skipped.

use std::path::Path;

use crate::error::ConfigError;
use crate::models::Submodule;

pub const GITMODULES: &str = ".gitmodules";

/// Submodules declared by the hub at `root`, sorted by name.
pub fn read(root: &Path) -> Result<Vec<Submodule>, ConfigError> {
    let path = root.join(GITMODULES);
    let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;
    Ok(parse(&contents))
}

pub fn parse(contents: &str) -> Vec<Submodule> {
    let mut submodules: Vec<Submodule> = Vec::new();
    let mut current: Option<(String, Option<String>, Option<String>)> = None;

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if line.starts_with('[') {
            flush(&mut current, &mut submodules);
            current = section_name(line).map(|name| (name, None, None));
            continue;
        }

        let Some((name, path, url)) = current.as_mut() else {
            continue;
        };
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = unquote(value.trim()).to_string();
        match key.trim() {
            "path" => *path = Some(value),
            "url" => *url = Some(value),
            other => tracing::trace!(submodule = %name, key = other, "ignoring .gitmodules key"),
        }
    }
    flush(&mut current, &mut submodules);

    submodules.sort_by(|a, b| a.name.cmp(&b.name));
    submodules
}

fn flush(
    current: &mut Option<(String, Option<String>, Option<String>)>,
    out: &mut Vec<Submodule>,
) {
    if let Some((name, path, url)) = current.take() {
        match path {
            Some(path) => out.push(Submodule {
                name,
                path: path.into(),
                url,
            }),
            None => tracing::warn!(submodule = %name, "submodule has no path in .gitmodules, ignoring"),
        }
    }
}

/// `[submodule "name"]` -> `name`.
fn section_name(line: &str) -> Option<String> {
    let inner = line.strip_prefix('[')?.strip_suffix(']')?.trim();
    let rest = inner.strip_prefix("submodule")?.trim();
    Some(unquote(rest).to_string())
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_submodule_sections() {
        let submodules = parse(
            r#"
[submodule "decg-fe-monorepo"]
	path = apps/decg-fe-monorepo
	url = git@github.com:decg/decg-fe-monorepo.git
[submodule "decg-be-monorepo"]
	path = apps/decg-be-monorepo
	url = git@github.com:decg/decg-be-monorepo.git
	branch = main
"#,
        );

        assert_eq!(submodules.len(), 2);
        assert_eq!(submodules[0].name, "decg-be-monorepo");
        assert_eq!(submodules[0].path, Path::new("apps/decg-be-monorepo"));
        assert_eq!(submodules[1].name, "decg-fe-monorepo");
        assert_eq!(
            submodules[1].url.as_deref(),
            Some("git@github.com:decg/decg-fe-monorepo.git")
        );
    }

    #[test]
    fn skips_sections_without_path_and_foreign_sections() {
        let submodules = parse(
            "[core]\n\tbare = false\n[submodule \"nopath\"]\n\turl = x\n[submodule \"ok\"]\n\tpath = ok\n",
        );
        assert_eq!(submodules, vec![Submodule::new("ok", "ok")]);
    }
}
