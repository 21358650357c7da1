use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::{FetchDepth, Probe, SparseRules, Vcs, VcsError};
use crate::models::Submodule;

/// [`Vcs`] backed by the `git` binary.
///
/// Every invocation is bounded by `timeout`; a child that outlives it is
/// killed.
#[derive(Debug, Clone)]
pub struct GitCli {
    root: PathBuf,
    timeout: Duration,
}

impl GitCli {
    pub fn new(root: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            root: root.into(),
            timeout,
        }
    }

    fn worktree(&self, submodule: &Submodule) -> PathBuf {
        self.root.join(&submodule.path)
    }

    async fn run(&self, cwd: &Path, args: &[&str], input: Option<String>) -> Result<String, VcsError> {
        let command = format!("git {}", args.join(" "));
        tracing::debug!(cwd = %cwd.display(), "{}", command);

        let mut child = Command::new("git")
            .args(args)
            .current_dir(cwd)
            .stdin(if input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| VcsError::Spawn {
                command: command.clone(),
                source,
            })?;

        let pipe = child.stdin.take();
        let run = async move {
            if let (Some(mut pipe), Some(input)) = (pipe, input) {
                pipe.write_all(input.as_bytes()).await?;
                // Dropping the pipe closes stdin so git sees EOF.
            }
            child.wait_with_output().await
        };

        let output = match tokio::time::timeout(self.timeout, run).await {
            Err(_) => {
                return Err(VcsError::Timeout {
                    command,
                    after: self.timeout,
                })
            }
            Ok(Err(source)) => return Err(VcsError::Spawn { command, source }),
            Ok(Ok(output)) => output,
        };

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            Err(VcsError::Failed {
                command,
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    /// Run a command whose nonzero exit means "no" rather than failure.
    async fn succeeds(&self, cwd: &Path, args: &[&str]) -> Result<bool, VcsError> {
        match self.run(cwd, args, None).await {
            Ok(_) => Ok(true),
            Err(VcsError::Failed { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl Vcs for GitCli {
    async fn probe(&self, submodule: &Submodule) -> Result<Option<Probe>, VcsError> {
        let dir = self.worktree(submodule);
        // Registered submodules carry a `.git` file pointing into the superproject.
        if !dir.join(".git").exists() {
            return Ok(None);
        }
        let out = self
            .run(&dir, &["rev-parse", "--is-shallow-repository"], None)
            .await?;
        let branch = match self
            .run(&dir, &["symbolic-ref", "--quiet", "--short", "HEAD"], None)
            .await
        {
            Ok(name) => Some(name.trim().to_string()),
            // Exits nonzero on a detached HEAD.
            Err(VcsError::Failed { .. }) => None,
            Err(e) => return Err(e),
        };
        Ok(Some(Probe {
            shallow: out.trim() == "true",
            branch,
        }))
    }

    async fn register(&self, submodule: &Submodule, shallow: bool) -> Result<(), VcsError> {
        let path = submodule.path.to_string_lossy().into_owned();
        self.run(&self.root, &["submodule", "init", "--", path.as_str()], None)
            .await?;

        let mut args = vec!["submodule", "update"];
        if shallow {
            args.extend(["--depth", "1"]);
        }
        args.extend(["--", path.as_str()]);
        self.run(&self.root, &args, None).await?;
        Ok(())
    }

    async fn fetch(
        &self,
        submodule: &Submodule,
        reference: Option<&str>,
        depth: FetchDepth,
    ) -> Result<(), VcsError> {
        let mut args = vec!["fetch"];
        match depth {
            FetchDepth::Shallow => args.extend(["--depth", "1"]),
            FetchDepth::Unshallow => args.push("--unshallow"),
            FetchDepth::Full => {}
        }
        args.push("origin");
        if let Some(reference) = reference {
            args.push(reference);
        }
        self.run(&self.worktree(submodule), &args, None).await?;
        Ok(())
    }

    async fn checkout(&self, submodule: &Submodule, reference: &str) -> Result<(), VcsError> {
        tracing::debug!(submodule = %submodule.name, reference, "checking out fetched ref");
        self.run(
            &self.worktree(submodule),
            &["checkout", "--quiet", "--detach", "FETCH_HEAD"],
            None,
        )
        .await?;
        Ok(())
    }

    async fn set_sparse(
        &self,
        submodule: &Submodule,
        rules: &SparseRules,
    ) -> Result<(), VcsError> {
        let dir = self.worktree(submodule);
        match rules {
            SparseRules::Cone(paths) => {
                let mut args = vec!["sparse-checkout", "set", "--cone"];
                args.extend(paths.iter().map(String::as_str));
                self.run(&dir, &args, None).await?;
            }
            SparseRules::Patterns(lines) => {
                let mut input = lines.join("\n");
                input.push('\n');
                self.run(
                    &dir,
                    &["sparse-checkout", "set", "--no-cone", "--stdin"],
                    Some(input),
                )
                .await?;
            }
        }
        Ok(())
    }

    async fn disable_sparse(&self, submodule: &Submodule) -> Result<(), VcsError> {
        self.run(
            &self.worktree(submodule),
            &["sparse-checkout", "disable"],
            None,
        )
        .await?;
        Ok(())
    }

    async fn ensure_branch(
        &self,
        submodule: &Submodule,
        branch: &str,
        reset: bool,
    ) -> Result<(), VcsError> {
        let dir = self.worktree(submodule);
        if reset {
            self.run(&dir, &["checkout", "--quiet", "-B", branch], None)
                .await?;
            return Ok(());
        }
        let local = format!("refs/heads/{branch}");
        if self
            .succeeds(&dir, &["rev-parse", "--verify", "--quiet", &local])
            .await?
        {
            self.run(&dir, &["checkout", "--quiet", branch], None).await?;
        } else {
            self.run(&dir, &["checkout", "--quiet", "-b", branch], None)
                .await?;
        }
        Ok(())
    }
}
