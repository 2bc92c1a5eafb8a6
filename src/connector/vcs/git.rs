use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::application::VcsProbe;
use crate::domain::{clean_relative, DomainError, VcsState};

/// Probe over the `git` binary. Every invocation is bounded by a timeout;
/// any failure degrades the change detector to mtime comparison.
pub struct GitProbe {
    timeout: Duration,
}

impl GitProbe {
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(120),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn run(&self, cwd: Option<&Path>, args: &[&str]) -> Result<String, DomainError> {
        let mut command = Command::new("git");
        command.args(args);
        if let Some(cwd) = cwd {
            command.current_dir(cwd);
        }

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| DomainError::timeout(format!("git {} timed out", args.join(" "))))?
            .map_err(|e| DomainError::vcs(format!("Failed to invoke git: {}", e)))?;

        if !output.status.success() {
            return Err(DomainError::vcs(format!(
                "git {} exited with {}: {}",
                args.join(" "),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl Default for GitProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VcsProbe for GitProbe {
    async fn is_available(&self) -> bool {
        self.run(None, &["--version"]).await.is_ok()
    }

    async fn is_repo(&self, root: &Path) -> bool {
        matches!(
            self.run(Some(root), &["rev-parse", "--is-inside-work-tree"])
                .await
                .as_deref(),
            Ok("true")
        )
    }

    async fn current_state(&self, root: &Path) -> Option<VcsState> {
        let branch = self
            .run(Some(root), &["rev-parse", "--abbrev-ref", "HEAD"])
            .await
            .ok()?;
        let commit = self.run(Some(root), &["rev-parse", "HEAD"]).await.ok()?;
        debug!("VCS state for {}: {}@{}", root.display(), branch, commit);
        Some(VcsState { branch, commit })
    }

    async fn diff(
        &self,
        root: &Path,
        from_commit: &str,
        to_commit: &str,
    ) -> Result<Vec<String>, DomainError> {
        let output = self
            .run(
                Some(root),
                &["diff", "--name-only", from_commit, to_commit],
            )
            .await
            .inspect_err(|e| warn!("git diff failed: {}", e))?;

        Ok(output
            .lines()
            .map(clean_relative)
            .filter(|line| !line.is_empty())
            .collect())
    }
}
