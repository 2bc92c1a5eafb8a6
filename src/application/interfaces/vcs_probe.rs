use std::path::Path;

use async_trait::async_trait;

use crate::domain::{DomainError, VcsState};

/// Thin contract over the source-control binary. All methods are bounded
/// by the probe's own timeout; failures surface as [`DomainError::VcsError`]
/// and the change detector falls back to mtime comparison.
#[async_trait]
pub trait VcsProbe: Send + Sync {
    async fn is_available(&self) -> bool;

    async fn is_repo(&self, root: &Path) -> bool;

    /// Current branch and commit, or `None` outside a repository.
    async fn current_state(&self, root: &Path) -> Option<VcsState>;

    /// Relative paths touched between two commits.
    async fn diff(
        &self,
        root: &Path,
        from_commit: &str,
        to_commit: &str,
    ) -> Result<Vec<String>, DomainError>;
}
