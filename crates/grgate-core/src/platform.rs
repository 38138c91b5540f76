//! The platform contract.
//!
//! Gating logic only talks to a source-control platform through [`Platform`].
//! GitHub and GitLab each provide an implementation; tests use the in-memory
//! platform from the `testing` feature.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{Issue, PlatformResult, Release, Status};

/// Source-control platform type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformKind {
    Github,
    Gitlab,
}

impl std::fmt::Display for PlatformKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlatformKind::Github => write!(f, "github"),
            PlatformKind::Gitlab => write!(f, "gitlab"),
        }
    }
}

impl std::str::FromStr for PlatformKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "github" => Ok(PlatformKind::Github),
            "gitlab" => Ok(PlatformKind::Gitlab),
            _ => Err(format!("platform {} is not recognized", s)),
        }
    }
}

/// Capabilities a source-control platform must provide.
///
/// Implementations perform exactly the remote call implied by each method,
/// never cache, and never retry. Errors carry the call context.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Which platform this is.
    fn kind(&self) -> PlatformKind;

    /// Read a file from the default branch. Returns
    /// [`crate::PlatformError::NotFound`] when the file does not exist.
    async fn read_file(&self, owner: &str, repository: &str, path: &str) -> PlatformResult<String>;

    /// List every release, published or not.
    async fn list_releases(&self, owner: &str, repository: &str) -> PlatformResult<Vec<Release>>;

    /// List releases that are not published yet.
    async fn list_draft_releases(
        &self,
        owner: &str,
        repository: &str,
    ) -> PlatformResult<Vec<Release>> {
        let releases = self.list_releases(owner, repository).await?;
        Ok(releases.into_iter().filter(|r| r.draft).collect())
    }

    /// Persist the name and release note of a release. Draft state is left untouched.
    async fn update_release(
        &self,
        owner: &str,
        repository: &str,
        release: &Release,
    ) -> PlatformResult<()>;

    /// Publish a draft release. Publishing an already published release is a no-op.
    async fn publish_release(
        &self,
        owner: &str,
        repository: &str,
        release: &Release,
    ) -> PlatformResult<bool>;

    /// List statuses attached to a commit.
    async fn list_statuses(
        &self,
        owner: &str,
        repository: &str,
        commit_sha: &str,
    ) -> PlatformResult<Vec<Status>>;

    /// Attach a status to a commit.
    async fn create_status(
        &self,
        owner: &str,
        repository: &str,
        status: &Status,
    ) -> PlatformResult<()>;

    /// Find a status on a commit by name.
    async fn get_status(
        &self,
        owner: &str,
        repository: &str,
        commit_sha: &str,
        name: &str,
    ) -> PlatformResult<Option<Status>> {
        let statuses = self.list_statuses(owner, repository, commit_sha).await?;
        Ok(statuses.into_iter().find(|s| s.name == name))
    }

    /// Check that every named status has succeeded on a commit.
    /// Vacuously true when `names` is empty.
    async fn check_all_status_succeeded(
        &self,
        owner: &str,
        repository: &str,
        commit_sha: &str,
        names: &[String],
    ) -> PlatformResult<bool> {
        if names.is_empty() {
            return Ok(true);
        }

        let statuses = self.list_statuses(owner, repository, commit_sha).await?;
        Ok(names
            .iter()
            .all(|name| statuses.iter().any(|s| &s.name == name && s.is_success())))
    }

    /// Login of the account the client is authenticated as.
    async fn current_user(&self) -> PlatformResult<String>;

    /// List issues opened by the given author.
    async fn list_issues_by_author(
        &self,
        owner: &str,
        repository: &str,
        author: &str,
    ) -> PlatformResult<Vec<Issue>>;

    async fn create_issue(&self, owner: &str, repository: &str, issue: &Issue)
    -> PlatformResult<()>;

    async fn update_issue(&self, owner: &str, repository: &str, issue: &Issue)
    -> PlatformResult<()>;
}
