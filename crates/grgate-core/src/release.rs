//! Release types.

use serde::{Deserialize, Serialize};

use crate::PlatformKind;

/// Platform-specific release identifier.
///
/// GitHub identifies a release by a numeric ID, GitLab by its tag name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "platform", content = "id", rename_all = "lowercase")]
pub enum ReleaseId {
    Github(u64),
    Gitlab(String),
}

impl std::fmt::Display for ReleaseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReleaseId::Github(id) => write!(f, "{}", id),
            ReleaseId::Gitlab(tag) => write!(f, "{}", tag),
        }
    }
}

/// A release object on the remote platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Release {
    /// Commit the release points at.
    pub commit_sha: String,
    pub id: ReleaseId,
    pub name: String,
    pub tag: String,
    /// Free-text description, possibly holding a rendered status report.
    pub release_note: String,
    /// True while the release is not published.
    pub draft: bool,
    pub platform: PlatformKind,
}
