//! Issue types.

use serde::{Deserialize, Serialize};

/// An issue in a repository. GRGate only manages its dashboard issue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Per-repository issue number (GitHub `number`, GitLab `iid`).
    /// Ignored on creation.
    pub id: u64,
    pub title: String,
    pub body: String,
}
