//! Commit status types.

use serde::{Deserialize, Serialize};

/// Lifecycle value GitHub reports once a check run is finished.
pub const STATUS_COMPLETED: &str = "completed";

/// Outcome value for a successful check (GitHub conclusion, GitLab state).
pub const STATE_SUCCESS: &str = "success";

/// A named check reported against a commit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub commit_sha: String,
    pub name: String,
    /// Lifecycle stage.
    /// GitHub: queued, in_progress or completed.
    /// GitLab: pending, running, success, failed or canceled.
    pub status: String,
    /// Outcome, only reported by GitHub checks (success, failure...).
    pub state: String,
}

impl Status {
    /// A status that has not been reported yet.
    pub fn pending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Whether the status reached its terminal successful state.
    ///
    /// GitHub reports `completed` with a `success` conclusion; GitLab has no
    /// separate outcome and reports `success` as the lifecycle stage.
    pub fn is_success(&self) -> bool {
        (self.status == STATUS_COMPLETED && self.state == STATE_SUCCESS)
            || self.status == STATE_SUCCESS
    }
}

/// Add a placeholder for every required status that has not been reported,
/// then sort by name so the rendered report is stable across runs.
pub fn merge_statuses(mut observed: Vec<Status>, required: &[String]) -> Vec<Status> {
    for name in required {
        if !observed.iter().any(|s| &s.name == name) {
            observed.push(Status::pending(name.as_str()));
        }
    }

    observed.sort_by(|a, b| a.name.cmp(&b.name));
    observed
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn status(name: &str, status: &str, state: &str) -> Status {
        Status {
            commit_sha: "abc123".to_string(),
            name: name.to_string(),
            status: status.to_string(),
            state: state.to_string(),
        }
    }

    #[test]
    fn test_merge_adds_missing_required_statuses() {
        let merged = merge_statuses(
            vec![Status::pending("feature-flow")],
            &["happy-flow".to_string(), "feature-flow".to_string()],
        );

        assert_eq!(
            merged,
            vec![Status::pending("feature-flow"), Status::pending("happy-flow")]
        );
    }

    #[test]
    fn test_merge_keeps_unrequired_statuses_sorted() {
        let observed = vec![
            status("lint", "completed", "failure"),
            status("e2e", "completed", "success"),
            status("build", "in_progress", ""),
        ];
        let required = vec!["e2e".to_string(), "deploy-preview".to_string()];

        let merged = merge_statuses(observed, &required);
        let names: Vec<&str> = merged.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["build", "deploy-preview", "e2e", "lint"]);

        let union: BTreeSet<&str> = ["lint", "e2e", "build", "deploy-preview"].into();
        assert_eq!(merged.len(), union.len());

        let e2e = merged.iter().find(|s| s.name == "e2e").unwrap();
        assert!(e2e.is_success());
        let preview = merged.iter().find(|s| s.name == "deploy-preview").unwrap();
        assert!(preview.status.is_empty() && preview.state.is_empty());
    }

    #[test]
    fn test_merge_with_nothing_required_only_sorts() {
        let merged = merge_statuses(vec![status("b", "", ""), status("a", "", "")], &[]);
        assert_eq!(merged[0].name, "a");
        assert_eq!(merged[1].name, "b");
    }

    #[test]
    fn test_is_success() {
        assert!(status("a", "completed", "success").is_success());
        assert!(status("a", "success", "").is_success());
        assert!(!status("a", "completed", "failure").is_success());
        assert!(!status("a", "in_progress", "").is_success());
        assert!(!status("a", "running", "").is_success());
        assert!(!Status::pending("a").is_success());
    }
}
