//! Repository references.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::PlatformKind;

static REPOSITORY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:(?:https?|ssh)://)?(?:git@)?(?:(?P<host>[\w-]+(?:\.[\w-]+)+)[:/])?(?P<owner>[\w.-]+(?:/[\w.-]+)*)/(?P<name>[\w.-]+?)(?:\.git)?/?$",
    )
    .expect("valid repository regex")
});

/// A repository on a source-control platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryRef {
    /// Owner, organization or GitLab group path.
    pub owner: String,
    pub name: String,
    /// Platform inferred from the host, when one was given.
    pub platform: Option<PlatformKind>,
}

impl RepositoryRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            platform: None,
        }
    }

    /// Parse an HTTPS or SSH clone URL, or a bare `owner/name`.
    pub fn parse(input: &str) -> Result<Self, String> {
        let caps = REPOSITORY_REGEX
            .captures(input.trim())
            .ok_or_else(|| "cannot parse provided repository url or owner/name".to_string())?;

        let platform = caps.name("host").and_then(|host| {
            let host = host.as_str();
            if host.contains("github") {
                Some(PlatformKind::Github)
            } else if host.contains("gitlab") {
                Some(PlatformKind::Gitlab)
            } else {
                None
            }
        });

        Ok(Self {
            owner: caps["owner"].to_string(),
            name: caps["name"].to_string(),
            platform,
        })
    }

    /// `owner/name`.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl std::fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl std::str::FromStr for RepositoryRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
