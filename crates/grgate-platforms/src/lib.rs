//! Source-control platform clients for GRGate.
//!
//! Provides [`Platform`] implementations for:
//! - GitHub (releases, check runs, issues)
//! - GitLab (releases, commit statuses, issues)

pub mod github;
pub mod gitlab;
mod http;

use std::sync::Arc;

use grgate_config::MainConfig;
use grgate_core::{Platform, PlatformKind, PlatformResult};

pub use github::GithubPlatform;
pub use gitlab::GitlabPlatform;

/// Build the client for `kind` from the global configuration.
pub fn new_platform(config: &MainConfig, kind: PlatformKind) -> PlatformResult<Arc<dyn Platform>> {
    Ok(match kind {
        PlatformKind::Github => Arc::new(GithubPlatform::new(&config.github)?),
        PlatformKind::Gitlab => Arc::new(GitlabPlatform::new(&config.gitlab)?),
    })
}
