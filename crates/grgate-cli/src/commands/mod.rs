//! CLI command implementations.

pub mod run;
pub mod serve;
pub mod status;

use std::sync::Arc;

use anyhow::{Context, Result};
use grgate_config::MainConfig;
use grgate_core::{Platform, RepositoryRef};

/// Client for the repository's platform. A host in the repository URL
/// takes precedence over the configured platform.
fn platform_for(config: &MainConfig, repository: &RepositoryRef) -> Result<Arc<dyn Platform>> {
    let kind = repository.platform.unwrap_or(config.platform);
    grgate_platforms::new_platform(config, kind)
        .with_context(|| format!("Failed to create {} client", kind))
}
