//! One-shot gating run against a repository.

use anyhow::{Context, Result};
use grgate_config::MainConfig;
use grgate_core::RepositoryRef;
use grgate_scheduler::Job;
use tracing::info;

use super::platform_for;

/// Command line overrides of the repository configuration.
#[derive(Debug, Default)]
pub struct RunOptions {
    pub dry_run: bool,
    pub tag_regexp: Option<String>,
    pub statuses: Vec<String>,
}

pub async fn run(config: &MainConfig, repository: &RepositoryRef, options: RunOptions) -> Result<()> {
    let platform = platform_for(config, repository)?;

    if options.dry_run {
        info!("Executing command with dry-run mode enabled");
    }

    let mut job = Job::resolve(platform, &repository.owner, &repository.name, config)
        .await
        .with_context(|| format!("Failed to resolve configuration of {}", repository))?;

    if !options.statuses.is_empty() {
        job.config.statuses = options.statuses;
    }
    if let Some(tag_regexp) = options.tag_regexp {
        job.config.tag_regexp = tag_regexp;
    }
    if options.dry_run {
        job.config.enabled = false;
    }

    let summary = job
        .process()
        .await
        .with_context(|| format!("Failed to process {}", repository))?;

    for tag in &summary.published {
        println!("published  {}", tag);
    }
    for tag in &summary.ready {
        println!("ready      {}", tag);
    }
    for tag in &summary.pending {
        println!("pending    {}", tag);
    }
    for error in &summary.errors {
        eprintln!("error: {}", error);
    }

    Ok(())
}
