//! Commit status commands.

use anyhow::{Context, Result, bail};
use grgate_config::MainConfig;
use grgate_core::{RepositoryRef, Status};
use tracing::info;

use super::platform_for;

fn print_status(status: &Status) {
    println!("{}\t{}\t{}", status.name, status.status, status.state);
}

pub async fn get(config: &MainConfig, repository: &RepositoryRef, commit: &str, name: &str) -> Result<()> {
    info!(%repository, commit, "Retrieving commit status");
    let platform = platform_for(config, repository)?;

    let status = platform
        .get_status(&repository.owner, &repository.name, commit, name)
        .await
        .context("Failed to get commit status")?;

    let Some(status) = status else {
        bail!("specified commit status name not found: {}", name);
    };
    print_status(&status);

    Ok(())
}

pub async fn list(config: &MainConfig, repository: &RepositoryRef, commit: &str) -> Result<()> {
    info!(%repository, commit, "Listing commit statuses");
    let platform = platform_for(config, repository)?;

    let statuses = platform
        .list_statuses(&repository.owner, &repository.name, commit)
        .await
        .context("Failed to list commit statuses")?;

    for status in &statuses {
        print_status(status);
    }

    Ok(())
}

pub async fn set(
    config: &MainConfig,
    repository: &RepositoryRef,
    commit: &str,
    name: &str,
    status: &str,
    state: &str,
) -> Result<()> {
    info!(%repository, commit, name, status, state, "Setting commit status");
    let platform = platform_for(config, repository)?;

    let status = Status {
        commit_sha: commit.to_string(),
        name: name.to_string(),
        status: status.to_string(),
        state: state.to_string(),
    };
    platform
        .create_status(&repository.owner, &repository.name, &status)
        .await
        .context("Failed to set commit status")?;

    Ok(())
}
