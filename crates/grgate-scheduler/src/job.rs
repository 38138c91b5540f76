//! A gating run over one repository.
//!
//! A job resolves the repository configuration, walks the draft releases,
//! refreshes their status report and publishes the ones whose required
//! statuses all succeeded. The dashboard issue is reported last, whatever
//! happened during the scan.

use std::sync::Arc;

use chrono::Utc;
use grgate_config::{ConfigError, MainConfig, RepoConfig, resolve_repo_config};
use grgate_core::{JobId, Platform, Release, merge_statuses};
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::dashboard::{DashboardData, format_execution_time, render_dashboard, upsert_dashboard};
use crate::release_note::{ReleaseNoteData, render_release_note};
use crate::{SchedulerError, SchedulerResult};

/// Outcome of a processed job, by release tag.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JobSummary {
    pub published: Vec<String>,
    /// Releases that would have been published if the repository was enabled.
    pub ready: Vec<String>,
    /// Releases still waiting on required statuses.
    pub pending: Vec<String>,
    /// Releases whose tag did not match.
    pub skipped: Vec<String>,
    /// Configuration problems reported on the dashboard.
    pub errors: Vec<String>,
}

/// Unit of work handed to a worker.
pub struct Job {
    pub id: JobId,
    pub platform: Arc<dyn Platform>,
    pub owner: String,
    pub repository: String,
    pub config: RepoConfig,
    /// Problems found while resolving `config`.
    pub config_errors: Vec<String>,
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("platform", &self.platform.kind())
            .field("owner", &self.owner)
            .field("repository", &self.repository)
            .finish_non_exhaustive()
    }
}

impl Job {
    pub fn new(
        platform: Arc<dyn Platform>,
        owner: impl Into<String>,
        repository: impl Into<String>,
        config: RepoConfig,
    ) -> Self {
        Self {
            id: JobId::new(),
            platform,
            owner: owner.into(),
            repository: repository.into(),
            config,
            config_errors: Vec::new(),
        }
    }

    /// Build a job with the configuration found in the repository.
    ///
    /// An unparsable repository file falls back to the globals and is
    /// reported on the dashboard. Failing to read it is an error.
    pub async fn resolve(
        platform: Arc<dyn Platform>,
        owner: &str,
        repository: &str,
        main: &MainConfig,
    ) -> SchedulerResult<Self> {
        let (config, config_errors) =
            match resolve_repo_config(platform.as_ref(), owner, repository, main).await {
                Ok(config) => (config, Vec::new()),
                Err(ConfigError::Platform(source)) => {
                    return Err(SchedulerError::Platform {
                        context: "read repository configuration".to_string(),
                        source,
                    });
                }
                Err(e) => {
                    warn!(owner, repository, error = %e, "Invalid repository configuration, using defaults");
                    let error = format!("Couldn't parse {}: {}", main.repo_config_path, e);
                    (main.globals.clone(), vec![error])
                }
            };

        let mut job = Self::new(platform, owner, repository, config);
        job.config_errors = config_errors;
        Ok(job)
    }

    /// Run the job to completion.
    ///
    /// A scan error is returned even when the dashboard was reported; a
    /// dashboard error is returned only when the scan succeeded.
    pub async fn process(&self) -> SchedulerResult<JobSummary> {
        info!(job_id = %self.id, owner = %self.owner, repository = %self.repository, "Processing job");

        let mut summary = JobSummary {
            errors: self.config_errors.clone(),
            ..Default::default()
        };
        let scanned = self.scan(&mut summary).await;

        if self.config.dashboard.enabled {
            let reported = self.report_dashboard(&summary.errors).await;
            scanned?;
            reported?;
        } else {
            scanned?;
        }

        Ok(summary)
    }

    async fn scan(&self, summary: &mut JobSummary) -> SchedulerResult<()> {
        let (owner, repository) = (self.owner.as_str(), self.repository.as_str());

        if self.config.statuses.is_empty() {
            warn!(job_id = %self.id, owner, repository, "No required statuses configured, skipping");
            summary
                .errors
                .push("Statuses are undefined in the repository configuration".to_string());
            return Ok(());
        }

        let tag_regexp = match Regex::new(&self.config.tag_regexp) {
            Ok(re) => re,
            Err(e) => {
                warn!(job_id = %self.id, owner, repository, error = %e, "Invalid tag regexp");
                summary
                    .errors
                    .push(format!("Couldn't compile regexp \"{}\"", self.config.tag_regexp));
                return Ok(());
            }
        };

        let releases = self
            .platform
            .list_draft_releases(owner, repository)
            .await
            .map_err(SchedulerError::platform("list draft releases"))?;
        debug!(job_id = %self.id, owner, repository, count = releases.len(), "Found draft releases");

        for release in releases {
            self.evaluate(release, &tag_regexp, summary).await?;
        }

        Ok(())
    }

    async fn evaluate(
        &self,
        mut release: Release,
        tag_regexp: &Regex,
        summary: &mut JobSummary,
    ) -> SchedulerResult<()> {
        let (owner, repository) = (self.owner.as_str(), self.repository.as_str());
        let tag = release.tag.clone();

        if !tag_regexp.is_match(&tag) {
            debug!(job_id = %self.id, owner, repository, tag = %tag, "Tag does not match, skipping");
            summary.skipped.push(tag);
            return Ok(());
        }

        let succeeded = self
            .platform
            .check_all_status_succeeded(owner, repository, &release.commit_sha, &self.config.statuses)
            .await
            .map_err(SchedulerError::platform("check statuses"))?;

        if self.config.release_note.enabled {
            self.update_release_note(&mut release).await?;
        }

        if !succeeded {
            info!(job_id = %self.id, owner, repository, tag = %tag, "Waiting on required statuses");
            summary.pending.push(tag);
            return Ok(());
        }

        if !self.config.enabled {
            info!(job_id = %self.id, owner, repository, tag = %tag, "All statuses succeeded, would publish (disabled)");
            summary.ready.push(tag);
            return Ok(());
        }

        self.platform
            .publish_release(owner, repository, &release)
            .await
            .map_err(SchedulerError::platform("publish release"))?;
        info!(job_id = %self.id, owner, repository, tag = %tag, "Published release");
        summary.published.push(tag);

        Ok(())
    }

    async fn update_release_note(&self, release: &mut Release) -> SchedulerResult<()> {
        let (owner, repository) = (self.owner.as_str(), self.repository.as_str());

        let observed = self
            .platform
            .list_statuses(owner, repository, &release.commit_sha)
            .await
            .map_err(SchedulerError::platform("list statuses"))?;

        let note = render_release_note(
            &self.config.release_note.template,
            &ReleaseNoteData {
                release_note: release.release_note.clone(),
                statuses: merge_statuses(observed, &self.config.statuses),
            },
        )?;

        if !self.config.enabled {
            debug!(job_id = %self.id, owner, repository, tag = %release.tag, "Release note not updated (disabled)");
            return Ok(());
        }

        release.release_note = note;
        self.platform
            .update_release(owner, repository, release)
            .await
            .map_err(SchedulerError::platform("update release"))?;
        debug!(job_id = %self.id, owner, repository, tag = %release.tag, "Updated release note");

        Ok(())
    }

    async fn report_dashboard(&self, errors: &[String]) -> SchedulerResult<()> {
        let dashboard = &self.config.dashboard;
        let body = render_dashboard(
            &dashboard.template,
            &DashboardData {
                enabled: self.config.enabled,
                errors: errors.to_vec(),
                last_execution_time: format_execution_time(Utc::now()),
            },
        )?;

        upsert_dashboard(
            self.platform.as_ref(),
            &self.owner,
            &self.repository,
            dashboard,
            body,
        )
        .await
    }
}
